use thiserror::Error;

#[derive(Debug, Error)]
pub enum MakerError {
    #[error("not initialized: run 'maker init'")]
    NotInitialized,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already exists: {0}")]
    TaskExists(String),

    #[error("invalid task id '{0}': must be alphanumeric with hyphens or underscores")]
    InvalidTaskId(String),

    #[error("invalid artifact extension '{0}': must not be empty or contain a path separator")]
    InvalidExtension(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("step not found: {0}")]
    StepNotFound(u32),

    #[error("batch not found: {0}")]
    BatchNotFound(u32),

    #[error("step {0} is already completed")]
    StepAlreadyCompleted(u32),

    #[error("step {requested} is out of order: next step is {expected}")]
    OutOfOrder { requested: u32, expected: u32 },

    #[error("batch {0} has not been checkpointed")]
    BatchNotCheckpointed(u32),

    #[error("batch {batch} is incomplete: {remaining} step(s) remaining")]
    BatchIncomplete { batch: u32, remaining: usize },

    #[error("batch {0} is already completed")]
    BatchAlreadyCompleted(u32),

    #[error("task {0} is finalized")]
    TaskFinalized(String),

    #[error("decomposition of task {0} is locked: steps have already completed")]
    DecompositionLocked(String),

    #[error("nothing to resume in task {0}: every step is completed")]
    NothingToResume(String),

    #[error("corrupt progress ledger: {0}")]
    CorruptLedger(String),

    #[error("no viable candidate: {0}")]
    NoViableCandidate(String),

    #[error("invalid score for candidate '{0}'")]
    InvalidScore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MakerError>;
