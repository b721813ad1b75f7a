use crate::paths;
use crate::progress::ProgressLedger;
use crate::types::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TaskManifest
// ---------------------------------------------------------------------------

/// Summary of one task record, stored as `task-manifest.json`.
///
/// The counters and checkpoint pointer are derived from the progress ledger;
/// [`TaskManifest::reconcile`] recomputes them after every write and on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskManifest {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub description: String,
    pub status: Status,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub current_batch: u32,
    pub batch_size: u32,
    pub can_resume: bool,
    pub last_checkpoint: Option<String>,
    #[serde(default = "default_extension")]
    pub artifact_extension: String,
}

fn default_extension() -> String {
    "txt".to_string()
}

impl TaskManifest {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        batch_size: u32,
        artifact_extension: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created: now,
            updated: now,
            description: description.into(),
            status: Status::Pending,
            total_steps: 0,
            completed_steps: 0,
            current_batch: 1,
            batch_size,
            can_resume: true,
            last_checkpoint: None,
            artifact_extension: artifact_extension.into(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_completed()
    }

    /// Bring derived fields in line with `ledger`. Returns true if anything changed.
    pub fn reconcile(&mut self, ledger: &ProgressLedger) -> bool {
        let before = self.clone();

        self.total_steps = ledger.steps.len() as u32;
        self.completed_steps = ledger.completed_steps() as u32;
        self.current_batch = ledger.current_batch();
        self.last_checkpoint = ledger.last_checkpoint().map(paths::batch_dir_name);
        if self.completed_steps > 0 {
            self.status.advance(Status::InProgress);
        }
        self.can_resume = !self.status.is_completed();

        *self != before
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
