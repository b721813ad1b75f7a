use crate::config::Config;
use crate::error::{MakerError, Result};
use crate::io;
use crate::manifest::TaskManifest;
use crate::paths;
use crate::plan::Plan;
use crate::progress::{ProgressLedger, ResumePointer, Step};
use crate::types::Status;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskState
// ---------------------------------------------------------------------------

/// Everything `load` reconstructs for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskState {
    pub manifest: TaskManifest,
    pub ledger: ProgressLedger,
}

impl TaskState {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn steps(&self) -> &[Step] {
        &self.ledger.steps
    }

    pub fn resume_point(&self) -> Option<&ResumePointer> {
        self.ledger.resume_point.as_ref()
    }

    pub fn step(&self, id: u32) -> Option<&Step> {
        self.ledger.step(id)
    }
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// File-backed store of task records under one task root directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    task_root: PathBuf,
    artifact_extension: String,
}

impl TaskStore {
    pub fn new(task_root: impl Into<PathBuf>) -> Self {
        Self {
            task_root: task_root.into(),
            artifact_extension: "txt".to_string(),
        }
    }

    pub fn from_config(root: &Path, cfg: &Config) -> Self {
        Self::new(cfg.task_root_in(root)).with_extension(cfg.artifact_extension.clone())
    }

    /// Extension used for assembled output of newly created tasks.
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.artifact_extension = ext.into();
        self
    }

    pub fn task_root(&self) -> &Path {
        &self.task_root
    }

    pub fn task_dir(&self, id: &str) -> PathBuf {
        paths::task_dir(&self.task_root, id)
    }

    pub fn generate_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..4])
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    pub fn create(&self, description: &str, plan: &Plan) -> Result<TaskManifest> {
        self.create_with_id(&Self::generate_id(), description, plan)
    }

    /// Create a task record. Fails with `TaskExists` if a record with this id
    /// has a manifest. A directory without one is left over from an
    /// interrupted create and is reclaimed.
    pub fn create_with_id(&self, id: &str, description: &str, plan: &Plan) -> Result<TaskManifest> {
        paths::validate_task_id(id)?;
        paths::validate_extension(&self.artifact_extension)?;
        plan.validate()?;
        let ledger = plan.to_ledger()?;

        io::ensure_dir(&self.task_root)?;
        self.claim_task_dir(id)?;

        let mut manifest = TaskManifest::new(
            id,
            description,
            plan.batch_size(),
            self.artifact_extension.clone(),
        );
        manifest.reconcile(&ledger);

        if let Err(e) = self.write_new_record(id, description, plan, &ledger, &manifest) {
            if let Err(cleanup) = std::fs::remove_dir_all(self.task_dir(id)) {
                tracing::warn!(task = %id, error = %cleanup, "failed to remove partial task record");
            }
            return Err(e);
        }

        tracing::info!(
            task = %id,
            steps = manifest.total_steps,
            batches = ledger.batches.len(),
            "created task"
        );
        Ok(manifest)
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Reconstruct a task from disk. Derived fields are recomputed from the
    /// step statuses in the ledger; nothing is written.
    pub fn load(&self, id: &str) -> Result<TaskState> {
        paths::validate_task_id(id)?;
        let manifest_path = paths::manifest_path(&self.task_root, id);
        if !manifest_path.exists() {
            return Err(MakerError::TaskNotFound(id.to_string()));
        }
        let mut manifest: TaskManifest =
            serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;
        if manifest.id != id {
            return Err(MakerError::CorruptLedger(format!(
                "directory {id} holds the manifest of task {}",
                manifest.id
            )));
        }
        paths::validate_extension(&manifest.artifact_extension)?;

        let progress_path = paths::progress_path(&self.task_root, id);
        if !progress_path.exists() {
            return Err(MakerError::CorruptLedger(format!(
                "task {id} has a manifest but no {}",
                paths::PROGRESS_FILE
            )));
        }
        let mut ledger: ProgressLedger =
            serde_json::from_str(&std::fs::read_to_string(&progress_path)?)?;
        ledger.validate()?;
        ledger.refresh();

        if manifest.reconcile(&ledger) {
            tracing::warn!(task = %id, "manifest was stale; recomputed from progress ledger");
        }
        tracing::debug!(task = %id, completed = manifest.completed_steps, "loaded task");
        Ok(TaskState { manifest, ledger })
    }

    /// The first step still to do. Fails with `NothingToResume` once every
    /// step is completed.
    pub fn resume(&self, id: &str) -> Result<ResumePointer> {
        let state = self.load(id)?;
        state
            .ledger
            .resume_point
            .ok_or_else(|| MakerError::NothingToResume(id.to_string()))
    }

    /// All task manifests, oldest first.
    pub fn list(&self) -> Result<Vec<TaskManifest>> {
        if !self.task_root.exists() {
            return Ok(Vec::new());
        }
        let mut tasks = Vec::new();
        for entry in std::fs::read_dir(&self.task_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&id) {
                Ok(state) => tasks.push(state.manifest),
                Err(MakerError::TaskNotFound(_)) | Err(MakerError::InvalidTaskId(_)) => {}
                Err(e) => return Err(e),
            }
        }
        tasks.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub fn step_artifact(&self, id: &str, step: u32) -> Result<String> {
        let state = self.load(id)?;
        let s = state.step(step).ok_or(MakerError::StepNotFound(step))?;
        let path = paths::step_artifact_path(&self.task_root, id, s.batch, s.id);
        Ok(std::fs::read_to_string(path)?)
    }

    pub fn partial_artifact(&self, id: &str, batch: u32) -> Result<String> {
        let state = self.load(id)?;
        if state.ledger.batch(batch).is_none() {
            return Err(MakerError::BatchNotFound(batch));
        }
        let path = paths::partial_artifact_path(
            &self.task_root,
            id,
            batch,
            &state.manifest.artifact_extension,
        );
        Ok(std::fs::read_to_string(path)?)
    }

    pub fn final_artifact(&self, id: &str) -> Result<String> {
        let state = self.load(id)?;
        let path =
            paths::final_artifact_path(&self.task_root, id, &state.manifest.artifact_extension);
        Ok(std::fs::read_to_string(path)?)
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    /// Mark a step as started. Repeating the call is a no-op.
    pub fn begin_step(&self, id: &str, step: u32) -> Result<TaskState> {
        let mut state = self.load_writable(id)?;
        if state.ledger.begin(step)? {
            state.manifest.touch();
            self.write_ledger(id, &state)?;
            self.write_manifest(id, &state)?;
            tracing::debug!(task = %id, step, "began step");
        }
        Ok(state)
    }

    /// Store the chosen solution for `step` and mark it completed.
    pub fn record_step_result(&self, id: &str, step: u32, summary: &str) -> Result<TaskState> {
        let mut state = self.load_writable(id)?;
        let batch = state.ledger.complete(step)?;
        let name = state
            .step(step)
            .map(|s| s.name.clone())
            .unwrap_or_default();

        let body = format!(
            "# Step {step}: {name}\n\nBatch: {batch}\n\n{}\n",
            summary.trim_end()
        );
        io::atomic_write(
            &paths::step_artifact_path(&self.task_root, id, batch, step),
            body.as_bytes(),
        )?;

        state.manifest.reconcile(&state.ledger);
        state.manifest.touch();
        self.write_ledger(id, &state)?;
        self.write_manifest(id, &state)?;

        tracing::info!(
            task = %id,
            step,
            batch,
            completed = state.manifest.completed_steps,
            total = state.manifest.total_steps,
            "recorded step result"
        );
        Ok(state)
    }

    /// Write the batch's assembled output and checkpoint it. After this
    /// returns, a resumed task skips the whole batch.
    pub fn complete_batch(&self, id: &str, batch: u32, assembled: &str) -> Result<TaskState> {
        let mut state = self.load_writable(id)?;
        state.ledger.checkpoint(batch)?;

        io::atomic_write(
            &paths::partial_artifact_path(
                &self.task_root,
                id,
                batch,
                &state.manifest.artifact_extension,
            ),
            assembled.as_bytes(),
        )?;

        state.manifest.reconcile(&state.ledger);
        state.manifest.touch();
        self.write_ledger(id, &state)?;
        self.write_manifest(id, &state)?;

        tracing::info!(task = %id, batch, "checkpointed batch");
        Ok(state)
    }

    /// Write the combined artifact and mark the task completed.
    pub fn finalize(&self, id: &str, artifact: &str) -> Result<TaskManifest> {
        let mut state = self.load_writable(id)?;
        if !state.ledger.all_checkpointed() {
            return Err(MakerError::BatchNotCheckpointed(state.ledger.current_batch()));
        }

        io::atomic_write(
            &paths::final_artifact_path(&self.task_root, id, &state.manifest.artifact_extension),
            artifact.as_bytes(),
        )?;

        state.manifest.status = Status::Completed;
        state.manifest.reconcile(&state.ledger);
        state.manifest.touch();
        self.write_manifest(id, &state)?;

        tracing::info!(task = %id, "finalized task");
        Ok(state.manifest)
    }

    // -----------------------------------------------------------------------
    // Decomposition / removal
    // -----------------------------------------------------------------------

    /// Replace the task's steps and batches wholesale. Only allowed before
    /// any step has completed.
    pub fn redecompose(&self, id: &str, plan: &Plan) -> Result<TaskState> {
        let state = self.load_writable(id)?;
        if state.ledger.any_completed() {
            return Err(MakerError::DecompositionLocked(id.to_string()));
        }
        plan.validate()?;
        let ledger = plan.to_ledger()?;

        // Step files left by an interrupted write belong to the old plan.
        let dir = self.task_dir(id);
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let is_batch_dir = entry.file_name().to_string_lossy().starts_with("batch-");
            if is_batch_dir && entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            }
        }

        let mut manifest = state.manifest;
        manifest.batch_size = plan.batch_size();
        manifest.reconcile(&ledger);
        manifest.touch();
        let state = TaskState { manifest, ledger };

        io::atomic_write(
            &paths::decomposition_path(&self.task_root, id),
            plan.render_markdown(&state.manifest.description).as_bytes(),
        )?;
        self.write_ledger(id, &state)?;
        self.write_manifest(id, &state)?;

        tracing::info!(task = %id, steps = state.manifest.total_steps, "replaced decomposition");
        Ok(state)
    }

    /// Remove a task record entirely.
    pub fn delete(&self, id: &str) -> Result<()> {
        paths::validate_task_id(id)?;
        let dir = self.task_dir(id);
        if !dir.is_dir() {
            return Err(MakerError::TaskNotFound(id.to_string()));
        }
        std::fs::remove_dir_all(&dir)?;
        tracing::info!(task = %id, "deleted task");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn load_writable(&self, id: &str) -> Result<TaskState> {
        let state = self.load(id)?;
        if state.manifest.is_finalized() {
            return Err(MakerError::TaskFinalized(id.to_string()));
        }
        Ok(state)
    }

    /// Make the task directory, reclaiming one that never got a manifest.
    fn claim_task_dir(&self, id: &str) -> Result<()> {
        let dir = self.task_dir(id);
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if paths::manifest_path(&self.task_root, id).exists() || !dir.is_dir() {
                    return Err(MakerError::TaskExists(id.to_string()));
                }
                tracing::warn!(task = %id, "reclaiming task directory without a manifest");
                std::fs::remove_dir_all(&dir)?;
                std::fs::create_dir(&dir)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_new_record(
        &self,
        id: &str,
        description: &str,
        plan: &Plan,
        ledger: &ProgressLedger,
        manifest: &TaskManifest,
    ) -> Result<()> {
        io::atomic_write(
            &paths::decomposition_path(&self.task_root, id),
            plan.render_markdown(description).as_bytes(),
        )?;
        io::write_json(&paths::progress_path(&self.task_root, id), ledger)?;
        // The manifest goes last: a record without one is not a task yet.
        io::write_json(&paths::manifest_path(&self.task_root, id), manifest)
    }

    fn write_ledger(&self, id: &str, state: &TaskState) -> Result<()> {
        io::write_json(&paths::progress_path(&self.task_root, id), &state.ledger)
    }

    fn write_manifest(&self, id: &str, state: &TaskState) -> Result<()> {
        io::write_json(&paths::manifest_path(&self.task_root, id), &state.manifest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
