use crate::error::{MakerError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const MAKER_DIR: &str = ".maker";
pub const CONFIG_FILE: &str = ".maker/config.yaml";
pub const DEFAULT_TASK_ROOT: &str = ".maker/tasks";

pub const MANIFEST_FILE: &str = "task-manifest.json";
pub const PROGRESS_FILE: &str = "progress.json";
pub const DECOMPOSITION_FILE: &str = "decomposition.md";
pub const ASSEMBLED_DIR: &str = "assembled-code";
pub const FINAL_DIR: &str = "final";

// ---------------------------------------------------------------------------
// Project-level paths
// ---------------------------------------------------------------------------

pub fn maker_dir(root: &Path) -> PathBuf {
    root.join(MAKER_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Task record paths (relative to the task root)
// ---------------------------------------------------------------------------

pub fn task_dir(task_root: &Path, id: &str) -> PathBuf {
    task_root.join(id)
}

pub fn manifest_path(task_root: &Path, id: &str) -> PathBuf {
    task_dir(task_root, id).join(MANIFEST_FILE)
}

pub fn progress_path(task_root: &Path, id: &str) -> PathBuf {
    task_dir(task_root, id).join(PROGRESS_FILE)
}

pub fn decomposition_path(task_root: &Path, id: &str) -> PathBuf {
    task_dir(task_root, id).join(DECOMPOSITION_FILE)
}

/// `batch-NNN`
pub fn batch_dir_name(batch: u32) -> String {
    format!("batch-{batch:03}")
}

pub fn step_artifact_path(task_root: &Path, id: &str, batch: u32, step: u32) -> PathBuf {
    task_dir(task_root, id)
        .join(batch_dir_name(batch))
        .join(format!("step-{step:02}-solution.md"))
}

pub fn partial_artifact_path(task_root: &Path, id: &str, batch: u32, ext: &str) -> PathBuf {
    task_dir(task_root, id)
        .join(ASSEMBLED_DIR)
        .join(format!("partial-{batch:03}.{ext}"))
}

pub fn final_artifact_path(task_root: &Path, id: &str, ext: &str) -> PathBuf {
    task_dir(task_root, id)
        .join(FINAL_DIR)
        .join(format!("complete.{ext}"))
}

// ---------------------------------------------------------------------------
// Task id validation
// ---------------------------------------------------------------------------

static TASK_ID_RE: OnceLock<Regex> = OnceLock::new();

fn task_id_re() -> &'static Regex {
    TASK_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

/// Task ids become directory names, so they must not contain separators or dots.
pub fn validate_task_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !task_id_re().is_match(id) {
        return Err(MakerError::InvalidTaskId(id.to_string()));
    }
    Ok(())
}

/// Extensions are spliced into file names under the task directory.
pub fn validate_extension(ext: &str) -> Result<()> {
    if ext.is_empty() || ext.contains(['/', '\\']) || ext.contains("..") {
        return Err(MakerError::InvalidExtension(ext.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
