use crate::error::{MakerError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Directory holding task records, relative to the project root.
    #[serde(default = "default_task_root")]
    pub task_root: PathBuf,
    /// Steps per batch when a plan is given as a flat list.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// How many candidates the generator is asked for per step.
    #[serde(default = "default_candidates_per_step")]
    pub candidates_per_step: u32,
    /// Extension for assembled output, without the leading dot.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
}

fn default_version() -> u32 {
    1
}

fn default_task_root() -> PathBuf {
    PathBuf::from(paths::DEFAULT_TASK_ROOT)
}

fn default_batch_size() -> u32 {
    3
}

fn default_candidates_per_step() -> u32 {
    3
}

fn default_artifact_extension() -> String {
    "rs".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            task_root: default_task_root(),
            batch_size: default_batch_size(),
            candidates_per_step: default_candidates_per_step(),
            artifact_extension: default_artifact_extension(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(MakerError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Absolute task root for a project.
    pub fn task_root_in(&self, root: &Path) -> PathBuf {
        root.join(&self.task_root)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.batch_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "batch_size must be at least 1".to_string(),
            });
        }

        match self.candidates_per_step {
            0 => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "candidates_per_step must be at least 1".to_string(),
            }),
            1 => warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "candidates_per_step is 1: no vote takes place".to_string(),
            }),
            _ => {}
        }

        let ext = self.artifact_extension.as_str();
        if let Err(e) = paths::validate_extension(ext) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: e.to_string(),
            });
        } else if ext.contains('.') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "artifact_extension '{ext}' should be a bare extension such as 'rs'"
                ),
            });
        }

        if self.task_root.is_absolute() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "task_root '{}' is absolute; task records will live outside the project",
                    self.task_root.display()
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.batch_size, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: Config = serde_yaml::from_str("batch_size: 5\n").unwrap();
        assert_eq!(parsed.batch_size, 5);
        assert_eq!(parsed.artifact_extension, "rs");
        assert_eq!(parsed.task_root, PathBuf::from(".maker/tasks"));
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(MakerError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            artifact_extension: "py".to_string(),
            ..Config::default()
        };
        cfg.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn validate_default_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_zero_batch_size_is_error() {
        let cfg = Config {
            batch_size: 0,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Error);
    }

    #[test]
    fn validate_single_candidate_warns() {
        let cfg = Config {
            candidates_per_step: 1,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }

    #[test]
    fn validate_dotted_extension_warns() {
        let cfg = Config {
            artifact_extension: ".rs".to_string(),
            ..Config::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("artifact_extension")));
    }

    #[test]
    fn validate_separator_in_extension_is_error() {
        let cfg = Config {
            artifact_extension: "/../../x".to_string(),
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Error);
    }
}
