pub mod batch;
pub mod config;
pub mod init;
pub mod step;
pub mod task;

use anyhow::Context;
use maker_core::{config::Config, plan::Plan, store::TaskStore};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Decomposition input shared by `create` and `redecompose`.
pub struct PlanArgs {
    pub steps: Vec<String>,
    pub plan: Option<PathBuf>,
    pub batch_size: Option<u32>,
}

impl PlanArgs {
    pub fn build(self, cfg: &Config) -> anyhow::Result<Plan> {
        if let Some(path) = &self.plan {
            let data = read_input(path)?;
            return Plan::from_yaml(&data)
                .with_context(|| format!("invalid plan file '{}'", path.display()));
        }
        if self.steps.is_empty() {
            anyhow::bail!("no steps given: pass --step NAME (repeatable) or --plan FILE");
        }
        let size = self.batch_size.unwrap_or(cfg.batch_size);
        Plan::uniform(self.steps, size).context("invalid decomposition")
    }
}

pub fn open_store(root: &Path) -> anyhow::Result<(Config, TaskStore)> {
    let cfg = Config::load(root).context("failed to load config")?;
    let store = TaskStore::from_config(root, &cfg);
    Ok((cfg, store))
}

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}
