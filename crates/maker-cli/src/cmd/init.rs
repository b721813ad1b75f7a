use anyhow::Context;
use maker_cli::output::print_json;
use maker_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    io::ensure_dir(&paths::maker_dir(root)).context("failed to create .maker/")?;

    let default_yaml = serde_yaml::to_string(&Config::default())?;
    let created = io::write_if_missing(&paths::config_path(root), default_yaml.as_bytes())
        .context("failed to write config")?;
    let cfg = Config::load(root).context("failed to load config")?;

    let task_root = cfg.task_root_in(root);
    io::ensure_dir(&task_root).context("failed to create task root")?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "config": paths::config_path(root),
            "config_created": created,
            "task_root": task_root,
        }))?;
    } else {
        println!("Initialized maker in {}", root.display());
        if !created {
            println!("Kept existing {}", paths::CONFIG_FILE);
        }
        println!("Task records: {}", task_root.display());
    }
    Ok(())
}
