use super::open_store;
use clap::Subcommand;
use maker_cli::output::print_json;
use maker_core::config::WarnLevel;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let (cfg, store) = open_store(root)?;
    if json {
        print_json(&cfg)?;
        return Ok(());
    }
    println!("task_root:           {}", store.task_root().display());
    println!("batch_size:          {}", cfg.batch_size);
    println!("candidates_per_step: {}", cfg.candidates_per_step);
    println!("artifact_extension:  {}", cfg.artifact_extension);
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let (cfg, _) = open_store(root)?;
    let warnings = cfg.validate();
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({
            "valid": errors == 0,
            "warnings": warnings,
        }))?;
    } else if warnings.is_empty() {
        println!("Config OK");
    } else {
        for w in &warnings {
            let tag = match w.level {
                WarnLevel::Error => "error",
                WarnLevel::Warning => "warning",
            };
            println!("{tag}: {}", w.message);
        }
    }

    if errors > 0 {
        anyhow::bail!("config has {errors} error(s)");
    }
    Ok(())
}
