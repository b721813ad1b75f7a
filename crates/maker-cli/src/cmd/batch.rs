use super::{open_store, read_input};
use anyhow::Context;
use clap::Subcommand;
use maker_cli::output::print_json;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum BatchSubcommand {
    /// Write a batch's assembled output and checkpoint it
    Complete {
        id: String,
        batch: u32,
        /// File holding the assembled output ('-' for stdin)
        #[arg(long)]
        file: PathBuf,
    },
}

pub fn run(root: &Path, subcmd: BatchSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BatchSubcommand::Complete { id, batch, file } => complete(root, &id, batch, &file, json),
    }
}

fn complete(root: &Path, id: &str, batch: u32, file: &Path, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let assembled = read_input(file)?;
    let state = store
        .complete_batch(id, batch, &assembled)
        .with_context(|| format!("failed to checkpoint batch {batch} of task '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "id": id,
            "batch": batch,
            "last_checkpoint": state.manifest.last_checkpoint,
            "current_batch": state.manifest.current_batch,
            "resume_point": state.resume_point(),
        }))?;
        return Ok(());
    }

    println!("Checkpointed batch {batch}");
    match state.resume_point() {
        Some(rp) => println!("Next: {}", rp.instruction),
        None if state.ledger.all_checkpointed() => {
            println!("Next: every batch is checkpointed; run 'maker finalize {id}'")
        }
        None => println!("Next: checkpoint batch {}", state.manifest.current_batch),
    }
    Ok(())
}
