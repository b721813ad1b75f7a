use super::{open_store, read_input};
use anyhow::Context;
use clap::Subcommand;
use maker_cli::output::print_json;
use maker_core::{store::TaskState, vote};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum StepSubcommand {
    /// Mark a step as started
    Begin { id: String, step: u32 },
    /// Record the chosen solution for a step
    Record {
        id: String,
        step: u32,
        /// Solution summary text
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        summary: Option<String>,
        /// File holding the solution summary ('-' for stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Select the best candidate from a scored JSON list and record it
    Vote {
        id: String,
        step: u32,
        /// JSON array of {label, score, content, red_flags?} ('-' for stdin)
        #[arg(long)]
        candidates: PathBuf,
    },
}

pub fn run(root: &Path, subcmd: StepSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StepSubcommand::Begin { id, step } => begin(root, &id, step, json),
        StepSubcommand::Record {
            id,
            step,
            summary,
            file,
        } => {
            let summary = match (summary, file) {
                (Some(text), _) => text,
                (None, Some(path)) => read_input(&path)?,
                (None, None) => anyhow::bail!("pass --summary TEXT or --file PATH"),
            };
            record(root, &id, step, &summary, json)
        }
        StepSubcommand::Vote {
            id,
            step,
            candidates,
        } => select_and_record(root, &id, step, &candidates, json),
    }
}

fn begin(root: &Path, id: &str, step: u32, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let state = store
        .begin_step(id, step)
        .with_context(|| format!("failed to begin step {step} of task '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "step": state.step(step) }))?;
    } else {
        println!("Started step {step}");
    }
    Ok(())
}

fn record(root: &Path, id: &str, step: u32, summary: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let state = store
        .record_step_result(id, step, summary)
        .with_context(|| format!("failed to record step {step} of task '{id}'"))?;
    report_recorded(&state, step, json)
}

fn select_and_record(
    root: &Path,
    id: &str,
    step: u32,
    candidates: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let data = read_input(candidates)?;
    let candidates: Vec<vote::Candidate> =
        serde_json::from_str(&data).context("candidates must be a JSON array")?;
    let selection = vote::select(candidates).context("candidate selection failed")?;

    let (_, store) = open_store(root)?;
    let state = store
        .record_step_result(id, step, &selection.render_summary())
        .with_context(|| format!("failed to record step {step} of task '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "id": id,
            "step": step,
            "winner": selection.winner.label,
            "score": selection.winner.score,
            "discarded": selection.considered.iter().filter(|c| !c.is_viable()).count(),
            "resume_point": state.resume_point(),
        }))?;
        return Ok(());
    }
    println!(
        "Selected '{}' (score {:.2}) from {} candidates",
        selection.winner.label,
        selection.winner.score,
        selection.considered.len()
    );
    report_recorded(&state, step, false)
}

fn report_recorded(state: &TaskState, step: u32, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({
            "id": state.id(),
            "step": step,
            "completed_steps": state.manifest.completed_steps,
            "total_steps": state.manifest.total_steps,
            "resume_point": state.resume_point(),
        }))?;
        return Ok(());
    }
    println!(
        "Recorded step {step} ({}/{} complete)",
        state.manifest.completed_steps, state.manifest.total_steps
    );
    match state.resume_point() {
        Some(rp) => println!("Next: {}", rp.instruction),
        None => println!("Next: all steps recorded; checkpoint remaining batches, then finalize"),
    }
    Ok(())
}
