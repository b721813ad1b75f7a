use super::{open_store, read_input, PlanArgs};
use anyhow::Context;
use maker_cli::output::{print_json, print_table, progress_fraction};
use maker_core::{store::TaskState, types::Status, MakerError};
use std::path::Path;

pub fn create(
    root: &Path,
    description: &str,
    plan: PlanArgs,
    id: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (cfg, store) = open_store(root)?;
    let plan = plan.build(&cfg)?;
    let manifest = match id {
        Some(id) => store.create_with_id(id, description, &plan),
        None => store.create(description, &plan),
    }
    .context("failed to create task")?;

    if json {
        print_json(&manifest)?;
    } else {
        println!(
            "Created task {} ({} steps in {} batches)",
            manifest.id,
            manifest.total_steps,
            plan.batches.len()
        );
        println!(
            "Generate {} candidates per step, then record the winner with 'maker step vote'.",
            cfg.candidates_per_step
        );
    }
    Ok(())
}

pub fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let tasks = store.list().context("failed to list tasks")?;

    if json {
        print_json(&tasks)?;
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.status.to_string(),
                progress_fraction(t.completed_steps, t.total_steps),
                t.current_batch.to_string(),
                t.description.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "STEPS", "BATCH", "DESCRIPTION"], rows);
    Ok(())
}

pub fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let state = store
        .load(id)
        .with_context(|| format!("failed to load task '{id}'"))?;

    if json {
        print_json(&show_json(&state))?;
        return Ok(());
    }

    let m = &state.manifest;
    println!("Task:        {}", m.id);
    println!("Description: {}", m.description);
    println!("Status:      {}", m.status);
    println!(
        "Progress:    {}",
        progress_fraction(m.completed_steps, m.total_steps)
    );
    println!(
        "Batch:       {} (last checkpoint: {})",
        m.current_batch,
        m.last_checkpoint.as_deref().unwrap_or("none")
    );
    match state.resume_point() {
        Some(rp) => println!("Resume:      {}", rp.instruction),
        None if m.status == Status::Completed => println!("Resume:      (task completed)"),
        None => {
            println!("Resume:      all steps recorded; checkpoint remaining batches, then finalize")
        }
    }
    println!();

    let rows: Vec<Vec<String>> = state
        .ledger
        .batches
        .iter()
        .map(|(bid, b)| {
            let computed = state
                .ledger
                .computed_status(*bid)
                .unwrap_or_default()
                .to_string();
            let span = match (b.steps.first(), b.steps.last()) {
                (Some(first), Some(last)) => format!("{first}-{last}"),
                _ => String::new(),
            };
            vec![bid.to_string(), span, computed, b.status.to_string()]
        })
        .collect();
    print_table(&["BATCH", "STEPS", "STATUS", "CHECKPOINT"], rows);
    println!();

    let rows: Vec<Vec<String>> = state
        .steps()
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.batch.to_string(),
                s.status.to_string(),
                s.name.clone(),
            ]
        })
        .collect();
    print_table(&["STEP", "BATCH", "STATUS", "NAME"], rows);
    Ok(())
}

fn show_json(state: &TaskState) -> serde_json::Value {
    let batches: Vec<serde_json::Value> = state
        .ledger
        .batches
        .iter()
        .map(|(id, b)| {
            serde_json::json!({
                "id": id,
                "status": b.status,
                "computed_status": state.ledger.computed_status(*id),
                "steps": b.steps,
            })
        })
        .collect();
    serde_json::json!({
        "task": state.manifest,
        "steps": state.ledger.steps,
        "batches": batches,
        "resume_point": state.ledger.resume_point,
    })
}

pub fn resume(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let rp = match store.resume(id) {
        Ok(rp) => rp,
        Err(e @ MakerError::NothingToResume(_)) => return Err(e.into()),
        Err(e) => return Err(e).with_context(|| format!("failed to load task '{id}'")),
    };

    if json {
        print_json(&rp)?;
    } else {
        println!("{}", rp.instruction);
    }
    Ok(())
}

pub fn finalize(root: &Path, id: &str, file: &Path, json: bool) -> anyhow::Result<()> {
    let (_, store) = open_store(root)?;
    let artifact = read_input(file)?;
    let manifest = store
        .finalize(id, &artifact)
        .with_context(|| format!("failed to finalize task '{id}'"))?;

    if json {
        print_json(&manifest)?;
    } else {
        println!(
            "Finalized task {} -> final/complete.{}",
            manifest.id, manifest.artifact_extension
        );
    }
    Ok(())
}

pub fn redecompose(root: &Path, id: &str, plan: PlanArgs, json: bool) -> anyhow::Result<()> {
    let (cfg, store) = open_store(root)?;
    let plan = plan.build(&cfg)?;
    let state = store
        .redecompose(id, &plan)
        .with_context(|| format!("failed to replace decomposition of task '{id}'"))?;

    if json {
        print_json(&state.manifest)?;
    } else {
        println!(
            "Replaced decomposition of {}: {} steps in {} batches",
            state.id(),
            state.manifest.total_steps,
            state.ledger.batches.len()
        );
    }
    Ok(())
}

pub fn delete(root: &Path, id: &str, yes: bool, json: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to delete task '{id}' without --yes");
    }
    let (_, store) = open_store(root)?;
    store
        .delete(id)
        .with_context(|| format!("failed to delete task '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
    } else {
        println!("Deleted task {id}");
    }
    Ok(())
}
