use crate::error::{MakerError, Result};
use crate::paths;
use crate::progress::{ProgressLedger, Step};
use crate::types::Status;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// An ordered decomposition: steps grouped into contiguous batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub batches: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub id: u32,
    pub name: String,
    pub batch: u32,
}

impl Plan {
    /// Split `names` into consecutive batches of `batch_size`.
    pub fn uniform<I, S>(names: I, batch_size: u32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if batch_size == 0 {
            return Err(MakerError::InvalidPlan(
                "batch size must be at least 1".to_string(),
            ));
        }
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let batches = names
            .chunks(batch_size as usize)
            .map(|chunk| chunk.to_vec())
            .collect();
        let plan = Self { batches };
        plan.validate()?;
        Ok(plan)
    }

    /// Use explicit batch groups as given.
    pub fn grouped(batches: Vec<Vec<String>>) -> Result<Self> {
        let plan = Self { batches };
        plan.validate()?;
        Ok(plan)
    }

    /// Parse `{ batches: [[name, ...], ...] }`.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(data)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batches.iter().all(|b| b.is_empty()) {
            return Err(MakerError::InvalidPlan("plan has no steps".to_string()));
        }
        for (i, batch) in self.batches.iter().enumerate() {
            if batch.is_empty() {
                return Err(MakerError::InvalidPlan(format!("batch {} is empty", i + 1)));
            }
            if let Some(pos) = batch.iter().position(|n| n.trim().is_empty()) {
                return Err(MakerError::InvalidPlan(format!(
                    "batch {} has an empty step name at position {}",
                    i + 1,
                    pos + 1
                )));
            }
        }
        Ok(())
    }

    pub fn step_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// The largest batch; recorded as the task's batch size.
    pub fn batch_size(&self) -> u32 {
        self.batches.iter().map(Vec::len).max().unwrap_or(0) as u32
    }

    /// Steps numbered sequentially from 1, batches from 1.
    pub fn steps(&self) -> Vec<PlannedStep> {
        let mut id = 0;
        let mut out = Vec::with_capacity(self.step_count());
        for (batch, names) in (1u32..).zip(&self.batches) {
            for name in names {
                id += 1;
                out.push(PlannedStep {
                    id,
                    name: name.trim().to_string(),
                    batch,
                });
            }
        }
        out
    }

    pub fn to_ledger(&self) -> Result<ProgressLedger> {
        let steps = self
            .steps()
            .into_iter()
            .map(|s| Step {
                id: s.id,
                name: s.name,
                status: Status::Pending,
                batch: s.batch,
            })
            .collect();
        ProgressLedger::from_steps(steps)
    }

    /// Render `decomposition.md`.
    pub fn render_markdown(&self, description: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Decomposition\n");
        let _ = writeln!(out, "{}\n", description.trim());
        let _ = writeln!(
            out,
            "{} steps in {} batches.\n",
            self.step_count(),
            self.batches.len()
        );
        let steps = self.steps();
        for batch in 1..=self.batches.len() as u32 {
            let members: Vec<&PlannedStep> = steps.iter().filter(|s| s.batch == batch).collect();
            let (first, last) = match (members.first(), members.last()) {
                (Some(f), Some(l)) => (f.id, l.id),
                _ => continue,
            };
            let _ = writeln!(
                out,
                "## {} (steps {first}-{last})\n",
                paths::batch_dir_name(batch)
            );
            for s in members {
                let _ = writeln!(out, "{}. {}", s.id, s.name);
            }
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("step {i}")).collect()
    }

    #[test]
    fn uniform_chunks_in_order() {
        let plan = Plan::uniform(names(7), 3).unwrap();
        assert_eq!(
            plan.batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        let steps = plan.steps();
        assert_eq!(steps[6].id, 7);
        assert_eq!(steps[6].batch, 3);
    }

    #[test]
    fn grouped_keeps_explicit_boundaries() {
        let plan = Plan::grouped(vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec!["d".into(), "e".into()],
            vec!["f".into(), "g".into()],
        ])
        .unwrap();
        assert_eq!(plan.batch_size(), 3);
        let ledger = plan.to_ledger().unwrap();
        assert_eq!(ledger.batch(2).unwrap().steps, vec![4, 5]);
        assert_eq!(ledger.batch(3).unwrap().steps, vec![6, 7]);
    }

    #[test]
    fn rejects_bad_plans() {
        assert!(Plan::uniform(Vec::<String>::new(), 3).is_err());
        assert!(Plan::uniform(names(2), 0).is_err());
        assert!(Plan::grouped(vec![vec!["a".into()], vec![]]).is_err());
        assert!(Plan::grouped(vec![vec!["a".into(), "  ".into()]]).is_err());
    }

    #[test]
    fn from_yaml() {
        let plan = Plan::from_yaml("batches:\n  - [lexer, parser]\n  - [codegen]\n").unwrap();
        assert_eq!(plan.step_count(), 3);
        assert_eq!(plan.steps()[2].name, "codegen");
    }

    #[test]
    fn markdown_lists_batches() {
        let plan = Plan::uniform(["lexer", "parser", "codegen"], 2).unwrap();
        let md = plan.render_markdown("Build a compiler");
        assert!(md.contains("Build a compiler"));
        assert!(md.contains("## batch-001 (steps 1-2)"));
        assert!(md.contains("## batch-002 (steps 3-3)"));
        assert!(md.contains("3. codegen"));
    }
}
