use crate::error::{MakerError, Result};
use crate::types::Status;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Step / BatchEntry / ResumePointer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: u32,
    pub name: String,
    pub status: Status,
    pub batch: u32,
}

/// A batch as stored in `progress.json`. `status` is the checkpoint status:
/// it only reaches `completed` once the batch's assembled output is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub status: Status,
    pub steps: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePointer {
    pub batch: u32,
    pub step: u32,
    pub instruction: String,
}

// ---------------------------------------------------------------------------
// ProgressLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLedger {
    pub steps: Vec<Step>,
    pub batches: BTreeMap<u32, BatchEntry>,
    #[serde(default)]
    pub resume_point: Option<ResumePointer>,
}

impl ProgressLedger {
    /// Build a ledger from steps whose `batch` fields are already assigned.
    /// Batch entries are derived from the steps; everything starts pending.
    pub fn from_steps(steps: Vec<Step>) -> Result<Self> {
        let mut batches: BTreeMap<u32, BatchEntry> = BTreeMap::new();
        for step in &steps {
            batches
                .entry(step.batch)
                .or_insert_with(|| BatchEntry {
                    status: Status::Pending,
                    steps: Vec::new(),
                })
                .steps
                .push(step.id);
        }
        let mut ledger = Self {
            steps,
            batches,
            resume_point: None,
        };
        ledger.validate()?;
        ledger.refresh();
        Ok(ledger)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn step(&self, id: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    fn step_mut(&mut self, id: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn batch(&self, id: u32) -> Option<&BatchEntry> {
        self.batches.get(&id)
    }

    pub fn batch_steps(&self, id: u32) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.batch == id)
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_completed()).count()
    }

    pub fn any_completed(&self) -> bool {
        self.steps.iter().any(|s| s.status.is_completed())
    }

    pub fn is_checkpointed(&self, batch: u32) -> bool {
        self.batches
            .get(&batch)
            .map(|b| b.status.is_completed())
            .unwrap_or(false)
    }

    pub fn all_checkpointed(&self) -> bool {
        self.batches.values().all(|b| b.status.is_completed())
    }

    /// Batch status derived from its steps, independent of the checkpoint.
    pub fn computed_status(&self, batch: u32) -> Option<Status> {
        let entry = self.batches.get(&batch)?;
        let statuses: Vec<Status> = entry
            .steps
            .iter()
            .filter_map(|id| self.step(*id).map(|s| s.status))
            .collect();
        if statuses.iter().all(|s| s.is_completed()) {
            Some(Status::Completed)
        } else if statuses.iter().any(|s| *s != Status::Pending) {
            Some(Status::InProgress)
        } else {
            Some(Status::Pending)
        }
    }

    /// The earliest step that is not completed. Step status is authoritative.
    pub fn first_incomplete_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| !s.status.is_completed())
    }

    /// Lowest batch id without a checkpoint, or the last batch once all are done.
    pub fn current_batch(&self) -> u32 {
        self.batches
            .iter()
            .find(|(_, b)| !b.status.is_completed())
            .or_else(|| self.batches.iter().next_back())
            .map(|(id, _)| *id)
            .unwrap_or(0)
    }

    /// Highest checkpointed batch id.
    pub fn last_checkpoint(&self) -> Option<u32> {
        self.batches
            .iter()
            .filter(|(_, b)| b.status.is_completed())
            .map(|(id, _)| *id)
            .next_back()
    }

    /// Lowest batch before `batch` that still lacks a checkpoint.
    pub fn unchecked_before(&self, batch: u32) -> Option<u32> {
        self.batches
            .range(..batch)
            .find(|(_, b)| !b.status.is_completed())
            .map(|(id, _)| *id)
    }

    // -----------------------------------------------------------------------
    // Resume pointer
    // -----------------------------------------------------------------------

    pub fn compute_resume_point(&self) -> Option<ResumePointer> {
        let step = self.first_incomplete_step()?;
        let instruction = match (self.unchecked_before(step.batch), step.status) {
            (Some(pending), _) => format!(
                "Checkpoint batch {pending}, then start step {} ({}) in batch {}",
                step.id, step.name, step.batch
            ),
            (None, Status::InProgress) => format!(
                "Resume step {} ({}) in batch {}: it was started but no result was recorded",
                step.id, step.name, step.batch
            ),
            (None, _) => format!(
                "Start step {} ({}) in batch {}",
                step.id, step.name, step.batch
            ),
        };
        Some(ResumePointer {
            batch: step.batch,
            step: step.id,
            instruction,
        })
    }

    pub fn refresh(&mut self) {
        self.resume_point = self.compute_resume_point();
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Check that `step` is the next one allowed to make progress.
    pub fn ensure_startable(&self, step: u32) -> Result<&Step> {
        let target = self.step(step).ok_or(MakerError::StepNotFound(step))?;
        if target.status.is_completed() {
            return Err(MakerError::StepAlreadyCompleted(step));
        }
        if let Some(next) = self.first_incomplete_step() {
            if next.id != step {
                return Err(MakerError::OutOfOrder {
                    requested: step,
                    expected: next.id,
                });
            }
        }
        if let Some(pending) = self.unchecked_before(target.batch) {
            return Err(MakerError::BatchNotCheckpointed(pending));
        }
        Ok(target)
    }

    /// Mark `step` started. Returns false if it was already in progress.
    pub fn begin(&mut self, step: u32) -> Result<bool> {
        let batch = self.ensure_startable(step)?.batch;
        let changed = self.set_step_status(step, batch, Status::InProgress);
        self.refresh();
        Ok(changed)
    }

    pub fn complete(&mut self, step: u32) -> Result<u32> {
        let batch = self.ensure_startable(step)?.batch;
        self.set_step_status(step, batch, Status::Completed);
        self.refresh();
        Ok(batch)
    }

    fn set_step_status(&mut self, step: u32, batch: u32, status: Status) -> bool {
        let mut changed = false;
        if let Some(s) = self.step_mut(step) {
            changed = s.status != status;
            s.status.advance(status);
        }
        if let Some(b) = self.batches.get_mut(&batch) {
            b.status.advance(Status::InProgress);
        }
        changed
    }

    /// Record the checkpoint for `batch`.
    pub fn checkpoint(&mut self, batch: u32) -> Result<()> {
        let entry = self.batches.get(&batch).ok_or(MakerError::BatchNotFound(batch))?;
        if entry.status.is_completed() {
            return Err(MakerError::BatchAlreadyCompleted(batch));
        }
        if let Some(pending) = self.unchecked_before(batch) {
            return Err(MakerError::BatchNotCheckpointed(pending));
        }
        let remaining = self
            .batch_steps(batch)
            .filter(|s| !s.status.is_completed())
            .count();
        if remaining > 0 {
            return Err(MakerError::BatchIncomplete { batch, remaining });
        }
        if let Some(b) = self.batches.get_mut(&batch) {
            b.status = Status::Completed;
        }
        self.refresh();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(MakerError::CorruptLedger(msg));

        if self.steps.is_empty() {
            return corrupt("ledger has no steps".to_string());
        }

        let mut prev_batch = 0u32;
        for (i, step) in self.steps.iter().enumerate() {
            let expected = i as u32 + 1;
            if step.id != expected {
                return corrupt(format!(
                    "step ids must run 1..n in order: found {} at position {expected}",
                    step.id
                ));
            }
            if step.batch != prev_batch && step.batch != prev_batch + 1 {
                return corrupt(format!(
                    "step {} jumps from batch {prev_batch} to batch {}",
                    step.id, step.batch
                ));
            }
            prev_batch = step.batch;
        }

        for (expected, (id, entry)) in (1u32..).zip(self.batches.iter()) {
            if *id != expected {
                return corrupt(format!("batch ids must run 1..m: found {id}"));
            }
            let members: Vec<u32> = self.batch_steps(*id).map(|s| s.id).collect();
            if members != entry.steps {
                return corrupt(format!(
                    "batch {id} lists steps {:?} but steps {members:?} name it",
                    entry.steps
                ));
            }
            if entry.status.is_completed() {
                if self.batch_steps(*id).any(|s| !s.status.is_completed()) {
                    return corrupt(format!("batch {id} is checkpointed but has incomplete steps"));
                }
                if let Some(gap) = self.unchecked_before(*id) {
                    return corrupt(format!("batch {id} is checkpointed before batch {gap}"));
                }
            }
        }

        if prev_batch as usize != self.batches.len() {
            return corrupt(format!(
                "steps reference {prev_batch} batches but {} are listed",
                self.batches.len()
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(groups: &[u32]) -> ProgressLedger {
        let mut steps = Vec::new();
        let mut id = 0;
        for (batch, size) in (1u32..).zip(groups) {
            for _ in 0..*size {
                id += 1;
                steps.push(Step {
                    id,
                    name: format!("step {id}"),
                    status: Status::Pending,
                    batch,
                });
            }
        }
        ProgressLedger::from_steps(steps).unwrap()
    }

    #[test]
    fn fresh_ledger_points_at_step_one() {
        let l = ledger(&[3, 2, 2]);
        let rp = l.resume_point.as_ref().unwrap();
        assert_eq!((rp.batch, rp.step), (1, 1));
        assert_eq!(l.current_batch(), 1);
        assert_eq!(l.last_checkpoint(), None);
        assert_eq!(l.batch(2).unwrap().steps, vec![4, 5]);
    }

    #[test]
    fn completing_a_batch_computes_completed() {
        let mut l = ledger(&[3, 2]);
        for step in 1..=3 {
            l.complete(step).unwrap();
        }
        assert_eq!(l.computed_status(1), Some(Status::Completed));
        assert_eq!(l.batch(1).unwrap().status, Status::InProgress);
        assert!(!l.is_checkpointed(1));
    }

    #[test]
    fn partial_batch_is_in_progress() {
        let mut l = ledger(&[4]);
        l.complete(1).unwrap();
        l.complete(2).unwrap();
        assert_eq!(l.computed_status(1), Some(Status::InProgress));
        assert_eq!(l.resume_point.as_ref().unwrap().step, 3);
    }

    #[test]
    fn steps_must_complete_in_order() {
        let mut l = ledger(&[3]);
        let err = l.complete(2).unwrap_err();
        assert!(matches!(
            err,
            MakerError::OutOfOrder {
                requested: 2,
                expected: 1
            }
        ));
    }

    #[test]
    fn next_batch_waits_for_checkpoint() {
        let mut l = ledger(&[1, 1]);
        l.complete(1).unwrap();
        assert!(matches!(
            l.complete(2),
            Err(MakerError::BatchNotCheckpointed(1))
        ));
        let rp = l.resume_point.as_ref().unwrap();
        assert_eq!((rp.batch, rp.step), (2, 2));
        assert!(rp.instruction.starts_with("Checkpoint batch 1"));

        l.checkpoint(1).unwrap();
        l.complete(2).unwrap();
        assert!(l.resume_point.is_none());
    }

    #[test]
    fn checkpoint_rules() {
        let mut l = ledger(&[2, 1]);
        l.complete(1).unwrap();
        assert!(matches!(
            l.checkpoint(1),
            Err(MakerError::BatchIncomplete {
                batch: 1,
                remaining: 1
            })
        ));
        assert!(matches!(
            l.checkpoint(2),
            Err(MakerError::BatchNotCheckpointed(1))
        ));
        l.complete(2).unwrap();
        l.checkpoint(1).unwrap();
        assert!(matches!(
            l.checkpoint(1),
            Err(MakerError::BatchAlreadyCompleted(1))
        ));
        assert!(matches!(l.checkpoint(9), Err(MakerError::BatchNotFound(9))));
        assert_eq!(l.last_checkpoint(), Some(1));
        assert_eq!(l.current_batch(), 2);
    }

    #[test]
    fn begin_is_idempotent() {
        let mut l = ledger(&[2]);
        assert!(l.begin(1).unwrap());
        assert!(!l.begin(1).unwrap());
        assert_eq!(l.step(1).unwrap().status, Status::InProgress);
        assert!(l
            .resume_point
            .as_ref()
            .unwrap()
            .instruction
            .starts_with("Resume step 1"));
    }

    #[test]
    fn completed_step_cannot_be_recorded_again() {
        let mut l = ledger(&[2]);
        l.complete(1).unwrap();
        assert!(matches!(
            l.complete(1),
            Err(MakerError::StepAlreadyCompleted(1))
        ));
        assert!(matches!(l.complete(7), Err(MakerError::StepNotFound(7))));
    }

    #[test]
    fn json_uses_string_batch_keys() {
        let l = ledger(&[1, 1]);
        let json = serde_json::to_value(&l).unwrap();
        assert!(json["batches"]["1"].is_object());
        assert!(json["batches"]["2"].is_object());
        let parsed: ProgressLedger = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, l);
    }

    #[test]
    fn validate_rejects_gaps_and_mismatches() {
        let mut l = ledger(&[2, 1]);
        l.steps[2].id = 5;
        assert!(matches!(l.validate(), Err(MakerError::CorruptLedger(_))));

        let mut l = ledger(&[2, 1]);
        l.batches.get_mut(&1).unwrap().steps = vec![1];
        assert!(matches!(l.validate(), Err(MakerError::CorruptLedger(_))));

        let mut l = ledger(&[2, 1]);
        l.batches.get_mut(&1).unwrap().status = Status::Completed;
        assert!(matches!(l.validate(), Err(MakerError::CorruptLedger(_))));
    }

    #[test]
    fn validate_rejects_non_contiguous_batches() {
        let steps = vec![
            Step {
                id: 1,
                name: "a".into(),
                status: Status::Pending,
                batch: 1,
            },
            Step {
                id: 2,
                name: "b".into(),
                status: Status::Pending,
                batch: 3,
            },
        ];
        assert!(ProgressLedger::from_steps(steps).is_err());
    }
}
