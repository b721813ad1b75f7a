use crate::error::{MakerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One independently generated solution for a step, already scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub score: f64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red_flags: Vec<String>,
}

impl Candidate {
    pub fn is_viable(&self) -> bool {
        self.red_flags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub winner: Candidate,
    /// Position of the winner in the input list.
    pub index: usize,
    pub considered: Vec<Candidate>,
}

/// Pick the highest-scoring candidate without red flags.
///
/// Ties go to the candidate that appears first.
pub fn select(candidates: Vec<Candidate>) -> Result<Selection> {
    if let Some(bad) = candidates.iter().find(|c| !c.score.is_finite()) {
        return Err(MakerError::InvalidScore(bad.label.clone()));
    }

    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if !c.is_viable() {
            continue;
        }
        match best {
            Some(b) if candidates[b].score >= c.score => {}
            _ => best = Some(i),
        }
    }

    let index = best.ok_or_else(|| {
        if candidates.is_empty() {
            MakerError::NoViableCandidate("no candidates given".to_string())
        } else {
            MakerError::NoViableCandidate(format!(
                "all {} candidates were red-flagged",
                candidates.len()
            ))
        }
    })?;

    tracing::debug!(
        winner = %candidates[index].label,
        score = candidates[index].score,
        considered = candidates.len(),
        "selected candidate"
    );

    Ok(Selection {
        winner: candidates[index].clone(),
        index,
        considered: candidates,
    })
}

impl Selection {
    /// Markdown stored as the step's solution: the winning content plus a tally.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Selected candidate: {} (score {:.2})\n",
            self.winner.label, self.winner.score
        );
        out.push_str(self.winner.content.trim_end());
        out.push_str("\n\n## Candidates\n\n");
        out.push_str("| # | label | score | outcome |\n");
        out.push_str("|---|-------|-------|---------|\n");
        for (i, c) in self.considered.iter().enumerate() {
            let outcome = if i == self.index {
                "selected".to_string()
            } else if c.is_viable() {
                "not selected".to_string()
            } else {
                format!("red-flagged: {}", c.red_flags.join("; "))
            };
            let _ = writeln!(
                out,
                "| {} | {} | {:.2} | {} |",
                i + 1,
                c.label,
                c.score,
                outcome
            );
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

    fn cand(label: &str, score: f64, flags: &[&str]) -> Candidate {
        Candidate {
            label: label.to_string(),
            score,
            content: format!("fn {label}() {{}}"),
            red_flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn highest_score_wins() {
        let sel = select(vec![cand("a", 0.4, &[]), cand("b", 0.9, &[]), cand("c", 0.7, &[])])
            .unwrap();
        assert_eq!(sel.winner.label, "b");
        assert_eq!(sel.index, 1);
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let sel = select(vec![cand("a", 0.5, &[]), cand("b", 0.8, &[]), cand("c", 0.8, &[])])
            .unwrap();
        assert_eq!(sel.winner.label, "b");
    }

    #[test]
    fn red_flagged_candidates_are_discarded() {
        let sel = select(vec![
            cand("a", 0.99, &["undefined import"]),
            cand("b", 0.1, &[]),
        ])
        .unwrap();
        assert_eq!(sel.winner.label, "b");
    }

    #[test]
    fn nothing_viable() {
        assert!(matches!(
            select(vec![cand("a", 1.0, &["infinite loop"])]),
            Err(MakerError::NoViableCandidate(_))
        ));
        assert!(matches!(
            select(Vec::new()),
            Err(MakerError::NoViableCandidate(_))
        ));
    }

    #[test]
    fn non_finite_scores_rejected() {
        assert!(matches!(
            select(vec![cand("a", f64::NAN, &[])]),
            Err(MakerError::InvalidScore(label)) if label == "a"
        ));
    }

    #[test]
    fn summary_tallies_candidates() {
        let sel = select(vec![cand("a", 0.2, &["parse error"]), cand("b", 0.6, &[])]).unwrap();
        let md = sel.render_summary();
        assert!(md.starts_with("Selected candidate: b (score 0.60)"));
        assert!(md.contains("fn b() {}"));
        assert!(md.contains("| 1 | a | 0.20 | red-flagged: parse error |"));
        assert!(md.contains("| 2 | b | 0.60 | selected |"));
    }
}
