use super::rules::{RuleCounts, RULE_COUNT};
use serde::Serialize;

/// What one batch contributes to the run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub clean_rows: u64,
    pub duplicates_dropped: u64,
    pub rule_counts: RuleCounts,
    pub algorithm_format_issues: u64,
}

/// Running totals for one full pass over one input file.
///
/// Updated once per batch, in file order, after that batch has been partitioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub total_clean_rows: u64,
    pub total_duplicates_dropped: u64,
    pub per_rule_violation_counts: RuleCounts,
    pub total_algorithm_format_issues: u64,
}

impl RunState {
    pub fn absorb(&mut self, tally: &BatchTally) {
        self.total_clean_rows += tally.clean_rows;
        self.total_duplicates_dropped += tally.duplicates_dropped;
        self.per_rule_violation_counts.merge(&tally.rule_counts);
        self.total_algorithm_format_issues += tally.algorithm_format_issues;
    }

    /// Sum of per-rule counts; a record failing several rules counts once per rule.
    pub fn total_rows_dropped(&self) -> u64 {
        self.per_rule_violation_counts.total()
    }

    pub fn total_examined(&self) -> u64 {
        self.total_clean_rows + self.total_rows_dropped()
    }

    /// Violation density normalised by rule count, clamped to `[0, 1]`; `0` for an empty run.
    pub fn transparency_score(&self) -> f64 {
        let examined = self.total_examined();
        if examined == 0 {
            return 0.0;
        }

        let penalty = self.total_rows_dropped() as f64 / (examined as f64 * RULE_COUNT as f64);
        (1.0 - penalty).max(0.0)
    }
}

/// Rounds a score to the four decimal places published in the run report.
pub fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
