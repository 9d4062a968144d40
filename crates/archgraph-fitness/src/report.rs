// ABOUTME: Fitness report: violations, per-policy outcomes, counts and compliance score.
// ABOUTME: Every skip or truncation is a field, never an omission.
use crate::loader::RejectedPolicy;
use crate::policy::{Severity, Violation};
use archgraph_core::FileFailure;
use archgraph_graph::{CycleReport, TruncationReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Loaded,
    Running,
    Completed,
    TimedOut,
    Aborted,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Loaded, RunState::Running)
                | (RunState::Loaded, RunState::Aborted)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::TimedOut)
                | (RunState::Running, RunState::Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::TimedOut | RunState::Aborted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    TimedOut,
    Faulted,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyOutcome {
    pub policy_id: String,
    pub severity: Severity,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
    pub violation_count: usize,
    pub elapsed_ms: u64,
}

impl PolicyOutcome {
    /// Evaluated outcomes count toward the compliance score.
    pub fn was_evaluated(&self) -> bool {
        self.status != OutcomeStatus::Skipped
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPolicy {
    pub policy_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Policies that ran and found nothing.
    pub passed_count: usize,
    pub info_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleSection {
    pub found: usize,
    pub truncated: bool,
    pub reason: Option<TruncationReason>,
    /// Search branches cut at the cycle length cap.
    pub pruned_branches: u64,
    pub cycles: Vec<Vec<String>>,
}

impl From<&CycleReport> for CycleSection {
    fn from(report: &CycleReport) -> Self {
        Self {
            found: report.cycles.len(),
            truncated: report.truncated,
            reason: report.reason,
            pruned_branches: report.pruned_branches,
            cycles: report
                .cycles
                .iter()
                .map(|c| c.nodes.iter().map(|m| m.to_string()).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FitnessReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub state: RunState,
    /// In policy schedule order, then in evaluation order.
    pub violations: Vec<Violation>,
    pub counts: SeverityCounts,
    pub compliance_score: f64,
    pub outcomes: Vec<PolicyOutcome>,
    pub skipped: Vec<SkippedPolicy>,
    pub rejected: Vec<RejectedPolicy>,
    pub cycles: CycleSection,
    pub file_failures: Vec<FileFailure>,
}

/// Flattened form persisted by history stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub violations: Vec<ViolationRecord>,
    pub passed_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub compliance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub policy_id: String,
    pub severity: Severity,
    pub message: String,
    pub location: String,
    pub confidence: f64,
}

impl FitnessReport {
    pub(crate) fn assemble(
        state: RunState,
        violations: Vec<Violation>,
        outcomes: Vec<PolicyOutcome>,
        cycles: &CycleReport,
    ) -> Self {
        let mut counts = SeverityCounts::default();
        for v in &violations {
            match v.severity {
                Severity::Info => counts.info_count += 1,
                Severity::Warning => counts.warning_count += 1,
                Severity::Error => counts.error_count += 1,
            }
        }
        counts.passed_count = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Passed)
            .count();

        let skipped = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Skipped)
            .map(|o| SkippedPolicy {
                policy_id: o.policy_id.clone(),
                reason: o.reason.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            state,
            compliance_score: compliance_score(&outcomes),
            violations,
            counts,
            outcomes,
            skipped,
            rejected: Vec::new(),
            cycles: CycleSection::from(cycles),
            file_failures: Vec::new(),
        }
    }

    pub fn with_rejected(mut self, rejected: Vec<RejectedPolicy>) -> Self {
        self.rejected = rejected;
        self
    }

    pub fn with_file_failures(mut self, failures: Vec<FileFailure>) -> Self {
        self.file_failures = failures;
        self
    }

    pub fn violations_for<'a>(&'a self, policy_id: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.policy_id == policy_id)
    }

    pub fn outcome(&self, policy_id: &str) -> Option<&PolicyOutcome> {
        self.outcomes.iter().find(|o| o.policy_id == policy_id)
    }

    /// True only when every policy ran, nothing was truncated or skipped,
    /// and no violation was reported.
    pub fn is_clean(&self) -> bool {
        self.state == RunState::Completed
            && self.violations.is_empty()
            && self.skipped.is_empty()
            && !self.cycles.truncated
            && self.file_failures.is_empty()
            && self.outcomes.iter().all(|o| o.status == OutcomeStatus::Passed)
    }

    pub fn to_record(&self) -> FitnessRecord {
        FitnessRecord {
            run_id: self.run_id,
            generated_at: self.generated_at,
            violations: self
                .violations
                .iter()
                .map(|v| ViolationRecord {
                    policy_id: v.policy_id.clone(),
                    severity: v.severity,
                    message: v.message.clone(),
                    location: v.location.to_string(),
                    confidence: v.confidence,
                })
                .collect(),
            passed_count: self.counts.passed_count,
            warning_count: self.counts.warning_count,
            error_count: self.counts.error_count,
            compliance_score: self.compliance_score,
        }
    }
}

/// Severity-weighted share of evaluated policies that passed. Skipped
/// policies are left out; with nothing evaluated the score is 1.0.
pub fn compliance_score(outcomes: &[PolicyOutcome]) -> f64 {
    let (passed, total) = outcomes
        .iter()
        .filter(|o| o.was_evaluated())
        .fold((0.0, 0.0), |(p, t), o| {
            let w = o.severity.weight();
            let p = if o.status == OutcomeStatus::Passed { p + w } else { p };
            (p, t + w)
        });
    if total == 0.0 {
        1.0
    } else {
        passed / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn outcome(id: &str, severity: Severity, status: OutcomeStatus) -> PolicyOutcome {
        PolicyOutcome {
            policy_id: id.into(),
            severity,
            status,
            reason: None,
            violation_count: 0,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn score_is_weighted_by_severity() {
        let outcomes = vec![
            outcome("a", Severity::Error, OutcomeStatus::Passed),
            outcome("b", Severity::Warning, OutcomeStatus::Failed),
            outcome("c", Severity::Info, OutcomeStatus::Skipped),
        ];
        assert_relative_eq!(compliance_score(&outcomes), 4.0 / 6.0);
        assert_relative_eq!(compliance_score(&[]), 1.0);
    }

    #[test]
    fn state_transitions() {
        assert!(RunState::Loaded.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::TimedOut));
        assert!(!RunState::Completed.can_transition_to(RunState::Running));
        assert!(!RunState::Loaded.can_transition_to(RunState::Completed));
        assert!(RunState::Aborted.is_terminal());
    }

    #[test]
    fn record_flattens_locations() {
        let violation = Violation {
            policy_id: "no-cycles".into(),
            severity: Severity::Error,
            message: "cycle".into(),
            location: crate::policy::Location::File {
                file: "a.py".into(),
                line: 3,
            },
            confidence: 0.9,
        };
        let report = FitnessReport::assemble(
            RunState::Completed,
            vec![violation],
            vec![outcome("no-cycles", Severity::Error, OutcomeStatus::Failed)],
            &CycleReport::default(),
        );
        let record = report.to_record();
        assert_eq!(record.error_count, 1);
        assert_eq!(record.passed_count, 0);
        assert_eq!(record.violations[0].location, "a.py:3");
        assert_eq!(record.compliance_score, 0.0);
        assert!(!report.is_clean());
    }
}
