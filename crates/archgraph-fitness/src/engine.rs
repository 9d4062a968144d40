// ABOUTME: Runs a policy set against one graph snapshot under per-policy and run budgets.
// ABOUTME: A policy that times out, faults or panics never affects the others.
use crate::evaluator::{evaluate, Deadline, EvalError, EvaluationInput};
use crate::policy::{ComplexityClass, Policy, Violation};
use crate::report::{FitnessReport, OutcomeStatus, PolicyOutcome, RunState};
use archgraph_core::{CancellationToken, FitnessConfig};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const REASON_BUDGET: &str = "run budget exhausted";
const REASON_CANCELLED: &str = "cancelled";

/// Signature shared by [`evaluate`] and substitute evaluators.
pub type EvaluateFn =
    dyn Fn(&Policy, EvaluationInput<'_>, &Deadline) -> Result<Vec<Violation>, EvalError> + Sync;

pub struct FitnessEngine {
    config: FitnessConfig,
}

impl FitnessEngine {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    pub fn run(
        &self,
        policies: &[Policy],
        input: EvaluationInput<'_>,
        cancel: &CancellationToken,
    ) -> FitnessReport {
        self.run_with(policies, input, cancel, &evaluate)
    }

    /// Same as [`FitnessEngine::run`] with a caller-supplied evaluator.
    pub fn run_with(
        &self,
        policies: &[Policy],
        input: EvaluationInput<'_>,
        cancel: &CancellationToken,
        evaluator: &EvaluateFn,
    ) -> FitnessReport {
        let mut run = FitnessRun::new(policies);
        if cancel.is_cancelled() {
            run.advance(RunState::Aborted);
            let outcomes = run
                .scheduled
                .iter()
                .map(|p| skipped(p, REASON_CANCELLED))
                .collect();
            return FitnessReport::assemble(run.state, Vec::new(), outcomes, input.cycles);
        }

        run.advance(RunState::Running);
        let started = Instant::now();
        let budget = self.config.run_budget();
        let mut outcomes = Vec::with_capacity(run.scheduled.len());
        let mut violations = Vec::new();

        for class in run.classes() {
            debug!(
                "Evaluating {} {:?} policies",
                class.len(),
                class[0].complexity
            );
            let step = |policy: &Policy| -> (PolicyOutcome, Vec<Violation>) {
                if cancel.is_cancelled() {
                    return (skipped(policy, REASON_CANCELLED), Vec::new());
                }
                if started.elapsed() >= budget {
                    return (skipped(policy, REASON_BUDGET), Vec::new());
                }
                self.evaluate_isolated(policy, input, evaluator)
            };
            let results: Vec<_> = if self.config.parallel && class.len() > 1 {
                class.par_iter().map(|&p| step(p)).collect()
            } else {
                class.iter().map(|&p| step(p)).collect()
            };
            for (outcome, found) in results {
                outcomes.push(outcome);
                violations.extend(found);
            }
        }

        let skipped_for = |reason: &str| {
            outcomes
                .iter()
                .any(|o| o.status == OutcomeStatus::Skipped && o.reason.as_deref() == Some(reason))
        };
        let final_state = if skipped_for(REASON_CANCELLED) {
            RunState::Aborted
        } else if skipped_for(REASON_BUDGET) {
            RunState::TimedOut
        } else {
            RunState::Completed
        };
        run.advance(final_state);

        info!(
            "Fitness run {:?}: {} policies, {} violations in {}ms",
            run.state,
            outcomes.len(),
            violations.len(),
            started.elapsed().as_millis()
        );
        FitnessReport::assemble(run.state, violations, outcomes, input.cycles)
    }

    fn evaluate_isolated(
        &self,
        policy: &Policy,
        input: EvaluationInput<'_>,
        evaluator: &EvaluateFn,
    ) -> (PolicyOutcome, Vec<Violation>) {
        let limit = policy.timeout.unwrap_or_else(|| self.config.policy_timeout());
        let deadline = Deadline::after(limit);
        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| evaluator(policy, input, &deadline)));
        let elapsed = start.elapsed();

        let (status, reason, found) = match result {
            Ok(Ok(_)) if elapsed > limit => (
                OutcomeStatus::TimedOut,
                Some(timeout_reason(limit)),
                Vec::new(),
            ),
            Ok(Ok(found)) if found.is_empty() => (OutcomeStatus::Passed, None, found),
            Ok(Ok(found)) => (OutcomeStatus::Failed, None, found),
            Ok(Err(EvalError::Timeout { .. })) => (
                OutcomeStatus::TimedOut,
                Some(timeout_reason(limit)),
                Vec::new(),
            ),
            Ok(Err(EvalError::Fault(message))) => {
                (OutcomeStatus::Faulted, Some(message), Vec::new())
            }
            Err(payload) => (
                OutcomeStatus::Faulted,
                Some(format!("panicked: {}", panic_message(payload.as_ref()))),
                Vec::new(),
            ),
        };
        if matches!(status, OutcomeStatus::TimedOut | OutcomeStatus::Faulted) {
            warn!(
                "Policy {} {:?}: {}",
                policy.id,
                status,
                reason.as_deref().unwrap_or_default()
            );
        }

        let outcome = PolicyOutcome {
            policy_id: policy.id.clone(),
            severity: policy.severity,
            status,
            reason,
            violation_count: found.len(),
            elapsed_ms: elapsed.as_millis() as u64,
        };
        (outcome, found)
    }
}

/// Lifecycle of one run: policies in schedule order plus the current state.
struct FitnessRun<'p> {
    scheduled: Vec<&'p Policy>,
    state: RunState,
}

impl<'p> FitnessRun<'p> {
    fn new(policies: &'p [Policy]) -> Self {
        let mut scheduled: Vec<&Policy> = policies.iter().collect();
        scheduled.sort_by(|a, b| a.schedule_key().cmp(&b.schedule_key()));
        Self {
            scheduled,
            state: RunState::Loaded,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Consecutive runs of policies sharing a complexity class.
    fn classes(&self) -> Vec<Vec<&'p Policy>> {
        let mut classes: Vec<Vec<&Policy>> = Vec::new();
        let mut current: Option<ComplexityClass> = None;
        for &policy in &self.scheduled {
            if current != Some(policy.complexity) {
                classes.push(Vec::new());
                current = Some(policy.complexity);
            }
            if let Some(last) = classes.last_mut() {
                last.push(policy);
            }
        }
        classes
    }
}

fn skipped(policy: &Policy, reason: &str) -> PolicyOutcome {
    PolicyOutcome {
        policy_id: policy.id.clone(),
        severity: policy.severity,
        status: OutcomeStatus::Skipped,
        reason: Some(reason.to_string()),
        violation_count: 0,
        elapsed_ms: 0,
    }
}

fn timeout_reason(limit: Duration) -> String {
    format!("exceeded {}ms", limit.as_millis())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Severity;
    use crate::rule::{ModuleFilter, Rule};

    fn policy(id: &str, complexity: ComplexityClass) -> Policy {
        Policy::new(
            id,
            Severity::Info,
            Rule::NoCycles {
                modules: ModuleFilter::any(),
            },
        )
        .with_complexity(complexity)
    }

    #[test]
    fn schedule_groups_by_class_then_id() {
        let policies = vec![
            policy("z", ComplexityClass::Constant),
            policy("b", ComplexityClass::Exponential),
            policy("a", ComplexityClass::Exponential),
            policy("m", ComplexityClass::Linear),
        ];
        let run = FitnessRun::new(&policies);
        let ids: Vec<Vec<&str>> = run
            .classes()
            .iter()
            .map(|c| c.iter().map(|p| p.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["z"], vec!["m"], vec!["a", "b"]]);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(3_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
