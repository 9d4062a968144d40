//! Architectural fitness policies for ArchGraph.
//!
//! Policies are declarative documents loaded by [`PolicyLoader`]; each one
//! carries a single [`Rule`] from a closed vocabulary that the evaluator
//! interprets against an immutable graph snapshot. [`FitnessEngine`] runs a
//! policy set under per-policy timeouts and a run budget and produces a
//! [`FitnessReport`].

pub mod engine;
pub mod evaluator;
pub mod loader;
pub mod policy;
pub mod report;
pub mod rule;

pub use engine::{EvaluateFn, FitnessEngine};
pub use evaluator::{evaluate, Deadline, EvalError, EvaluationInput};
pub use loader::{PolicyFormat, PolicyLoader, PolicySet, RejectedPolicy, POLICY_SCHEMA_VERSION};
pub use policy::{ComplexityClass, Location, Policy, Severity, Violation};
pub use report::{
    compliance_score, CycleSection, FitnessRecord, FitnessReport, OutcomeStatus, PolicyOutcome,
    RunState, SeverityCounts, SkippedPolicy, ViolationRecord,
};
pub use rule::{DeclarationMetric, Layer, ModuleFilter, NodeMetric, Rule};
