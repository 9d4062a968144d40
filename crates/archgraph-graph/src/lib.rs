//! Module dependency graph for ArchGraph.
//!
//! [`GraphBuilder`] turns structural facts into an immutable
//! [`DependencyGraph`]; the analytics modules work on that value without
//! mutating it: bounded cycle search, coupling metrics and structural
//! validation.

pub mod builder;
pub mod coupling;
pub mod cycles;
pub mod export;
pub mod graph;
pub mod resolver;
pub mod validation;

pub use builder::GraphBuilder;
pub use coupling::{instability, CouplingMetric, CouplingMetrics};
pub use cycles::{Cycle, CycleDetector, CycleReport, TruncationReason};
pub use export::{to_dot, to_json};
pub use graph::{
    Adjacency, DependencyEdge, DependencyGraph, LocatedDeclaration, ModuleNode, ReferenceSite,
};
pub use resolver::Resolver;
pub use validation::{
    ChainLengths, GraphShape, GraphValidator, PathSearch, DEFAULT_PATH_STEP_BUDGET,
};
