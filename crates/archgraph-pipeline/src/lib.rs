//! End-to-end ArchGraph analysis.
//!
//! [`Analyzer`] wires the structural extractor, graph builder, analytics
//! and fitness engine together for one set of source files and one policy
//! set, under the limits of a single [`Settings`](archgraph_core::Settings).

pub mod analyzer;

pub use analyzer::{Analysis, Analyzer};
