//! Syntax-only structural extraction.
//!
//! Source files are parsed with tree-sitter and reduced to a
//! [`StructuralFact`](archgraph_core::StructuralFact): declarations with
//! cyclomatic complexity and nesting depth, plus raw import, call and
//! inherit references. Analysed content is never executed.

pub mod complexity;
pub mod extractor;
pub mod language;
pub mod languages;
pub mod limits;
pub mod pipeline;
pub mod walker;

pub use extractor::{StructuralExtractor, FACT_SCHEMA_VERSION};
pub use language::LanguageRegistry;
pub use pipeline::{ExtractionOutcome, ExtractionPipeline};
