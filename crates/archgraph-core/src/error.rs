use std::fmt;
use thiserror::Error;

/// Input-size bounds enforced by the structural extractor before traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceLimit {
    FileBytes,
    LineCount,
    AstDepth,
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceLimit::FileBytes => "file bytes",
            ResourceLimit::LineCount => "line count",
            ResourceLimit::AstDepth => "ast depth",
        };
        write!(f, "{}", s)
    }
}

/// Structural bounds of a dependency graph. Each one is reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphLimit {
    Nodes,
    Edges,
    PathLength,
}

impl fmt::Display for GraphLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GraphLimit::Nodes => "node count",
            GraphLimit::Edges => "edge count",
            GraphLimit::PathLength => "path length",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum ArchGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Parse error in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Resource limit exceeded in {path}: {limit} is {actual} (max {max})")]
    ResourceLimit {
        path: String,
        limit: ResourceLimit,
        actual: u64,
        max: u64,
    },

    #[error("Graph too large: {limit} reached {observed} (max {max})")]
    GraphTooLarge {
        limit: GraphLimit,
        max: usize,
        observed: usize,
    },

    #[error("Dangling edge {from} -> {to}: endpoint is not a node")]
    DanglingEdge { from: String, to: String },

    #[error("Policy validation failed for {}: {reason}", .policy_id.as_deref().unwrap_or("<document>"))]
    PolicyValidation {
        policy_id: Option<String>,
        reason: String,
    },

    #[error("Timed out: {operation} after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArchGraphError {
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn policy(policy_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::PolicyValidation {
            policy_id: policy_id.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Failures that end the whole run rather than one file or one policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::GraphTooLarge { .. } | Self::DanglingEdge { .. } | Self::Cancelled
        )
    }

    /// Failures recovered by skipping the offending file and recording it.
    pub fn is_file_local(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::ResourceLimit { .. })
    }

    /// Stable machine-readable tag used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Parse { .. } => "parse_error",
            Self::ResourceLimit { .. } => "resource_limit",
            Self::GraphTooLarge { .. } => "graph_too_large",
            Self::DanglingEdge { .. } => "dangling_edge",
            Self::PolicyValidation { .. } => "policy_validation",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::Cache(_) => "cache",
            Self::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for ArchGraphError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArchGraphError>;
