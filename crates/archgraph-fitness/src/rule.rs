// ABOUTME: Closed vocabulary of declarative fitness rules.
// ABOUTME: Rules are tagged data interpreted by the evaluator; nothing is executed.
use crate::policy::ComplexityClass;
use archgraph_core::DeclarationKind;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Glob patterns over module identifiers (`shop.*`, `*.internal.*`).
/// An empty filter matches every module.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ModuleFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ModuleFilter {
    pub fn new(patterns: Vec<String>) -> Result<Self, String> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern).map_err(|e| format!("invalid pattern {pattern:?}: {e}"))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| format!("invalid pattern set: {e}"))?;
        Ok(Self { patterns, set })
    }

    pub fn any() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn matches(&self, module: &str) -> bool {
        self.patterns.is_empty() || self.set.is_match(module)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for ModuleFilter {
    fn default() -> Self {
        Self::any()
    }
}

impl TryFrom<Vec<String>> for ModuleFilter {
    type Error = String;

    fn try_from(patterns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(patterns)
    }
}

impl From<ModuleFilter> for Vec<String> {
    fn from(filter: ModuleFilter) -> Self {
        filter.patterns
    }
}

impl PartialEq for ModuleFilter {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl fmt::Debug for ModuleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleFilter").field(&self.patterns).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMetric {
    FanIn,
    FanOut,
    Instability,
    LinesOfCode,
    AverageComplexity,
    DeclarationCount,
    ExternalReferences,
}

impl fmt::Display for NodeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeMetric::FanIn => "fan-in",
            NodeMetric::FanOut => "fan-out",
            NodeMetric::Instability => "instability",
            NodeMetric::LinesOfCode => "lines of code",
            NodeMetric::AverageComplexity => "average complexity",
            NodeMetric::DeclarationCount => "declaration count",
            NodeMetric::ExternalReferences => "external references",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationMetric {
    Complexity,
    NestingDepth,
    Lines,
}

impl fmt::Display for DeclarationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclarationMetric::Complexity => "cyclomatic complexity",
            DeclarationMetric::NestingDepth => "nesting depth",
            DeclarationMetric::Lines => "length",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layer {
    pub name: String,
    pub modules: ModuleFilter,
}

fn default_declaration_kinds() -> Vec<DeclarationKind> {
    vec![DeclarationKind::Function]
}

/// One predicate over the graph, its metrics or its cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Rule {
    /// Module metric must stay within `[min, max]`. Modules whose metric is
    /// undefined (isolated modules for instability) are not checked.
    NodeMetric {
        metric: NodeMetric,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        modules: ModuleFilter,
    },
    /// Per-declaration metric must not exceed `max`.
    DeclarationMetric {
        metric: DeclarationMetric,
        max: u32,
        #[serde(default = "default_declaration_kinds")]
        declaration_kinds: Vec<DeclarationKind>,
        #[serde(default)]
        modules: ModuleFilter,
    },
    /// No edge from a module matching `from` to one matching `to`.
    ForbiddenDependency { from: ModuleFilter, to: ModuleFilter },
    /// Layers listed top to bottom; a module may only depend on its own
    /// layer or on layers listed after it.
    LayerOrder { layers: Vec<Layer> },
    /// Every detected cycle touching `modules` is a violation.
    NoCycles {
        #[serde(default)]
        modules: ModuleFilter,
    },
    /// Longest dependency chain starting at a module, in edges.
    MaxDependencyDepth {
        max: usize,
        #[serde(default)]
        modules: ModuleFilter,
    },
    /// A module may not depend on a module that is less stable than itself
    /// by more than `tolerance`.
    StableDependencies {
        #[serde(default)]
        tolerance: f64,
    },
}

impl Rule {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Rule::NodeMetric { .. } => "node_metric",
            Rule::DeclarationMetric { .. } => "declaration_metric",
            Rule::ForbiddenDependency { .. } => "forbidden_dependency",
            Rule::LayerOrder { .. } => "layer_order",
            Rule::NoCycles { .. } => "no_cycles",
            Rule::MaxDependencyDepth { .. } => "max_dependency_depth",
            Rule::StableDependencies { .. } => "stable_dependencies",
        }
    }

    /// Exact measurements are certain; structural heuristics less so.
    pub fn default_confidence(&self) -> f64 {
        match self {
            Rule::NodeMetric { .. } | Rule::DeclarationMetric { .. } => 1.0,
            Rule::ForbiddenDependency { .. } | Rule::NoCycles { .. } => 0.9,
            Rule::MaxDependencyDepth { .. } => 0.8,
            Rule::LayerOrder { .. } => 0.7,
            Rule::StableDependencies { .. } => 0.6,
        }
    }

    pub fn default_complexity(&self) -> ComplexityClass {
        match self {
            Rule::NodeMetric { .. }
            | Rule::DeclarationMetric { .. }
            | Rule::ForbiddenDependency { .. }
            | Rule::LayerOrder { .. }
            | Rule::StableDependencies { .. } => ComplexityClass::Linear,
            Rule::MaxDependencyDepth { .. } => ComplexityClass::Polynomial,
            Rule::NoCycles { .. } => ComplexityClass::Exponential,
        }
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Rule::NodeMetric { min, max, .. } => {
                match (min, max) {
                    (None, None) => return Err("node_metric needs min or max".into()),
                    (Some(lo), Some(hi)) if lo > hi => {
                        return Err(format!("min {lo} is greater than max {hi}"))
                    }
                    _ => {}
                }
                if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
                    return Err("bounds must be finite".into());
                }
                Ok(())
            }
            Rule::DeclarationMetric {
                declaration_kinds, ..
            } if declaration_kinds.is_empty() => {
                Err("declaration_kinds must not be empty".into())
            }
            Rule::ForbiddenDependency { from, to } if from.is_empty() || to.is_empty() => {
                Err("forbidden_dependency needs both from and to patterns".into())
            }
            Rule::LayerOrder { layers } => {
                if layers.len() < 2 {
                    return Err("layer_order needs at least two layers".into());
                }
                if let Some(layer) = layers.iter().find(|l| l.modules.is_empty()) {
                    return Err(format!("layer {} has no module patterns", layer.name));
                }
                Ok(())
            }
            Rule::StableDependencies { tolerance } if !(0.0..=1.0).contains(tolerance) => {
                Err(format!("tolerance {tolerance} is outside [0, 1]"))
            }
            _ => Ok(()),
        }
    }
}
