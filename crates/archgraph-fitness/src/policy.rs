// ABOUTME: Policy, severity, scheduling class and violation types.
// ABOUTME: A policy is data: metadata plus one rule from the closed vocabulary.
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warning")]
    Warning,
    #[serde(alias = "error")]
    Error,
}

impl Severity {
    /// Weight of a policy of this severity in the compliance score.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Info => 1.0,
            Severity::Warning => 2.0,
            Severity::Error => 4.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Expected evaluation cost. Only affects scheduling: cheaper classes run
/// first so an exhausted run budget drops the expensive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    Constant,
    Linear,
    Polynomial,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    pub id: String,
    pub version: u32,
    pub severity: Severity,
    pub complexity: ComplexityClass,
    /// Confidence attached to every violation this policy reports.
    pub confidence: f64,
    pub timeout: Option<Duration>,
    pub description: Option<String>,
    pub rule: Rule,
}

impl Policy {
    /// Builds a policy with the rule's default class and confidence.
    pub fn new(id: impl Into<String>, severity: Severity, rule: Rule) -> Self {
        Self {
            id: id.into(),
            version: 1,
            severity,
            complexity: rule.default_complexity(),
            confidence: rule.default_confidence(),
            timeout: None,
            description: None,
            rule,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_complexity(mut self, complexity: ComplexityClass) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Scheduling order: cheaper classes first, then by identifier.
    pub fn schedule_key(&self) -> (ComplexityClass, &str) {
        (self.complexity, self.id.as_str())
    }
}

/// Where a violation was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    File {
        file: String,
        line: u32,
    },
    Module {
        module: String,
        file: Option<String>,
    },
    Edge {
        source: String,
        target: String,
        file: String,
        line: u32,
    },
    Cycle {
        modules: Vec<String>,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File { file, line } => write!(f, "{}:{}", file, line),
            Location::Module { module, file } => match file {
                Some(file) => write!(f, "{} ({})", module, file),
                None => write!(f, "{}", module),
            },
            Location::Edge {
                source,
                target,
                file,
                line,
            } => write!(f, "{} -> {} ({}:{})", source, target, file, line),
            Location::Cycle { modules } => {
                write!(f, "{}", modules.join(" -> "))?;
                match modules.first() {
                    Some(first) => write!(f, " -> {}", first),
                    None => Ok(()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub policy_id: String,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_accepts_both_cases() {
        let s: Severity = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(s, Severity::Error);
        let s: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(s, Severity::Warning);
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), "\"INFO\"");
    }

    #[test]
    fn complexity_classes_order_cheap_first() {
        assert!(ComplexityClass::Constant < ComplexityClass::Linear);
        assert!(ComplexityClass::Polynomial < ComplexityClass::Exponential);
    }

    #[test]
    fn cycle_locations_close_the_loop() {
        let loc = Location::Cycle {
            modules: vec!["a".into(), "b".into()],
        };
        assert_eq!(loc.to_string(), "a -> b -> a");
    }
}
