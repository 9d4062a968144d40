// ABOUTME: Loads versioned policy documents from TOML or JSON.
// ABOUTME: Invalid policies are rejected one by one; the rest of the document loads.
use crate::policy::{ComplexityClass, Policy, Severity};
use crate::rule::Rule;
use archgraph_core::{ArchGraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const POLICY_SCHEMA_VERSION: u32 = 1;

/// Keys that would smuggle executable content into a policy.
const EXECUTABLE_KEYS: &[&str] = &["script", "code", "expr", "eval", "command"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Toml,
    Json,
}

impl PolicyFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => PolicyFormat::Json,
            _ => PolicyFormat::Toml,
        }
    }
}

/// A policy excluded at load time, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedPolicy {
    pub policy_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    pub policies: Vec<Policy>,
    pub rejected: Vec<RejectedPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    schema_version: u32,
    #[serde(default)]
    policies: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDefinition {
    id: String,
    #[serde(default = "default_version")]
    version: u32,
    severity: Severity,
    #[serde(default)]
    complexity: Option<ComplexityClass>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    description: Option<String>,
    rule: Rule,
}

fn default_version() -> u32 {
    1
}

pub struct PolicyLoader;

impl PolicyLoader {
    pub fn load_file(path: &Path) -> Result<PolicySet> {
        let content = std::fs::read_to_string(path)?;
        debug!("Loading policies from {}", path.display());
        Self::load_str(&content, PolicyFormat::from_path(path))
    }

    /// Fails only when the document as a whole is unusable (syntax error,
    /// missing or unsupported `schema_version`).
    pub fn load_str(source: &str, format: PolicyFormat) -> Result<PolicySet> {
        let raw: Value = match format {
            PolicyFormat::Json => serde_json::from_str(source)
                .map_err(|e| ArchGraphError::policy(None, format!("invalid JSON: {e}")))?,
            PolicyFormat::Toml => toml::from_str(source)
                .map_err(|e| ArchGraphError::policy(None, format!("invalid TOML: {e}")))?,
        };
        let document: PolicyDocument = serde_json::from_value(raw)
            .map_err(|e| ArchGraphError::policy(None, e.to_string()))?;
        if document.schema_version != POLICY_SCHEMA_VERSION {
            return Err(ArchGraphError::policy(
                None,
                format!(
                    "unsupported schema_version {} (expected {})",
                    document.schema_version, POLICY_SCHEMA_VERSION
                ),
            ));
        }

        let mut set = PolicySet::default();
        let mut seen = HashSet::new();
        for entry in document.policies {
            let id_hint = entry.get("id").and_then(Value::as_str).map(str::to_string);
            match parse_policy(entry) {
                Ok(policy) if !seen.insert(policy.id.clone()) => set.rejected.push(RejectedPolicy {
                    policy_id: Some(policy.id),
                    reason: "duplicate policy id".into(),
                }),
                Ok(policy) => set.policies.push(policy),
                Err(reason) => {
                    warn!(
                        "Rejected policy {}: {}",
                        id_hint.as_deref().unwrap_or("<unnamed>"),
                        reason
                    );
                    set.rejected.push(RejectedPolicy {
                        policy_id: id_hint,
                        reason,
                    });
                }
            }
        }
        debug!(
            "Loaded {} policies ({} rejected)",
            set.policies.len(),
            set.rejected.len()
        );
        Ok(set)
    }

    /// Strict variant: any rejected policy fails the load.
    pub fn load_str_strict(source: &str, format: PolicyFormat) -> Result<Vec<Policy>> {
        let set = Self::load_str(source, format)?;
        match set.rejected.into_iter().next() {
            Some(rejected) => Err(ArchGraphError::PolicyValidation {
                policy_id: rejected.policy_id,
                reason: rejected.reason,
            }),
            None => Ok(set.policies),
        }
    }
}

fn parse_policy(entry: Value) -> std::result::Result<Policy, String> {
    if let Some(key) = find_executable_key(&entry) {
        return Err(format!(
            "field `{key}` is not allowed: policies are declarative and never executed"
        ));
    }
    let def: PolicyDefinition = serde_json::from_value(entry).map_err(|e| e.to_string())?;

    if def.id.trim().is_empty() {
        return Err("policy id must not be empty".into());
    }
    if let Some(c) = def.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(format!("confidence {c} is outside [0, 1]"));
        }
    }
    def.rule.validate()?;

    Ok(Policy {
        complexity: def
            .complexity
            .unwrap_or_else(|| def.rule.default_complexity()),
        confidence: def
            .confidence
            .unwrap_or_else(|| def.rule.default_confidence()),
        timeout: def.timeout_ms.map(Duration::from_millis),
        id: def.id,
        version: def.version,
        severity: def.severity,
        description: def.description,
        rule: def.rule,
    })
}

/// First executable-looking key anywhere in the entry.
fn find_executable_key(value: &Value) -> Option<String> {
    let mut stack = vec![value];
    while let Some(v) = stack.pop() {
        match v {
            Value::Object(map) => {
                for (key, child) in map {
                    if EXECUTABLE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                        return Some(key.clone());
                    }
                    stack.push(child);
                }
            }
            Value::Array(items) => stack.extend(items),
            _ => {}
        }
    }
    None
}
