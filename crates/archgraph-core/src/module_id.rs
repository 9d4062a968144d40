// ABOUTME: Deterministic module identifiers derived from project-relative paths.
// ABOUTME: Also computes the namespace that relative references resolve against.
use crate::{ArchGraphError, Language, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// File stems that name their directory rather than a child module.
const PACKAGE_STEMS: &[&str] = &["mod", "__init__", "index"];

/// Rust crate roots: `mod x;` inside them declares a sibling file.
const CRATE_ROOT_STEMS: &[&str] = &["lib", "main"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(String);

impl ModuleId {
    /// Builds the identifier from a normalized relative path:
    /// `src/graph/mod.rs` -> `src.graph`, `pkg/util.py` -> `pkg.util`.
    pub fn from_path(normalized: &str) -> Self {
        Self(path_segments(normalized).join("."))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Identifier one level up, `None` at the root.
    pub fn parent(&self) -> Option<ModuleId> {
        self.0.rfind('.').map(|idx| ModuleId(self.0[..idx].to_string()))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a candidate path to forward slashes without `.`/`..` parts.
/// Absolute paths and paths escaping the project root are rejected.
pub fn normalize_path(raw: &str) -> Result<String> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || unified.chars().nth(1) == Some(':') {
        return Err(ArchGraphError::parse(raw, "path must be project-relative"));
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(ArchGraphError::parse(raw, "path escapes project root"));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(ArchGraphError::parse(raw, "empty path"));
    }
    Ok(parts.join("/"))
}

/// Segments of the module a normalized path maps to.
pub fn path_segments(normalized: &str) -> Vec<String> {
    let mut segments: Vec<String> = normalized
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(last) = segments.pop() {
        let stem = match last.rfind('.') {
            Some(idx) if idx > 0 => last[..idx].to_string(),
            _ => last,
        };
        let keep = !(PACKAGE_STEMS.contains(&stem.as_str()) && !segments.is_empty());
        if keep {
            segments.push(stem);
        }
    }
    segments
}

/// Namespace against which relative references of a file resolve.
///
/// For a package file (`pkg/__init__.py`, `src/graph/mod.rs`) and for Rust
/// crate roots that is the directory; for Python/ECMAScript/Go modules it is
/// the containing directory; for ordinary Rust files it is the module itself,
/// because `mod child;` declares `<file>/child.rs`.
pub fn module_namespace(normalized: &str, language: Language) -> Vec<String> {
    let mut dir: Vec<String> = normalized
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let file = dir.pop().unwrap_or_default();
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file.as_str(),
    };

    if PACKAGE_STEMS.contains(&stem) {
        return dir;
    }
    match language {
        Language::Rust if !CRATE_ROOT_STEMS.contains(&stem) => {
            dir.push(stem.to_string());
            dir
        }
        _ => dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_paths() {
        assert_eq!(normalize_path("./src/a.rs").unwrap(), "src/a.rs");
        assert_eq!(normalize_path("src\\x\\..\\b.py").unwrap(), "src/b.py");
        assert_eq!(normalize_path("src//c.go").unwrap(), "src/c.go");
    }

    #[test]
    fn rejects_escaping_and_absolute_paths() {
        assert!(normalize_path("../outside.rs").is_err());
        assert!(normalize_path("/etc/passwd").is_err());
        assert!(normalize_path("C:/x.rs").is_err());
        assert!(normalize_path("./").is_err());
    }

    #[test]
    fn module_ids_drop_extension_and_package_stems() {
        assert_eq!(ModuleId::from_path("src/graph/builder.rs").as_str(), "src.graph.builder");
        assert_eq!(ModuleId::from_path("src/graph/mod.rs").as_str(), "src.graph");
        assert_eq!(ModuleId::from_path("pkg/__init__.py").as_str(), "pkg");
        assert_eq!(ModuleId::from_path("web/index.ts").as_str(), "web");
        assert_eq!(ModuleId::from_path("index.js").as_str(), "index");
        assert_eq!(ModuleId::from_path("src/lib.rs").as_str(), "src.lib");
    }

    #[test]
    fn parent_walks_up() {
        let id = ModuleId::new("a.b.c");
        assert_eq!(id.parent(), Some(ModuleId::new("a.b")));
        assert_eq!(ModuleId::new("a").parent(), None);
    }

    #[test]
    fn namespaces_follow_language_rules() {
        assert_eq!(module_namespace("src/lib.rs", Language::Rust), vec!["src"]);
        assert_eq!(
            module_namespace("src/graph.rs", Language::Rust),
            vec!["src", "graph"]
        );
        assert_eq!(
            module_namespace("src/graph/mod.rs", Language::Rust),
            vec!["src", "graph"]
        );
        assert_eq!(module_namespace("pkg/util.py", Language::Python), vec!["pkg"]);
        assert_eq!(module_namespace("pkg/__init__.py", Language::Python), vec!["pkg"]);
        assert_eq!(module_namespace("web/app.ts", Language::TypeScript), vec!["web"]);
    }
}
