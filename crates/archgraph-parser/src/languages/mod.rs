// ABOUTME: Per-language syntax rules consumed by the generic structural walker.
// ABOUTME: Each grammar classifies declarations, decision points and references.

pub mod ecmascript;
pub mod go;
pub mod python;
pub mod rust;

use archgraph_core::{DeclarationKind, Language, ReferenceEdge, ReferenceKind};
use std::collections::HashMap;
use tree_sitter::Node;

/// A node that introduces a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSite {
    pub kind: DeclarationKind,
    pub name: String,
}

/// What a grammar contributes to extraction. Implementations only look at
/// the node they are given and its immediate neighbourhood; the walker owns
/// traversal.
pub trait LanguageRules: Send + Sync {
    fn declaration(&self, node: Node, src: &[u8]) -> Option<DeclarationSite>;

    /// Name that members nested below `node` are qualified with.
    fn container(&self, node: Node, src: &[u8]) -> Option<String>;

    /// Container a declaration names itself, such as a Go method receiver.
    fn receiver(&self, _node: Node, _src: &[u8]) -> Option<String> {
        None
    }

    /// Decision points contributed by `node` (0 for most nodes).
    fn decision_points(&self, node: Node, src: &[u8]) -> u32;

    /// Appends references introduced by `node`, registering imported names.
    fn references(
        &self,
        node: Node,
        src: &[u8],
        imports: &mut ImportScope,
        out: &mut Vec<ReferenceEdge>,
    );
}

pub fn rules_for(language: Language) -> &'static dyn LanguageRules {
    match language {
        Language::Rust => &rust::RustRules,
        Language::Python => &python::PythonRules,
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            &ecmascript::EcmaScriptRules
        }
        Language::Go => &go::GoRules,
    }
}

/// Names bound by imports in the file being walked, mapped to the specifier
/// they came from.
#[derive(Debug, Default)]
pub struct ImportScope {
    bindings: HashMap<String, String>,
}

impl ImportScope {
    pub fn bind(&mut self, name: impl Into<String>, specifier: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() && name != "_" && name != "*" {
            self.bindings.insert(name, specifier.into());
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }
}

pub fn node_text<'a>(node: &Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

pub fn line_of(node: &Node) -> u32 {
    (node.start_position().row + 1) as u32
}

pub fn reference(target: impl Into<String>, kind: ReferenceKind, node: &Node) -> ReferenceEdge {
    ReferenceEdge {
        target: target.into(),
        kind,
        line: line_of(node),
    }
}

/// String literal contents without the surrounding quotes.
pub fn unquote(text: &str) -> &str {
    let t = text.trim();
    let t = t
        .strip_prefix(['"', '\'', '`'])
        .unwrap_or(t);
    t.strip_suffix(['"', '\'', '`']).unwrap_or(t)
}

/// Identifier-like dotted or `::` path (no calls, indexing or whitespace).
pub fn is_plain_path(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':' || c == '$')
}

/// Leftmost descendant reached through first children, bounded by `max_steps`.
pub fn leftmost_leaf<'t>(node: Node<'t>, max_steps: usize) -> Node<'t> {
    let mut current = node;
    for _ in 0..max_steps {
        match current.named_child(0) {
            Some(child) => current = child,
            None => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_handles_all_quote_styles() {
        assert_eq!(unquote("\"./store\""), "./store");
        assert_eq!(unquote("'fmt'"), "fmt");
        assert_eq!(unquote("`x`"), "x");
        assert_eq!(unquote("bare"), "bare");
    }

    #[test]
    fn plain_paths() {
        assert!(is_plain_path("os.path.join"));
        assert!(is_plain_path("crate::graph::build"));
        assert!(!is_plain_path("f(x).y"));
        assert!(!is_plain_path(""));
    }

    #[test]
    fn import_scope_ignores_placeholders() {
        let mut scope = ImportScope::default();
        scope.bind("_", "fmt");
        scope.bind("util", "pkg.util");
        assert_eq!(scope.lookup("_"), None);
        assert_eq!(scope.lookup("util"), Some("pkg.util"));
    }
}
