use crate::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Go => "go",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let ext = std::path::Path::new(path).extension()?.to_str()?;
        Self::from_extension(&ext.to_ascii_lowercase())
    }

    /// ECMAScript family shares import syntax and resolution rules.
    pub fn is_ecmascript(&self) -> bool {
        matches!(
            self,
            Language::JavaScript | Language::TypeScript | Language::Tsx
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Function,
    Class,
    ModuleSymbol,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::ModuleSymbol => "module_symbol",
        };
        f.write_str(s)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Import,
    Call,
    Inherit,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceKind::Import => "import",
            ReferenceKind::Call => "call",
            ReferenceKind::Inherit => "inherit",
        };
        f.write_str(s)
    }
}

impl FromStr for ReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "import" => Ok(ReferenceKind::Import),
            "call" => Ok(ReferenceKind::Call),
            "inherit" => Ok(ReferenceKind::Inherit),
            other => Err(format!("unknown reference kind: {}", other)),
        }
    }
}

/// A function, class or module-level symbol found in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub name: String,
    /// Enclosing class or impl, when the declaration is a member.
    pub container: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    /// Decision points plus one, capped at the configured maximum.
    pub complexity: u32,
    /// Deepest AST level reached below the declaration node, capped.
    pub nesting_depth: u32,
    /// Set when either the complexity or depth cap stopped the count.
    pub depth_exceeded: bool,
}

impl Declaration {
    pub fn qualified_name(&self) -> String {
        match &self.container {
            Some(container) => format!("{}.{}", container, self.name),
            None => self.name.clone(),
        }
    }

    pub fn line_span(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// An outgoing reference as written in the source. `target` is the raw
/// specifier (`crate::graph::builder`, `..util`, `./store`); resolution to a
/// first-party module happens when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub target: String,
    pub kind: ReferenceKind,
    pub line: u32,
}

/// Path-independent syntax summary of one file body. This is the value the
/// cache stores under the content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSyntax {
    pub language: Language,
    pub line_count: u32,
    pub declarations: Vec<Declaration>,
    pub references: Vec<ReferenceEdge>,
}

/// One analysed file: the syntax summary bound to its path and content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFact {
    pub path: String,
    pub content_hash: ContentHash,
    pub language: Language,
    pub line_count: u32,
    pub declarations: Vec<Declaration>,
    pub references: Vec<ReferenceEdge>,
}

impl StructuralFact {
    pub fn from_syntax(path: String, content_hash: ContentHash, syntax: FileSyntax) -> Self {
        Self {
            path,
            content_hash,
            language: syntax.language,
            line_count: syntax.line_count,
            declarations: syntax.declarations,
            references: syntax.references,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations
            .iter()
            .filter(|d| d.kind == DeclarationKind::Function)
    }
}

/// Raw input handed over by file discovery.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// A file that was skipped, with the reason recorded for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    /// `parse_error`, `resource_limit`, `cancelled`, ...
    pub kind: String,
    pub message: String,
}

impl FileFailure {
    pub fn from_error(path: impl Into<String>, error: &crate::ArchGraphError) -> Self {
        Self {
            path: path.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}
