use archgraph_core::ContentHash;
use std::fmt;

/// Where a scope's values come from. Decides the TTL rules of its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeOrigin {
    /// Derived purely from local file content; never expires on time.
    Local,
    /// Fetched across a network boundary; always expires.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheScope {
    name: String,
    origin: ScopeOrigin,
}

impl CacheScope {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: ScopeOrigin::Local,
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: ScopeOrigin::External,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> ScopeOrigin {
        self.origin
    }

    /// Column value used by persistent stores, e.g. `local:facts/v1/python`.
    pub fn storage_name(&self) -> String {
        match self.origin {
            ScopeOrigin::Local => format!("local:{}", self.name),
            ScopeOrigin::External => format!("external:{}", self.name),
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_name())
    }
}

/// `(scope, content hash)`; paths and timestamps never take part in a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub scope: CacheScope,
    pub hash: ContentHash,
}

impl CacheKey {
    pub fn new(scope: CacheScope, hash: ContentHash) -> Self {
        Self { scope, hash }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.scope, self.hash.short())
    }
}
