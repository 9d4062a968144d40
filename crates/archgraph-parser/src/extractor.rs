use crate::language::LanguageRegistry;
use crate::languages::rules_for;
use crate::limits::{check_depth, check_input};
use crate::walker::collect;
use archgraph_cache::{CacheKey, CacheManager, CacheScope};
use archgraph_core::{
    normalize_path, ArchGraphError, ContentHash, ExtractionLimits, FileSyntax, Language, Result,
    StructuralFact,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bumped whenever the shape or meaning of [`FileSyntax`] changes; older
/// cached facts then live in a scope nobody reads.
pub const FACT_SCHEMA_VERSION: u32 = 3;

/// Syntax-only extraction of one file into a [`StructuralFact`].
///
/// Nothing from the analysed file is executed or loaded. Input bounds are
/// enforced before the tree is walked, and byte-identical input is served
/// from the cache without parsing.
pub struct StructuralExtractor {
    limits: ExtractionLimits,
    registry: LanguageRegistry,
    cache: Option<Arc<CacheManager>>,
    parse_count: AtomicU64,
}

impl StructuralExtractor {
    pub fn new(limits: ExtractionLimits, cache: Arc<CacheManager>) -> Self {
        Self {
            limits,
            registry: LanguageRegistry::new(),
            cache: Some(cache),
            parse_count: AtomicU64::new(0),
        }
    }

    pub fn without_cache(limits: ExtractionLimits) -> Self {
        Self {
            limits,
            registry: LanguageRegistry::new(),
            cache: None,
            parse_count: AtomicU64::new(0),
        }
    }

    pub fn limits(&self) -> &ExtractionLimits {
        &self.limits
    }

    /// Number of times the parser actually ran.
    pub fn parse_count(&self) -> u64 {
        self.parse_count.load(Ordering::Relaxed)
    }

    pub fn cache_scope(&self, language: Language) -> CacheScope {
        CacheScope::local(format!(
            "facts/v{}/{}/{}",
            FACT_SCHEMA_VERSION,
            language.as_str(),
            self.limits.fingerprint()
        ))
    }

    /// Fails with `Parse` on malformed or unsupported input and with
    /// `ResourceLimit` when a configured bound is exceeded.
    pub fn extract(&self, file_path: &str, bytes: &[u8]) -> Result<StructuralFact> {
        let path = normalize_path(file_path)?;
        let language = Language::from_path(&path)
            .filter(|l| self.registry.supports(*l))
            .ok_or_else(|| ArchGraphError::parse(&path, "unsupported language"))?;

        let line_count = check_input(&path, bytes, &self.limits)?;
        let source = std::str::from_utf8(bytes).map_err(|e| {
            ArchGraphError::parse(&path, format!("invalid UTF-8 at byte {}", e.valid_up_to()))
        })?;

        let hash = ContentHash::of(bytes);
        let key = CacheKey::new(self.cache_scope(language), hash.clone());

        if let Some(syntax) = self.cached(&key) {
            debug!("cache hit for {} ({})", path, hash.short());
            return Ok(StructuralFact::from_syntax(path, hash, syntax));
        }

        let syntax = self.parse(&path, source, language, line_count)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(key, syntax.clone(), None) {
                warn!("failed to cache facts for {}: {}", path, e);
            }
        }
        Ok(StructuralFact::from_syntax(path, hash, syntax))
    }

    fn cached(&self, key: &CacheKey) -> Option<FileSyntax> {
        let cache = self.cache.as_ref()?;
        match cache.get::<FileSyntax>(key) {
            Ok(hit) => hit.map(|arc| (*arc).clone()),
            Err(e) => {
                warn!("cache lookup failed for {}: {}", key, e);
                None
            }
        }
    }

    fn parse(
        &self,
        path: &str,
        source: &str,
        language: Language,
        line_count: u64,
    ) -> Result<FileSyntax> {
        let mut parser = self.registry.parser_for(path, language)?;
        self.parse_count.fetch_add(1, Ordering::Relaxed);

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ArchGraphError::parse(path, "parser produced no tree"))?;
        check_depth(path, &tree, &self.limits)?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(&tree).unwrap_or(1);
            return Err(ArchGraphError::parse(
                path,
                format!("syntax error near line {line}"),
            ));
        }

        let src = source.as_bytes();
        Ok(collect(
            &tree,
            src,
            language,
            u32::try_from(line_count).unwrap_or(u32::MAX),
            rules_for(language),
            &self.limits,
        ))
    }
}

/// Line of the first ERROR or MISSING node in document order.
fn first_error_line(tree: &tree_sitter::Tree) -> Option<u32> {
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some((node.start_position().row + 1) as u32);
        }
        // Only descend into subtrees that contain an error.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}
