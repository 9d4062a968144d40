use archgraph_cache::{CacheManager, SqliteStore};
use archgraph_core::{
    ArchGraphError, CacheSettings, CancellationToken, ExtractionLimits, ResourceLimit, SourceFile,
    WorkerConfig,
};
use archgraph_parser::{ExtractionPipeline, StructuralExtractor};
use std::sync::Arc;
use tempfile::TempDir;

const MODULE: &str = "import os\n\ndef walk(root):\n    for entry in os.listdir(root):\n        if entry.startswith('.'):\n            continue\n    return root\n";

fn cached_extractor(limits: ExtractionLimits) -> (StructuralExtractor, Arc<CacheManager>) {
    let cache = Arc::new(CacheManager::in_memory(64).unwrap());
    (StructuralExtractor::new(limits, cache.clone()), cache)
}

#[test]
fn test_unchanged_bytes_are_served_without_parsing() {
    let (extractor, cache) = cached_extractor(ExtractionLimits::default());

    let first = extractor.extract("tools/walk.py", MODULE.as_bytes()).unwrap();
    assert_eq!(extractor.parse_count(), 1);

    let second = extractor.extract("tools/walk.py", MODULE.as_bytes()).unwrap();
    assert_eq!(extractor.parse_count(), 1);
    assert_eq!(first, second);
    assert_eq!(cache.stats().memory_hits, 1);
}

#[test]
fn test_identical_bytes_under_another_path_hit() {
    let (extractor, _cache) = cached_extractor(ExtractionLimits::default());
    let a = extractor.extract("a/walk.py", MODULE.as_bytes()).unwrap();
    let b = extractor.extract("b/walk.py", MODULE.as_bytes()).unwrap();
    assert_eq!(extractor.parse_count(), 1);
    assert_eq!(b.path, "b/walk.py");
    assert_eq!(a.content_hash, b.content_hash);
    assert_eq!(a.declarations, b.declarations);
}

#[test]
fn test_changed_byte_forces_reextraction() {
    let (extractor, _cache) = cached_extractor(ExtractionLimits::default());
    let first = extractor.extract("tools/walk.py", MODULE.as_bytes()).unwrap();

    let mut edited = MODULE.as_bytes().to_vec();
    let idx = edited.iter().position(|b| *b == b'.').unwrap();
    edited[idx] = b'_';
    let second = extractor.extract("tools/walk.py", &edited).unwrap();

    assert_eq!(extractor.parse_count(), 2);
    assert_ne!(first.content_hash, second.content_hash);
}

#[test]
fn test_limit_change_does_not_serve_stale_facts() {
    let cache = Arc::new(CacheManager::in_memory(64).unwrap());
    let loose = StructuralExtractor::new(ExtractionLimits::default(), cache.clone());
    let tight = StructuralExtractor::new(
        ExtractionLimits {
            max_complexity: 2,
            ..ExtractionLimits::default()
        },
        cache,
    );

    let full = loose.extract("walk.py", MODULE.as_bytes()).unwrap();
    let capped = tight.extract("walk.py", MODULE.as_bytes()).unwrap();
    assert_eq!(tight.parse_count(), 1);
    assert_eq!(full.declarations[0].complexity, 3);
    assert_eq!(capped.declarations[0].complexity, 2);
    assert!(capped.declarations[0].depth_exceeded);
}

#[test]
fn test_facts_survive_restart_with_sqlite_tier() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.db");
    let settings = CacheSettings::default();

    let first = {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let cache = Arc::new(CacheManager::with_store(&settings, store).unwrap());
        let extractor = StructuralExtractor::new(ExtractionLimits::default(), cache);
        extractor.extract("walk.py", MODULE.as_bytes()).unwrap()
    };

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let cache = Arc::new(CacheManager::with_store(&settings, store).unwrap());
    let extractor = StructuralExtractor::new(ExtractionLimits::default(), cache.clone());
    let second = extractor.extract("walk.py", MODULE.as_bytes()).unwrap();

    assert_eq!(extractor.parse_count(), 0);
    assert_eq!(first, second);
    assert_eq!(cache.stats().persistent_hits, 1);
}

#[test]
fn test_oversized_input_is_a_resource_limit() {
    let limits = ExtractionLimits {
        max_lines: 100,
        ..ExtractionLimits::default()
    };
    let extractor = StructuralExtractor::without_cache(limits);
    let body = "x = 1\n".repeat(10_000);
    let err = extractor.extract("huge.py", body.as_bytes()).unwrap_err();
    match err {
        ArchGraphError::ResourceLimit {
            limit, actual, max, ..
        } => {
            assert_eq!(limit, ResourceLimit::LineCount);
            assert_eq!(actual, 10_000);
            assert_eq!(max, 100);
        }
        other => panic!("expected resource limit, got {other:?}"),
    }
    assert_eq!(extractor.parse_count(), 0);
}

#[test]
fn test_deep_nesting_is_bounded() {
    let limits = ExtractionLimits {
        max_ast_depth: 64,
        ..ExtractionLimits::default()
    };
    let extractor = StructuralExtractor::without_cache(limits);
    let body = format!("x = {}1{}\n", "(".repeat(200), ")".repeat(200));
    let err = extractor.extract("deep.py", body.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        ArchGraphError::ResourceLimit {
            limit: ResourceLimit::AstDepth,
            ..
        }
    ));
}

#[test]
fn test_tighter_depth_limit_is_not_bypassed_by_the_cache() {
    let cache = Arc::new(CacheManager::in_memory(64).unwrap());
    let body = format!("x = {}1{}\n", "(".repeat(60), ")".repeat(60));

    let loose = StructuralExtractor::new(ExtractionLimits::default(), cache.clone());
    loose.extract("deep.py", body.as_bytes()).unwrap();
    assert_eq!(loose.parse_count(), 1);

    let tight = StructuralExtractor::new(
        ExtractionLimits {
            max_ast_depth: 20,
            max_nesting_depth: 20,
            ..ExtractionLimits::default()
        },
        cache,
    );
    let err = tight.extract("deep.py", body.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        ArchGraphError::ResourceLimit {
            limit: ResourceLimit::AstDepth,
            ..
        }
    ));
    assert_eq!(tight.parse_count(), 1);
}

#[test]
fn test_pipeline_uses_the_cache_across_runs() {
    let (extractor, _cache) = cached_extractor(ExtractionLimits::default());
    let files: Vec<SourceFile> = (0..12)
        .map(|i| SourceFile::new(format!("pkg/m{i}.py"), format!("import pkg.m{}\n", (i + 1) % 12)))
        .collect();
    let workers = WorkerConfig {
        workers: Some(4),
        hard_cap: 4,
    };
    let pipeline = ExtractionPipeline::new(&extractor, &workers);
    assert_eq!(pipeline.workers(), 4);

    let first = pipeline
        .extract_all(&files, &CancellationToken::new())
        .unwrap();
    let second = pipeline
        .extract_all(&files, &CancellationToken::new())
        .unwrap();

    assert_eq!(first.facts.len(), 12);
    assert!(first.failures.is_empty());
    assert_eq!(first.facts, second.facts);
    assert_eq!(extractor.parse_count(), 12);
}
