use archgraph_core::{
    ArchGraphError, CancellationToken, GraphLimit, GraphLimits, Settings, SourceFile, WorkerConfig,
};
use archgraph_fitness::{OutcomeStatus, PolicyFormat, PolicyLoader, PolicySet, RunState, Severity};
use archgraph_graph::TruncationReason;
use archgraph_pipeline::Analyzer;

const POLICIES: &str = r#"
schema_version = 1

[[policies]]
id = "no-cycles"
severity = "ERROR"
[policies.rule]
kind = "no_cycles"

[[policies]]
id = "function-complexity"
severity = "WARNING"
[policies.rule]
kind = "declaration_metric"
metric = "complexity"
max = 10

[[policies]]
id = "shell-out"
severity = "ERROR"
command = "make clean"
[policies.rule]
kind = "no_cycles"
"#;

fn branchy_function() -> String {
    let mut src = String::from("def classify(x):\n");
    for i in 0..10 {
        src.push_str(&format!("    if x == {i}:\n        return {i}\n"));
    }
    src.push_str("    return -1\n\n\ndef simple(x):\n    return x\n");
    src
}

/// Two import cycles (a <-> b, c <-> d) and one function with complexity 11.
fn fixture() -> Vec<SourceFile> {
    vec![
        SourceFile::new("app/a.py", "import app.b\n"),
        SourceFile::new("app/b.py", "import app.a\n"),
        SourceFile::new("app/c.py", "import app.d\n"),
        SourceFile::new("app/d.py", "from app import c\n"),
        SourceFile::new("app/rules.py", branchy_function()),
    ]
}

fn settings() -> Settings {
    Settings {
        workers: WorkerConfig {
            workers: Some(2),
            ..WorkerConfig::default()
        },
        ..Settings::default()
    }
}

fn policies() -> PolicySet {
    PolicyLoader::load_str(POLICIES, PolicyFormat::Toml).unwrap()
}

#[test]
fn test_fixture_report_is_complete() {
    let analyzer = Analyzer::new(settings()).unwrap();
    let analysis = analyzer
        .analyze(&fixture(), &policies(), &CancellationToken::new())
        .unwrap();
    let report = &analysis.report;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.violations_for("no-cycles").count(), 2);
    assert!(report
        .violations_for("no-cycles")
        .all(|v| v.severity == Severity::Error));

    let complexity: Vec<_> = report.violations_for("function-complexity").collect();
    assert_eq!(complexity.len(), 1);
    assert_eq!(complexity[0].severity, Severity::Warning);
    assert!(complexity[0].message.contains("classify"));

    assert_eq!(report.counts.error_count, 2);
    assert_eq!(report.counts.warning_count, 1);
    assert_eq!(report.compliance_score, 0.0);

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].policy_id.as_deref(), Some("shell-out"));

    assert_eq!(report.cycles.found, 2);
    assert!(!report.cycles.truncated);
    assert_eq!(
        report.cycles.cycles,
        vec![
            vec!["app.a".to_string(), "app.b".to_string()],
            vec!["app.c".to_string(), "app.d".to_string()],
        ]
    );
    assert_eq!(analysis.shape.nodes, 5);
}

#[test]
fn test_repeated_runs_are_idempotent_and_cached() {
    let analyzer = Analyzer::new(settings()).unwrap();
    let files = fixture();

    let first = analyzer
        .analyze(&files, &policies(), &CancellationToken::new())
        .unwrap();
    assert_eq!(analyzer.extractor().parse_count(), 5);

    let second = analyzer
        .analyze(&files, &policies(), &CancellationToken::new())
        .unwrap();
    assert_eq!(analyzer.extractor().parse_count(), 5);
    assert_eq!(first.graph, second.graph);
    assert_eq!(first.report.violations, second.report.violations);
    assert_eq!(first.graph_dot(), second.graph_dot());
    assert!(analyzer.cache().stats().memory_hits >= 5);
}

#[test]
fn test_changed_file_is_reextracted() {
    let analyzer = Analyzer::new(settings()).unwrap();
    let mut files = fixture();
    analyzer
        .analyze(&files, &policies(), &CancellationToken::new())
        .unwrap();

    // Break the c <-> d cycle.
    files[3] = SourceFile::new("app/d.py", "from app import b\n");
    let analysis = analyzer
        .analyze(&files, &policies(), &CancellationToken::new())
        .unwrap();
    assert_eq!(analyzer.extractor().parse_count(), 6);
    assert_eq!(analysis.report.violations_for("no-cycles").count(), 1);
}

#[test]
fn test_truncated_cycle_search_is_visible() {
    let settings = Settings {
        graph: GraphLimits {
            max_cycle_count: 1,
            ..GraphLimits::default()
        },
        ..settings()
    };
    let analysis = Analyzer::new(settings)
        .unwrap()
        .analyze(&fixture(), &policies(), &CancellationToken::new())
        .unwrap();

    let cycles = &analysis.report.cycles;
    assert!(cycles.truncated);
    assert_eq!(cycles.reason, Some(TruncationReason::MaxCount));
    assert_eq!(cycles.cycles.len(), 1);
    assert!(!analysis.report.is_clean());
}

#[test]
fn test_node_cap_aborts_the_run() {
    let settings = Settings {
        graph: GraphLimits {
            max_nodes: 3,
            ..GraphLimits::default()
        },
        ..settings()
    };
    let err = Analyzer::new(settings)
        .unwrap()
        .analyze(&fixture(), &policies(), &CancellationToken::new())
        .unwrap_err();
    match &err {
        ArchGraphError::GraphTooLarge {
            limit,
            max,
            observed,
        } => {
            assert_eq!(*limit, GraphLimit::Nodes);
            assert_eq!(*max, 3);
            assert_eq!(*observed, 4);
        }
        other => panic!("expected GraphTooLarge, got {other:?}"),
    }
    assert!(err.is_fatal());
}

#[test]
fn test_file_failures_are_reported_not_fatal() {
    let mut files = fixture();
    files.push(SourceFile::new("docs/readme.txt", "not code"));
    files.push(SourceFile::new("app/broken.py", vec![0xff, 0xfe, 0x00]));

    let analysis = Analyzer::new(settings())
        .unwrap()
        .analyze(&files, &policies(), &CancellationToken::new())
        .unwrap();
    let failed: Vec<_> = analysis
        .report
        .file_failures
        .iter()
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(failed, vec!["app/broken.py", "docs/readme.txt"]);
    assert_eq!(analysis.shape.nodes, 5);
    assert_eq!(
        analysis.report.outcome("no-cycles").unwrap().status,
        OutcomeStatus::Failed
    );
}

#[test]
fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let err = Analyzer::new(settings())
        .unwrap()
        .analyze(&fixture(), &policies(), &token)
        .unwrap_err();
    assert!(matches!(err, ArchGraphError::Cancelled));
}

#[test]
fn test_sqlite_cache_survives_a_new_analyzer() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.cache.persistent_path = Some(dir.path().join("facts.db"));

    let first = Analyzer::new(settings.clone()).unwrap();
    first
        .analyze(&fixture(), &policies(), &CancellationToken::new())
        .unwrap();
    assert_eq!(first.extractor().parse_count(), 5);
    drop(first);

    let second = Analyzer::new(settings).unwrap();
    let analysis = second
        .analyze(&fixture(), &policies(), &CancellationToken::new())
        .unwrap();
    assert_eq!(second.extractor().parse_count(), 0);
    assert_eq!(analysis.report.violations_for("no-cycles").count(), 2);
    let json = analysis.report_json().unwrap();
    assert!(json.contains("\"no-cycles\""));
}
