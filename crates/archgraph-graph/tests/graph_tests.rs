use archgraph_core::{
    ArchGraphError, ContentHash, Declaration, DeclarationKind, GraphLimit, GraphLimits, Language,
    ModuleId, ReferenceEdge, ReferenceKind, StructuralFact,
};
use archgraph_graph::{CouplingMetrics, CycleDetector, GraphBuilder, GraphValidator};

fn fact(path: &str, language: Language, refs: &[(&str, ReferenceKind)]) -> StructuralFact {
    StructuralFact {
        path: path.to_string(),
        content_hash: ContentHash::of(path.as_bytes()),
        language,
        line_count: 20,
        declarations: vec![Declaration {
            kind: DeclarationKind::Function,
            name: "run".into(),
            container: None,
            start_line: 1,
            end_line: 5,
            complexity: 4,
            nesting_depth: 3,
            depth_exceeded: false,
        }],
        references: refs
            .iter()
            .enumerate()
            .map(|(i, (target, kind))| ReferenceEdge {
                target: target.to_string(),
                kind: *kind,
                line: i as u32 + 1,
            })
            .collect(),
    }
}

fn python_project() -> Vec<StructuralFact> {
    vec![
        fact(
            "shop/orders.py",
            Language::Python,
            &[
                (".billing", ReferenceKind::Import),
                (".billing.charge", ReferenceKind::Call),
                ("requests", ReferenceKind::Import),
            ],
        ),
        fact(
            "shop/billing.py",
            Language::Python,
            &[("shop.ledger", ReferenceKind::Import)],
        ),
        fact(
            "shop/ledger.py",
            Language::Python,
            &[("shop.orders", ReferenceKind::Import), ("shop.models.Base", ReferenceKind::Inherit)],
        ),
        fact("shop/models/__init__.py", Language::Python, &[]),
    ]
}

#[test]
fn test_build_is_idempotent_and_order_independent() {
    let builder = GraphBuilder::new(GraphLimits::default());
    let facts = python_project();
    let first = builder.build(&facts).unwrap();
    let second = builder.build(&facts).unwrap();
    assert_eq!(first, second);

    let mut reversed = facts.clone();
    reversed.reverse();
    assert_eq!(first, builder.build(&reversed).unwrap());
}

#[test]
fn test_edges_are_weighted_and_typed() {
    let graph = GraphBuilder::new(GraphLimits::default())
        .build(&python_project())
        .unwrap();
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 4);
    assert!(graph.verify_integrity().is_ok());

    let edge = graph
        .edge(&ModuleId::new("shop.orders"), &ModuleId::new("shop.billing"))
        .unwrap();
    assert_eq!(edge.weight, 2);
    assert_eq!(edge.kinds[&ReferenceKind::Import], 1);
    assert_eq!(edge.kinds[&ReferenceKind::Call], 1);
    assert_eq!(edge.first_site.file, "shop/orders.py");
    assert_eq!(edge.first_site.line, 1);

    let inherit = graph
        .edge(&ModuleId::new("shop.ledger"), &ModuleId::new("shop.models"))
        .unwrap();
    assert_eq!(inherit.kinds[&ReferenceKind::Inherit], 1);

    let orders = graph.node(&ModuleId::new("shop.orders")).unwrap();
    assert!(orders.external_references.contains("requests"));
    assert_eq!(orders.average_complexity, Some(4.0));
}

#[test]
fn test_analytics_over_built_graph() {
    let graph = GraphBuilder::new(GraphLimits::default())
        .build(&python_project())
        .unwrap();

    let report = CycleDetector::new(&GraphLimits::default()).detect(&graph);
    assert_eq!(report.cycles.len(), 1);
    let ids: Vec<_> = report.cycles[0].nodes.iter().map(ModuleId::as_str).collect();
    assert_eq!(ids, vec!["shop.billing", "shop.ledger", "shop.orders"]);

    let metrics = CouplingMetrics::compute(&graph);
    let models = metrics.get(&ModuleId::new("shop.models")).unwrap();
    assert_eq!(models.instability, Some(0.0));

    let shape = GraphValidator::new(GraphLimits::default())
        .validate(&graph)
        .unwrap();
    assert_eq!(shape.longest_path, 3);
    assert!(!shape.path_truncated);
}

#[test]
fn test_node_cap_stops_construction_at_cap_plus_one() {
    let facts: Vec<StructuralFact> = (0..50)
        .map(|i| fact(&format!("m{i:02}.py"), Language::Python, &[]))
        .collect();
    let limits = GraphLimits {
        max_nodes: 10,
        ..GraphLimits::default()
    };
    match GraphBuilder::new(limits).build(&facts) {
        Err(ArchGraphError::GraphTooLarge {
            limit,
            max,
            observed,
        }) => {
            assert_eq!(limit, GraphLimit::Nodes);
            assert_eq!(max, 10);
            assert_eq!(observed, 11);
        }
        other => panic!("expected GraphTooLarge, got {other:?}"),
    }
}

#[test]
fn test_mixed_language_resolution() {
    let facts = vec![
        fact(
            "src/lib.rs",
            Language::Rust,
            &[("self::store", ReferenceKind::Import), ("serde::Serialize", ReferenceKind::Import)],
        ),
        fact(
            "src/store.rs",
            Language::Rust,
            &[("crate::lib", ReferenceKind::Call)],
        ),
        fact(
            "web/app.ts",
            Language::TypeScript,
            &[("./api/index", ReferenceKind::Import)],
        ),
        fact("web/api/index.ts", Language::TypeScript, &[]),
        fact(
            "cmd/main.go",
            Language::Go,
            &[("example.com/app/internal/db", ReferenceKind::Import)],
        ),
        fact("internal/db/conn.go", Language::Go, &[]),
        fact("internal/db/pool.go", Language::Go, &[]),
    ];
    let graph = GraphBuilder::new(GraphLimits::default()).build(&facts).unwrap();

    assert!(graph
        .edge(&ModuleId::new("src.lib"), &ModuleId::new("src.store"))
        .is_some());
    assert!(graph
        .edge(&ModuleId::new("web.app"), &ModuleId::new("web.api"))
        .is_some());
    let main = ModuleId::new("cmd.main");
    let targets: Vec<_> = graph.successors(&main).map(ModuleId::as_str).collect();
    assert_eq!(targets, vec!["internal.db.conn", "internal.db.pool"]);
    assert_eq!(graph.node(&main).unwrap().fan_out, 2);
}
