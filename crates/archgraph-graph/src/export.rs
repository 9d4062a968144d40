// ABOUTME: Textual graph exports for visualization tools.
// ABOUTME: Graphviz DOT and a JSON node/edge list, both with metrics attached.
use crate::coupling::instability;
use crate::graph::DependencyGraph;
use archgraph_core::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Serialize)]
struct JsonGraph<'a> {
    nodes: Vec<JsonNode<'a>>,
    edges: Vec<JsonEdge<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonNode<'a> {
    id: &'a str,
    language: &'static str,
    files: &'a [String],
    lines_of_code: u64,
    declaration_count: usize,
    average_complexity: Option<f64>,
    fan_in: usize,
    fan_out: usize,
    instability: Option<f64>,
    external_references: usize,
}

#[derive(Debug, Serialize)]
struct JsonEdge<'a> {
    source: &'a str,
    target: &'a str,
    weight: u32,
    kinds: BTreeMap<String, u32>,
}

pub fn to_json(graph: &DependencyGraph) -> Result<String> {
    let payload = JsonGraph {
        nodes: graph
            .nodes()
            .map(|n| JsonNode {
                id: n.id.as_str(),
                language: n.language.as_str(),
                files: &n.files,
                lines_of_code: n.lines_of_code,
                declaration_count: n.declaration_count(),
                average_complexity: n.average_complexity,
                fan_in: n.fan_in,
                fan_out: n.fan_out,
                instability: instability(n.fan_in, n.fan_out),
                external_references: n.external_references.len(),
            })
            .collect(),
        edges: graph
            .edges()
            .map(|e| JsonEdge {
                source: e.source.as_str(),
                target: e.target.as_str(),
                weight: e.weight,
                kinds: e.kinds.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn to_dot(graph: &DependencyGraph) -> String {
    let mut out = String::from("digraph dependencies {\n    rankdir=LR;\n    node [shape=box];\n");
    for node in graph.nodes() {
        let instability = instability(node.fan_in, node.fan_out)
            .map(|i| format!("{:.2}", i))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "    \"{}\" [label=\"{}\\nloc={} fan_in={} fan_out={} I={}\"];",
            escape(node.id.as_str()),
            escape(node.id.as_str()),
            node.lines_of_code,
            node.fan_in,
            node.fan_out,
            instability
        );
    }
    for edge in graph.edges() {
        let kinds: Vec<String> = edge.kinds.keys().map(|k| k.to_string()).collect();
        let _ = writeln!(
            out,
            "    \"{}\" -> \"{}\" [weight={}, label=\"{}\"];",
            escape(edge.source.as_str()),
            escape(edge.target.as_str()),
            edge.weight,
            kinds.join(",")
        );
    }
    out.push_str("}\n");
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
