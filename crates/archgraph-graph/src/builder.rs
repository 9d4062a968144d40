// ABOUTME: Aggregates structural facts into a module dependency graph.
// ABOUTME: Node and edge caps are enforced as elements are added, not afterwards.
use crate::graph::{DependencyGraph, LocatedDeclaration, ModuleNode, ReferenceSite};
use crate::resolver::Resolver;
use archgraph_core::{
    ArchGraphError, GraphLimit, GraphLimits, Language, ModuleId, ReferenceKind, Result,
    StructuralFact,
};
use std::time::Instant;
use tracing::{debug, info};

pub struct GraphBuilder {
    limits: GraphLimits,
}

impl GraphBuilder {
    pub fn new(limits: GraphLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &GraphLimits {
        &self.limits
    }

    /// Builds a fresh graph from `facts`. Input order does not matter: facts
    /// are processed sorted by path so equal fact sets give equal graphs.
    pub fn build(&self, facts: &[StructuralFact]) -> Result<DependencyGraph> {
        let start = Instant::now();
        let mut ordered: Vec<&StructuralFact> = facts.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));

        let mut graph = DependencyGraph::default();
        let mut module_of = Vec::with_capacity(ordered.len());
        for fact in &ordered {
            let id = ModuleId::from_path(&fact.path);
            self.add_module(&mut graph, &id, fact)?;
            module_of.push(id);
        }

        let resolver = Resolver::new(graph.nodes().map(|n| (&n.id, n.language)));
        let mut edge_count = 0usize;
        for (fact, source) in ordered.iter().zip(&module_of) {
            for reference in &fact.references {
                let targets = resolver.resolve(&fact.path, fact.language, &reference.target);
                if targets.is_empty() {
                    if let Some(node) = graph.node_mut(source) {
                        node.external_references.insert(reference.target.clone());
                    }
                    continue;
                }
                for target in &targets {
                    if target == source {
                        if let Some(node) = graph.node_mut(source) {
                            node.self_references += 1;
                        }
                        continue;
                    }
                    let site = ReferenceSite {
                        file: fact.path.clone(),
                        line: reference.line,
                    };
                    if !graph.contains_edge(source, target) {
                        edge_count += 1;
                        self.check_edges(edge_count)?;
                    }
                    graph.upsert_edge(source, target, reference.kind, site);
                }
            }
        }

        graph.finalize();
        info!(
            "Built dependency graph: {} modules, {} edges from {} files in {:?}",
            graph.node_count(),
            graph.edge_count(),
            facts.len(),
            start.elapsed()
        );
        Ok(graph)
    }

    /// Graph over bare identifiers, for synthetic inputs. Every edge endpoint
    /// must be listed in `modules`.
    pub fn from_edges(
        &self,
        language: Language,
        modules: &[&str],
        edges: &[(&str, &str)],
    ) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::default();
        for name in modules {
            let id = ModuleId::new(*name);
            if graph.contains(&id) {
                continue;
            }
            self.check_nodes(graph.node_count() + 1)?;
            graph.insert_node(ModuleNode::new(id, language));
        }

        let mut edge_count = 0usize;
        for (line, (from, to)) in edges.iter().enumerate() {
            let (source, target) = (ModuleId::new(*from), ModuleId::new(*to));
            if !graph.contains(&source) || !graph.contains(&target) {
                return Err(ArchGraphError::DanglingEdge {
                    from: source.to_string(),
                    to: target.to_string(),
                });
            }
            if source == target {
                if let Some(node) = graph.node_mut(&source) {
                    node.self_references += 1;
                }
                continue;
            }
            if !graph.contains_edge(&source, &target) {
                edge_count += 1;
                self.check_edges(edge_count)?;
            }
            let site = ReferenceSite {
                file: String::new(),
                line: (line + 1) as u32,
            };
            graph.upsert_edge(&source, &target, ReferenceKind::Import, site);
        }
        graph.finalize();
        Ok(graph)
    }

    fn add_module(
        &self,
        graph: &mut DependencyGraph,
        id: &ModuleId,
        fact: &StructuralFact,
    ) -> Result<()> {
        if !graph.contains(id) {
            self.check_nodes(graph.node_count() + 1)?;
            graph.insert_node(ModuleNode::new(id.clone(), fact.language));
        } else {
            debug!("Merging {} into existing module {}", fact.path, id);
        }
        if let Some(node) = graph.node_mut(id) {
            node.files.push(fact.path.clone());
            node.lines_of_code += u64::from(fact.line_count);
            node.declarations
                .extend(fact.declarations.iter().map(|d| LocatedDeclaration {
                    file: fact.path.clone(),
                    declaration: d.clone(),
                }));
        }
        Ok(())
    }

    fn check_nodes(&self, observed: usize) -> Result<()> {
        if observed > self.limits.max_nodes {
            return Err(ArchGraphError::GraphTooLarge {
                limit: GraphLimit::Nodes,
                max: self.limits.max_nodes,
                observed,
            });
        }
        Ok(())
    }

    fn check_edges(&self, observed: usize) -> Result<()> {
        if observed > self.limits.max_edges {
            return Err(ArchGraphError::GraphTooLarge {
                limit: GraphLimit::Edges,
                max: self.limits.max_edges,
                observed,
            });
        }
        Ok(())
    }
}
