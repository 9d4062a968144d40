// ABOUTME: Immutable module dependency graph produced by the builder.
// ABOUTME: Nodes and edges live in ordered maps so equal inputs give equal values.
use archgraph_core::{ArchGraphError, Declaration, Language, ModuleId, ReferenceKind, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A declaration together with the file it was found in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedDeclaration {
    pub file: String,
    pub declaration: Declaration,
}

/// One first-party module. Several files may map to the same identifier
/// (`pkg/__init__.py` and `pkg.py`); they are merged here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleNode {
    pub id: ModuleId,
    pub files: Vec<String>,
    pub language: Language,
    pub lines_of_code: u64,
    pub declarations: Vec<LocatedDeclaration>,
    /// Mean complexity over function declarations, `None` without functions.
    pub average_complexity: Option<f64>,
    pub fan_in: usize,
    pub fan_out: usize,
    /// Raw specifiers that did not resolve to a first-party module.
    pub external_references: BTreeSet<String>,
    pub self_references: u32,
}

impl ModuleNode {
    pub(crate) fn new(id: ModuleId, language: Language) -> Self {
        Self {
            id,
            files: Vec::new(),
            language,
            lines_of_code: 0,
            declarations: Vec::new(),
            average_complexity: None,
            fan_in: 0,
            fan_out: 0,
            external_references: BTreeSet::new(),
            self_references: 0,
        }
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    /// First file of the module, used as the location of graph-level findings.
    pub fn primary_file(&self) -> Option<&str> {
        self.files.first().map(String::as_str)
    }

    pub(crate) fn refresh_average_complexity(&mut self) {
        let (sum, count) = self
            .declarations
            .iter()
            .filter(|d| d.declaration.kind == archgraph_core::DeclarationKind::Function)
            .fold((0u64, 0u64), |(s, c), d| {
                (s + u64::from(d.declaration.complexity), c + 1)
            });
        self.average_complexity = if count == 0 {
            None
        } else {
            Some(sum as f64 / count as f64)
        };
    }
}

/// Where the first reference behind an edge was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSite {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyEdge {
    pub source: ModuleId,
    pub target: ModuleId,
    /// Number of references folded into this edge.
    pub weight: u32,
    pub kinds: BTreeMap<ReferenceKind, u32>,
    pub first_site: ReferenceSite,
}

/// Index-based view for graph algorithms. `ids` is sorted and every
/// successor list is sorted, so traversals are deterministic.
#[derive(Debug, Clone)]
pub struct Adjacency {
    pub ids: Vec<ModuleId>,
    pub successors: Vec<Vec<usize>>,
}

impl Adjacency {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<ModuleId, ModuleNode>,
    edges: BTreeMap<(ModuleId, ModuleId), DependencyEdge>,
}

impl DependencyGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.values()
    }

    pub fn edge(&self, source: &ModuleId, target: &ModuleId) -> Option<&DependencyEdge> {
        self.edges.get(&(source.clone(), target.clone()))
    }

    pub fn contains_edge(&self, source: &ModuleId, target: &ModuleId) -> bool {
        self.edges.contains_key(&(source.clone(), target.clone()))
    }

    pub fn successors<'a>(&'a self, id: &'a ModuleId) -> impl Iterator<Item = &'a ModuleId> + 'a {
        self.edges
            .range((id.clone(), ModuleId::new(""))..)
            .take_while(move |((s, _), _)| s == id)
            .map(|((_, t), _)| t)
    }

    pub fn adjacency(&self) -> Adjacency {
        let ids: Vec<ModuleId> = self.nodes.keys().cloned().collect();
        let index: BTreeMap<&ModuleId, usize> =
            ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let mut successors = vec![Vec::new(); ids.len()];
        for (source, target) in self.edges.keys() {
            if let (Some(&s), Some(&t)) = (index.get(source), index.get(target)) {
                successors[s].push(t);
            }
        }
        Adjacency { ids, successors }
    }

    /// Fails on the first edge whose endpoints are not both nodes.
    pub fn verify_integrity(&self) -> Result<()> {
        for (source, target) in self.edges.keys() {
            if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
                return Err(ArchGraphError::DanglingEdge {
                    from: source.to_string(),
                    to: target.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn node_mut(&mut self, id: &ModuleId) -> Option<&mut ModuleNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn insert_node(&mut self, node: ModuleNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Returns `true` when a new (source, target) pair was created.
    pub(crate) fn upsert_edge(
        &mut self,
        source: &ModuleId,
        target: &ModuleId,
        kind: ReferenceKind,
        site: ReferenceSite,
    ) -> bool {
        let key = (source.clone(), target.clone());
        if let Some(edge) = self.edges.get_mut(&key) {
            edge.weight = edge.weight.saturating_add(1);
            *edge.kinds.entry(kind).or_insert(0) += 1;
            return false;
        }
        let mut kinds = BTreeMap::new();
        kinds.insert(kind, 1);
        self.edges.insert(
            key,
            DependencyEdge {
                source: source.clone(),
                target: target.clone(),
                weight: 1,
                kinds,
                first_site: site,
            },
        );
        true
    }

    /// Fan counts are distinct neighbours; edges are already deduplicated.
    pub(crate) fn finalize(&mut self) {
        for node in self.nodes.values_mut() {
            node.fan_in = 0;
            node.fan_out = 0;
            node.refresh_average_complexity();
        }
        let pairs: Vec<(ModuleId, ModuleId)> = self.edges.keys().cloned().collect();
        for (source, target) in pairs {
            if let Some(n) = self.nodes.get_mut(&source) {
                n.fan_out += 1;
            }
            if let Some(n) = self.nodes.get_mut(&target) {
                n.fan_in += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> ReferenceSite {
        ReferenceSite {
            file: "a.py".into(),
            line: 1,
        }
    }

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::default();
        for (s, t) in edges {
            for id in [s, t] {
                let id = ModuleId::new(*id);
                if !g.contains(&id) {
                    g.insert_node(ModuleNode::new(id, Language::Python));
                }
            }
            g.upsert_edge(&ModuleId::new(*s), &ModuleId::new(*t), ReferenceKind::Import, site());
        }
        g.finalize();
        g
    }

    #[test]
    fn duplicate_pairs_increment_weight() {
        let g = graph(&[("a", "b"), ("a", "b"), ("a", "c")]);
        assert_eq!(g.edge_count(), 2);
        let ab = g.edge(&ModuleId::new("a"), &ModuleId::new("b")).unwrap();
        assert_eq!(ab.weight, 2);
        assert_eq!(ab.kinds[&ReferenceKind::Import], 2);
        assert_eq!(g.node(&ModuleId::new("a")).unwrap().fan_out, 2);
        assert_eq!(g.node(&ModuleId::new("b")).unwrap().fan_in, 1);
    }

    #[test]
    fn successors_stay_within_source() {
        let g = graph(&[("a", "c"), ("a", "b"), ("ab", "a")]);
        let a = ModuleId::new("a");
        let succ: Vec<_> = g.successors(&a).map(ModuleId::as_str).collect();
        assert_eq!(succ, vec!["b", "c"]);

        let adj = g.adjacency();
        assert_eq!(adj.ids[0].as_str(), "a");
        assert_eq!(adj.successors[0], vec![2, 3]);
    }

    #[test]
    fn integrity_check_reports_dangling_edges() {
        let mut g = graph(&[("a", "b")]);
        assert!(g.verify_integrity().is_ok());
        g.upsert_edge(&ModuleId::new("a"), &ModuleId::new("ghost"), ReferenceKind::Call, site());
        let err = g.verify_integrity().unwrap_err();
        assert_eq!(err.kind(), "dangling_edge");
    }
}
