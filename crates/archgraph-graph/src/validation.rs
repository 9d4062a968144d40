// ABOUTME: Structural validation of a built graph against the configured caps.
// ABOUTME: Longest simple chains: exact across components, a bounded search inside each cycle.
use crate::cycles::TruncationReason;
use crate::graph::{Adjacency, DependencyGraph};
use archgraph_core::{ArchGraphError, GraphLimit, GraphLimits, ModuleId, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Steps between deadline checks.
const CHECK_INTERVAL: u64 = 256;

/// Search steps spent inside strongly connected components before giving up.
pub const DEFAULT_PATH_STEP_BUDGET: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphShape {
    pub nodes: usize,
    pub edges: usize,
    /// Longest simple dependency chain found, in edges.
    pub longest_path: usize,
    /// The chain search inside some cycle stopped early, so `longest_path`
    /// is the longest chain found rather than a proven maximum.
    pub path_truncated: bool,
}

pub struct GraphValidator {
    limits: GraphLimits,
    search: PathSearch,
}

impl GraphValidator {
    pub fn new(limits: GraphLimits) -> Self {
        let search = PathSearch::new(&limits);
        Self { limits, search }
    }

    pub fn with_path_search(mut self, search: PathSearch) -> Self {
        self.search = search;
        self
    }

    /// Checks endpoint integrity, then node, edge and path caps in that order.
    /// The path cap only fails on a chain that was actually found.
    pub fn validate(&self, graph: &DependencyGraph) -> Result<GraphShape> {
        graph.verify_integrity()?;

        let nodes = graph.node_count();
        if nodes > self.limits.max_nodes {
            return Err(too_large(GraphLimit::Nodes, self.limits.max_nodes, nodes));
        }
        let edges = graph.edge_count();
        if edges > self.limits.max_edges {
            return Err(too_large(GraphLimit::Edges, self.limits.max_edges, edges));
        }
        let chains = self.search.run(graph);
        let longest_path = chains.longest_path();
        if longest_path > self.limits.max_path_length {
            return Err(too_large(
                GraphLimit::PathLength,
                self.limits.max_path_length,
                longest_path,
            ));
        }
        Ok(GraphShape {
            nodes,
            edges,
            longest_path,
            path_truncated: chains.truncated,
        })
    }
}

fn too_large(limit: GraphLimit, max: usize, observed: usize) -> ArchGraphError {
    ArchGraphError::GraphTooLarge {
        limit,
        max,
        observed,
    }
}

/// Longest simple chains per module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainLengths {
    /// Per module, the number of modules on the longest simple chain
    /// starting at it, itself included.
    pub depths: BTreeMap<ModuleId, usize>,
    /// Set when a search inside a cycle stopped early. Every depth is still
    /// the length of a real chain, never an estimate above it.
    pub truncated: bool,
    pub reason: Option<TruncationReason>,
}

impl ChainLengths {
    /// Longest chain in edges; 0 for an edgeless graph.
    pub fn longest_path(&self) -> usize {
        self.depths
            .values()
            .max()
            .map(|d| d.saturating_sub(1))
            .unwrap_or(0)
    }
}

/// Longest simple path search.
///
/// The condensation is acyclic, so a chain that leaves a component never
/// comes back and chains combine exactly across components. Inside a
/// component every simple path from each member is walked depth-first until
/// the step budget or the timeout runs out.
#[derive(Debug, Clone)]
pub struct PathSearch {
    step_budget: u64,
    timeout: Duration,
}

impl Default for PathSearch {
    fn default() -> Self {
        Self::new(&GraphLimits::default())
    }
}

impl PathSearch {
    pub fn new(limits: &GraphLimits) -> Self {
        Self {
            step_budget: DEFAULT_PATH_STEP_BUDGET,
            timeout: limits.cycle_timeout(),
        }
    }

    pub fn with_step_budget(mut self, steps: u64) -> Self {
        self.step_budget = steps;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn run(&self, graph: &DependencyGraph) -> ChainLengths {
        let start = Instant::now();
        let deadline = start.checked_add(self.timeout);
        let adj = graph.adjacency();
        let n = adj.len();
        let components = strongly_connected_components(&adj);

        let mut component_of = vec![0usize; n];
        for (c, members) in components.iter().enumerate() {
            for &v in members {
                component_of[v] = c;
            }
        }

        let mut length = vec![0usize; n];
        // Longest chain reachable by leaving the node's component in one step.
        let mut exit = vec![0usize; n];
        let mut on_path = vec![false; n];
        let mut steps: u64 = 0;
        let mut reason = None;

        // Tarjan emits a component only after every component reachable from it.
        for (c, members) in components.iter().enumerate() {
            for &u in members {
                exit[u] = adj.successors[u]
                    .iter()
                    .filter(|&&w| component_of[w] != c)
                    .map(|&w| length[w])
                    .max()
                    .unwrap_or(0);
                length[u] = 1 + exit[u];
            }
            if members.len() == 1 || reason.is_some() {
                continue;
            }

            let ceiling = members.len() + members.iter().map(|&u| exit[u]).max().unwrap_or(0);
            for &v in members {
                let mut best = length[v];
                let mut path: Vec<(usize, usize)> = vec![(v, 0)];
                on_path[v] = true;

                while let Some(frame) = path.last_mut() {
                    if steps % CHECK_INTERVAL == 0 && deadline.is_some_and(|d| Instant::now() >= d)
                    {
                        reason = Some(TruncationReason::Timeout);
                        break;
                    }
                    if steps >= self.step_budget {
                        reason = Some(TruncationReason::StepBudget);
                        break;
                    }
                    steps += 1;

                    let (u, cursor) = *frame;
                    let Some(&w) = adj.successors[u].get(cursor) else {
                        on_path[u] = false;
                        path.pop();
                        continue;
                    };
                    frame.1 += 1;
                    if component_of[w] == c && !on_path[w] {
                        on_path[w] = true;
                        path.push((w, 0));
                        best = best.max(path.len() + exit[w]);
                        if best == ceiling {
                            break;
                        }
                    }
                }

                for &(u, _) in &path {
                    on_path[u] = false;
                }
                length[v] = best;
                if reason.is_some() {
                    break;
                }
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if let Some(reason) = reason {
            warn!(
                "Longest path search truncated ({:?}) after {} steps in {}ms",
                reason, steps, elapsed_ms
            );
        } else {
            debug!("Longest path search took {} steps in {}ms", steps, elapsed_ms);
        }

        ChainLengths {
            depths: adj
                .ids
                .iter()
                .enumerate()
                .map(|(v, id)| (id.clone(), length[v]))
                .collect(),
            truncated: reason.is_some(),
            reason,
        }
    }
}

/// Iterative Tarjan. Components come out in reverse topological order.
pub fn strongly_connected_components(adj: &Adjacency) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = adj.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0usize;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        index[root] = counter;
        lowlink[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(frame) = frames.last_mut() {
            let (v, pos) = *frame;
            if let Some(&w) = adj.successors[v].get(pos) {
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = counter;
                    lowlink[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }
    components
}
