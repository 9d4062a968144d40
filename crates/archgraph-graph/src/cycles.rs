// ABOUTME: Bounded enumeration of simple dependency cycles.
// ABOUTME: Length, count and wall-clock caps truncate the search instead of failing it.
use crate::graph::DependencyGraph;
use archgraph_core::{CancellationToken, GraphLimits, ModuleId};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Steps between deadline and cancellation checks.
const CHECK_INTERVAL: u64 = 256;

/// A closed path, rotated to start at its smallest identifier. The edge from
/// the last node back to the first is implied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub nodes: Vec<ModuleId>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains(id)
    }

    /// Consecutive (source, target) pairs including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (&ModuleId, &ModuleId)> {
        let n = self.nodes.len();
        (0..n).map(move |i| (&self.nodes[i], &self.nodes[(i + 1) % n]))
    }
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for id in &self.nodes {
            write!(f, "{} -> ", id)?;
        }
        match self.nodes.first() {
            Some(first) => write!(f, "{}", first),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    MaxCount,
    Timeout,
    Cancelled,
    /// The longest path search spent its step budget.
    StepBudget,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycles: Vec<Cycle>,
    /// Set whenever the search stopped before exhausting the graph.
    pub truncated: bool,
    pub reason: Option<TruncationReason>,
    /// Branches cut because the path reached the length cap.
    pub pruned_branches: u64,
    pub elapsed_ms: u64,
}

impl CycleReport {
    fn stop(&mut self, reason: TruncationReason) {
        self.truncated = true;
        self.reason = Some(reason);
    }
}

pub struct CycleDetector {
    max_count: usize,
    max_length: usize,
    timeout: Duration,
}

impl CycleDetector {
    pub fn new(limits: &GraphLimits) -> Self {
        Self {
            max_count: limits.max_cycle_count,
            max_length: limits.max_cycle_length,
            timeout: limits.cycle_timeout(),
        }
    }

    pub fn detect(&self, graph: &DependencyGraph) -> CycleReport {
        self.detect_with_cancel(graph, &CancellationToken::new())
    }

    /// Depth-first search from every node `s`, visiting only nodes ordered
    /// after `s`, so each simple cycle is found exactly once from its
    /// smallest member.
    pub fn detect_with_cancel(
        &self,
        graph: &DependencyGraph,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let start = Instant::now();
        let deadline = start.checked_add(self.timeout);
        let adj = graph.adjacency();
        let n = adj.len();

        let mut report = CycleReport::default();
        let mut on_path = vec![false; n];
        let mut steps: u64 = 0;

        'search: for s in 0..n {
            let mut path = vec![s];
            let mut next = vec![0usize];
            on_path[s] = true;

            while let (Some(&v), Some(cursor)) = (path.last(), next.last_mut()) {
                if steps % CHECK_INTERVAL == 0 {
                    if cancel.is_cancelled() {
                        report.stop(TruncationReason::Cancelled);
                        break 'search;
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        report.stop(TruncationReason::Timeout);
                        break 'search;
                    }
                }
                steps += 1;

                let successors = &adj.successors[v];
                if *cursor >= successors.len() {
                    on_path[v] = false;
                    path.pop();
                    next.pop();
                    continue;
                }
                let w = successors[*cursor];
                *cursor += 1;

                if w == s {
                    if report.cycles.len() >= self.max_count {
                        report.stop(TruncationReason::MaxCount);
                        break 'search;
                    }
                    report.cycles.push(Cycle {
                        nodes: path.iter().map(|&i| adj.ids[i].clone()).collect(),
                    });
                } else if w > s && !on_path[w] {
                    if path.len() >= self.max_length {
                        report.pruned_branches += 1;
                    } else {
                        on_path[w] = true;
                        path.push(w);
                        next.push(0);
                    }
                }
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        if report.truncated {
            warn!(
                "Cycle search truncated ({:?}) after {} cycles in {}ms",
                report.reason,
                report.cycles.len(),
                report.elapsed_ms
            );
        } else {
            debug!(
                "Found {} cycles ({} branches pruned) in {}ms",
                report.cycles.len(),
                report.pruned_branches,
                report.elapsed_ms
            );
        }
        report
    }
}
