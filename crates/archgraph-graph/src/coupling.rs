use crate::graph::DependencyGraph;
use archgraph_core::ModuleId;
use serde::Serialize;
use std::collections::BTreeMap;

/// `fan_out / (fan_in + fan_out)`, `None` for an isolated module.
pub fn instability(fan_in: usize, fan_out: usize) -> Option<f64> {
    let total = fan_in + fan_out;
    if total == 0 {
        None
    } else {
        Some(fan_out as f64 / total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouplingMetric {
    pub module: ModuleId,
    pub fan_in: usize,
    pub fan_out: usize,
    pub instability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CouplingMetrics {
    by_module: BTreeMap<ModuleId, CouplingMetric>,
}

impl CouplingMetrics {
    pub fn compute(graph: &DependencyGraph) -> Self {
        let by_module = graph
            .nodes()
            .map(|node| {
                (
                    node.id.clone(),
                    CouplingMetric {
                        module: node.id.clone(),
                        fan_in: node.fan_in,
                        fan_out: node.fan_out,
                        instability: instability(node.fan_in, node.fan_out),
                    },
                )
            })
            .collect();
        Self { by_module }
    }

    pub fn get(&self, id: &ModuleId) -> Option<&CouplingMetric> {
        self.by_module.get(id)
    }

    pub fn instability_of(&self, id: &ModuleId) -> Option<f64> {
        self.get(id).and_then(|m| m.instability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CouplingMetric> {
        self.by_module.values()
    }

    pub fn len(&self) -> usize {
        self.by_module.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_module.is_empty()
    }
}
