// ABOUTME: Interprets one rule against an immutable graph snapshot.
// ABOUTME: Evaluation is pure and checks a cooperative deadline as it iterates.
use crate::policy::{Location, Policy, Violation};
use crate::rule::{DeclarationMetric, Layer, ModuleFilter, NodeMetric, Rule};
use archgraph_graph::{CouplingMetrics, CycleReport, DependencyGraph, ModuleNode, PathSearch};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("policy evaluation exceeded {limit_ms}ms")]
    Timeout { limit_ms: u64 },
    #[error("policy evaluation faulted: {0}")]
    Fault(String),
}

/// Everything a policy may read. Nothing here is mutated during a run.
#[derive(Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub graph: &'a DependencyGraph,
    pub metrics: &'a CouplingMetrics,
    pub cycles: &'a CycleReport,
}

/// Cooperative per-policy deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(limit).unwrap_or(now),
            limit,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn check(&self) -> Result<(), EvalError> {
        if Instant::now() >= self.at {
            Err(EvalError::Timeout {
                limit_ms: self.limit.as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }
}

pub fn evaluate(
    policy: &Policy,
    input: EvaluationInput<'_>,
    deadline: &Deadline,
) -> Result<Vec<Violation>, EvalError> {
    deadline.check()?;
    let mut out = Findings {
        policy,
        violations: Vec::new(),
    };
    match &policy.rule {
        Rule::NodeMetric {
            metric,
            min,
            max,
            modules,
        } => node_metric(input, *metric, *min, *max, modules, deadline, &mut out)?,
        Rule::DeclarationMetric {
            metric,
            max,
            declaration_kinds,
            modules,
        } => {
            for node in input.graph.nodes() {
                deadline.check()?;
                if !modules.matches(node.id.as_str()) {
                    continue;
                }
                for located in &node.declarations {
                    let decl = &located.declaration;
                    if !declaration_kinds.contains(&decl.kind) {
                        continue;
                    }
                    let value = match metric {
                        DeclarationMetric::Complexity => decl.complexity,
                        DeclarationMetric::NestingDepth => decl.nesting_depth,
                        DeclarationMetric::Lines => decl.line_span(),
                    };
                    if value > *max {
                        out.push(
                            format!(
                                "{} {} `{}` has {} {} (max {})",
                                node.id,
                                decl.kind,
                                decl.qualified_name(),
                                metric,
                                value,
                                max
                            ),
                            Location::File {
                                file: located.file.clone(),
                                line: decl.start_line,
                            },
                        );
                    }
                }
            }
        }
        Rule::ForbiddenDependency { from, to } => {
            for edge in input.graph.edges() {
                deadline.check()?;
                if from.matches(edge.source.as_str()) && to.matches(edge.target.as_str()) {
                    out.push(
                        format!("{} must not depend on {}", edge.source, edge.target),
                        edge_location(edge),
                    );
                }
            }
        }
        Rule::LayerOrder { layers } => {
            for edge in input.graph.edges() {
                deadline.check()?;
                let (Some(src), Some(dst)) = (
                    layer_of(layers, edge.source.as_str()),
                    layer_of(layers, edge.target.as_str()),
                ) else {
                    continue;
                };
                if dst < src {
                    out.push(
                        format!(
                            "{} (layer {}) depends on {} (higher layer {})",
                            edge.source, layers[src].name, edge.target, layers[dst].name
                        ),
                        edge_location(edge),
                    );
                }
            }
        }
        Rule::NoCycles { modules } => {
            for cycle in &input.cycles.cycles {
                deadline.check()?;
                if !modules.is_empty() && !cycle.nodes.iter().any(|m| modules.matches(m.as_str()))
                {
                    continue;
                }
                out.push(
                    format!("dependency cycle of {} modules: {}", cycle.len(), cycle),
                    Location::Cycle {
                        modules: cycle.nodes.iter().map(|m| m.to_string()).collect(),
                    },
                );
            }
        }
        Rule::MaxDependencyDepth { max, modules } => {
            // Depths are chains actually found; a cut-short search cannot overreport.
            let chains = PathSearch::default()
                .with_timeout(deadline.remaining())
                .run(input.graph);
            for (id, depth) in chains.depths {
                deadline.check()?;
                let edges = depth.saturating_sub(1);
                if edges > *max && modules.matches(id.as_str()) {
                    let file = input
                        .graph
                        .node(&id)
                        .and_then(ModuleNode::primary_file)
                        .map(str::to_string);
                    out.push(
                        format!("{} starts a dependency chain of {} edges (max {})", id, edges, max),
                        Location::Module {
                            module: id.to_string(),
                            file,
                        },
                    );
                }
            }
        }
        Rule::StableDependencies { tolerance } => {
            for edge in input.graph.edges() {
                deadline.check()?;
                let (Some(from), Some(to)) = (
                    input.metrics.instability_of(&edge.source),
                    input.metrics.instability_of(&edge.target),
                ) else {
                    continue;
                };
                if to > from + tolerance {
                    out.push(
                        format!(
                            "{} (I={:.2}) depends on less stable {} (I={:.2})",
                            edge.source, from, edge.target, to
                        ),
                        edge_location(edge),
                    );
                }
            }
        }
    }
    Ok(out.violations)
}

struct Findings<'p> {
    policy: &'p Policy,
    violations: Vec<Violation>,
}

impl Findings<'_> {
    fn push(&mut self, message: String, location: Location) {
        self.violations.push(Violation {
            policy_id: self.policy.id.clone(),
            severity: self.policy.severity,
            message,
            location,
            confidence: self.policy.confidence,
        });
    }
}

fn node_metric(
    input: EvaluationInput<'_>,
    metric: NodeMetric,
    min: Option<f64>,
    max: Option<f64>,
    modules: &ModuleFilter,
    deadline: &Deadline,
    out: &mut Findings<'_>,
) -> Result<(), EvalError> {
    for node in input.graph.nodes() {
        deadline.check()?;
        if !modules.matches(node.id.as_str()) {
            continue;
        }
        let Some(value) = node_value(node, metric, input.metrics) else {
            continue;
        };
        if value.is_nan() {
            return Err(EvalError::Fault(format!("{} of {} is NaN", metric, node.id)));
        }
        let bound = match (min, max) {
            (Some(lo), _) if value < lo => Some(format!("below min {}", lo)),
            (_, Some(hi)) if value > hi => Some(format!("above max {}", hi)),
            _ => None,
        };
        if let Some(bound) = bound {
            out.push(
                format!("{} has {} {} ({})", node.id, metric, format_value(value), bound),
                Location::Module {
                    module: node.id.to_string(),
                    file: node.primary_file().map(str::to_string),
                },
            );
        }
    }
    Ok(())
}

fn node_value(node: &ModuleNode, metric: NodeMetric, metrics: &CouplingMetrics) -> Option<f64> {
    match metric {
        NodeMetric::FanIn => Some(node.fan_in as f64),
        NodeMetric::FanOut => Some(node.fan_out as f64),
        NodeMetric::Instability => metrics.instability_of(&node.id),
        NodeMetric::LinesOfCode => Some(node.lines_of_code as f64),
        NodeMetric::AverageComplexity => node.average_complexity,
        NodeMetric::DeclarationCount => Some(node.declaration_count() as f64),
        NodeMetric::ExternalReferences => Some(node.external_references.len() as f64),
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn layer_of(layers: &[Layer], module: &str) -> Option<usize> {
    layers.iter().position(|l| l.modules.matches(module))
}

fn edge_location(edge: &archgraph_graph::DependencyEdge) -> Location {
    Location::Edge {
        source: edge.source.to_string(),
        target: edge.target.to_string(),
        file: edge.first_site.file.clone(),
        line: edge.first_site.line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Severity;
    use archgraph_core::{GraphLimits, Language};
    use archgraph_graph::{CycleDetector, GraphBuilder};

    struct Fixture {
        graph: DependencyGraph,
        metrics: CouplingMetrics,
        cycles: CycleReport,
    }

    impl Fixture {
        fn new(modules: &[&str], edges: &[(&str, &str)]) -> Self {
            let graph = GraphBuilder::new(GraphLimits::default())
                .from_edges(Language::Python, modules, edges)
                .unwrap();
            let metrics = CouplingMetrics::compute(&graph);
            let cycles = CycleDetector::new(&GraphLimits::default()).detect(&graph);
            Self {
                graph,
                metrics,
                cycles,
            }
        }

        fn input(&self) -> EvaluationInput<'_> {
            EvaluationInput {
                graph: &self.graph,
                metrics: &self.metrics,
                cycles: &self.cycles,
            }
        }

        fn run(&self, rule: Rule) -> Vec<Violation> {
            let policy = Policy::new("p", Severity::Error, rule);
            evaluate(&policy, self.input(), &Deadline::after(Duration::from_secs(5))).unwrap()
        }
    }

    fn filter(patterns: &[&str]) -> ModuleFilter {
        ModuleFilter::new(patterns.iter().map(|p| p.to_string()).collect()).unwrap()
    }

    #[test]
    fn layer_order_flags_upward_dependencies() {
        let f = Fixture::new(
            &["ui.view", "svc.orders", "domain.order"],
            &[
                ("ui.view", "svc.orders"),
                ("svc.orders", "domain.order"),
                ("domain.order", "ui.view"),
            ],
        );
        let rule = Rule::LayerOrder {
            layers: vec![
                Layer {
                    name: "ui".into(),
                    modules: filter(&["ui.*"]),
                },
                Layer {
                    name: "service".into(),
                    modules: filter(&["svc.*"]),
                },
                Layer {
                    name: "domain".into(),
                    modules: filter(&["domain.*"]),
                },
            ],
        };
        let v = f.run(rule);
        assert_eq!(v.len(), 1);
        assert!(v[0].message.starts_with("domain.order (layer domain) depends on ui.view"));
        assert_eq!(v[0].confidence, 0.7);
    }

    #[test]
    fn forbidden_dependency_uses_globs() {
        let f = Fixture::new(&["api.http", "db.sql", "core"], &[("api.http", "db.sql"), ("core", "db.sql")]);
        let v = f.run(Rule::ForbiddenDependency {
            from: filter(&["api.*"]),
            to: filter(&["db.*"]),
        });
        assert_eq!(v.len(), 1);
        assert!(matches!(&v[0].location, Location::Edge { source, .. } if source == "api.http"));
    }

    #[test]
    fn isolated_modules_skip_instability_bounds() {
        let f = Fixture::new(&["a", "b", "lonely"], &[("a", "b")]);
        let v = f.run(Rule::NodeMetric {
            metric: NodeMetric::Instability,
            min: None,
            max: Some(0.5),
            modules: ModuleFilter::any(),
        });
        assert_eq!(v.len(), 1);
        assert!(v[0].message.contains("instability 1"));
    }

    #[test]
    fn stable_dependencies_and_depth() {
        // b has two dependents and one dependency, so it is more stable than c.
        let f = Fixture::new(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("c", "b"), ("b", "c"), ("c", "d")],
        );
        let v = f.run(Rule::StableDependencies { tolerance: 0.0 });
        let pairs: Vec<_> = v
            .iter()
            .map(|v| match &v.location {
                Location::Edge { source, target, .. } => (source.as_str(), target.as_str()),
                _ => ("", ""),
            })
            .collect();
        assert_eq!(pairs, vec![("b", "c")]);

        let v = f.run(Rule::MaxDependencyDepth {
            max: 2,
            modules: ModuleFilter::any(),
        });
        let modules: Vec<_> = v
            .iter()
            .map(|v| match &v.location {
                Location::Module { module, .. } => module.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(modules, vec!["a"]);
    }

    #[test]
    fn depth_inside_a_cycle_counts_simple_chains() {
        // Six modules in one component; the longest simple chain is leaf -> hub -> leaf.
        let leaves = ["l1", "l2", "l3", "l4", "l5"];
        let mut modules = vec!["hub"];
        modules.extend(leaves);
        let edges: Vec<_> = leaves
            .iter()
            .flat_map(|&leaf| [("hub", leaf), (leaf, "hub")])
            .collect();
        let f = Fixture::new(&modules, &edges);

        let v = f.run(Rule::MaxDependencyDepth {
            max: 2,
            modules: ModuleFilter::any(),
        });
        assert!(v.is_empty());

        let v = f.run(Rule::MaxDependencyDepth {
            max: 1,
            modules: ModuleFilter::any(),
        });
        assert_eq!(v.len(), 5);
        assert!(v.iter().all(|v| v.message.contains("2 edges")));
    }

    #[test]
    fn zero_budget_times_out_deterministically() {
        let f = Fixture::new(&["a"], &[]);
        let policy = Policy::new("slow", Severity::Info, Rule::NoCycles {
            modules: ModuleFilter::any(),
        });
        let err = evaluate(&policy, f.input(), &Deadline::after(Duration::ZERO)).unwrap_err();
        assert_eq!(err, EvalError::Timeout { limit_ms: 0 });
    }
}
