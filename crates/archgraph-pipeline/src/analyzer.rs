// ABOUTME: One analysis run: extract facts, build and validate the graph, run analytics and policies.
// ABOUTME: File and policy failures are aggregated into the report; graph-level failures abort.
use archgraph_cache::CacheManager;
use archgraph_core::{ArchGraphError, CancellationToken, Result, Settings, SourceFile};
use archgraph_fitness::{EvaluationInput, FitnessEngine, FitnessReport, PolicySet};
use archgraph_graph::{
    to_dot, to_json, CouplingMetrics, CycleDetector, CycleReport, DependencyGraph, GraphBuilder,
    GraphShape, GraphValidator,
};
use archgraph_parser::{ExtractionPipeline, StructuralExtractor};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Everything one run produced. The graph and analytics are kept so
/// callers can export or inspect them after reading the report.
#[derive(Debug)]
pub struct Analysis {
    pub graph: DependencyGraph,
    pub shape: GraphShape,
    pub metrics: CouplingMetrics,
    pub cycles: CycleReport,
    pub report: FitnessReport,
}

impl Analysis {
    pub fn graph_json(&self) -> Result<String> {
        to_json(&self.graph)
    }

    pub fn graph_dot(&self) -> String {
        to_dot(&self.graph)
    }

    pub fn report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.report)?)
    }
}

pub struct Analyzer {
    settings: Settings,
    cache: Arc<CacheManager>,
    extractor: StructuralExtractor,
}

impl Analyzer {
    /// Opens the cache described by `settings.cache`.
    pub fn new(settings: Settings) -> Result<Self> {
        let cache = Arc::new(CacheManager::new(&settings.cache)?);
        Ok(Self::with_cache(settings, cache))
    }

    /// Shares an existing cache, e.g. across analyzers in one process.
    pub fn with_cache(settings: Settings, cache: Arc<CacheManager>) -> Self {
        let extractor = StructuralExtractor::new(settings.limits.clone(), cache.clone());
        Self {
            settings,
            cache,
            extractor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn extractor(&self) -> &StructuralExtractor {
        &self.extractor
    }

    /// Fails with `GraphTooLarge` or `DanglingEdge` when the graph cannot be
    /// analysed, and with `Cancelled` when cancellation is observed before
    /// policy evaluation starts. A cancellation during evaluation yields an
    /// aborted report instead.
    pub fn analyze(
        &self,
        files: &[SourceFile],
        policies: &PolicySet,
        cancel: &CancellationToken,
    ) -> Result<Analysis> {
        let start = Instant::now();

        let extraction = ExtractionPipeline::new(&self.extractor, &self.settings.workers)
            .extract_all(files, cancel)?;
        if extraction.cancelled {
            warn!("Analysis cancelled during extraction");
            return Err(ArchGraphError::Cancelled);
        }

        let graph = GraphBuilder::new(self.settings.graph.clone()).build(&extraction.facts)?;
        let shape = GraphValidator::new(self.settings.graph.clone()).validate(&graph)?;
        cancel.check()?;

        let cycles = CycleDetector::new(&self.settings.graph).detect_with_cancel(&graph, cancel);
        if cycles.truncated {
            warn!(
                "Cycle search truncated ({:?}) after {} cycles",
                cycles.reason,
                cycles.cycles.len()
            );
        }
        let metrics = CouplingMetrics::compute(&graph);
        cancel.check()?;

        let input = EvaluationInput {
            graph: &graph,
            metrics: &metrics,
            cycles: &cycles,
        };
        let report = FitnessEngine::new(self.settings.fitness.clone())
            .run(&policies.policies, input, cancel)
            .with_rejected(policies.rejected.clone())
            .with_file_failures(extraction.failures);

        info!(
            "Analysed {} files into {} modules, {} edges: {} violations, score {:.2} in {}ms",
            files.len(),
            shape.nodes,
            shape.edges,
            report.violations.len(),
            report.compliance_score,
            start.elapsed().as_millis()
        );

        Ok(Analysis {
            graph,
            shape,
            metrics,
            cycles,
            report,
        })
    }
}
