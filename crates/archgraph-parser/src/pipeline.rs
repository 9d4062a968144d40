// ABOUTME: Parallel extraction over a bounded rayon pool with per-file failure isolation.
// ABOUTME: Cancellation is observed between files; in-flight files finish.
use crate::extractor::StructuralExtractor;
use archgraph_core::{
    normalize_path, ArchGraphError, CancellationToken, FileFailure, Result, SourceFile,
    StructuralFact, WorkerConfig,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Sorted by path.
    pub facts: Vec<StructuralFact>,
    /// Sorted by path; every input file is either a fact or a failure.
    pub failures: Vec<FileFailure>,
    pub cancelled: bool,
}

enum FileResult {
    Fact(StructuralFact),
    Failed(FileFailure),
}

pub struct ExtractionPipeline<'a> {
    extractor: &'a StructuralExtractor,
    workers: usize,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(extractor: &'a StructuralExtractor, workers: &WorkerConfig) -> Self {
        Self {
            extractor,
            workers: workers.effective_workers(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Extracts every file. Only pool construction can fail; per-file
    /// problems and cancellation are reported in the outcome.
    pub fn extract_all(
        &self,
        files: &[SourceFile],
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("archgraph-extract-{i}"))
            .build()
            .map_err(|e| ArchGraphError::Config(format!("worker pool: {e}")))?;

        let (unique, mut failures) = dedupe(files);

        let results: Vec<FileResult> = pool.install(|| {
            unique
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return FileResult::Failed(FileFailure::from_error(
                            &file.path,
                            &ArchGraphError::Cancelled,
                        ));
                    }
                    match self.extractor.extract(&file.path, &file.bytes) {
                        Ok(fact) => FileResult::Fact(fact),
                        Err(e) => {
                            warn!("Skipping {}: {}", file.path, e);
                            FileResult::Failed(FileFailure::from_error(&file.path, &e))
                        }
                    }
                })
                .collect()
        });

        let mut facts = Vec::with_capacity(results.len());
        for result in results {
            match result {
                FileResult::Fact(f) => facts.push(f),
                FileResult::Failed(f) => failures.push(f),
            }
        }
        facts.sort_by(|a, b| a.path.cmp(&b.path));
        failures.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.kind.cmp(&b.kind)));

        let cancelled = cancel.is_cancelled();
        info!(
            "Extracted {} files ({} skipped) with {} workers in {:?}{}",
            facts.len(),
            failures.len(),
            self.workers,
            start.elapsed(),
            if cancelled { " [cancelled]" } else { "" }
        );
        Ok(ExtractionOutcome {
            facts,
            failures,
            cancelled,
        })
    }
}

/// Keeps the first file per normalized path; later duplicates are recorded.
fn dedupe(files: &[SourceFile]) -> (Vec<&SourceFile>, Vec<FileFailure>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for file in files {
        match normalize_path(&file.path) {
            Ok(normalized) => {
                if seen.insert(normalized) {
                    unique.push(file);
                } else {
                    debug!("Duplicate input path {}", file.path);
                    failures.push(FileFailure::from_error(
                        &file.path,
                        &ArchGraphError::parse(&file.path, "duplicate path"),
                    ));
                }
            }
            // Let the extractor report the path problem for this file.
            Err(_) => unique.push(file),
        }
    }
    (unique, failures)
}
