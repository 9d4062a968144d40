use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Bounds applied to a single input file by the structural extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionLimits {
    #[serde(default = "ExtractionLimits::default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "ExtractionLimits::default_max_lines")]
    pub max_lines: u64,
    /// Hard bound on syntax tree depth; deeper files are rejected.
    #[serde(default = "ExtractionLimits::default_max_ast_depth")]
    pub max_ast_depth: u32,
    /// Soft cap on per-declaration nesting depth; the count stops and flags.
    #[serde(default = "ExtractionLimits::default_max_nesting_depth")]
    pub max_nesting_depth: u32,
    /// Soft cap on per-declaration cyclomatic complexity.
    #[serde(default = "ExtractionLimits::default_max_complexity")]
    pub max_complexity: u32,
}

impl ExtractionLimits {
    fn default_max_file_bytes() -> u64 {
        2 * 1024 * 1024
    }

    fn default_max_lines() -> u64 {
        50_000
    }

    fn default_max_ast_depth() -> u32 {
        400
    }

    fn default_max_nesting_depth() -> u32 {
        200
    }

    fn default_max_complexity() -> u32 {
        1_000
    }

    /// Short stable tag of every bound a cached fact depends on. The AST
    /// depth is only checked on a parse, so a fact admitted under a looser
    /// depth bound must live in a different scope.
    pub fn fingerprint(&self) -> String {
        format!(
            "a{}d{}c{}",
            self.max_ast_depth, self.max_nesting_depth, self.max_complexity
        )
    }
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: Self::default_max_file_bytes(),
            max_lines: Self::default_max_lines(),
            max_ast_depth: Self::default_max_ast_depth(),
            max_nesting_depth: Self::default_max_nesting_depth(),
            max_complexity: Self::default_max_complexity(),
        }
    }
}

/// Bounds on graph construction and graph analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GraphLimits {
    #[serde(default = "GraphLimits::default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "GraphLimits::default_max_edges")]
    pub max_edges: usize,
    #[serde(default = "GraphLimits::default_max_cycle_count")]
    pub max_cycle_count: usize,
    /// Longest cycle (in nodes) the detector follows.
    #[serde(default = "GraphLimits::default_max_cycle_length")]
    pub max_cycle_length: usize,
    /// Longest dependency chain (in edges) a valid graph may contain.
    #[serde(default = "GraphLimits::default_max_path_length")]
    pub max_path_length: usize,
    #[serde(default = "GraphLimits::default_cycle_timeout_ms")]
    pub cycle_timeout_ms: u64,
}

impl GraphLimits {
    fn default_max_nodes() -> usize {
        50_000
    }

    fn default_max_edges() -> usize {
        500_000
    }

    fn default_max_cycle_count() -> usize {
        1_000
    }

    fn default_max_cycle_length() -> usize {
        12
    }

    fn default_max_path_length() -> usize {
        10_000
    }

    fn default_cycle_timeout_ms() -> u64 {
        5_000
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_nodes: Self::default_max_nodes(),
            max_edges: Self::default_max_edges(),
            max_cycle_count: Self::default_max_cycle_count(),
            max_cycle_length: Self::default_max_cycle_length(),
            max_path_length: Self::default_max_path_length(),
            cycle_timeout_ms: Self::default_cycle_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FitnessConfig {
    /// Default wall-clock budget for one policy; a policy may override it.
    #[serde(default = "FitnessConfig::default_policy_timeout_ms")]
    pub policy_timeout_ms: u64,
    /// Budget for the whole run; remaining policies are skipped once spent.
    #[serde(default = "FitnessConfig::default_run_budget_ms")]
    pub run_budget_ms: u64,
    /// Evaluate policies of the same complexity class on the rayon pool.
    #[serde(default = "FitnessConfig::default_parallel")]
    pub parallel: bool,
}

impl FitnessConfig {
    fn default_policy_timeout_ms() -> u64 {
        2_000
    }

    fn default_run_budget_ms() -> u64 {
        30_000
    }

    fn default_parallel() -> bool {
        true
    }

    pub fn policy_timeout(&self) -> Duration {
        Duration::from_millis(self.policy_timeout_ms)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_millis(self.run_budget_ms)
    }
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            policy_timeout_ms: Self::default_policy_timeout_ms(),
            run_budget_ms: Self::default_run_budget_ms(),
            parallel: Self::default_parallel(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheSettings {
    /// Entries held by the in-process tier across all shards.
    #[serde(default = "CacheSettings::default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "CacheSettings::default_shards")]
    pub shards: usize,
    /// SQLite file backing the persistent tier; in-memory when unset.
    #[serde(default)]
    pub persistent_path: Option<PathBuf>,
    /// TTL applied to externally sourced entries stored without one.
    #[serde(default = "CacheSettings::default_external_ttl_secs")]
    pub external_ttl_secs: u64,
}

impl CacheSettings {
    fn default_memory_capacity() -> usize {
        10_000
    }

    fn default_shards() -> usize {
        16
    }

    fn default_external_ttl_secs() -> u64 {
        7 * 24 * 60 * 60
    }

    pub fn external_ttl(&self) -> Duration {
        Duration::from_secs(self.external_ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_capacity: Self::default_memory_capacity(),
            shards: Self::default_shards(),
            persistent_path: None,
            external_ttl_secs: Self::default_external_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerConfig {
    /// Extraction workers; defaults to available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "WorkerConfig::default_hard_cap")]
    pub hard_cap: usize,
}

impl WorkerConfig {
    fn default_hard_cap() -> usize {
        64
    }

    pub fn effective_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(num_cpus::get)
            .clamp(1, self.hard_cap.max(1))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            hard_cap: Self::default_hard_cap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Settings {
    #[serde(default)]
    pub limits: ExtractionLimits,
    #[serde(default)]
    pub graph: GraphLimits,
    #[serde(default)]
    pub fitness: FitnessConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.limits.max_file_bytes > 0, "limits.max_file_bytes must be > 0");
        anyhow::ensure!(self.limits.max_lines > 0, "limits.max_lines must be > 0");
        anyhow::ensure!(self.limits.max_ast_depth > 0, "limits.max_ast_depth must be > 0");
        anyhow::ensure!(
            self.limits.max_nesting_depth <= self.limits.max_ast_depth,
            "limits.max_nesting_depth cannot exceed limits.max_ast_depth"
        );
        anyhow::ensure!(self.limits.max_complexity > 0, "limits.max_complexity must be > 0");

        anyhow::ensure!(self.graph.max_nodes > 0, "graph.max_nodes must be > 0");
        anyhow::ensure!(self.graph.max_cycle_length >= 2, "graph.max_cycle_length must be >= 2");

        anyhow::ensure!(self.cache.memory_capacity > 0, "cache.memory_capacity must be > 0");
        anyhow::ensure!(
            self.cache.shards > 0 && self.cache.shards <= 1024,
            "cache.shards must be 1..=1024"
        );
        anyhow::ensure!(
            self.cache.external_ttl_secs > 0,
            "cache.external_ttl_secs must be > 0; external entries always expire"
        );

        anyhow::ensure!(self.workers.hard_cap > 0, "workers.hard_cap must be > 0");
        if let Some(w) = self.workers.workers {
            anyhow::ensure!(w > 0, "workers.workers must be > 0 when set");
        }
        Ok(())
    }
}

/// Layered loading of [`Settings`] from files and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    pub const ENV_PREFIX: &'static str = "ARCHGRAPH";

    /// Resolve the configuration directory.
    ///
    /// Priority order:
    /// 1. ~/.archgraph/
    /// 2. ./config/
    /// 3. Current directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".archgraph");
            if user_dir.exists() {
                info!("Using config directory: {:?}", user_dir);
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("Using config directory: {:?}", project_config);
            return project_config;
        }

        info!("Using config directory: {:?}", cwd);
        cwd
    }

    pub fn default_env() -> String {
        env::var("ARCHGRAPH_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// `default.toml`, then `{env}.toml`, then `local.toml`, then
    /// `ARCHGRAPH__SECTION__KEY` variables; later sources win.
    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let settings: Settings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Settings> {
        Self::load_from_sources(&Self::default_config_dir(), &Self::default_env())
    }

    /// JSON schema of the settings document, for editor tooling.
    pub fn schema_json() -> Result<String> {
        let schema = schemars::schema_for!(Settings);
        serde_json::to_string_pretty(&schema).context("serializing settings schema")
    }
}
