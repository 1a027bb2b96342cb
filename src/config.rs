//! Benchmark configuration.
//!
//! Loaded in layers: built-in defaults, then an optional `embedbench.{toml,yaml,json}`
//! file (or an explicit path), then `EMBEDBENCH__<SECTION>__<KEY>` environment
//! variables. The binary applies command-line overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dispatch::{LaunchSpec, PoolConfig, ReadinessConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use throughput::{DownScale, StatsError};

/// Errors raised while loading or validating [`BenchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error(transparent)]
    Scale(#[from] StatsError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Fraction of dataset records to embed, in `(0, 1]`.
    #[serde(default = "default_down_scale")]
    pub down_scale: f64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Character count of the full corpus. Scanned from the dataset when unset.
    #[serde(default)]
    pub corpus_chars: Option<u64>,

    /// JSON-lines dataset with one `{"text": ...}` object per line.
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,

    /// Run statistics are appended here, one JSON object per line.
    #[serde(default = "default_results_log")]
    pub results_log: PathBuf,

    /// Whole-dispatch retries on transient failures. 0 disables retrying.
    /// Only the successful attempt is timed.
    #[serde(default)]
    pub dispatch_retries: u32,

    /// Write chunks with their embeddings here after a successful run.
    #[serde(default)]
    pub publish: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            down_scale: default_down_scale(),
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            corpus_chars: None,
            dataset: default_dataset(),
            results_log: default_results_log(),
            dispatch_retries: 0,
            publish: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSection {
    #[serde(default = "default_n_gpu")]
    pub n_gpu: usize,

    /// In-flight batches per worker.
    #[serde(default = "default_allow_concurrent_inputs")]
    pub allow_concurrent_inputs: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            n_gpu: default_n_gpu(),
            allow_concurrent_inputs: default_allow_concurrent_inputs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Where workers come from and how their readiness is probed.
///
/// With `endpoints` set the pool attaches to already-running servers.
/// Otherwise it launches `n_gpu` copies of `program` on `base_port..`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub endpoints: Vec<String>,

    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Passed as `--max-client-batch-size`; defaults to `run.batch_size`.
    #[serde(default)]
    pub max_client_batch_size: Option<usize>,

    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default = "default_true")]
    pub inherit_output: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            program: default_program(),
            model_id: default_model_id(),
            host: default_host(),
            base_port: default_base_port(),
            max_client_batch_size: None,
            extra_args: Vec::new(),
            inherit_output: default_true(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            startup_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `dispatch=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl BenchConfig {
    /// Load defaults, then the config file, then environment overrides.
    ///
    /// `file` replaces the default optional `embedbench.*` lookup and must exist.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("embedbench").required(false),
        };
        let builder = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix("EMBEDBENCH")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("worker.endpoints")
                    .with_list_parse_key("worker.extra_args")
                    .try_parsing(true),
            );

        let config: BenchConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject settings that would fail later, before any dataset or worker work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.down_scale()?;
        if self.run.chunk_size == 0 {
            return Err(ConfigError::Invalid("run.chunk_size must be at least 1".into()));
        }
        if self.run.batch_size == 0 {
            return Err(ConfigError::Invalid("run.batch_size must be at least 1".into()));
        }
        if self.pool.n_gpu == 0 {
            return Err(ConfigError::Invalid("pool.n_gpu must be at least 1".into()));
        }
        if self.pool.allow_concurrent_inputs == 0 {
            return Err(ConfigError::Invalid(
                "pool.allow_concurrent_inputs must be at least 1".into(),
            ));
        }
        if self.worker.endpoints.len() > self.pool.n_gpu {
            return Err(ConfigError::Invalid(format!(
                "{} worker endpoints configured but pool.n_gpu is {}",
                self.worker.endpoints.len(),
                self.pool.n_gpu
            )));
        }
        if self.worker.endpoints.is_empty() && self.worker.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "either worker.endpoints or worker.program must be set".into(),
            ));
        }
        Ok(())
    }

    pub fn down_scale(&self) -> Result<DownScale, ConfigError> {
        Ok(DownScale::new(self.run.down_scale)?)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            n_gpu: self.pool.n_gpu,
            allow_concurrent_inputs: self.pool.allow_concurrent_inputs,
            readiness: ReadinessConfig::default()
                .with_poll_interval(Duration::from_millis(self.worker.poll_interval_ms))
                .with_connect_timeout(Duration::from_millis(self.worker.connect_timeout_ms))
                .with_startup_timeout(self.worker.startup_timeout_secs.map(Duration::from_secs)),
            request_timeout: Duration::from_secs(self.pool.request_timeout_secs),
        }
    }

    pub fn launch_spec(&self) -> LaunchSpec {
        let mut spec = LaunchSpec::new(
            self.worker.program.clone(),
            self.worker.model_id.clone(),
            self.worker
                .max_client_batch_size
                .unwrap_or(self.run.batch_size),
        );
        spec.extra_args = self.worker.extra_args.clone();
        spec.inherit_output = self.worker.inherit_output;
        spec
    }
}

fn default_down_scale() -> f64 {
    0.005
}

fn default_chunk_size() -> usize {
    corpus::DEFAULT_CHUNK_SIZE
}

fn default_batch_size() -> usize {
    corpus::DEFAULT_BATCH_SIZE
}

fn default_dataset() -> PathBuf {
    PathBuf::from("wikipedia.jsonl")
}

fn default_results_log() -> PathBuf {
    PathBuf::from("benchmarks.jsonl")
}

fn default_n_gpu() -> usize {
    dispatch::DEFAULT_N_GPU
}

fn default_allow_concurrent_inputs() -> usize {
    dispatch::DEFAULT_ALLOW_CONCURRENT_INPUTS
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_program() -> String {
    "text-embeddings-router".to_string()
}

fn default_model_id() -> String {
    "BAAI/bge-base-en-v1.5".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_base_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.run.chunk_size, 400);
        assert_eq!(cfg.run.batch_size, 128);
        assert_eq!(cfg.run.down_scale, 0.005);
        assert_eq!(cfg.run.dispatch_retries, 0);
        assert_eq!(cfg.run.results_log, PathBuf::from("benchmarks.jsonl"));
        assert_eq!(cfg.pool.n_gpu, 6);
        assert_eq!(cfg.pool.allow_concurrent_inputs, 100);
        assert_eq!(cfg.worker.base_port, 8000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_launch_spec_uses_batch_size() {
        let mut cfg = BenchConfig::default();
        cfg.run.batch_size = 64;
        let spec = cfg.launch_spec();
        assert_eq!(spec.max_client_batch_size, 64);
        assert_eq!(spec.model_id, "BAAI/bge-base-en-v1.5");

        cfg.worker.max_client_batch_size = Some(256);
        assert_eq!(cfg.launch_spec().max_client_batch_size, 256);
    }

    #[test]
    fn test_pool_config_mapping() {
        let mut cfg = BenchConfig::default();
        cfg.worker.poll_interval_ms = 250;
        cfg.worker.startup_timeout_secs = Some(30);
        let pool = cfg.pool_config();
        assert_eq!(pool.max_in_flight(), 600);
        assert_eq!(pool.readiness.poll_interval, Duration::from_millis(250));
        assert_eq!(pool.readiness.startup_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = BenchConfig::default();
        cfg.run.down_scale = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Scale(_))));

        let mut cfg = BenchConfig::default();
        cfg.run.down_scale = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Scale(_))));

        let mut cfg = BenchConfig::default();
        cfg.run.chunk_size = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = BenchConfig::default();
        cfg.pool.n_gpu = 1;
        cfg.worker.endpoints = vec!["http://a:1".into(), "http://b:1".into()];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(
            &path,
            r#"
[run]
down_scale = 0.25
corpus_chars = 1000000

[pool]
n_gpu = 2

[worker]
endpoints = ["http://127.0.0.1:9001", "http://127.0.0.1:9002"]
"#,
        )
        .unwrap();

        let cfg = BenchConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.run.down_scale, 0.25);
        assert_eq!(cfg.run.corpus_chars, Some(1_000_000));
        assert_eq!(cfg.run.chunk_size, 400);
        assert_eq!(cfg.pool.n_gpu, 2);
        assert_eq!(cfg.worker.endpoints.len(), 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = BenchConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
