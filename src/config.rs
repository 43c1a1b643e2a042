use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on per-root worker threads.
pub const MAX_WORKERS_LIMIT: usize = 256;

/// Indexer configuration.
///
/// Resolved from a TOML file, then overridden by `CXX_INDEX_*` environment
/// variables, see [`IndexConfig::load`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Worker threads per root. 0 means one per CPU.
    pub max_workers: usize,

    /// How often a cancelled root is re-checked while draining.
    pub drain_poll_interval_ms: u64,

    /// Upper bound on waiting for a cancelled root to drain.
    pub drain_timeout_ms: u64,

    /// Files above this size are reported as failed instead of parsed.
    pub max_file_size_bytes: u64,

    /// Follow quoted `#include` directives into project headers.
    pub expand_includes: bool,

    pub max_include_depth: usize,

    /// Extra directories searched for quoted includes.
    pub include_dirs: Vec<PathBuf>,

    /// Glob patterns excluded from workspace discovery.
    pub exclude_patterns: Vec<String>,

    pub respect_gitignore: bool,

    /// Stack size of each worker thread. 0 keeps the thread library default.
    pub worker_stack_size_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            drain_poll_interval_ms: 100,
            drain_timeout_ms: 30_000,
            max_file_size_bytes: 10 * 1024 * 1024,
            expand_includes: true,
            max_include_depth: 16,
            include_dirs: Vec::new(),
            exclude_patterns: vec![
                "**/.git/**".to_string(),
                "**/build/**".to_string(),
                "**/cmake-build-*/**".to_string(),
                "**/CMakeFiles/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
            respect_gitignore: true,
            worker_stack_size_bytes: 0,
        }
    }
}

impl IndexConfig {
    /// Configuration from process environment variables on top of defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Configuration from an arbitrary variable source on top of defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CXX_INDEX_WORKERS") {
            config.max_workers = value
                .trim()
                .parse()
                .context("Invalid value for CXX_INDEX_WORKERS")?;
        }

        if let Some(value) = lookup("CXX_INDEX_DRAIN_POLL_MS") {
            config.drain_poll_interval_ms = value
                .trim()
                .parse()
                .context("Invalid value for CXX_INDEX_DRAIN_POLL_MS")?;
        }

        if let Some(value) = lookup("CXX_INDEX_DRAIN_TIMEOUT_MS") {
            config.drain_timeout_ms = value
                .trim()
                .parse()
                .context("Invalid value for CXX_INDEX_DRAIN_TIMEOUT_MS")?;
        }

        if let Some(value) = lookup("CXX_INDEX_FILE_SIZE_MB") {
            config.max_file_size_bytes = parse_megabytes(&value, "CXX_INDEX_FILE_SIZE_MB")?;
        }

        if let Some(value) = lookup("CXX_INDEX_WORKER_STACK_MB") {
            let bytes = parse_megabytes(&value, "CXX_INDEX_WORKER_STACK_MB")?;
            config.worker_stack_size_bytes = usize::try_from(bytes)
                .map_err(|_| anyhow!("CXX_INDEX_WORKER_STACK_MB is too large: {}", value))?;
        }

        if let Some(value) = lookup("CXX_INDEX_EXPAND_INCLUDES") {
            config.expand_includes = parse_bool_env(&value, "CXX_INDEX_EXPAND_INCLUDES")?;
        }

        if let Some(value) = lookup("CXX_INDEX_INCLUDE_DEPTH") {
            config.max_include_depth = value
                .trim()
                .parse()
                .context("Invalid value for CXX_INDEX_INCLUDE_DEPTH")?;
        }

        if let Some(value) = lookup("CXX_INDEX_INCLUDE_DIRS") {
            config.include_dirs = split_list(&value).map(PathBuf::from).collect();
        }

        if let Some(value) = lookup("CXX_INDEX_EXCLUDE") {
            config.exclude_patterns = split_list(&value).map(str::to_string).collect();
        }

        if let Some(value) = lookup("CXX_INDEX_GITIGNORE") {
            config.respect_gitignore = parse_bool_env(&value, "CXX_INDEX_GITIGNORE")?;
        }

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Self =
            toml::from_str(&content).context("Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with priority: env -> file -> defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let config_paths = [
            std::env::var("CXX_INDEX_CONFIG").ok().map(PathBuf::from),
            dirs::config_dir().map(|d| d.join("cxx-index").join("config.toml")),
            Some(PathBuf::from("cxx-index.toml")),
        ];

        for config_path in config_paths.into_iter().flatten() {
            if config_path.exists() {
                info!("Loading index configuration from {:?}", config_path);
                config = Self::from_file(&config_path)
                    .with_context(|| format!("Failed to load config from {config_path:?}"))?;
                break;
            }
        }

        let env_config = Self::from_env()?;
        config.merge_with(env_config);

        config.validate()?;
        Ok(config)
    }

    /// Take every field of `other` that differs from the default.
    pub fn merge_with(&mut self, other: Self) {
        let defaults = Self::default();

        macro_rules! merge_field {
            ($field:ident) => {
                if other.$field != defaults.$field {
                    self.$field = other.$field;
                }
            };
        }

        merge_field!(max_workers);
        merge_field!(drain_poll_interval_ms);
        merge_field!(drain_timeout_ms);
        merge_field!(max_file_size_bytes);
        merge_field!(expand_includes);
        merge_field!(max_include_depth);
        merge_field!(include_dirs);
        merge_field!(exclude_patterns);
        merge_field!(respect_gitignore);
        merge_field!(worker_stack_size_bytes);
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(anyhow!(
                "max_workers must not exceed {}",
                MAX_WORKERS_LIMIT
            ));
        }

        if self.drain_poll_interval_ms == 0 {
            return Err(anyhow!("drain_poll_interval_ms must be greater than 0"));
        }

        if self.drain_timeout_ms < self.drain_poll_interval_ms {
            return Err(anyhow!(
                "drain_timeout_ms ({}) must be at least drain_poll_interval_ms ({})",
                self.drain_timeout_ms,
                self.drain_poll_interval_ms
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow!("max_file_size_bytes must be greater than 0"));
        }

        if self.expand_includes && self.max_include_depth == 0 {
            warn!("max_include_depth is 0, quoted includes will not be followed");
        }

        for pattern in &self.exclude_patterns {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid exclude pattern: {pattern}"))?;
        }

        Ok(())
    }

    /// Worker threads per root with 0 resolved to the CPU count.
    pub fn effective_workers(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_workers
        }
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Parse a size given in MiB into bytes.
fn parse_megabytes(value: &str, var_name: &str) -> Result<u64> {
    let megabytes: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {var_name}"))?;
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow!("{} is too large: {} MiB", var_name, megabytes))
}

/// Parse boolean from environment variable string
fn parse_bool_env(value: &str, var_name: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "Invalid boolean value for {}: {} (use true/false, 1/0, yes/no, on/off)",
            var_name,
            value
        )),
    }
}
