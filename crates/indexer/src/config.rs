use crate::builtin::builtin_pattern_sets;
use crate::error::{IndexerError, Result};
use crate::registry::{PatternRegistry, PatternSet};
use crate::scanner::ScanOptions;
use review_code_chunker::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scan and delivery settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Extensions the scanner picks up, without the dot
    pub extensions: Vec<String>,

    /// Records per sink call
    pub batch_size: usize,

    /// Pause between sink calls, for rate-limited stores
    pub batch_pause_ms: u64,

    /// Files read and chunked at once
    pub concurrency: usize,

    pub max_file_size_bytes: u64,

    pub respect_gitignore: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        let scan = ScanOptions::default();
        Self {
            extensions: scan.extensions,
            batch_size: 50,
            batch_pause_ms: 0,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .clamp(2, 8),
            max_file_size_bytes: scan.max_file_size_bytes,
            respect_gitignore: scan.respect_gitignore,
        }
    }
}

impl RunConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size_bytes: self.max_file_size_bytes,
            respect_gitignore: self.respect_gitignore,
        }
    }
}

/// Everything a run needs, as loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunker: ChunkerConfig,
    pub run: RunConfig,
    /// Register the compiled-in framework sets after any custom ones
    pub use_builtin_patterns: bool,
    pub pattern_sets: Vec<PatternSet>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            run: RunConfig::default(),
            use_builtin_patterns: true,
            pattern_sets: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| IndexerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)
            .map_err(|e| IndexerError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker.validate().map_err(IndexerError::Config)?;
        if self.run.batch_size == 0 {
            return Err(IndexerError::Config("run.batch_size must be > 0".into()));
        }
        if self.run.concurrency == 0 {
            return Err(IndexerError::Config("run.concurrency must be > 0".into()));
        }
        if self.run.extensions.is_empty() {
            return Err(IndexerError::Config("run.extensions must not be empty".into()));
        }
        Ok(())
    }

    /// Custom sets in file order, then the built-ins when enabled
    pub fn build_registry(&self) -> Result<PatternRegistry> {
        let mut registry = PatternRegistry::new();
        for set in &self.pattern_sets {
            registry.register_set(set.clone())?;
        }
        if self.use_builtin_patterns {
            for set in builtin_pattern_sets()? {
                registry.register_set(set)?;
            }
        }
        Ok(registry)
    }
}
