use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the reference document catalogue (XML files)
    pub catalogue_dir: PathBuf,

    /// Directory where grafted output documents are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extraction tool config
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Matching and alignment config
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Optional embedding service config
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,

    /// Optional path to the translator-maintained custom term list
    #[serde(default)]
    pub terms_file: Option<PathBuf>,

    /// Max translation documents processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Configuration for the external extraction tool
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractionConfig {
    // @field: Tool executable name or path
    #[serde(default = "default_extraction_command")]
    pub command: String,

    // @field: Extra arguments passed before the input path
    #[serde(default)]
    pub args: Vec<String>,

    // @field: Directory for cached extraction output
    #[serde(default = "default_extraction_cache_dir")]
    pub cache_dir: PathBuf,

    // @field: Timeout seconds for a single tool invocation
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            command: default_extraction_command(),
            args: Vec::new(),
            cache_dir: default_extraction_cache_dir(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

/// Thresholds and window parameters for matching and alignment
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchingConfig {
    /// Hard floor below which a document is persisted as unmatched
    #[serde(default = "default_match_floor")]
    pub match_floor: f64,

    /// Minimum score for a pass-1 alignment
    #[serde(default = "default_pass1_threshold")]
    pub pass1_threshold: f64,

    /// Relaxed minimum score for the gap-filling pass
    #[serde(default = "default_pass2_threshold")]
    pub pass2_threshold: f64,

    /// Forward window of candidate units searched past the cursor
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Consecutive failures before the stalest window unit is quarantined
    #[serde(default = "default_quarantine_limit")]
    pub quarantine_limit: usize,

    /// Score bonus for order-consistent neighbors in pass 2
    #[serde(default = "default_neighbor_bonus")]
    pub neighbor_bonus: f64,

    /// Damping applied to title evidence at document granularity
    #[serde(default = "default_title_damping")]
    pub title_damping: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            match_floor: default_match_floor(),
            pass1_threshold: default_pass1_threshold(),
            pass2_threshold: default_pass2_threshold(),
            window_size: default_window_size(),
            quarantine_limit: default_quarantine_limit(),
            neighbor_bonus: default_neighbor_bonus(),
            title_damping: default_title_damping(),
        }
    }
}

/// Embedding service configuration (optional collaborator)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmbeddingConfig {
    // @field: Provider type identifier
    #[serde(rename = "type", default = "default_embedding_provider")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    // @field: Service URL
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

/// Log level configuration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to the log crate's level filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_extraction_command() -> String {
    "marker_single".to_string()
}

fn default_extraction_cache_dir() -> PathBuf {
    PathBuf::from("extraction_cache")
}

fn default_extraction_timeout_secs() -> u64 {
    600
}

fn default_match_floor() -> f64 {
    0.15
}

fn default_pass1_threshold() -> f64 {
    0.40
}

fn default_pass2_threshold() -> f64 {
    0.25
}

fn default_window_size() -> usize {
    5
}

fn default_quarantine_limit() -> usize {
    3
}

fn default_neighbor_bonus() -> f64 {
    0.15
}

fn default_title_damping() -> f64 {
    0.85
}

fn default_concurrency() -> usize {
    4
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalogue_dir: PathBuf::from("catalogue"),
            output_dir: default_output_dir(),
            extraction: ExtractionConfig::default(),
            matching: MatchingConfig::default(),
            embedding: None,
            terms_file: None,
            concurrency: default_concurrency(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))
    }

    /// Validate threshold ordering and ranges
    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;

        for (name, value) in [
            ("match_floor", m.match_floor),
            ("pass1_threshold", m.pass1_threshold),
            ("pass2_threshold", m.pass2_threshold),
            ("neighbor_bonus", m.neighbor_bonus),
            ("title_damping", m.title_damping),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }

        if m.pass2_threshold > m.pass1_threshold {
            return Err(anyhow!(
                "pass2_threshold ({}) must not exceed pass1_threshold ({})",
                m.pass2_threshold,
                m.pass1_threshold
            ));
        }

        if m.window_size == 0 {
            return Err(anyhow!("window_size must be at least 1"));
        }

        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }

        Ok(())
    }
}
