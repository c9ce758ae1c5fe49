use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration, constructed once at startup and passed into
/// component constructors. Nothing here is read from ambient process state
/// after load.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub blobs: BlobConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    /// Directory the filesystem blob store writes source bytes under.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding provider, e.g. `http://localhost:11434`.
    pub base_url: String,
    pub model: String,
    /// Expected vector dimensionality; every response is checked against it.
    pub dims: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts; the actual sleep grows linearly with the
    /// attempt number (delay, 2×delay, …) to keep total latency bounded.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_timeout_secs() -> u64 {
    60
}

impl EmbeddingConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Window/overlap used for long-form (website) text. Row- and page-oriented
/// formats chunk on their natural boundaries and ignore these.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_window_chars() -> usize {
    4000
}
fn default_overlap_chars() -> usize {
    400
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_min_score")]
    pub default_min_score: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Character budget for the assembled prompt context.
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_min_score: default_min_score(),
            default_limit: default_limit(),
            context_budget_chars: default_context_budget(),
        }
    }
}

fn default_min_score() -> f64 {
    0.5
}
fn default_limit() -> usize {
    5
}
fn default_context_budget() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum simultaneously running pipeline runs, sized to the embedding
    /// provider's rate limits.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.max_attempts == 0 {
        anyhow::bail!("embedding.max_attempts must be >= 1");
    }
    if config.embedding.base_url.is_empty() {
        anyhow::bail!("embedding.base_url must be set");
    }
    if config.embedding.model.is_empty() {
        anyhow::bail!("embedding.model must be set");
    }

    if config.chunking.window_chars == 0 {
        anyhow::bail!("chunking.window_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.window_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.window_chars");
    }

    if !(0.0..=1.0).contains(&config.retrieval.default_min_score) {
        anyhow::bail!("retrieval.default_min_score must be in [0.0, 1.0]");
    }
    if config.retrieval.default_limit == 0 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }
    if config.retrieval.context_budget_chars == 0 {
        anyhow::bail!("retrieval.context_budget_chars must be > 0");
    }

    if config.pipeline.workers == 0 {
        anyhow::bail!("pipeline.workers must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ragbase.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    const MINIMAL: &str = r#"
[db]
path = "/tmp/ragbase.sqlite"

[blobs]
dir = "/tmp/ragbase-blobs"

[embedding]
base_url = "http://localhost:11434"
model = "bge-m3"
dims = 1024
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let (_tmp, path) = write_config(MINIMAL);
        let config = load_config(&path).unwrap();
        assert_eq!(config.embedding.max_attempts, 3);
        assert_eq!(config.embedding.retry_delay_secs, 5);
        assert_eq!(config.embedding.timeout_secs, 60);
        assert_eq!(config.chunking.window_chars, 4000);
        assert_eq!(config.chunking.overlap_chars, 400);
        assert!((config.retrieval.default_min_score - 0.5).abs() < 1e-12);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn zero_dims_rejected() {
        let (_tmp, path) = write_config(&MINIMAL.replace("dims = 1024", "dims = 0"));
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn overlap_must_be_below_window() {
        let content = format!(
            "{MINIMAL}\n[chunking]\nwindow_chars = 100\noverlap_chars = 100\n"
        );
        let (_tmp, path) = write_config(&content);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn min_score_out_of_range_rejected() {
        let content = format!("{MINIMAL}\n[retrieval]\ndefault_min_score = 1.5\n");
        let (_tmp, path) = write_config(&content);
        assert!(load_config(&path).is_err());
    }
}
