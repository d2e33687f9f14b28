//! TOML configuration parsing and validation.
//!
//! Every section has defaults, so an empty file yields a working
//! configuration pointed at the OpenAI API. Secrets are never read from the
//! file: the API key comes from the environment variable named by
//! `api_key_env`, which the binary may populate from a `.env` file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classifier::GreetingTable;
use crate::error::{RagError, RagResult};
use crate::prompts::ResponseStyle;

/// Value shipped in `.env.example`; treated the same as an unset key.
const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: GreetingTable,
    #[serde(default)]
    pub style: ResponseStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            index: IndexConfig::default(),
            documents: DocumentsConfig::default(),
            server: ServerConfig::default(),
            classifier: GreetingTable::default(),
            style: ResponseStyle::default(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"ollama"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Service base URL. Defaults per provider when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum texts per HTTP request; larger batches are split.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Caller-side retries around the gateway. `0` disables retrying.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_batch_size() -> usize {
    256
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> &str {
        match (self.url.as_deref(), self.provider.as_str()) {
            (Some(url), _) => url,
            (None, "ollama") => "http://localhost:11434",
            (None, _) => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_generation_url")]
    pub base_url: String,
    /// Lower is more deterministic.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_generation_url(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_generation_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Passages retrieved per question (doubled once on an empty result).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Hits farther than this squared L2 distance are discarded.
    #[serde(default)]
    pub max_distance: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: None,
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Base path; the index is stored as `<path>.vectors` and
    /// `<path>.passages.json`.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// PDF or plain-text files making up the corpus.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Maximum passage length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}

impl DocumentsConfig {
    /// True when at least one configured document is present on disk.
    pub fn any_exist(&self) -> bool {
        self.paths.iter().any(|p| p.exists())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Config {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.documents.chunk_size == 0 {
            anyhow::bail!("documents.chunk_size must be > 0");
        }
        if self.documents.chunk_overlap >= self.documents.chunk_size {
            anyhow::bail!("documents.chunk_overlap must be < documents.chunk_size");
        }

        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if let Some(d) = self.retrieval.max_distance {
            if d.is_nan() || d < 0.0 {
                anyhow::bail!("retrieval.max_distance must be >= 0");
            }
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
        }

        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        match self.embedding.provider.as_str() {
            "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be openai or ollama.",
                other
            ),
        }

        self.classifier
            .validate()
            .map_err(|e| anyhow::anyhow!("classifier: {}", e))?;

        Ok(())
    }

    /// The API key from the environment, if set to a real value.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
    }

    /// Like [`api_key`](Self::api_key), but a missing key is a
    /// configuration error.
    pub fn require_api_key(&self) -> RagResult<String> {
        self.api_key().ok_or_else(|| {
            RagError::Configuration(format!(
                "{} not found in environment variables or .env file",
                self.api_key_env
            ))
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.documents.chunk_size, 800);
        assert_eq!(config.documents.chunk_overlap, 100);
        assert_eq!(config.index.path, PathBuf::from("data/index"));
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert!((config.generation.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sections_override_defaults() {
        let toml = r#"
[embedding]
provider = "ollama"
model = "nomic-embed-text"

[retrieval]
top_k = 6
max_distance = 1.25

[index]
path = "/tmp/idx"
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.base_url(), "http://localhost:11434");
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.retrieval.max_distance, Some(1.25));
        assert_eq!(config.index.path, PathBuf::from("/tmp/idx"));
    }

    #[test]
    fn test_openai_default_base_url() {
        let config = Config::default();
        assert_eq!(config.embedding.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = Config::from_toml_str("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_chunk() {
        let toml = "[documents]\nchunk_size = 100\nchunk_overlap = 100\n";
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_zero_top_k() {
        assert!(Config::from_toml_str("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        assert!(Config::from_toml_str("[generation]\ntemperature = 3.5\n").is_err());
    }

    #[test]
    fn test_placeholder_key_counts_as_missing() {
        let config = Config {
            api_key_env: "DOCRAG_TEST_PLACEHOLDER_KEY".to_string(),
            ..Config::default()
        };
        std::env::set_var("DOCRAG_TEST_PLACEHOLDER_KEY", PLACEHOLDER_API_KEY);
        assert!(config.api_key().is_none());
        assert!(matches!(
            config.require_api_key(),
            Err(RagError::Configuration(_))
        ));

        std::env::set_var("DOCRAG_TEST_PLACEHOLDER_KEY", "sk-real");
        assert_eq!(config.api_key().as_deref(), Some("sk-real"));
        std::env::remove_var("DOCRAG_TEST_PLACEHOLDER_KEY");
    }
}
