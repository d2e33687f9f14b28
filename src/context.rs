//! Application startup and readiness.
//!
//! [`AppContext::initialize`] is the single place where gateways are
//! created and the index is loaded or built. It never fails: any startup
//! error leaves the context *degraded*, carrying the reason, so the HTTP
//! server can still answer `/health` and report why `/ask` is unavailable.

use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{RagError, RagResult};
use crate::generation::create_chat_model;
use crate::index::VectorIndex;
use crate::loader::load_passages;
use crate::rag::RagPipeline;

/// Load the persisted index at `index.path`, or build it from the configured
/// documents and persist it.
///
/// With `rebuild` set the persisted artifacts are ignored and overwritten.
pub async fn open_index(
    config: &Config,
    embedder: &dyn Embedder,
    rebuild: bool,
) -> RagResult<VectorIndex> {
    let prefix = &config.index.path;
    let mut index = VectorIndex::new();

    if !rebuild && index.load(prefix)? {
        return Ok(index);
    }

    if !config.documents.any_exist() {
        return Err(RagError::Configuration(format!(
            "no index at {} and none of the configured documents exist: {:?}",
            prefix.display(),
            config.documents.paths
        )));
    }

    tracing::info!(prefix = %prefix.display(), rebuild, "building index from documents");
    let passages = load_passages(&config.documents)?;
    index.build(embedder, passages).await?;
    index.save(prefix)?;
    Ok(index)
}

/// Snapshot reported by `GET /health` and `docrag status`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `"healthy"` or `"degraded"`.
    pub status: &'static str,
    pub index_loaded: bool,
    pub passages_count: usize,
    pub dims: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_error: Option<String>,
    pub api_key_configured: bool,
    pub documents_available: bool,
}

/// Process-wide state, built once at startup and shared behind an `Arc`.
pub struct AppContext {
    config: Arc<Config>,
    pipeline: Option<Arc<RagPipeline>>,
    init_error: Option<String>,
}

impl AppContext {
    /// Create the gateways and open the index. Failures are logged and turn
    /// into a degraded context.
    pub async fn initialize(config: Config) -> Self {
        match Self::build_pipeline(&config).await {
            Ok(pipeline) => {
                tracing::info!(passages = pipeline.index().len(), "system ready");
                Self::ready(config, pipeline)
            }
            Err(e) => {
                tracing::error!(error = %e, "initialization failed, running degraded");
                Self::degraded(config, e.to_string())
            }
        }
    }

    async fn build_pipeline(config: &Config) -> RagResult<RagPipeline> {
        let embedder = create_embedder(config)?;
        let chat = create_chat_model(config)?;
        let index = open_index(config, embedder.as_ref(), false).await?;
        Ok(RagPipeline::from_config(
            config,
            Arc::new(index),
            embedder,
            chat,
        ))
    }

    pub fn ready(config: Config, pipeline: RagPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Some(Arc::new(pipeline)),
            init_error: None,
        }
    }

    pub fn degraded(config: Config, reason: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: None,
            init_error: Some(reason.into()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> Option<&Arc<RagPipeline>> {
        self.pipeline.as_ref()
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn health(&self) -> HealthReport {
        let index = self.pipeline.as_ref().map(|p| p.index());
        HealthReport {
            status: if self.is_ready() { "healthy" } else { "degraded" },
            index_loaded: index.is_some_and(|i| i.is_built()),
            passages_count: index.map_or(0, |i| i.len()),
            dims: index.and_then(|i| i.dims()),
            init_error: self.init_error.clone(),
            api_key_configured: self.config.api_key().is_some(),
            documents_available: self.config.documents.any_exist(),
        }
    }
}
