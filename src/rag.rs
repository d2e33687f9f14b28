//! Retrieval-augmented answer generation.
//!
//! [`RagPipeline::ask`] runs one question through a small state machine:
//!
//! ```text
//!            ┌──────────┐ empty  ┌──────────────────┐
//!  question ─▶ CLASSIFY ├───────▶│ "please ask ..."  │
//!            └────┬─────┘        └──────────────────┘
//!        greeting │ content
//!        ┌────────┴─────────┐
//!        ▼                  ▼
//!  ┌───────────┐     ┌────────────┐ no context ┌───────────┐
//!  │ GREETING  │     │  RETRIEVE  ├───────────▶│ NOT FOUND │
//!  │  (1 call) │     │ k, then 2k │            └───────────┘
//!  └───────────┘     └─────┬──────┘
//!                          ▼
//!                   ┌──────────────┐
//!                   │ GENERATE +   │
//!                   │ clean prefix │
//!                   └──────────────┘
//! ```
//!
//! Gateway and index errors propagate to the caller untouched; an empty
//! retrieval is the only condition handled locally (one widened retry,
//! then the canned not-found reply in the question's script).

use serde::Serialize;
use std::sync::Arc;

use crate::classifier::{QueryClassifier, QueryKind, Script};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::RagResult;
use crate::generation::ChatModel;
use crate::index::{SearchHit, VectorIndex};
use crate::postprocess::clean_answer;
use crate::prompts::ResponseStyle;

/// Where an answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerKind {
    /// Blank question; canned reply, no remote calls.
    EmptyQuestion,
    /// Generated greeting reply; no retrieval.
    Greeting,
    /// Generated from `passages` retrieved passages.
    Grounded { passages: usize },
    /// Retrieval produced no context; canned reply, no generation.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
}

/// Passages found for one question.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Nearest first, after the distance filter.
    pub hits: Vec<SearchHit>,
    /// Width of the last search pass: `top_k`, or `2 × top_k` when widened.
    pub k: usize,
}

/// Retrieval and sampling knobs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub max_distance: Option<f32>,
    pub temperature: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_distance: None,
            temperature: 0.2,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_distance: config.retrieval.max_distance,
            temperature: config.generation.temperature,
        }
    }
}

/// The question-answering pipeline. Cheap to share behind an `Arc`; every
/// method takes `&self`.
pub struct RagPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    classifier: QueryClassifier,
    style: ResponseStyle,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            index,
            embedder,
            chat,
            classifier: QueryClassifier::default(),
            style: ResponseStyle::default(),
            options: PipelineOptions::default(),
        }
    }

    /// A pipeline using the classifier table, style, and options from
    /// `config`.
    pub fn from_config(
        config: &Config,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self::new(index, embedder, chat)
            .with_classifier(QueryClassifier::new(&config.classifier))
            .with_style(config.style.clone())
            .with_options(PipelineOptions::from_config(config))
    }

    pub fn with_classifier(mut self, classifier: QueryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_style(mut self, style: ResponseStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answer one question.
    pub async fn ask(&self, question: &str) -> RagResult<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(Answer {
                text: self.style.empty_question.clone(),
                kind: AnswerKind::EmptyQuestion,
            });
        }

        if self.classifier.classify(question) == QueryKind::Greeting {
            tracing::debug!("question classified as greeting");
            let reply = self
                .chat
                .complete(&self.style.greeting_messages(question), self.options.temperature)
                .await?;
            return Ok(Answer {
                text: reply.trim().to_string(),
                kind: AnswerKind::Greeting,
            });
        }

        let hits = self.retrieve(question).await?.hits;
        let context = assemble_context(&hits);

        if context.trim().is_empty() {
            let script = Script::detect(question);
            tracing::info!(?script, "no supporting context retrieved");
            return Ok(Answer {
                text: self.style.not_found(script).to_string(),
                kind: AnswerKind::NotFound,
            });
        }

        let messages = self.style.grounded_messages(&context, question);
        let raw = self.chat.complete(&messages, self.options.temperature).await?;

        Ok(Answer {
            text: clean_answer(&raw, &self.style.filler_prefixes),
            kind: AnswerKind::Grounded {
                passages: hits.len(),
            },
        })
    }

    /// Embed the question and fetch its nearest passages, widening once to
    /// `2 × top_k` when the first pass comes back empty.
    ///
    /// Without `max_distance` the first pass is never empty for a built
    /// index. With it, the wider pass only adds hits farther than the ones
    /// already rejected, so it cannot recover any; it still runs, and
    /// [`Retrieval::k`] records the width of the last pass.
    pub async fn retrieve(&self, question: &str) -> RagResult<Retrieval> {
        let query = self.embedder.embed_one(question).await?;
        let k = self.options.top_k;

        let hits = self.search(&query, k)?;
        if !hits.is_empty() {
            return Ok(Retrieval { hits, k });
        }

        let k = k.saturating_mul(2);
        tracing::debug!(k, "empty retrieval, widening search");
        let hits = self.search(&query, k)?;
        Ok(Retrieval { hits, k })
    }

    fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<SearchHit>> {
        let mut hits = self.index.search_scored(query, k)?;
        if let Some(max) = self.options.max_distance {
            hits.retain(|hit| hit.distance <= max);
        }
        Ok(hits)
    }
}

/// Passages nearest-first, separated by a blank line.
fn assemble_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.passage.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(position: usize, passage: &str) -> SearchHit {
        SearchHit {
            position,
            distance: position as f32,
            passage: passage.to_string(),
        }
    }

    #[test]
    fn test_context_joins_with_blank_line() {
        let hits = vec![hit(0, "first"), hit(1, "second")];
        assert_eq!(assemble_context(&hits), "first\n\nsecond");
        assert_eq!(assemble_context(&[]), "");
    }

    #[test]
    fn test_answer_kind_serialization() {
        let json = serde_json::to_value(AnswerKind::Grounded { passages: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "grounded", "passages": 3 }));
        let json = serde_json::to_value(AnswerKind::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "not_found" }));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::from_toml_str(
            "[retrieval]\ntop_k = 7\nmax_distance = 0.5\n[generation]\ntemperature = 0.0\n",
        )
        .unwrap();
        let options = PipelineOptions::from_config(&config);
        assert_eq!(options.top_k, 7);
        assert_eq!(options.max_distance, Some(0.5));
        assert_eq!(options.temperature, 0.0);
    }
}
