//! Deterministic in-process gateways shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use doc_rag::embedding::Embedder;
use doc_rag::error::{RagError, RagResult};
use doc_rag::generation::{ChatMessage, ChatModel};
use doc_rag::index::VectorIndex;
use doc_rag::rag::{PipelineOptions, RagPipeline};

pub const CORPUS: [&str; 3] = [
    "Revenue grew 5%.",
    "Headquarters is in City X.",
    "Founded in 2010.",
];

const VOCAB: [&str; 8] = [
    "revenue",
    "grew",
    "headquarters",
    "city",
    "founded",
    "2010",
    "weather",
    "today",
];

/// Bag-of-words embedder over a fixed vocabulary, L2-normalized.
///
/// Texts sharing no vocabulary word embed to the zero vector.
#[derive(Default)]
pub struct VocabEmbedder {
    pub calls: AtomicUsize,
}

impl VocabEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vectorize(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut v: Vec<f32> = VOCAB
            .iter()
            .map(|word| tokens.iter().filter(|t| *t == word).count() as f32)
            .collect();

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

/// Embedder whose every call fails with a transient gateway error.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn embed_batch(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Err(RagError::transient("embedding service unavailable"))
    }
}

/// Chat model returning a fixed reply and recording what it was sent.
pub struct ScriptedChat {
    reply: String,
    calls: AtomicUsize,
    last: Mutex<Vec<ChatMessage>>,
}

impl ScriptedChat {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> RagResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = messages.to_vec();
        Ok(self.reply.clone())
    }
}

pub fn corpus() -> Vec<String> {
    CORPUS.iter().map(|s| s.to_string()).collect()
}

pub async fn built_index(embedder: &VocabEmbedder, passages: Vec<String>) -> Arc<VectorIndex> {
    let mut index = VectorIndex::new();
    index.build(embedder, passages).await.unwrap();
    Arc::new(index)
}

/// A pipeline over [`CORPUS`] whose relevance cut-off rejects any passage
/// sharing no vocabulary with the query.
pub async fn corpus_pipeline(
    top_k: usize,
    reply: &str,
) -> (RagPipeline, Arc<VocabEmbedder>, Arc<ScriptedChat>) {
    let embedder = VocabEmbedder::new();
    let chat = ScriptedChat::new(reply);
    let index = built_index(&embedder, corpus()).await;
    embedder.calls.store(0, Ordering::SeqCst);

    let pipeline = RagPipeline::new(index, embedder.clone(), chat.clone()).with_options(
        PipelineOptions {
            top_k,
            max_distance: Some(0.9),
            temperature: 0.2,
        },
    );
    (pipeline, embedder, chat)
}
