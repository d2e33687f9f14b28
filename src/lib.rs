//! # doc-rag
//!
//! Grounded question answering over a fixed set of PDF and text documents,
//! in English and Arabic.
//!
//! Documents are split into passages, embedded through a remote embedding
//! service, and stored in an exact L2 vector index persisted to disk. Each
//! question is routed by a rule-based classifier: greetings get a short
//! generated reply, content questions get the nearest passages as context
//! for a grounded, temperature-controlled generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌──────────────┐
//! │ Documents │──▶│   Loader   │──▶│ VectorIndex  │──▶ <prefix>.vectors
//! │ PDF / txt │   │ split+embed│   │  exact L2    │    <prefix>.passages.json
//! └───────────┘   └────────────┘   └──────┬───────┘
//!                                         │
//!            question ──▶ Classifier ──▶ RagPipeline ──▶ ChatModel
//!                                         │
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │ (docrag) │       │  (axum)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! docrag index                         # build data/index.* from the documents
//! docrag ask "When was it founded?"
//! docrag serve                         # HTTP API on 0.0.0.0:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`embedding`] | Embedding gateway and vector utilities |
//! | [`generation`] | Chat completion gateway |
//! | [`index`] | Exact vector index with persistence |
//! | [`loader`] | Document extraction and passage splitting |
//! | [`classifier`] | Greeting detection and script detection |
//! | [`prompts`] | Prompt templates and canned replies |
//! | [`postprocess`] | Answer clean-up |
//! | [`rag`] | Question-answering pipeline |
//! | [`context`] | Startup, readiness, and health |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod classifier;
pub mod commands;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod postprocess;
pub mod prompts;
pub mod rag;
pub mod server;
