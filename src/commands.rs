//! CLI command implementations for the `docrag` binary.
//!
//! Each `run_*` function prints human-readable output to stdout and returns
//! `anyhow::Result` so `main` can report failures uniformly.

use anyhow::{Context, Result};

use crate::classifier::{QueryClassifier, Script};
use crate::config::Config;
use crate::context::{open_index, AppContext};
use crate::embedding::create_embedder;
use crate::index::{artifact_paths, VectorIndex};

/// Build (or load) the index and report its size.
pub async fn run_index(config: &Config, rebuild: bool) -> Result<()> {
    let embedder = create_embedder(config)?;
    let index = open_index(config, embedder.as_ref(), rebuild)
        .await
        .context("failed to open index")?;

    println!(
        "Index ready: {} passages, {} dims ({})",
        index.len(),
        index.dims().unwrap_or(0),
        config.index.path.display()
    );
    Ok(())
}

/// Answer one question end to end.
pub async fn run_ask(config: Config, question: &str) -> Result<()> {
    let ctx = AppContext::initialize(config).await;
    let Some(pipeline) = ctx.pipeline() else {
        anyhow::bail!(
            "RAG system not ready: {}",
            ctx.init_error().unwrap_or("unknown error")
        );
    };

    let answer = pipeline.ask(question).await?;
    println!("{}", answer.text);
    Ok(())
}

/// Print the nearest passages for `query` with their distances.
pub async fn run_search(config: &Config, query: &str, k: usize) -> Result<()> {
    let embedder = create_embedder(config)?;
    let index = open_index(config, embedder.as_ref(), false)
        .await
        .context("failed to open index")?;

    let vector = embedder.embed_one(query).await?;
    let hits = index.search_scored(&vector, k)?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. [#{} distance {:.4}] {}",
            rank + 1,
            hit.position,
            hit.distance,
            preview(&hit.passage, 160)
        );
    }
    Ok(())
}

/// Print the routing decision for `text`. Never touches the network.
pub fn run_classify(config: &Config, text: &str) -> Result<()> {
    let classifier = QueryClassifier::new(&config.classifier);
    let kind = classifier.classify(text);
    println!("{} ({})", kind.as_str(), Script::detect(text).as_str());
    Ok(())
}

/// Summarize configuration and persisted index state. Never touches the
/// network.
pub fn run_status(config: &Config) -> Result<()> {
    let (vectors_path, passages_path) = artifact_paths(&config.index.path);

    println!("docrag status");
    println!("=============");
    println!();
    println!("  Index:       {}", config.index.path.display());

    let mut index = VectorIndex::new();
    match index.load(&config.index.path) {
        Ok(true) => {
            println!("  Passages:    {}", index.len());
            println!("  Dimensions:  {}", index.dims().unwrap_or(0));
        }
        Ok(false) => {
            println!("  Passages:    not built");
            println!(
                "               (expected {} and {})",
                vectors_path.display(),
                passages_path.display()
            );
        }
        Err(e) => println!("  Passages:    unreadable ({})", e),
    }

    println!();
    println!("  Embedding:   {} / {}", config.embedding.provider, config.embedding.model);
    println!("  Generation:  {}", config.generation.model);
    println!(
        "  API key:     {} ({})",
        if config.api_key().is_some() { "configured" } else { "missing" },
        config.api_key_env
    );

    println!();
    println!("  Documents:");
    if config.documents.paths.is_empty() {
        println!("    (none configured)");
    }
    for path in &config.documents.paths {
        let state = if path.exists() { "ok" } else { "missing" };
        println!("    {:<8} {}", state, path.display());
    }
    println!();
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
