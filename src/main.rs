//! # docrag CLI
//!
//! Grounded question answering over a fixed set of documents.
//!
//! ## Usage
//!
//! ```bash
//! docrag --config ./config/docrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docrag index [--rebuild]` | Load the persisted index, or build it from the documents |
//! | `docrag ask "<question>"` | Answer one question |
//! | `docrag search "<query>" [--k N]` | Show the nearest passages with distances |
//! | `docrag classify "<text>"` | Show the greeting/content routing decision |
//! | `docrag status` | Summarize configuration and index state |
//! | `docrag serve` | Start the HTTP API |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.
//!
//! The API key may live in a `.env` file beside the config file or in the
//! working directory. Variables already set in the environment win.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use doc_rag::commands;
use doc_rag::config::{load_config, Config};
use doc_rag::context::AppContext;
use doc_rag::server;

/// Grounded question answering over PDF and text documents.
#[derive(Parser)]
#[command(
    name = "docrag",
    about = "docrag: grounded question answering over a fixed document set",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the persisted index, building it from the documents when absent.
    Index {
        /// Ignore the persisted index and rebuild from the documents.
        #[arg(long)]
        rebuild: bool,
    },

    /// Answer a question about the documents.
    Ask {
        question: String,
    },

    /// Show the passages nearest to a query.
    Search {
        query: String,

        /// Number of passages to return.
        #[arg(long, default_value = "4")]
        k: usize,
    },

    /// Classify text as a greeting or a content question. Offline.
    Classify {
        text: String,
    },

    /// Show configuration and index status. Offline.
    Status,

    /// Start the HTTP API.
    Serve,
}

/// Offline commands fall back to defaults when the config file is absent.
fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

/// Populate the environment from `.env` files: the one beside the config
/// file first, then the nearest one from the working directory up.
fn load_dotenv(config_path: &Path) {
    let beside_config = config_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .join(".env");

    if beside_config.is_file() {
        match dotenvy::from_path(&beside_config) {
            Ok(()) => tracing::debug!(path = %beside_config.display(), "loaded .env"),
            Err(e) => tracing::warn!(path = %beside_config.display(), error = %e, "ignoring unreadable .env"),
        }
    }

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    load_dotenv(&cli.config);

    match cli.command {
        Commands::Classify { text } => {
            let cfg = load_or_default(&cli.config)?;
            commands::run_classify(&cfg, &text)?;
        }
        Commands::Status => {
            let cfg = load_or_default(&cli.config)?;
            commands::run_status(&cfg)?;
        }
        Commands::Index { rebuild } => {
            let cfg = load_config(&cli.config)?;
            commands::run_index(&cfg, rebuild).await?;
        }
        Commands::Ask { question } => {
            let cfg = load_config(&cli.config)?;
            commands::run_ask(cfg, &question).await?;
        }
        Commands::Search { query, k } => {
            let cfg = load_config(&cli.config)?;
            commands::run_search(&cfg, &query, k).await?;
        }
        Commands::Serve => {
            let cfg = load_config(&cli.config)?;
            let bind = cfg.server.bind.clone();
            let ctx = Arc::new(AppContext::initialize(cfg).await);
            server::run_server(ctx, &bind).await?;
        }
    }

    Ok(())
}
