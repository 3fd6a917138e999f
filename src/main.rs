//! # snaptext CLI
//!
//! The `snaptext` binary extracts text from images and manages the saved
//! history. It can also serve the same operations over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! snaptext --config ./config/snaptext.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `snaptext init` | Create the SQLite database and run schema migrations |
//! | `snaptext extract <images>...` | Extract text from one or more images |
//! | `snaptext list` | List saved records, newest first |
//! | `snaptext search` | Filter by keyword and creation date range |
//! | `snaptext get <id>` | Show one record in full |
//! | `snaptext edit <id>` | Replace a record's text |
//! | `snaptext delete <id>` | Delete a record |
//! | `snaptext export` | Write every record to CSV or XLSX |
//! | `snaptext stats` | Show aggregate counts |
//! | `snaptext serve` | Start the HTTP API |
//!
//! ## Environment
//!
//! `OPENAI_API_KEY` (or the variable named by `[extraction].api_key_env`)
//! enables extraction. `DATABASE_URL` overrides the configured database.
//! Both may be placed in a `.env` file.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use snaptext::config::{self, Config, Secrets, DEFAULT_CONFIG_PATH};
use snaptext::export::{self, ExportFormat};
use snaptext::extraction::{Extractor, OpenAiExtractor};
use snaptext::progress::ProgressMode;
use snaptext::server::{self, AppState};
use snaptext::store::{RecordStore, SqliteRecordStore};
use snaptext::{db, extract_cmd, records, stats};

/// snaptext: extract text from images and keep a searchable history.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/snaptext.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "snaptext",
    about = "Extract text from images with a vision model and keep a searchable history",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default file does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it again leaves existing records untouched.
    Init,

    /// Extract text from image files.
    ///
    /// A single file is extracted directly. Several files run as a batch:
    /// every file is attempted, and the command fails if any of them failed.
    Extract {
        /// Image files (png, jpg, jpeg, gif, bmp, webp).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Save successful extractions as records.
        #[arg(long)]
        save: bool,

        /// Batch progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// List all saved records, newest first.
    List,

    /// Search saved records.
    ///
    /// Filters combine with AND. Dates are `YYYY-MM-DD` and inclusive.
    Search {
        /// Case-insensitive substring of the filename or extracted text.
        #[arg(long)]
        keyword: Option<String>,

        /// Earliest creation date (inclusive).
        #[arg(long)]
        from: Option<String>,

        /// Latest creation date (inclusive).
        #[arg(long)]
        to: Option<String>,
    },

    /// Show one record.
    Get { id: i64 },

    /// Replace the text of a record.
    Edit {
        id: i64,

        /// New text.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the new text from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete a record.
    Delete { id: i64 },

    /// Export every record to a timestamped file.
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Output directory. Defaults to `[export].dir`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show aggregate counts over saved records.
    Stats,

    /// Start the HTTP API server.
    Serve,
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn build_extractor(cfg: &Config) -> anyhow::Result<Option<Arc<dyn Extractor>>> {
    if !cfg.extraction.is_enabled() {
        return Ok(None);
    }
    Ok(Some(Arc::new(OpenAiExtractor::new(&cfg.extraction)?)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut cfg = config::load_or_default(&cli.config)?;
    Secrets::from_env(&cfg).apply(&mut cfg);

    let pool = db::connect(&cfg).await?;
    let store = SqliteRecordStore::new(pool);
    store.initialize().await?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized successfully.");
        }
        Commands::Extract {
            files,
            save,
            progress,
        } => {
            let Some(extractor) = build_extractor(&cfg)? else {
                bail!(
                    "extraction disabled: set {} to enable it",
                    cfg.extraction.api_key_env
                );
            };
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            extract_cmd::run_extract(extractor.as_ref(), &store, &files, save, progress).await?;
        }
        Commands::List => {
            records::run_list(&store).await?;
        }
        Commands::Search { keyword, from, to } => {
            records::run_search(&store, keyword, from, to).await?;
        }
        Commands::Get { id } => {
            records::run_get(&store, id).await?;
        }
        Commands::Edit { id, text, file } => {
            records::run_edit(&store, id, text, file.as_deref()).await?;
        }
        Commands::Delete { id } => {
            records::run_delete(&store, id).await?;
        }
        Commands::Export { format, output } => {
            export::run_export(&cfg, &store, format, output.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&store).await?;
        }
        Commands::Serve => {
            let extractor = build_extractor(&cfg)?;
            let state = AppState::new(Arc::new(store), extractor);
            server::run_server(&cfg, state).await?;
        }
    }

    Ok(())
}
