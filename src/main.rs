//! # Course RAG CLI (`course-rag`)
//!
//! ## Usage
//!
//! ```bash
//! course-rag --config ./config/course-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `course-rag init` | Create the SQLite database and schema |
//! | `course-rag ingest` | Index course documents from a folder |
//! | `course-rag query "<question>"` | Ask a question from the terminal |
//! | `course-rag courses` | List indexed courses |
//! | `course-rag serve` | Start the HTTP API |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use course_rag::config::{self, Config};
use course_rag::embedding::create_embedder;
use course_rag::ingest;
use course_rag::logging;
use course_rag::migrate;
use course_rag::rag::RagSystem;
use course_rag::server;
use course_rag::store::sqlite::SqliteStore;
use course_rag::store::Store;
use course_rag::vector_store::VectorStore;

/// Course RAG: answer questions about course materials with a hosted
/// chat model and semantic search.
#[derive(Parser)]
#[command(name = "course-rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/course-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index course documents.
    ///
    /// Courses whose title is already indexed are skipped unless `--clear`
    /// is given.
    Ingest {
        /// Folder to scan. Defaults to `[documents].folder`.
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Remove all indexed courses before ingesting.
        #[arg(long)]
        clear: bool,
    },

    /// Ask a single question.
    Query {
        /// The question.
        text: String,

        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,
    },

    /// List indexed courses.
    Courses,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest { folder, clear } => run_ingest(&cfg, folder, clear).await?,
        Commands::Query { text, session } => {
            let rag = RagSystem::from_config(cfg).await?;
            let response = rag.query(&text, session.as_deref()).await?;
            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &response.sources {
                    match &source.link {
                        Some(link) => println!("  {} ({})", source.label, link),
                        None => println!("  {}", source.label),
                    }
                }
            }
            println!();
            println!("session: {}", response.session_id);
        }
        Commands::Courses => {
            let store = SqliteStore::connect(&cfg).await?;
            let titles = store.course_titles().await?;
            println!("{} courses", titles.len());
            for title in titles {
                println!("  {}", title);
            }
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

async fn run_ingest(cfg: &Config, folder: Option<PathBuf>, clear: bool) -> Result<()> {
    let store = Arc::new(SqliteStore::connect(cfg).await?);
    let embedder = create_embedder(&cfg.embedding)?;
    let vector_store = VectorStore::new(store, embedder, cfg);
    let folder = folder.unwrap_or_else(|| cfg.documents.folder.clone());

    let report = ingest::add_course_folder(
        &vector_store,
        &folder,
        &cfg.documents.extensions,
        &cfg.chunking,
        clear,
    )
    .await?;

    println!("ingest {}", folder.display());
    println!("  files: {}", report.files_seen);
    println!("  courses added: {}", report.courses_added);
    println!("  courses skipped: {}", report.courses_skipped);
    println!("  chunks written: {}", report.chunks_added);
    if !report.failures.is_empty() {
        println!("  failed: {}", report.failures.len());
        for failure in &report.failures {
            println!("    {}: {}", failure.path.display(), failure.error);
        }
    }
    println!("ok");
    Ok(())
}
