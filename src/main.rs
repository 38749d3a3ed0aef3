//! # Operius CLI
//!
//! The `operius` binary is the primary interface for the knowledge base.
//! It provides commands for database initialization, source ingestion,
//! semantic search, document retrieval, collection statistics, and an
//! interactive chat session.
//!
//! ## Usage
//!
//! ```bash
//! operius --config ./config/operius.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `operius init` | Create the SQLite database and run schema migrations |
//! | `operius sources` | List configured connectors |
//! | `operius sync <source>` | Ingest from a source (`github`, `kubernetes`, `all`) |
//! | `operius search "<query>"` | One-shot semantic search |
//! | `operius get <id>` | Retrieve a full document by id |
//! | `operius stats` | Collection statistics |
//! | `operius chat` | Interactive chat REPL |

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use operius::agent::SearchAgent;
use operius::chat::ChatSession;
use operius::config::{self, Config};
use operius::gateway::LlmGateway;
use operius::models::Source;
use operius::store::VectorStore;
use operius::{db, migrate, pipeline, sources, stats};

/// Operius — knowledge ingestion and semantic search over a GitHub
/// repository and a Kubernetes cluster.
#[derive(Parser)]
#[command(
    name = "operius",
    about = "Knowledge ingestion and semantic search over GitHub and Kubernetes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/operius.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// List configured sources.
    Sources,

    /// Ingest data from a source.
    ///
    /// Fetches raw records, normalizes them into documents, embeds them,
    /// and upserts into the store. Incremental by default; sync cursors
    /// advance only after a fully successful run.
    Sync {
        /// Source to sync: `github`, `kubernetes` (or `k8s`), or `all`.
        source: String,

        /// Ignore the stored cursor — re-fetch everything.
        #[arg(long)]
        full: bool,

        /// Maximum number of raw records to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// One-shot semantic search with intent routing.
    Search {
        /// The search query string.
        query: String,

        /// Restrict to one source (`github` or `kubernetes`), overriding
        /// the inferred intent.
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Retrieve a document by its id.
    ///
    /// Ids are stable: `github:{repo}/{path}`, `github:{repo}@{sha}`,
    /// `k8s://{namespace}/{kind}/{name}`.
    Get {
        /// Document id.
        id: String,
    },

    /// Collection statistics: counts, breakdowns, cursors.
    Stats,

    /// Interactive chat session over the knowledge base.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            run_sources(&cfg)?;
        }
        Commands::Sync {
            source,
            full,
            limit,
        } => {
            run_sync(&cfg, &source, full, limit).await?;
        }
        Commands::Search {
            query,
            source,
            limit,
        } => {
            run_search(&cfg, &query, source, limit).await?;
        }
        Commands::Get { id } => {
            run_get(&cfg, &id).await?;
        }
        Commands::Stats => {
            let pool = db::connect(&cfg).await?;
            let collected = stats::collect(&pool).await?;
            print!("{}", stats::render(&collected));
        }
        Commands::Chat => {
            let store = open_store(&cfg).await?;
            let gateway = LlmGateway::new(cfg.gateway.clone());
            if !gateway.configured() {
                eprintln!(
                    "Note: OPENROUTER_API_KEY is not set; answers will be raw search results."
                );
            }
            let agent = SearchAgent::new(store, gateway, cfg.search.top_k);
            ChatSession::new(agent).run().await?;
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<VectorStore> {
    let pool = db::connect(cfg).await?;
    Ok(VectorStore::new(pool, cfg.embedding.clone()))
}

fn run_sources(cfg: &Config) -> anyhow::Result<()> {
    let registered = sources::build_connectors(cfg)?;
    if registered.is_empty() {
        println!("No sources configured. Add [connectors.github] or [connectors.kubernetes].");
        return Ok(());
    }
    println!("Configured sources:\n");
    for entry in &registered {
        println!("  {:<12} {}", entry.source, entry.connector.description());
    }
    Ok(())
}

async fn run_sync(
    cfg: &Config,
    source_arg: &str,
    full: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;
    let registered = sources::build_connectors(cfg)?;

    let targets: Vec<Source> = if source_arg == "all" {
        registered.iter().map(|s| s.source).collect()
    } else {
        vec![Source::from_str(source_arg)?]
    };

    if targets.is_empty() {
        anyhow::bail!("No sources configured; nothing to sync.");
    }

    for source in targets {
        let connector = sources::connector_for(&registered, source)?;
        let report = pipeline::run_sync(connector, &store, source, full, limit).await?;
        println!(
            "{}: {} document(s) processed, {} skipped, in {:.1}s",
            report.source,
            report.documents_processed,
            report.documents_failed,
            report.duration.as_secs_f64(),
        );
    }

    Ok(())
}

async fn run_search(
    cfg: &Config,
    query: &str,
    source_arg: Option<String>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;
    let top_k = limit.unwrap_or(cfg.search.top_k);

    // An explicit --source overrides the inferred intent.
    let (filter, intent_label) = match source_arg {
        Some(s) => (Some(Source::from_str(&s)?), None),
        None => {
            let intent = operius::agent::classify_intent(query);
            (intent.source_filter(), Some(intent))
        }
    };

    if let Some(intent) = intent_label {
        println!("intent: {}", intent);
    }

    let results = store.query(query, filter, top_k).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for result in &results {
        println!(
            "{}. [{:.3}] {} ({})",
            result.rank, result.score, result.document.title, result.document.id
        );
    }

    Ok(())
}

async fn run_get(cfg: &Config, id: &str) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;
    match store.get_document(id).await? {
        Some(doc) => {
            println!("id:      {}", doc.id);
            println!("source:  {}", doc.source);
            println!("title:   {}", doc.title);
            println!("updated: {}", doc.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if !doc.metadata.is_empty() {
                println!("metadata:");
                for (key, value) in &doc.metadata {
                    println!("  {}: {}", key, value);
                }
            }
            println!("\n{}", doc.content);
        }
        None => {
            println!("Document not found: {}", id);
        }
    }
    Ok(())
}
