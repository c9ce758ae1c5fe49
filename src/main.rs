//! # ragbase CLI
//!
//! Thin development surface over the ragbase library, standing in for the
//! upload/API layer. Commands cover admission, status inspection, querying,
//! reprocessing, and deletion.
//!
//! ```bash
//! ragbase --config ./config/ragbase.toml init
//! ragbase add ./report.pdf
//! ragbase add-url https://example.com/policy
//! ragbase query "refund policy" --limit 3
//! ragbase reprocess <id>
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use ragbase::blob::{BlobStore, FsBlobStore};
use ragbase::chunk::ChunkSettings;
use ragbase::config::{load_config, Config};
use ragbase::context::ContextAssembler;
use ragbase::embedding::HttpEmbedder;
use ragbase::models::{DocumentKind, RetrievalMode};
use ragbase::pipeline::{IngestionCoordinator, ReprocessOutcome};
use ragbase::retrieval::RetrievalEngine;
use ragbase::store::sqlite::SqliteStore;
use ragbase::store::ChunkStore;

#[derive(Parser)]
#[command(
    name = "ragbase",
    about = "Document ingestion and semantic retrieval engine for retrieval-augmented chat",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragbase.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Admit a local file and wait for ingestion to finish.
    Add {
        /// Path to the source file.
        path: PathBuf,

        /// Declared format: pdf, csv, or xlsx. Inferred from the file
        /// extension when omitted.
        #[arg(long)]
        kind: Option<String>,

        /// Retrieval mode: semantic or structured.
        #[arg(long, default_value = "semantic")]
        mode: String,

        /// Free-text description stored with the document.
        #[arg(long)]
        description: Option<String>,
    },

    /// Fetch a web page, admit it, and wait for ingestion to finish.
    AddUrl {
        url: String,

        #[arg(long, default_value = "semantic")]
        mode: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List all documents with their status.
    List,

    /// Show one document's status, error detail, and metadata.
    Status {
        /// Document id.
        id: String,
    },

    /// Retrieve chunks for a query and print the assembled context.
    Query {
        query: String,

        /// Maximum number of chunks to retrieve.
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum similarity score in [0, 1].
        #[arg(long)]
        min_score: Option<f64>,

        /// Restrict retrieval to these document ids (comma-separated).
        #[arg(long, value_delimiter = ',')]
        docs: Option<Vec<String>>,
    },

    /// Re-run the full ingestion pipeline for a document.
    Reprocess {
        /// Document id.
        id: String,
    },

    /// Delete a document, its chunks, metadata, and source bytes.
    Delete {
        /// Document id.
        id: String,
    },
}

/// Everything a command needs, built once from config.
struct App {
    store: Arc<SqliteStore>,
    blobs: Arc<FsBlobStore>,
    coordinator: IngestionCoordinator,
    engine: RetrievalEngine,
    config: Config,
}

async fn build_app(config: Config) -> anyhow::Result<App> {
    let pool = ragbase::db::connect(&config.db.path).await?;
    ragbase::migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let blobs = Arc::new(FsBlobStore::new(config.blobs.dir.clone())?);
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);

    let coordinator = IngestionCoordinator::new(
        store.clone(),
        blobs.clone(),
        embedder.clone(),
        ChunkSettings::from(&config.chunking),
        config.pipeline.workers,
    );
    let engine = RetrievalEngine::new(store.clone(), embedder);

    Ok(App {
        store,
        blobs,
        coordinator,
        engine,
        config,
    })
}

fn infer_kind(path: &Path) -> anyhow::Result<DocumentKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(DocumentKind::Pdf),
        "csv" => Ok(DocumentKind::Csv),
        "xlsx" => Ok(DocumentKind::Xlsx),
        other => bail!(
            "cannot infer document kind from extension '{}'; pass --kind pdf|csv|xlsx",
            other
        ),
    }
}

fn parse_mode(mode: &str) -> anyhow::Result<RetrievalMode> {
    mode.parse::<RetrievalMode>().map_err(anyhow::Error::msg)
}

async fn wait_and_report(app: &App, id: &str) -> anyhow::Result<()> {
    let status = app.coordinator.wait_for(id).await?;
    let doc = app
        .store
        .get_document(id)
        .await?
        .context("document disappeared during processing")?;

    println!("id:     {id}");
    println!("status: {status}");
    if let Some(detail) = doc.error_detail {
        println!("error:  {detail}");
    } else {
        let chunks = app.store.chunks_for(id).await?;
        println!("chunks: {}", chunks.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ragbase=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = ragbase::db::connect(&config.db.path).await?;
            ragbase::migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }

        Commands::Add {
            path,
            kind,
            mode,
            description,
        } => {
            let app = build_app(config).await?;
            let kind = match kind {
                Some(k) => k.parse::<DocumentKind>().map_err(anyhow::Error::msg)?,
                None => infer_kind(&path)?,
            };
            if kind == DocumentKind::Website {
                bail!("use add-url for websites");
            }
            let mode = parse_mode(&mode)?;
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();

            let id = app
                .coordinator
                .admit(bytes, &name, kind, mode, description)
                .await?;
            wait_and_report(&app, &id).await?;
        }

        Commands::AddUrl {
            url,
            mode,
            description,
        } => {
            let app = build_app(config).await?;
            let mode = parse_mode(&mode)?;

            let response = reqwest::get(&url)
                .await
                .with_context(|| format!("Failed to fetch {url}"))?
                .error_for_status()
                .with_context(|| format!("Failed to fetch {url}"))?;
            let bytes = response.bytes().await?.to_vec();

            let id = app
                .coordinator
                .admit(bytes, &url, DocumentKind::Website, mode, description)
                .await?;
            wait_and_report(&app, &id).await?;
        }

        Commands::List => {
            let app = build_app(config).await?;
            let docs = app.store.list_documents().await?;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!("{}  {:10}  {:8}  {}", doc.id, doc.status, doc.kind, doc.name);
            }
        }

        Commands::Status { id } => {
            let app = build_app(config).await?;
            let doc = app
                .store
                .get_document(&id)
                .await?
                .with_context(|| format!("No document with id {id}"))?;
            println!("id:          {}", doc.id);
            println!("name:        {}", doc.name);
            println!("kind:        {}", doc.kind);
            println!("mode:        {}", doc.mode.as_str());
            println!("status:      {}", doc.status);
            if let Some(detail) = &doc.error_detail {
                println!("error:       {detail}");
            }
            if let Some(description) = &doc.description {
                println!("description: {description}");
            }
            if let Some(details) = app.store.get_details(&id).await? {
                println!("details:     {}", serde_json::to_string(&details)?);
            }
            let chunks = app.store.chunks_for(&id).await?;
            println!("chunks:      {}", chunks.len());
        }

        Commands::Query {
            query,
            limit,
            min_score,
            docs,
        } => {
            let app = build_app(config).await?;
            let k = limit.unwrap_or(app.config.retrieval.default_limit);
            let min_score = min_score.unwrap_or(app.config.retrieval.default_min_score);

            let results = app
                .engine
                .retrieve(&query, k, min_score, docs.as_deref())
                .await?;

            println!("{} result(s)", results.len());
            for result in &results {
                println!(
                    "  {:.3}  {}  ({})",
                    result.score, result.document_name, result.locator
                );
            }

            let assembler = ContextAssembler::new(app.config.retrieval.context_budget_chars);
            let assembled = assembler.assemble(&results);
            println!("\n{}", assembled.text);
            if !assembled.citations.is_empty() {
                println!("\nSources:");
                for citation in &assembled.citations {
                    println!("  - {} ({})", citation.document_name, citation.locator);
                }
            }
        }

        Commands::Reprocess { id } => {
            let app = build_app(config).await?;
            match app.coordinator.reprocess(&id).await? {
                ReprocessOutcome::Busy => {
                    println!("Document {id} is busy; a pipeline run is already in flight.");
                }
                ReprocessOutcome::Accepted => {
                    wait_and_report(&app, &id).await?;
                }
            }
        }

        Commands::Delete { id } => {
            let app = build_app(config).await?;
            let doc = app
                .store
                .get_document(&id)
                .await?
                .with_context(|| format!("No document with id {id}"))?;
            app.store.delete_document(&id).await?;
            app.blobs.remove(&doc.source_ref).await?;
            println!("Deleted {} ({})", id, doc.name);
        }
    }

    Ok(())
}
