use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_ingest_core::{
    CharacterNgramEmbedder, ChunkingConfig, Embedder, HttpEmbedder, HttpEmbedderConfig,
    IngestionPipeline, LopdfExtractor, PipelineConfig, PipelineOutcome, SkippedPdf,
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_DATA_PATH, DEFAULT_EMBEDDING_BATCH_SIZE,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_PATH,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Pipeline = IngestionPipeline<LopdfExtractor, Box<dyn Embedder>>;

#[derive(Parser)]
#[command(name = "pdf-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Folder that contains the PDFs to ingest.
    #[arg(long, env = "DATA_PATH", default_value = DEFAULT_DATA_PATH, global = true)]
    data_path: PathBuf,

    /// Directory the vector store is written to and loaded from.
    #[arg(long, env = "DB_FAISS_PATH", default_value = DEFAULT_INDEX_PATH, global = true)]
    db_path: PathBuf,

    /// Maximum characters per chunk.
    #[arg(long, env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP, global = true)]
    chunk_overlap: usize,

    /// Also ingest PDFs in sub-folders.
    #[arg(long, env = "DATA_RECURSIVE", global = true)]
    recursive: bool,

    /// OpenAI-compatible API base URL. The local n-gram embedder is used when unset.
    #[arg(long, env = "EMBEDDING_ENDPOINT", global = true)]
    embedding_endpoint: Option<String>,

    /// Embedding model name sent to the endpoint.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,

    /// Bearer token for the embedding endpoint.
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true, global = true)]
    embedding_api_key: Option<String>,

    /// Requested vector size, for models that support shortening.
    #[arg(long, env = "EMBEDDING_DIMENSIONS", global = true)]
    embedding_dimensions: Option<usize>,

    /// Inputs per embedding request.
    #[arg(long, env = "EMBEDDING_BATCH_SIZE", default_value_t = DEFAULT_EMBEDDING_BATCH_SIZE, global = true)]
    embedding_batch_size: usize,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Load PDFs, split them into chunks, embed them and persist the vector store.
    Ingest,
    /// Search a previously persisted vector store.
    Query {
        /// Search text
        #[arg(long)]
        text: String,
        /// Number of chunks to return.
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-ingest boot"
    );

    tokio::task::spawn_blocking(move || execute(cli)).await?
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.clone().unwrap_or(Command::Ingest);
    let embedder = build_embedder(&cli)?;
    let config = PipelineConfig {
        data_path: cli.data_path,
        index_path: cli.db_path,
        chunking: ChunkingConfig {
            chunk_size: cli.chunk_size,
            chunk_overlap: cli.chunk_overlap,
        },
        recursive: cli.recursive,
    };
    let pipeline = IngestionPipeline::new(config, LopdfExtractor, embedder)?;

    match command {
        Command::Ingest => ingest(&pipeline),
        Command::Query { text, top_k } => query(&pipeline, &text, top_k),
    }
}

fn build_embedder(cli: &Cli) -> anyhow::Result<Box<dyn Embedder>> {
    let endpoint = cli
        .embedding_endpoint
        .as_deref()
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty());

    let Some(endpoint) = endpoint else {
        info!("no embedding endpoint configured, using the local character n-gram embedder");
        return Ok(Box::new(CharacterNgramEmbedder::default()));
    };

    let mut config = HttpEmbedderConfig::new(endpoint);
    config.model = cli.embedding_model.clone();
    config.api_key = cli.embedding_api_key.clone();
    config.dimensions = cli.embedding_dimensions;
    config.batch_size = cli.embedding_batch_size;

    let embedder = HttpEmbedder::new(config)?;
    info!(endpoint = %embedder.endpoint(), model = embedder.model_name(), "using http embedder");
    Ok(Box::new(embedder))
}

fn ingest(pipeline: &Pipeline) -> anyhow::Result<()> {
    let folder = pipeline.config().data_path.display().to_string();

    match pipeline.run()? {
        PipelineOutcome::Indexed {
            store,
            summary,
            skipped,
        } => {
            report_skipped(&folder, &skipped);
            println!(
                "{} chunks from {} pages of {} pdf files indexed into {} at {}",
                summary.chunks,
                summary.documents,
                summary.pdf_files - summary.skipped,
                pipeline.config().index_path.display(),
                store.manifest().built_at.to_rfc3339()
            );
        }
        PipelineOutcome::NoDocuments { skipped } => {
            report_skipped(&folder, &skipped);
            if skipped.is_empty() {
                println!("0 chunks ingested (no pdf files in {folder})");
            } else {
                println!("0 chunks ingested (all {} pdf files were skipped)", skipped.len());
            }
        }
        PipelineOutcome::NothingToIndex { summary } => {
            println!(
                "0 chunks ingested ({} pages carried no text to index)",
                summary.documents
            );
        }
    }

    Ok(())
}

fn report_skipped(folder: &str, skipped: &[SkippedPdf]) {
    if skipped.is_empty() {
        return;
    }

    warn!("skipped_files={} for folder={}", skipped.len(), folder);
    for file in skipped {
        warn!(path = %file.path.display(), reason = %file.reason, "skipped pdf");
    }
}

fn query(pipeline: &Pipeline, text: &str, top_k: usize) -> anyhow::Result<()> {
    let Some(store) = pipeline.load_store()? else {
        println!(
            "no vector store at {}; run `pdf-ingest ingest` first",
            pipeline.config().index_path.display()
        );
        return Ok(());
    };

    let hits = store.similarity_search(text, pipeline.embedder(), top_k)?;
    println!("query: {text}");
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "[{}] distance={:.4} source={} page={}",
            rank + 1,
            hit.distance,
            hit.chunk.metadata.source_path,
            hit.chunk.metadata.page
        );
        println!("  chunk_text:\n{}", hit.chunk.text);
    }

    Ok(())
}
