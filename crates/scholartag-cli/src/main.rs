use std::path::PathBuf;

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use clap::{Parser, Subcommand};
use scholartag_ai::OllamaClient;
use scholartag_analysis::{LabelPolicy, TidyOptions};
use scholartag_core::SynonymMap;
use tracing::{Level, info};

mod display;
mod pipeline;

use pipeline::Pipeline;

/// Tag a researcher's publications with academic disciplines using a local LLM,
/// then cluster the papers by their tags.
#[derive(Parser)]
#[command(name = "scholartag", version, about)]
struct Cli {
    /// Directory holding the publication and classification snapshots.
    #[arg(long, env = "SCHOLARTAG_CACHE_DIR", default_value = "cache", global = true)]
    cache_dir: PathBuf,

    /// Directory for the dendrogram SVG.
    #[arg(long, env = "SCHOLARTAG_OUT_DIR", default_value = "out", global = true)]
    out_dir: PathBuf,

    /// Base URL of the scholarly metadata service.
    #[arg(
        long,
        env = "SCHOLARTAG_SCHOLAR_URL",
        default_value = "https://api.semanticscholar.org",
        global = true
    )]
    scholar_url: String,

    /// Base URL of the Ollama server.
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434", global = true)]
    ollama_url: String,

    /// Model used for classification.
    #[arg(long, env = "SCHOLARTAG_MODEL", default_value = "llama3.1:8b", global = true)]
    model: String,

    /// JSON object of extra `raw → canonical` tag synonyms; overrides built-ins.
    #[arg(long, env = "SCHOLARTAG_SYNONYMS", global = true)]
    synonyms: Option<PathBuf>,

    /// Keep model labels exactly as generated (no trimming or lowercasing).
    #[arg(long, global = true)]
    raw_labels: bool,

    /// Maximum characters of a paper title shown as a dendrogram leaf.
    #[arg(long, default_value_t = 40, global = true)]
    label_width: usize,

    /// Discard cached snapshots and recompute them.
    #[arg(long, global = true)]
    refresh: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, classify, tidy, and cluster in one go
    Run {
        /// Author profile identifier
        profile: String,
        /// Rows of the frequency table to print
        #[arg(long, default_value_t = 30)]
        top: usize,
    },
    /// Fetch a profile's publications and abstracts into the cache
    Fetch {
        /// Author profile identifier
        profile: String,
    },
    /// Classify cached publications with the local model
    Classify,
    /// Show tidy tag assignments and tag frequencies
    Tags {
        /// Rows of each table to print
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },
    /// Cluster papers by tag and write the dendrogram
    Cluster,
    /// Run SQL over the cached `publications` and `classifications` tables
    #[cfg(feature = "duckdb")]
    Query {
        /// SQL to execute
        sql: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();
    info!("scholartag v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = build_pipeline(&cli)?;
    let ollama = OllamaClient::new(cli.ollama_url.clone());

    match cli.command {
        Commands::Run { profile, top } => {
            pipeline.check_inference_server(&ollama).await?;
            pipeline.fetch(&profile).await?;
            let classifications = pipeline.classify(&ollama).await?;
            let (assignments, counts) = pipeline.tags(&classifications)?;
            display::print_frequencies(&counts, top)?;
            cluster(&pipeline, &assignments)?;
        }
        Commands::Fetch { profile } => {
            let batch = pipeline.fetch(&profile).await?;
            eprintln!(
                "  {} publications in {}",
                batch.num_rows(),
                pipeline.publications_cache().path().display()
            );
        }
        Commands::Classify => {
            pipeline.check_inference_server(&ollama).await?;
            let batch = pipeline.classify(&ollama).await?;
            eprintln!(
                "  {} classifications in {}",
                batch.num_rows(),
                pipeline.classifications_cache().path().display()
            );
        }
        Commands::Tags { limit } => {
            let classifications = pipeline.load_classifications()?;
            let (assignments, counts) = pipeline.tags(&classifications)?;
            println!("Tag assignments:");
            display::print_batch(&assignments, limit)?;
            display::print_frequencies(&counts, limit)?;
        }
        Commands::Cluster => {
            let classifications = pipeline.load_classifications()?;
            let (assignments, _) = pipeline.tags(&classifications)?;
            cluster(&pipeline, &assignments)?;
        }
        #[cfg(feature = "duckdb")]
        Commands::Query { sql } => query(&pipeline, &sql)?,
    }

    Ok(())
}

fn build_pipeline(cli: &Cli) -> anyhow::Result<Pipeline> {
    let defaults = SynonymMap::default();
    let synonyms = match &cli.synonyms {
        Some(path) => defaults
            .extended_from_json_file(path)
            .with_context(|| format!("loading synonyms from {}", path.display()))?,
        None => defaults,
    };
    info!(entries = synonyms.len(), "synonym map ready");

    let policy = if cli.raw_labels {
        LabelPolicy::Raw
    } else {
        LabelPolicy::Sanitise
    };

    Ok(Pipeline {
        cache_dir: cli.cache_dir.clone(),
        out_dir: cli.out_dir.clone(),
        scholar_url: cli.scholar_url.clone(),
        model: cli.model.clone(),
        tidy: TidyOptions {
            policy,
            synonyms,
            ..TidyOptions::default()
        },
        label_width: cli.label_width,
        refresh: cli.refresh,
    })
}

fn cluster(pipeline: &Pipeline, assignments: &RecordBatch) -> anyhow::Result<()> {
    let clustering = pipeline.cluster(assignments)?;
    display::print_clustering(&clustering.matrix, &clustering.tree, pipeline.label_width);
    let path = pipeline.write_dendrogram(&clustering.tree)?;
    eprintln!("  Dendrogram written to {}", path.display());
    Ok(())
}

#[cfg(feature = "duckdb")]
fn query(pipeline: &Pipeline, sql: &str) -> anyhow::Result<()> {
    let db = scholartag_store::DuckStore::open()?;
    let mut registered = 0;
    for (view, cache) in [
        ("publications", pipeline.publications_cache()),
        ("classifications", pipeline.classifications_cache()),
    ] {
        if cache.exists() {
            db.register_parquet(view, cache.path())?;
            info!(view, rows = db.count(view)?, "registered cache view");
            registered += 1;
        }
    }
    if registered == 0 {
        anyhow::bail!("no cache files in {}", pipeline.cache_dir.display());
    }
    let batches = db.query_arrow(sql).with_context(|| format!("running query: {sql}"))?;
    display::print_batches(&batches)
}
