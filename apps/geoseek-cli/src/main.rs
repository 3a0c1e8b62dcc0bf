//! geoseek command line: ingest harvested records into LanceDB, run hybrid
//! queries and check place resolution.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use geoseek_core::catalog::CatalogLoader;
use geoseek_core::config::{resolve_with_base, Config, Settings};
use geoseek_core::{DatasetRecord, IndexHandle, RetrievalRequest, RetrievalResult};
use geoseek_embed::{build_provider, get_default_embedder};
use geoseek_hybrid::geocode::geocoder_from_settings;
use geoseek_hybrid::setup::{build_orchestrator, open_index};
use geoseek_hybrid::GeocoderAdapter;
use geoseek_vector::LanceDatasetWriter;

const EMBED_BATCH: usize = 32;

#[derive(Parser)]
#[command(name = "geoseek")]
#[command(author, version, about = "Natural-language spatial dataset discovery", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load harvested records and upsert them into the LanceDB table
    Ingest {
        /// Records directory (defaults to index.records_dir)
        dir: Option<PathBuf>,

        /// Only read the first N record files
        #[arg(long)]
        limit: Option<usize>,

        /// Embed records that arrive without an embedding
        #[arg(long)]
        embed_missing: bool,

        /// Do not build the envelope indexes (spatial queries then scan)
        #[arg(long)]
        skip_spatial_index: bool,
    },

    /// Answer a free-text dataset query
    Query {
        text: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a place name with the configured geocoder
    Geocode { place: String },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug,lance=info,lancedb=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lance=warn,lancedb=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_from(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    let settings = config.settings()?;
    let base = cli.config.parent().map(Path::to_path_buf).unwrap_or_default();

    match cli.command {
        Commands::Ingest { dir, limit, embed_missing, skip_spatial_index } => {
            ingest(&settings, &base, IngestOptions { dir, limit, embed_missing, spatial_index: !skip_spatial_index }).await
        }
        Commands::Query { text, top_k, json } => query(&settings, &base, text, top_k, json).await,
        Commands::Geocode { place } => geocode(&settings, &place).await,
    }
}

struct IngestOptions {
    dir: Option<PathBuf>,
    limit: Option<usize>,
    embed_missing: bool,
    spatial_index: bool,
}

async fn ingest(settings: &Settings, base: &Path, opts: IngestOptions) -> Result<()> {
    let dir = opts.dir.unwrap_or_else(|| resolve_with_base(base, &settings.index.records_dir));
    let mut loader = CatalogLoader::new().with_embedding_dim(settings.embedding.dim);
    if let Some(limit) = opts.limit {
        loader = loader.with_file_limit(limit);
    }
    let mut catalog = loader.load_dir(&dir)?;
    println!("Records directory: {}", dir.display());
    println!("Loaded {} records ({} skipped)", catalog.records.len(), catalog.skipped);

    if opts.embed_missing {
        embed_missing_records(settings, &mut catalog.records)?;
    }

    let lancedb_dir = resolve_with_base(base, &settings.index.lancedb_dir);
    std::fs::create_dir_all(&lancedb_dir)?;
    let writer = LanceDatasetWriter::new(&lancedb_dir, &settings.index.table, settings.embedding.dim)
        .await?
        .with_spatial_indexes(opts.spatial_index);
    if !opts.spatial_index {
        println!("⚠️  Skipping envelope indexes (--skip-spatial-index flag)");
    }
    let written = writer.write(&catalog.records).await?;
    println!("\n✅ Upserted {} records into {}/{}", written, lancedb_dir.display(), settings.index.table);
    Ok(())
}

fn embed_missing_records(settings: &Settings, records: &mut [DatasetRecord]) -> Result<()> {
    let mut missing: Vec<&mut DatasetRecord> = records.iter_mut().filter(|r| r.embedding.is_none()).collect();
    if missing.is_empty() {
        return Ok(());
    }
    let embedder = get_default_embedder(&settings.embedding)?;
    if embedder.dim() != settings.embedding.dim {
        anyhow::bail!("embedder produces {} dims but embedding.dim is {}", embedder.dim(), settings.embedding.dim);
    }
    info!(count = missing.len(), "embedding records without vectors");
    for chunk in missing.chunks_mut(EMBED_BATCH) {
        let texts: Vec<String> = chunk.iter().map(|r| embedding_text(r)).collect();
        let vectors = embedder.embed_batch(&texts)?;
        for (record, vector) in chunk.iter_mut().zip(vectors) {
            record.embedding = Some(vector);
        }
    }
    Ok(())
}

fn embedding_text(record: &DatasetRecord) -> String {
    let mut text = record.title.clone();
    if !record.description.is_empty() {
        text.push('\n');
        text.push_str(&record.description);
    }
    if !record.keywords.is_empty() {
        text.push('\n');
        text.push_str(&record.keywords.join(", "));
    }
    text
}

async fn query(settings: &Settings, base: &Path, text: String, top_k: Option<usize>, json: bool) -> Result<()> {
    let index = open_index(settings, base).await?;
    let embedder = build_provider(&settings.embedding)?;
    let orchestrator = build_orchestrator(settings, Arc::new(IndexHandle::new(index)), embedder)?;

    let mut request = RetrievalRequest::new(text);
    request.top_k = top_k;
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let result = orchestrator.retrieve_until(request, ctrl_c).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &RetrievalResult) {
    let q = &result.query;
    println!("Query: {}", q.raw_text);
    match (&q.place_name, &q.extent) {
        (Some(place), Some(extent)) => println!("Place: {place} -> {extent}"),
        (Some(place), None) => println!("Place: {place} (not applied)"),
        _ => {}
    }
    println!("Searching for: {}\n", q.semantic_text);

    for (i, d) in result.datasets.iter().enumerate() {
        let c = &d.candidate;
        println!(
            "{:>2}. [{}] {}  (combined {:.3}, spatial {:.2}, semantic {:.3})",
            i + 1,
            c.dataset_id,
            d.record.title,
            c.combined_score,
            c.spatial_score,
            c.semantic_score
        );
    }
    if let Some(answer) = &result.answer {
        println!("\n{answer}");
    }
    let deg = &result.degradations;
    if let Some(reason) = deg.spatial {
        println!("\n⚠️  Spatial filter skipped: {reason:?}");
    }
    if deg.spatial_full_scan {
        println!("⚠️  Spatial index unavailable; footprints were scanned");
    }
    if deg.semantic_skipped {
        println!("⚠️  Semantic ranking skipped; ranked by location only");
    }
    if deg.missing_records > 0 {
        println!("⚠️  {} ranked datasets were missing from the index", deg.missing_records);
    }
    if deg.prose_skipped {
        println!("⚠️  Answer generation failed; showing ranked list only");
    }
}

async fn geocode(settings: &Settings, place: &str) -> Result<()> {
    let adapter = GeocoderAdapter::new(
        geocoder_from_settings(&settings.geocoder)?,
        Duration::from_millis(settings.timeouts.geocode_ms),
        settings.geocoder.cache_capacity,
    );
    match adapter.resolve(place).await? {
        Some(extent) => println!("{place} ({}) -> {extent}", adapter.backend_name()),
        None => println!("{place}: not found ({})", adapter.backend_name()),
    }
    Ok(())
}
