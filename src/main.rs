mod config;
mod crawler;
mod error;
mod jobs;
mod parser;
mod pdf;
mod record;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use chrono::Datelike;
use clap::{Parser, Subcommand};

use config::Config;
use jobs::{JobKind, JobQueue};
use record::Series;
use store::StoreRegistry;

#[derive(Parser)]
#[command(name = "fia_scraper", about = "FIA penalty document scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover available seasons for every supported series
    Discover,
    /// Crawl one series season and ingest its penalty documents
    Ingest {
        /// Series identifier (f1, f2, f3)
        #[arg(short, long)]
        series: String,
        /// Season year (default: current year)
        #[arg(short, long)]
        year: Option<i32>,
        /// Full crawl instead of newest-documents-only
        #[arg(long)]
        all: bool,
    },
    /// Parse local PDF documents without crawling
    Parse {
        /// Series identifier (f1, f2, f3)
        #[arg(short, long)]
        series: String,
        /// Season year, required with --save
        #[arg(short, long)]
        year: Option<i32>,
        /// Persist parsed records as manual uploads
        #[arg(long)]
        save: bool,
        /// PDF files to parse
        files: Vec<PathBuf>,
    },
    /// Show per-partition record counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = Arc::new(Config::default());
    let store = Arc::new(StoreRegistry::new(cfg.data_dir.clone()));

    let result = match cli.command {
        Commands::Discover => {
            let queue = JobQueue::new(cfg.clone(), store.clone());
            let (id, rx) = queue.handle().enqueue(JobKind::DiscoverSeriesData);
            let summary = rx.await.context("job worker dropped")?;
            println!("Job {id}: {summary}");
            queue.shutdown().await;
            Ok(())
        }
        Commands::Ingest { series, year, all } => {
            let series = parse_series(&series)?;
            let year = year.unwrap_or_else(|| chrono::Utc::now().year());
            let kind = if all {
                JobKind::IngestAll { series, year }
            } else {
                JobKind::IngestNewest { series, year }
            };

            let queue = JobQueue::new(cfg.clone(), store.clone());
            let (id, rx) = queue.handle().enqueue(kind);
            let summary = rx.await.context("job worker dropped")?;
            println!("Job {id}: {summary}");
            for failure in &summary.failures {
                println!("  {} [{}]: {}", failure.document, failure.class, failure.message);
            }
            // Drain any delegated full crawl before exiting.
            queue.shutdown().await;
            Ok(())
        }
        Commands::Parse {
            series,
            year,
            save,
            files,
        } => {
            let series = parse_series(&series)?;
            if files.is_empty() {
                return Err(anyhow!("no files given"));
            }
            if save && year.is_none() {
                return Err(anyhow!("--save requires --year"));
            }
            parse_files(series, year, save, &files, &cfg, &store)
        }
        Commands::Stats => {
            for partition in store.partitions_on_disk()? {
                if partition == store::SERIES_DATA_PARTITION {
                    for series in Series::ALL {
                        let seasons = store.descriptors(series)?;
                        println!("{partition}: {series} has {} known seasons", seasons.len());
                    }
                } else {
                    println!("{partition}: {} records", store.count(&partition)?);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Parse already-downloaded PDFs in parallel, printing each record and
/// optionally persisting it as a manual upload.
fn parse_files(
    series: Series,
    year: Option<i32>,
    save: bool,
    files: &[PathBuf],
    cfg: &Config,
    store: &StoreRegistry,
) -> anyhow::Result<()> {
    use rayon::prelude::*;

    let results: Vec<(String, anyhow::Result<record::IncidentRecord>)> = files
        .par_iter()
        .map(|path| {
            let name = path.to_string_lossy().to_string();
            let parsed = (|| {
                let bytes = std::fs::read(path).with_context(|| format!("reading {name}"))?;
                let fragments = pdf::extract_fragments(&bytes)?;
                let mut record = parser::reconstruct(&name, &fragments, series, None, cfg)?;
                record.manual_upload = true;
                Ok(record)
            })();
            (name, parsed)
        })
        .collect();

    let mut saved = 0;
    let mut failed = 0;
    for (name, parsed) in results {
        match parsed {
            Ok(record) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                if save {
                    let partition = store::partition_name(series, year.unwrap_or_default());
                    if store.insert(&partition, &record)? {
                        saved += 1;
                    }
                }
            }
            Err(err) => {
                failed += 1;
                println!("{name}: {err:#}");
            }
        }
    }

    if save {
        println!("Saved {saved} records ({failed} failed).");
    } else {
        println!(
            "Parsed {} records ({failed} failed).",
            files.len().saturating_sub(failed)
        );
    }
    Ok(())
}

fn parse_series(input: &str) -> anyhow::Result<Series> {
    Series::parse(input)
        .ok_or_else(|| anyhow!("unsupported series '{input}', expected one of f1, f2, f3"))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
