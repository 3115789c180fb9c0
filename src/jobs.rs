use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crawler::{self, DocumentLink};
use crate::error::PipelineError;
use crate::parser;
use crate::pdf;
use crate::record::Series;
use crate::store::{self, StoreRegistry};

/// Work the queue accepts. The trigger surface (HTTP, CLI) only ever
/// sees enqueue + a completion summary.
#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    /// Refresh season descriptors for every supported series.
    DiscoverSeriesData,
    /// Full crawl of one series-year.
    IngestAll { series: Series, year: i32 },
    /// Incremental crawl; delegates to a full crawl when the partition
    /// has no baseline to be incremental against.
    IngestNewest { series: Series, year: i32 },
}

impl JobKind {
    fn name(&self) -> &'static str {
        match self {
            JobKind::DiscoverSeriesData => "discover-series-data",
            JobKind::IngestAll { .. } => "ingest-all",
            JobKind::IngestNewest { .. } => "ingest-newest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One failed document inside an otherwise-running job.
#[derive(Debug, Clone, Serialize)]
pub struct DocFailure {
    pub document: String,
    /// transport / extraction / format / persistence.
    pub class: String,
    pub message: String,
}

/// Structured result of a job. Jobs never throw past this boundary;
/// even an internal error comes back as a summary with `error` set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobSummary {
    pub found: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<DocFailure>,
    /// Set when an incremental job handed its work to a full crawl.
    pub delegated_to: Option<JobId>,
    pub error: Option<String>,
}

impl JobSummary {
    fn failed_with(message: String) -> Self {
        JobSummary {
            error: Some(message),
            ..Default::default()
        }
    }

    fn delegated(to: JobId) -> Self {
        JobSummary {
            delegated_to: Some(to),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for JobSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(error) = &self.error {
            return write!(f, "failed: {error}");
        }
        if let Some(to) = self.delegated_to {
            return write!(f, "delegated to job {to}");
        }
        write!(
            f,
            "{} found, {} processed, {} succeeded, {} failed",
            self.found, self.processed, self.succeeded, self.failed
        )
    }
}

struct Job {
    id: JobId,
    kind: JobKind,
    result_tx: oneshot::Sender<JobSummary>,
}

/// Cloneable enqueue surface, also used by workers for delegation.
#[derive(Clone)]
pub struct JobHandle {
    tx: async_channel::Sender<Job>,
    next_id: Arc<AtomicU64>,
}

impl JobHandle {
    pub fn enqueue(&self, kind: JobKind) -> (JobId, oneshot::Receiver<JobSummary>) {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (result_tx, result_rx) = oneshot::channel();
        info!(job = %id, kind = kind.name(), "job queued");
        let _ = self.tx.try_send(Job {
            id,
            kind,
            result_tx,
        });
        (id, result_rx)
    }
}

#[derive(Clone)]
struct JobContext {
    cfg: Arc<Config>,
    store: Arc<StoreRegistry>,
    handle: JobHandle,
}

/// Fixed-size worker pool over a shared job channel. Workers pull jobs
/// and run up to `max_jobs_per_worker` concurrently; listing jobs are
/// heavy, so the default limit is 1.
pub struct JobQueue {
    handle: JobHandle,
    pool: tokio::task::JoinHandle<()>,
}

impl JobQueue {
    pub fn new(cfg: Arc<Config>, store: Arc<StoreRegistry>) -> Self {
        let (tx, rx) = async_channel::unbounded::<Job>();
        let handle = JobHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        let ctx = JobContext {
            cfg: cfg.clone(),
            store,
            handle: handle.clone(),
        };

        let workers = cfg.workers.max(1);
        let pool = tokio::spawn(async move {
            let mut worker_handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                worker_handles.push(tokio::spawn(worker_loop(
                    worker,
                    rx.clone(),
                    ctx.clone(),
                )));
            }
            drop(rx);
            for handle in worker_handles {
                let _ = handle.await;
            }
        });

        JobQueue { handle, pool }
    }

    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    /// Close the queue and wait for queued jobs to drain.
    pub async fn shutdown(self) {
        self.handle.tx.close();
        let _ = self.pool.await;
    }
}

async fn worker_loop(worker: usize, rx: async_channel::Receiver<Job>, ctx: JobContext) {
    let limit = ctx.cfg.max_jobs_per_worker.max(1);
    let slots = Arc::new(Semaphore::new(limit));
    let mut running = JoinSet::new();

    while let Ok(job) = rx.recv().await {
        let permit = slots
            .clone()
            .acquire_owned()
            .await
            .expect("job slot semaphore closed");
        let ctx = ctx.clone();
        running.spawn(async move {
            let _permit = permit;
            run_job(worker, job, ctx).await;
        });
    }
    while running.join_next().await.is_some() {}
}

async fn run_job(worker: usize, job: Job, ctx: JobContext) {
    info!(worker, job = %job.id, kind = job.kind.name(), "job started");
    let summary = match execute(&job.kind, &ctx).await {
        Ok(summary) => summary,
        Err(err) => {
            error!(job = %job.id, error = %format!("{err:#}"), "job failed");
            JobSummary::failed_with(format!("{err:#}"))
        }
    };
    info!(worker, job = %job.id, result = %summary, "job finished");
    let _ = job.result_tx.send(summary);
}

async fn execute(kind: &JobKind, ctx: &JobContext) -> Result<JobSummary> {
    match kind {
        JobKind::DiscoverSeriesData => run_discover(ctx).await,
        JobKind::IngestAll { series, year } => run_ingest(*series, *year, false, ctx).await,
        JobKind::IngestNewest { series, year } => run_ingest(*series, *year, true, ctx).await,
    }
}

/// Season discovery across all series. A missing year selector on any
/// series page fails the whole job; there is nothing useful to report
/// from a half-blind discovery.
async fn run_discover(ctx: &JobContext) -> Result<JobSummary> {
    let client = http_client(ctx.cfg.listing_timeout)?;
    let mut summary = JobSummary::default();

    for series in Series::ALL {
        let descriptors = crawler::discover_series(&client, series, &ctx.cfg).await?;
        for descriptor in &descriptors {
            ctx.store.upsert_descriptor(descriptor)?;
        }
        summary.found += descriptors.len();
        summary.succeeded += descriptors.len();
    }
    summary.processed = summary.found;
    Ok(summary)
}

async fn run_ingest(
    series: Series,
    year: i32,
    incremental: bool,
    ctx: &JobContext,
) -> Result<JobSummary> {
    let descriptor = ctx
        .store
        .find_descriptor(series, year)?
        .ok_or_else(|| anyhow!("no season descriptor for {series} {year}; run discover first"))?;
    let partition = store::partition_name(series, year);

    let cutoff = if incremental {
        match ctx.store.latest_doc_date(&partition)? {
            // Nothing to be incremental against; a full crawl of the
            // same season takes over.
            None => {
                let (delegate_id, _) = ctx
                    .handle
                    .enqueue(JobKind::IngestAll { series, year });
                info!(%series, year, delegate = %delegate_id, "empty partition, delegating to full crawl");
                return Ok(JobSummary::delegated(delegate_id));
            }
            Some(latest) => crawler::incremental_cutoff(&latest, &ctx.cfg),
        }
    } else {
        None
    };

    // Listing phase. The listing client is sized for panel expansion
    // and dropped before any document work starts, on both exit paths.
    debug!(%series, year, "listing");
    let links = {
        let listing_client = http_client(ctx.cfg.listing_timeout)?;
        crawler::list_documents(&listing_client, &descriptor.documents_url, &ctx.cfg).await?
    };
    let links: Vec<DocumentLink> = match cutoff {
        Some(cutoff) => links
            .into_iter()
            .filter(|link| crawler::is_fresh(link, cutoff))
            .collect(),
        None => links,
    };

    let mut summary = JobSummary {
        found: links.len(),
        ..Default::default()
    };
    if links.is_empty() {
        return Ok(summary);
    }

    // Fetch, reconstruct and persist each document as an independent
    // unit: paced, bounded, and collected without letting one failure
    // cancel its siblings.
    let client = http_client(ctx.cfg.fetch_timeout)?;
    let semaphore = Arc::new(Semaphore::new(ctx.cfg.concurrency.max(1)));
    let pacer = Arc::new(Pacer::new(ctx.cfg.pacing_interval));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(String, Result<bool, PipelineError>)>(
        ctx.cfg.concurrency.max(1) * 2,
    );

    for link in links {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        let pacer = Arc::clone(&pacer);
        let store = Arc::clone(&ctx.store);
        let cfg = Arc::clone(&ctx.cfg);
        let partition = partition.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            pacer.pause().await;
            let _permit = semaphore.acquire().await.unwrap();
            let result = process_document(&client, &link, series, &partition, &store, &cfg).await;
            let _ = tx.send((link.file_name, result)).await;
        });
    }
    drop(tx);

    let pb = ProgressBar::new(summary.found as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    while let Some((document, result)) = rx.recv().await {
        summary.processed += 1;
        match result {
            Ok(inserted) => {
                summary.succeeded += 1;
                if !inserted {
                    debug!(document = %document, "document already exists, skipping");
                }
            }
            Err(err) => {
                summary.failed += 1;
                warn!(document = %document, class = err.class(), error = %err, "document failed");
                summary.failures.push(DocFailure {
                    document,
                    class: err.class().to_string(),
                    message: err.to_string(),
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(summary)
}

/// The per-document pipeline: fetch → extract → reconstruct → dedup →
/// persist. Returns whether a new row was written; an already-known
/// identity is a success that writes nothing.
async fn process_document(
    client: &reqwest::Client,
    link: &DocumentLink,
    series: Series,
    partition: &str,
    store: &StoreRegistry,
    cfg: &Config,
) -> Result<bool, PipelineError> {
    let fetch_err = |source| PipelineError::Fetch {
        url: link.url.clone(),
        source,
    };
    let bytes = client
        .get(&link.url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?
        .bytes()
        .await
        .map_err(fetch_err)?;

    let fragments = pdf::extract_fragments(&bytes)?;
    let record = parser::reconstruct(
        &link.file_name,
        &fragments,
        series,
        Some(link.url.clone()),
        cfg,
    )?;

    let persistence = |e: anyhow::Error| PipelineError::Persistence(format!("{e:#}"));
    if store
        .find_by_identity(partition, &record)
        .map_err(persistence)?
    {
        return Ok(false);
    }
    store.insert(partition, &record).map_err(persistence)?;
    Ok(true)
}

/// Staggers request starts: unit i waits i × interval before touching
/// the network, bounding the request rate without a token bucket. The
/// pacing policy lives here, swappable independently of how results
/// are collected.
pub struct Pacer {
    interval: Duration,
    next_slot: AtomicU64,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Pacer {
            interval,
            next_slot: AtomicU64::new(0),
        }
    }

    pub fn next_delay(&self) -> Duration {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        self.interval * slot as u32
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("building http client")
}

// ── Tests ──
