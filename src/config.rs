use std::path::PathBuf;
use std::time::Duration;

use crate::record::Series;

/// Main FIA domain, used to resolve relative document links.
pub const FIA_DOMAIN: &str = "https://www.fia.com";

/// Documents index page for each series (no specific year).
const F1_DOCUMENTS_PAGE: &str =
    "https://www.fia.com/documents/championships/championships/fia-formula-one-world-championship-14";
const F2_DOCUMENTS_PAGE: &str =
    "https://www.fia.com/documents/championships/championships/formula-2-championship-44";
const F3_DOCUMENTS_PAGE: &str =
    "https://www.fia.com/documents/championships/championships/fia-formula-3-championship-1012";

/// Administrative documents that are never penalty decisions.
const DISALLOWED_DOC_WORDS: &[&str] = &[
    "reprimand",
    "withdrawal",
    "schedule",
    "set a time",
    "permission to start",
    "protest lodged",
    "protest",
    "cover",
    "alledgedly score",
    "right of review",
    "petition to review",
    "summons",
];

/// Tunables for the whole pipeline. The fragment-length thresholds are
/// empirically matched to the observed document templates and may need
/// re-validation when the source changes its layout.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub disallowed_doc_words: Vec<String>,

    /// Weekend-region fragments at or below this length are stray
    /// title letters, not content.
    pub weekend_noise_len: usize,
    /// A list item whose successor is shorter than this got split by the
    /// text layer and is re-glued.
    pub glue_fragment_len: usize,
    /// A weekend date shorter than this is the first half of a
    /// two-fragment date.
    pub split_date_len: usize,
    /// Headline fragments must exceed this length to be distinguished
    /// from stray repeated letters.
    pub headline_min_len: usize,

    /// Timeout for a single document fetch.
    pub fetch_timeout: Duration,
    /// Timeout for listing pages, sized for lazily-expanded panels.
    pub listing_timeout: Duration,
    /// Stagger between consecutive document requests within one job.
    pub pacing_interval: Duration,
    /// Max in-flight document units within one job.
    pub concurrency: usize,

    /// Worker tasks pulling from the job queue.
    pub workers: usize,
    /// Concurrent jobs per worker. Listing jobs are resource-heavy,
    /// so this stays at 1 unless tuned otherwise.
    pub max_jobs_per_worker: usize,

    /// Incremental mode keeps documents published after the newest known
    /// record minus this window, tolerating publication-boundary skew.
    pub incremental_grace: chrono::Duration,

    /// Oldest season year a descriptor may reference.
    pub min_descriptor_year: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            disallowed_doc_words: DISALLOWED_DOC_WORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            weekend_noise_len: 4,
            glue_fragment_len: 6,
            split_date_len: 12,
            headline_min_len: 12,
            fetch_timeout: Duration::from_secs(15),
            listing_timeout: Duration::from_secs(90),
            pacing_interval: Duration::from_millis(1000),
            concurrency: 10,
            workers: 2,
            max_jobs_per_worker: 1,
            incremental_grace: chrono::Duration::days(1),
            min_descriptor_year: 2019,
        }
    }
}

impl Config {
    pub fn documents_page(&self, series: Series) -> &'static str {
        match series {
            Series::F1 => F1_DOCUMENTS_PAGE,
            Series::F2 => F2_DOCUMENTS_PAGE,
            Series::F3 => F3_DOCUMENTS_PAGE,
        }
    }

    /// F1 decisions carry four steward signatures, F2 and F3 three.
    pub fn steward_count(&self, series: Series) -> usize {
        match series {
            Series::F1 => 4,
            Series::F2 | Series::F3 => 3,
        }
    }
}
