use thiserror::Error;

/// Failures scoped to a single document. None of these abort the job;
/// each one marks that document as failed and the batch moves on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unparseable pdf: {0}")]
    Extraction(String),

    #[error("incorrect document format, missing fields: {}", missing.join(", "))]
    MalformedDocument { missing: Vec<String> },

    #[error("unexpected field label: {0}")]
    UnexpectedLabel(String),

    #[error("document type not recognized in filename")]
    UnknownDocType,

    #[error("not a driver penalty")]
    NotADriverPenalty,

    #[error("headline not found")]
    HeadlineNotFound,

    #[error("cannot parse date: {0}")]
    DateParse(String),

    #[error("store error: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// Coarse class used in job summaries, so operators can tell
    /// "source changed format" from "network flaky".
    pub fn class(&self) -> &'static str {
        match self {
            PipelineError::Fetch { .. } => "transport",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::MalformedDocument { .. }
            | PipelineError::UnexpectedLabel(_)
            | PipelineError::UnknownDocType
            | PipelineError::NotADriverPenalty
            | PipelineError::HeadlineNotFound
            | PipelineError::DateParse(_) => "format",
            PipelineError::Persistence(_) => "persistence",
        }
    }
}

/// Failures while discovering seasons or listing a season's documents.
/// These are fatal to the whole job: without a listing there is nothing
/// to ingest.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no season selector found on {0}")]
    SeasonSelectorNotFound(String),

    #[error("no document list found on {0}")]
    DocumentListNotFound(String),
}
