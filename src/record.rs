use serde::{Deserialize, Serialize};

/// Supported championship series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Series {
    F1,
    F2,
    F3,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::F1, Series::F2, Series::F3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Series::F1 => "f1",
            Series::F2 => "f2",
            Series::F3 => "f3",
        }
    }

    pub fn parse(s: &str) -> Option<Series> {
        match s.to_lowercase().as_str() {
            "f1" => Some(Series::F1),
            "f2" => Some(Series::F2),
            "f3" => Some(Series::F3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document classification taken from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Decision,
    Offence,
    Infringement,
    Unknown,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Decision => "decision",
            DocType::Offence => "offence",
            DocType::Infringement => "infringement",
            DocType::Unknown => "unknown",
        }
    }
}

/// Closed set of penalty categories, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyType {
    #[serde(rename = "disqualified")]
    Disqualified,
    #[serde(rename = "drive-through")]
    DriveThrough,
    #[serde(rename = "pit-lane")]
    PitLane,
    #[serde(rename = "grid")]
    Grid,
    #[serde(rename = "stop and go")]
    StopAndGo,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "fine")]
    Fine,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "reprimand")]
    Reprimand,
    #[serde(rename = "no penalty")]
    NoPenalty,
}

impl PenaltyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyType::Disqualified => "disqualified",
            PenaltyType::DriveThrough => "drive-through",
            PenaltyType::PitLane => "pit-lane",
            PenaltyType::Grid => "grid",
            PenaltyType::StopAndGo => "stop and go",
            PenaltyType::Time => "time",
            PenaltyType::Fine => "fine",
            PenaltyType::Warning => "warning",
            PenaltyType::Reprimand => "reprimand",
            PenaltyType::NoPenalty => "no penalty",
        }
    }
}

/// Header block common to every source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Document")]
    pub document: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
}

/// A field whose source value is either one joined sentence or a bulleted
/// list of short items (e.g. replaced car components).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Prose(String),
    Items(Vec<String>),
}

/// Incident detail block reconstructed from the fragment stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDetails {
    #[serde(rename = "Headline")]
    pub headline: String,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "Competitor")]
    pub competitor: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Session")]
    pub session: String,
    #[serde(rename = "Fact")]
    pub fact: FieldValue,
    #[serde(rename = "Infringement")]
    pub infringement: String,
    #[serde(rename = "Decision")]
    pub decision: Vec<String>,
    #[serde(rename = "Reason")]
    pub reason: String,
}

/// Canonical structured output of the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub series: Series,
    pub doc_type: DocType,
    pub doc_name: String,
    /// Canonical sortable `YYYY/MM/DD HH:MM` string.
    pub doc_date: String,
    pub grand_prix: String,
    pub penalty_type: PenaltyType,
    pub weekend: String,
    pub incident_title: String,
    pub document_info: DocumentMetadata,
    pub incident_info: IncidentDetails,
    pub stewards: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub manual_upload: bool,
}

/// One discovered season listing page for a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesYearDescriptor {
    pub series: Series,
    pub year: i32,
    pub documents_url: String,
}
