use chrono::NaiveDateTime;

use crate::error::PipelineError;

/// Canonical storage layout. Lexicographic order equals chronological
/// order, which the store's latest-by-date lookup relies on.
pub const CANONICAL_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Layouts seen in document headers across seasons, plus the canonical
/// layout itself so normalization is idempotent.
const INPUT_FORMATS: &[&str] = &[
    CANONICAL_FORMAT,
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Normalize a combined date-time string into `YYYY/MM/DD HH:MM`.
pub fn normalize(combined: &str) -> Result<String, PipelineError> {
    let trimmed = combined.trim();
    for format in INPUT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.format(CANONICAL_FORMAT).to_string());
        }
    }
    Err(PipelineError::DateParse(trimmed.to_string()))
}

/// Join the header's Date and Time fields and normalize.
pub fn normalize_parts(date: &str, time: &str) -> Result<String, PipelineError> {
    normalize(&format!("{} {}", date.trim(), time.trim()))
}

// ── Tests ──
