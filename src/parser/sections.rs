use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::error::PipelineError;
use crate::record::DocumentMetadata;

static DRIVER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)no.?/.?driver").unwrap());

/// Separator label between the reason paragraph and steward signatures,
/// also sprinkled through the body as noise.
const STEWARDS_LABEL: &str = "The Stewards";

const HEADER_LABELS: [&str; 5] = ["From", "To", "Document", "Date", "Time"];

/// The fragment stream split at its section boundaries. There are no
/// delimiters in the source; boundaries are label positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Segments {
    /// Header span, `From` label through the `Time` value.
    pub document: Vec<String>,
    /// Race weekend date range.
    pub weekend: String,
    /// Opening statement, joined.
    pub headline: String,
    /// Relabeled incident detail span, `Driver` label through the last
    /// fragment before `Reason`.
    pub incident: Vec<String>,
    /// Everything after the last `Reason`: reason paragraph fragments
    /// followed by steward names.
    pub tail: Vec<String>,
}

/// Segment a trimmed fragment sequence with explicit cursors per section
/// boundary.
pub fn split(fragments: &[String], cfg: &Config) -> Result<Segments, PipelineError> {
    let from_idx = find_label(fragments, "From")?;
    let document_idx = find_label(fragments, "Document")?;
    // First occurrence belongs to the header; the incident span has its
    // own Time label further down.
    let time_idx = find_label(fragments, "Time")?;
    let competitor_idx = find_label(fragments, "Competitor")?;
    let reason_idx = fragments
        .iter()
        .rposition(|s| s == "Reason")
        .ok_or_else(|| missing("Reason"))?;

    // The opening statement is the first long fragment naming the
    // stewards; the bare 12-char separator label never qualifies.
    let headline_idx = fragments
        .iter()
        .position(|s| s.len() > cfg.headline_min_len && s.to_lowercase().contains("the stewards"))
        .ok_or(PipelineError::HeadlineNotFound)?;

    if time_idx + 2 > fragments.len() || time_idx < from_idx {
        return Err(missing("Time"));
    }
    if competitor_idx < 2 || reason_idx <= competitor_idx {
        return Err(missing("Competitor"));
    }
    if headline_idx + 1 > competitor_idx - 2 || headline_idx < time_idx {
        return Err(PipelineError::HeadlineNotFound);
    }

    let document = fragments[from_idx..time_idx + 2].to_vec();
    let headline = fragments[headline_idx..competitor_idx - 2].join(" ");
    let incident = cleanup_incident(&fragments[competitor_idx - 2..reason_idx])?;
    let tail: Vec<String> = fragments[reason_idx + 1..]
        .iter()
        .filter(|s| s.as_str() != STEWARDS_LABEL)
        .cloned()
        .collect();
    let weekend = weekend_date(fragments, headline_idx, from_idx, document_idx, cfg)?;

    Ok(Segments {
        document,
        weekend,
        headline,
        incident,
        tail,
    })
}

/// Pair the header span into its five fields. Labels arrive in a fixed
/// order; a value split across fragments (the To recipient + its
/// organization) is rejoined with a single space.
pub fn parse_header(document: &[String]) -> Result<DocumentMetadata, PipelineError> {
    let mut values: [Option<String>; 5] = Default::default();
    let mut current: Option<usize> = None;

    for frag in document {
        if let Some(pos) = HEADER_LABELS.iter().position(|l| *l == frag.as_str()) {
            current = Some(pos);
            continue;
        }
        match current {
            Some(idx) => match &mut values[idx] {
                Some(v) => {
                    v.push(' ');
                    v.push_str(frag);
                }
                slot => *slot = Some(frag.clone()),
            },
            None => return Err(PipelineError::UnexpectedLabel(frag.clone())),
        }
    }

    let missing: Vec<String> = HEADER_LABELS
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(l, _)| l.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MalformedDocument { missing });
    }

    let mut it = values.into_iter().map(|v| v.unwrap_or_default());
    Ok(DocumentMetadata {
        from: it.next().unwrap_or_default(),
        to: it.next().unwrap_or_default(),
        document: it.next().unwrap_or_default(),
        date: it.next().unwrap_or_default(),
        time: it.next().unwrap_or_default(),
    })
}

/// Relabel and de-noise the incident span. `No / Driver` becomes the
/// plain `Driver` label, an `Offence` label becomes `Infringement` so
/// both template dialects read the same downstream, and a Team Manager
/// addressee means this is not a driver penalty at all.
fn cleanup_incident(span: &[String]) -> Result<Vec<String>, PipelineError> {
    let mut out = Vec::with_capacity(span.len());
    for (i, frag) in span.iter().enumerate() {
        if DRIVER_LABEL_RE.is_match(frag) {
            out.push("Driver".to_string());
            continue;
        }
        let lower = frag.to_lowercase();
        if lower == "team"
            && span
                .get(i + 1)
                .is_some_and(|next| next.to_lowercase() == "manager")
        {
            return Err(PipelineError::NotADriverPenalty);
        }
        if lower == "offence" {
            out.push("Infringement".to_string());
            continue;
        }
        if frag == STEWARDS_LABEL {
            continue;
        }
        out.push(frag.clone());
    }
    Ok(out)
}

/// The weekend date hides between the header block and the headline,
/// surrounded by the event title drawn letter-by-letter. Remove the
/// known-length header spans and the stray letters; what survives after
/// the year line is the date, possibly split across two fragments.
fn weekend_date(
    fragments: &[String],
    headline_idx: usize,
    from_idx: usize,
    document_idx: usize,
    cfg: &Config,
) -> Result<String, PipelineError> {
    let region: Vec<&String> = fragments[..headline_idx]
        .iter()
        .enumerate()
        .filter(|(i, _)| !(*i >= from_idx && *i < from_idx + 5))
        .filter(|(i, _)| !(*i >= document_idx && *i < document_idx + 6))
        .map(|(_, s)| s)
        .filter(|s| s.as_str() != STEWARDS_LABEL && s.len() > cfg.weekend_noise_len)
        .skip(1)
        .collect();

    match region.as_slice() {
        [] => Err(missing("weekend")),
        [first, rest @ ..] if first.len() < cfg.split_date_len => match rest.first() {
            Some(second) => Ok(format!("{} {}", first.trim(), second)),
            None => Ok(first.to_string()),
        },
        [first, ..] => Ok(first.to_string()),
    }
}

fn find_label(fragments: &[String], label: &str) -> Result<usize, PipelineError> {
    fragments
        .iter()
        .position(|s| s == label)
        .ok_or_else(|| missing(label))
}

fn missing(label: &str) -> PipelineError {
    PipelineError::MalformedDocument {
        missing: vec![label.to_string()],
    }
}

// ── Tests ──
