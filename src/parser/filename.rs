use std::sync::LazyLock;

use regex::Regex;

use crate::record::DocType;

// Common duplicate-file suffixes: "_0", "-3", "_(2)", "(1)".
static NUM_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_]\d+$").unwrap());
static PAREN_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]?\(\d+\)$").unwrap());
static DOC_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(offence|decision|infringement)").unwrap());
// Optional series code glued to the doc-type keyword in the title part.
static TITLE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(f[123]\s)?(offence|decision|infringement)").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct FilenameParts {
    /// Normalized filename: suffix-stripped, lowercased, underscores
    /// replaced with spaces.
    pub doc_name: String,
    pub grand_prix: String,
    pub doc_type: DocType,
    pub incident_title: String,
}

/// Decompose an anchor href or bare filename into document name, grand
/// prix name, document type and incident title.
///
/// The filename is the only place the document type appears; fragments
/// inside the PDF never state it.
pub fn decompose(href: &str) -> FilenameParts {
    let file = href.rsplit('/').next().unwrap_or(href);
    let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);

    // Suffixes are stripped before underscores become spaces, otherwise
    // "_0" turns into " 0" and stops matching. The bare-number pattern
    // runs first so "car_1_(2)" keeps its car number.
    let unsuffixed = NUM_SUFFIX_RE.replace(stem, "");
    let unsuffixed = PAREN_SUFFIX_RE.replace(&unsuffixed, "");
    let doc_name = unsuffixed.replace('_', " ").to_lowercase().trim().to_string();

    let grand_prix = match doc_name.find('-') {
        Some(i) => doc_name[..i].trim().to_string(),
        None => doc_name.clone(),
    };

    let remainder = doc_name.replacen(&grand_prix, "", 1).trim().to_string();

    let doc_type = match DOC_TYPE_RE.find(&remainder).map(|m| m.as_str()) {
        Some("offence") => DocType::Offence,
        Some("decision") => DocType::Decision,
        Some("infringement") => DocType::Infringement,
        _ => DocType::Unknown,
    };

    let incident_title = incident_title(&remainder);

    FilenameParts {
        doc_name,
        grand_prix,
        doc_type,
        incident_title,
    }
}

/// The title is what remains after the series code, doc-type keyword and
/// the dashes around them are gone.
fn incident_title(remainder: &str) -> String {
    let mut title = remainder.trim();
    title = title.strip_prefix('-').unwrap_or(title).trim();

    // Only strip the keyword when it leads the title; a keyword later in
    // the text is part of the incident description.
    if TITLE_PREFIX_RE.find(title).is_some_and(|m| m.start() == 0) {
        let stripped = TITLE_PREFIX_RE.replace(title, "");
        return finish_title(stripped.trim());
    }
    finish_title(title)
}

fn finish_title(title: &str) -> String {
    let title = title.strip_prefix('-').unwrap_or(title).trim();
    title.strip_suffix('.').unwrap_or(title).trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_href_with_duplicate_suffix() {
        let parts =
            decompose("/sites/default/files/decision/australian_gp_-_offence_-_turn_4_incident_0.pdf");
        assert_eq!(parts.doc_name, "australian gp - offence - turn 4 incident");
        assert_eq!(parts.grand_prix, "australian gp");
        assert_eq!(parts.doc_type, DocType::Offence);
        assert_eq!(parts.incident_title, "turn 4 incident");
    }

    #[test]
    fn bare_filename_decision() {
        let parts = decompose("monaco_gp_-_decision_-_car_16_pit_lane_speeding.pdf");
        assert_eq!(parts.grand_prix, "monaco gp");
        assert_eq!(parts.doc_type, DocType::Decision);
        assert_eq!(parts.incident_title, "car 16 pit lane speeding");
    }

    #[test]
    fn series_code_stripped_from_title() {
        let parts = decompose("bahrain_gp_-_f2_infringement_-_car_7_track_limits.pdf");
        assert_eq!(parts.doc_type, DocType::Infringement);
        assert_eq!(parts.incident_title, "car 7 track limits");
    }

    #[test]
    fn parenthesised_suffix_stripped() {
        let parts = decompose("austrian_gp_-_decision_-_car_1_(2).pdf");
        assert_eq!(parts.doc_name, "austrian gp - decision - car 1");
    }

    #[test]
    fn trailing_period_stripped_from_title() {
        let parts = decompose("spanish_gp_-_offence_-_car_55_jump_start..pdf");
        assert_eq!(parts.incident_title, "car 55 jump start");
    }

    #[test]
    fn unknown_doc_type_without_keyword() {
        let parts = decompose("italian_gp_-_summons_-_car_44.pdf");
        assert_eq!(parts.doc_type, DocType::Unknown);
    }

    #[test]
    fn no_dash_means_no_type() {
        let parts = decompose("calendar_overview.pdf");
        assert_eq!(parts.doc_type, DocType::Unknown);
        assert_eq!(parts.grand_prix, "calendar overview");
    }
}
