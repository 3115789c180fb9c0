use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::{Config, FIA_DOMAIN};
use crate::error::ListingError;
use crate::record::{Series, SeriesYearDescriptor};

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());
static PUBLISHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2}\.\d{2}\.\d{2,4})(\s+\d{2}:\d{2})?").unwrap());

/// Filename terms marking a penalty document in either dialect,
/// misspelling included.
const DOC_TYPE_TERMS: [&str; 4] = ["decision", "offence", "infringement", "infringment"];

/// One candidate document anchor from a season listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLink {
    /// Absolute URL of the PDF.
    pub url: String,
    /// Lowercased filename, used for filtering and reconstruction.
    pub file_name: String,
    /// Publish timestamp read from the listing, when present.
    pub published: Option<NaiveDateTime>,
}

/// Season discovery: read the year selector off a series' documents
/// index page and derive one descriptor per listed season.
pub async fn discover_series(
    client: &reqwest::Client,
    series: Series,
    cfg: &Config,
) -> Result<Vec<SeriesYearDescriptor>, ListingError> {
    let page_url = cfg.documents_page(series);
    let html = fetch_text(client, page_url).await?;
    let seasons = parse_season_options(&html, page_url)?;

    let current_year = chrono::Utc::now().year();
    let descriptors: Vec<SeriesYearDescriptor> = seasons
        .into_iter()
        .filter(|(year, _)| (cfg.min_descriptor_year..=current_year).contains(year))
        .map(|(year, documents_url)| SeriesYearDescriptor {
            series,
            year,
            documents_url,
        })
        .collect();

    info!(series = %series, seasons = descriptors.len(), "discovered seasons");
    Ok(descriptors)
}

/// Document listing: scan a season page's document list for candidate
/// anchors. Pages whose per-event panels are loaded lazily expose the
/// panel resources via ajax URLs; those are fetched directly and their
/// anchors merged in.
pub async fn list_documents(
    client: &reqwest::Client,
    url: &str,
    cfg: &Config,
) -> Result<Vec<DocumentLink>, ListingError> {
    let html = fetch_text(client, url).await?;

    let mut links = match parse_document_list(&html) {
        Some(links) => links,
        None => {
            let panel_urls = parse_panel_urls(&html);
            if panel_urls.is_empty() {
                return Err(ListingError::DocumentListNotFound(url.to_string()));
            }
            debug!(panels = panel_urls.len(), "expanding season event panels");
            let mut merged = Vec::new();
            for panel_url in panel_urls {
                let fragment = fetch_text(client, &panel_url).await?;
                merged.extend(parse_document_list(&fragment).unwrap_or_default());
            }
            merged
        }
    };

    let before = links.len();
    links.retain(|link| filter_document_name(&link.file_name, cfg));
    info!(url, total = before, accepted = links.len(), "listed documents");
    Ok(links)
}

/// Uniform filename filter: administrative documents are rejected by
/// the disallow list; what remains must name a car and a penalty
/// document type.
pub fn filter_document_name(file_name: &str, cfg: &Config) -> bool {
    let lower = file_name.to_lowercase();
    if cfg
        .disallowed_doc_words
        .iter()
        .any(|word| lower.contains(word))
    {
        return false;
    }
    lower.contains("car") && DOC_TYPE_TERMS.iter().any(|term| lower.contains(term))
}

/// Incremental cutoff: the newest persisted doc_date minus the grace
/// window. Candidates published before this are already ingested.
pub fn incremental_cutoff(latest_doc_date: &str, cfg: &Config) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(latest_doc_date, crate::parser::dates::CANONICAL_FORMAT)
        .ok()
        .map(|dt| dt - cfg.incremental_grace)
}

/// A candidate survives incremental filtering when its publish stamp is
/// at or after the cutoff. Anchors without a readable stamp are kept;
/// over-fetching is safe because dedup drops repeats.
pub fn is_fresh(link: &DocumentLink, cutoff: NaiveDateTime) -> bool {
    link.published.is_none_or(|published| published >= cutoff)
}

/// Parse a locale-layout publish stamp (`02.04.23 16:05`, `02.04.2023`)
/// into a comparable datetime.
pub fn parse_published(text: &str) -> Option<NaiveDateTime> {
    let caps = PUBLISHED_RE.captures(text)?;
    let date_part = &caps[1];
    // dd.mm.yyyy is 10 chars; anything shorter carries a 2-digit year.
    let format = if date_part.len() == 10 { "%d.%m.%Y" } else { "%d.%m.%y" };
    let date = NaiveDate::parse_from_str(date_part, format).ok()?;
    let time = caps
        .get(2)
        .and_then(|m| chrono::NaiveTime::parse_from_str(m.as_str().trim(), "%H:%M").ok())
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    Some(date.and_time(time))
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, ListingError> {
    let fetch_err = |source| ListingError::Fetch {
        url: url.to_string(),
        source,
    };
    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?
        .text()
        .await
        .map_err(fetch_err)
}

/// Scan the decision-document list for PDF anchors. Returns None when
/// the list container itself is absent, which is how a lazily-rendered
/// page looks before its panels load.
fn parse_document_list(html: &str) -> Option<Vec<DocumentLink>> {
    let doc = Html::parse_document(html);
    let list_sel = Selector::parse(".decision-document-list").unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();

    let mut found_container = false;
    let mut links = Vec::new();
    for list in doc.select(&list_sel) {
        found_container = true;
        for anchor in list.select(&anchor_sel) {
            let href = anchor.value().attr("href").unwrap_or_default();
            if !href.to_lowercase().ends_with(".pdf") {
                continue;
            }
            let url = absolutize(href);
            let file_name = url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase();
            links.push(DocumentLink {
                url,
                file_name,
                published: anchor_published(&anchor),
            });
        }
    }

    if found_container { Some(links) } else { None }
}

/// Ajax resources backing collapsed event panels.
fn parse_panel_urls(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let panel_sel = Selector::parse("[data-ajax-url]").unwrap();
    doc.select(&panel_sel)
        .filter_map(|el| el.value().attr("data-ajax-url"))
        .map(absolutize)
        .collect()
}

/// Read the publish stamp from the anchor's enclosing rows, which carry
/// a date text node next to the link.
fn anchor_published(anchor: &ElementRef) -> Option<NaiveDateTime> {
    let mut node = anchor.parent();
    for _ in 0..2 {
        let current = node?;
        if let Some(element) = ElementRef::wrap(current) {
            let text: String = element.text().collect::<Vec<_>>().join(" ");
            if let Some(published) = parse_published(&text) {
                return Some(published);
            }
        }
        node = current.parent();
    }
    None
}

/// First select control whose options carry season years becomes the
/// year selector; each option maps to (year, documents_url).
fn parse_season_options(html: &str, page_url: &str) -> Result<Vec<(i32, String)>, ListingError> {
    let doc = Html::parse_document(html);
    let select_sel = Selector::parse("select").unwrap();
    let option_sel = Selector::parse("option").unwrap();

    for select in doc.select(&select_sel) {
        let mut seasons = Vec::new();
        for option in select.select(&option_sel) {
            let value = option.value().attr("value").unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            let text: String = option.text().collect::<Vec<_>>().join(" ");
            let year = YEAR_RE
                .captures(&text)
                .or_else(|| YEAR_RE.captures(value))
                .and_then(|c| c[1].parse::<i32>().ok());
            if let Some(year) = year {
                seasons.push((year, absolutize(value)));
            }
        }
        if !seasons.is_empty() {
            return Ok(seasons);
        }
    }
    Err(ListingError::SeasonSelectorNotFound(page_url.to_string()))
}

fn absolutize(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", FIA_DOMAIN, href)
    } else {
        format!("{}/{}", FIA_DOMAIN, href)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_only_car_penalty_documents() {
        let cfg = Config::default();
        assert!(filter_document_name("monaco_gp_-_decision_-_car_5.pdf", &cfg));
        assert!(!filter_document_name("monaco_gp_-_schedule.pdf", &cfg));
        assert!(!filter_document_name("monaco_gp_-_reprimand_-_car_3.pdf", &cfg));
        // A decision without a car reference is administrative.
        assert!(!filter_document_name("monaco_gp_-_decision_-_track_limits.pdf", &cfg));
        // The source's misspelling still counts as a document type.
        assert!(filter_document_name("monaco_gp_-_infringment_-_car_9.pdf", &cfg));
    }

    #[test]
    fn listing_page_filter_scenario() {
        let html = r#"
            <div id="list-view"><ul class="decision-document-list">
              <li><a href="/decision/monaco_gp_-_decision_-_car_5.pdf">doc</a></li>
              <li><a href="/decision/monaco_gp_-_schedule.pdf">doc</a></li>
              <li><a href="/decision/monaco_gp_-_reprimand_car.pdf">doc</a></li>
            </ul></div>"#;
        let cfg = Config::default();
        let mut links = parse_document_list(html).unwrap();
        links.retain(|l| filter_document_name(&l.file_name, &cfg));
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].url,
            "https://www.fia.com/decision/monaco_gp_-_decision_-_car_5.pdf"
        );
    }

    #[test]
    fn published_stamp_read_from_enclosing_row() {
        let html = r#"
            <ul class="decision-document-list">
              <li class="document-row">
                <a href="/decision/monaco_gp_-_decision_-_car_5.pdf">doc</a>
                <div class="published"><span>Published on 02.04.23 16:05 CET</span></div>
              </li>
            </ul>"#;
        let links = parse_document_list(html).unwrap();
        assert_eq!(
            links[0].published,
            NaiveDate::from_ymd_opt(2023, 4, 2)
                .unwrap()
                .and_hms_opt(16, 5, 0)
        );
    }

    #[test]
    fn missing_container_is_distinguished_from_empty_list() {
        assert!(parse_document_list("<div><p>no documents here</p></div>").is_none());
        let empty = parse_document_list(r#"<ul class="decision-document-list"></ul>"#);
        assert_eq!(empty, Some(vec![]));
    }

    #[test]
    fn panel_urls_collected_from_ajax_attributes() {
        let html = r#"
            <div class="event-panel" data-ajax-url="/ajax/event/1"></div>
            <div class="event-panel" data-ajax-url="https://www.fia.com/ajax/event/2"></div>"#;
        let urls = parse_panel_urls(html);
        assert_eq!(
            urls,
            vec![
                "https://www.fia.com/ajax/event/1".to_string(),
                "https://www.fia.com/ajax/event/2".to_string(),
            ]
        );
    }

    #[test]
    fn season_selector_yields_year_url_pairs() {
        let html = r#"
            <select name="season">
              <option value="">- Season -</option>
              <option value="/documents/season/season-2023">SEASON 2023</option>
              <option value="/documents/season/season-2022">SEASON 2022</option>
            </select>"#;
        let seasons = parse_season_options(html, "page").unwrap();
        assert_eq!(seasons.len(), 2);
        assert_eq!(seasons[0].0, 2023);
        assert_eq!(
            seasons[0].1,
            "https://www.fia.com/documents/season/season-2023"
        );
    }

    #[test]
    fn missing_selector_is_a_listing_error() {
        let err = parse_season_options("<div>nothing</div>", "page").unwrap_err();
        assert!(matches!(err, ListingError::SeasonSelectorNotFound(_)));
    }

    #[test]
    fn published_date_layouts() {
        let full = parse_published("Published on 02.04.2023 16:05").unwrap();
        assert_eq!(full.format("%Y/%m/%d %H:%M").to_string(), "2023/04/02 16:05");
        let short = parse_published("02.04.23").unwrap();
        assert_eq!(short.format("%Y/%m/%d %H:%M").to_string(), "2023/04/02 00:00");
        assert!(parse_published("no date in sight").is_none());
    }

    #[test]
    fn cutoff_applies_grace_window() {
        let cfg = Config::default();
        let cutoff = incremental_cutoff("2023/04/02 16:05", &cfg).unwrap();
        assert_eq!(
            cutoff,
            NaiveDate::from_ymd_opt(2023, 4, 1)
                .unwrap()
                .and_hms_opt(16, 5, 0)
                .unwrap()
        );

        let stale = DocumentLink {
            url: String::new(),
            file_name: String::new(),
            published: NaiveDate::from_ymd_opt(2023, 3, 30)
                .unwrap()
                .and_hms_opt(12, 0, 0),
        };
        let fresh = DocumentLink {
            published: NaiveDate::from_ymd_opt(2023, 4, 2)
                .unwrap()
                .and_hms_opt(18, 0, 0),
            ..stale.clone()
        };
        let unstamped = DocumentLink {
            published: None,
            ..stale.clone()
        };
        assert!(!is_fresh(&stale, cutoff));
        assert!(is_fresh(&fresh, cutoff));
        assert!(is_fresh(&unstamped, cutoff));
    }
}
