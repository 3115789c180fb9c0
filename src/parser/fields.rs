use std::collections::HashSet;

use crate::config::Config;
use crate::error::PipelineError;
use crate::record::{FieldValue, IncidentDetails};

/// Closed set of incident-span labels. Anything else in label position
/// is a format error, never a silently invented field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Driver,
    Competitor,
    Time,
    Session,
    Fact,
    Infringement,
    Decision,
}

impl Label {
    fn parse(s: &str) -> Option<Label> {
        match s {
            "Driver" => Some(Label::Driver),
            "Competitor" => Some(Label::Competitor),
            "Time" => Some(Label::Time),
            "Session" => Some(Label::Session),
            "Fact" => Some(Label::Fact),
            "Infringement" => Some(Label::Infringement),
            "Decision" => Some(Label::Decision),
            _ => None,
        }
    }
}

/// An incident value after grouping: either a joined sentence or a list
/// of bulleted items.
#[derive(Debug, Clone, PartialEq)]
enum Grouped {
    Text(String),
    List(Vec<String>),
}

/// Reduce the cleaned incident span to an [`IncidentDetails`] block.
/// `headline` was segmented earlier; `reason` is filled by the caller
/// from the document tail.
pub fn assemble(
    incident: &[String],
    headline: String,
    cfg: &Config,
) -> Result<IncidentDetails, PipelineError> {
    let grouped = group_values(incident, cfg)?;

    let mut driver = None;
    let mut competitor = None;
    let mut time = None;
    let mut session = None;
    let mut fact = None;
    let mut infringement = None;
    let mut decision = None;

    for pair in grouped.chunks(2) {
        let label = match &pair[0] {
            Grouped::Text(s) => {
                Label::parse(s).ok_or_else(|| PipelineError::UnexpectedLabel(s.clone()))?
            }
            Grouped::List(items) => {
                return Err(PipelineError::UnexpectedLabel(items.join(" ")));
            }
        };
        let value = pair.get(1).cloned().unwrap_or(Grouped::Text(String::new()));

        match (label, value) {
            (Label::Driver, Grouped::Text(s)) => driver = Some(s),
            (Label::Competitor, Grouped::Text(s)) => competitor = Some(s),
            (Label::Time, Grouped::Text(s)) => time = Some(s),
            (Label::Session, Grouped::Text(s)) => session = Some(s),
            (Label::Fact, Grouped::Text(s)) => fact = Some(FieldValue::Prose(s)),
            (Label::Fact, Grouped::List(v)) => fact = Some(FieldValue::Items(v)),
            (Label::Infringement, Grouped::Text(s)) => infringement = Some(s),
            // The infringement span is always joined to prose; a list in
            // its position means the grouping went off the rails.
            (Label::Infringement, Grouped::List(v)) => infringement = Some(v.join(" ")),
            (Label::Decision, Grouped::Text(s)) => decision = Some(vec![s]),
            (Label::Decision, Grouped::List(v)) => decision = Some(v),
            (label, Grouped::List(items)) => {
                return Err(PipelineError::UnexpectedLabel(format!(
                    "{:?}: {}",
                    label,
                    items.join(" ")
                )));
            }
        }
    }

    let mut missing = Vec::new();
    let mut require = |name: &str, present: bool| {
        if !present {
            missing.push(name.to_string());
        }
    };
    require("Driver", driver.is_some());
    require("Competitor", competitor.is_some());
    require("Time", time.is_some());
    require("Fact", fact.is_some());
    require("Infringement", infringement.is_some());
    require("Decision", decision.is_some());
    if !missing.is_empty() {
        return Err(PipelineError::MalformedDocument { missing });
    }

    Ok(IncidentDetails {
        headline,
        driver: driver.unwrap_or_default(),
        competitor: competitor.unwrap_or_default(),
        time: time.unwrap_or_default(),
        // Older templates omit the session entirely.
        session: session.unwrap_or_else(|| "N/A".to_string()),
        fact: fact.unwrap_or(FieldValue::Prose(String::new())),
        infringement: infringement.unwrap_or_default(),
        decision: decision.unwrap_or_default(),
        reason: String::new(),
    })
}

/// Group the multi-fragment spans that follow Fact, Infringement and
/// Decision. Fact and Decision values are either one sentence spread
/// over several fragments (joined with spaces) or a colon-led list of
/// short items; the infringement text is always one sentence. A skip-set
/// keeps fragments consumed by a group from being visited again.
fn group_values(data: &[String], cfg: &Config) -> Result<Vec<Grouped>, PipelineError> {
    let mut out = Vec::with_capacity(data.len());
    let mut skip: HashSet<usize> = HashSet::new();

    for index in 0..data.len() {
        if skip.contains(&index) {
            continue;
        }
        let prev = index.checked_sub(1).map(|i| data[i].as_str());

        match prev {
            Some("Fact") => {
                if data[index].ends_with(':') {
                    out.push(Grouped::List(collect_list(
                        data,
                        index,
                        Some("Infringement"),
                        &mut skip,
                        cfg,
                    )?));
                } else {
                    out.push(Grouped::Text(collect_prose(
                        data,
                        index,
                        Some("Infringement"),
                        &mut skip,
                    )?));
                }
            }
            Some("Infringement") => {
                out.push(Grouped::Text(collect_prose(
                    data,
                    index,
                    Some("Decision"),
                    &mut skip,
                )?));
            }
            Some("Decision") => {
                if data[index].ends_with(':') {
                    out.push(Grouped::List(collect_list(data, index, None, &mut skip, cfg)?));
                } else {
                    out.push(Grouped::Text(collect_prose(data, index, None, &mut skip)?));
                }
            }
            _ => out.push(Grouped::Text(data[index].clone())),
        }
    }

    Ok(out)
}

/// Join a value run into one sentence, stopping at `until` (or the end
/// of the span when `until` is None).
fn collect_prose(
    data: &[String],
    start: usize,
    until: Option<&str>,
    skip: &mut HashSet<usize>,
) -> Result<String, PipelineError> {
    let mut parts = Vec::new();
    let mut i = start;
    while i < data.len() && Some(data[i].as_str()) != until {
        parts.push(data[i].as_str());
        skip.insert(i);
        i += 1;
    }
    if until.is_some() && i == data.len() {
        return Err(PipelineError::MalformedDocument {
            missing: vec![until.unwrap_or_default().to_string()],
        });
    }
    Ok(parts.join(" "))
}

/// Collect a bulleted list, re-gluing an item with its successor when
/// the successor is short enough to be an accidental line split.
fn collect_list(
    data: &[String],
    start: usize,
    until: Option<&str>,
    skip: &mut HashSet<usize>,
    cfg: &Config,
) -> Result<Vec<String>, PipelineError> {
    let mut items = Vec::new();
    let mut i = start;
    while i < data.len() && Some(data[i].as_str()) != until {
        let next = data
            .get(i + 1)
            .filter(|n| Some(n.as_str()) != until)
            .map(String::as_str);
        match next {
            Some(n) if n.len() < cfg.glue_fragment_len => {
                items.push(format!("{} {}", data[i], n));
                skip.insert(i);
                skip.insert(i + 1);
                i += 2;
            }
            _ => {
                items.push(data[i].clone());
                skip.insert(i);
                i += 1;
            }
        }
    }
    if until.is_some() && i == data.len() {
        return Err(PipelineError::MalformedDocument {
            missing: vec![until.unwrap_or_default().to_string()],
        });
    }
    Ok(items)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::default()
    }

    fn span(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn base_span() -> Vec<String> {
        span(&[
            "Driver",
            "44 - Lewis Hamilton",
            "Competitor",
            "Mercedes",
            "Time",
            "14:05",
            "Session",
            "Race",
            "Fact",
            "Collision with Car 14.",
            "Infringement",
            "Breach of Article 2.1.",
            "Decision",
            "Drive through penalty.",
        ])
    }

    #[test]
    fn simple_fields_pair_up() {
        let details = assemble(&base_span(), "headline".into(), &cfg()).unwrap();
        assert_eq!(details.driver, "44 - Lewis Hamilton");
        assert_eq!(details.competitor, "Mercedes");
        assert_eq!(details.time, "14:05");
        assert_eq!(details.session, "Race");
        assert_eq!(details.infringement, "Breach of Article 2.1.");
    }

    #[test]
    fn multi_fragment_fact_joins_to_prose() {
        let mut data = base_span();
        data.splice(
            9..10,
            span(&[
                "The driver of Car 44 attempted an overtake",
                "and made contact with Car 14,",
                "forcing it off the track.",
            ]),
        );
        let details = assemble(&data, String::new(), &cfg()).unwrap();
        assert_eq!(
            details.fact,
            FieldValue::Prose(
                "The driver of Car 44 attempted an overtake and made contact with Car 14, \
                 forcing it off the track."
                    .into()
            )
        );
    }

    #[test]
    fn colon_led_fact_becomes_list() {
        let mut data = base_span();
        data.splice(
            9..10,
            span(&["Parts replaced:", "Survival cell", "Front wing assembly"]),
        );
        let details = assemble(&data, String::new(), &cfg()).unwrap();
        assert_eq!(
            details.fact,
            FieldValue::Items(vec![
                "Parts replaced:".into(),
                "Survival cell".into(),
                "Front wing assembly".into(),
            ])
        );
    }

    #[test]
    fn short_successor_is_reglued() {
        let mut data = base_span();
        data.splice(
            9..10,
            span(&["Parts replaced:", "Gear", "box", "Front wing assembly"]),
        );
        let details = assemble(&data, String::new(), &cfg()).unwrap();
        assert_eq!(
            details.fact,
            FieldValue::Items(vec![
                "Parts replaced:".into(),
                "Gear box".into(),
                "Front wing assembly".into(),
            ])
        );
    }

    #[test]
    fn decision_prose_wraps_in_single_element_list() {
        let details = assemble(&base_span(), String::new(), &cfg()).unwrap();
        assert_eq!(details.decision, vec!["Drive through penalty.".to_string()]);
    }

    #[test]
    fn decision_multi_fragment_joins_before_wrapping() {
        let mut data = base_span();
        data.extend(span(&["No further action taken against", "the competitor."]));
        data.remove(13);
        let details = assemble(&data, String::new(), &cfg()).unwrap();
        assert_eq!(
            details.decision,
            vec!["No further action taken against the competitor.".to_string()]
        );
    }

    #[test]
    fn colon_led_decision_stays_a_list() {
        let mut data = base_span();
        data.truncate(13);
        data.extend(span(&[
            "The following penalties are imposed:",
            "Ten second time penalty",
            "Two penalty points",
        ]));
        let details = assemble(&data, String::new(), &cfg()).unwrap();
        assert_eq!(details.decision.len(), 3);
        assert!(details.decision[0].ends_with(':'));
    }

    #[test]
    fn session_defaults_when_template_omits_it() {
        let data: Vec<String> = base_span()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != 6 && *i != 7)
            .map(|(_, s)| s)
            .collect();
        let details = assemble(&data, String::new(), &cfg()).unwrap();
        assert_eq!(details.session, "N/A");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut data = base_span();
        data[2] = "Constructor".to_string();
        let err = assemble(&data, String::new(), &cfg()).unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedLabel(ref l) if l == "Constructor"));
    }

    #[test]
    fn fact_without_infringement_terminator_fails() {
        let data = span(&["Driver", "44", "Fact", "Collision.", "Decision", "Fine."]);
        let err = assemble(&data, String::new(), &cfg()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument { .. }));
    }
}
