use crate::record::PenaltyType;

/// Severity-ordered keyword table. Synonyms fold into one canonical
/// category before assignment; only the first match counts, so a
/// decision that both fines and disqualifies a driver classifies as
/// disqualified.
const SEVERITY: &[(&str, PenaltyType)] = &[
    ("disqualified", PenaltyType::Disqualified),
    ("drive through", PenaltyType::DriveThrough),
    ("drive-through", PenaltyType::DriveThrough),
    ("pit lane", PenaltyType::PitLane),
    ("pit-lane", PenaltyType::PitLane),
    ("grid", PenaltyType::Grid),
    ("drop of one position", PenaltyType::Grid),
    ("stop and go", PenaltyType::StopAndGo),
    ("stop & go", PenaltyType::StopAndGo),
    ("time", PenaltyType::Time),
    ("seconds", PenaltyType::Time),
    ("fine", PenaltyType::Fine),
    ("warning", PenaltyType::Warning),
    ("reprimand", PenaltyType::Reprimand),
];

/// Classify a decision's lead sentence into a penalty category.
/// No keyword at all means the stewards took no action.
pub fn classify(decision_lead: &str) -> PenaltyType {
    let text = decision_lead.to_lowercase();
    for (keyword, penalty) in SEVERITY {
        if text.contains(keyword) {
            return *penalty;
        }
    }
    PenaltyType::NoPenalty
}

// ── Tests ──
