//! Merges the five capture streams into unified records.
//!
//! Join rules:
//! - a missing access code never matches anything, including another
//!   missing access code;
//! - duplicate submissions per access code keep the greatest entrance
//!   timestamp, ties resolved to the last occurrence in input order;
//! - baseline rows without an access code are discarded outright, not
//!   flagged;
//! - access codes seen only in follow-up 2 get a synthesized all-missing
//!   follow-up-1 row so the participant is not lost.

use super::record::{FollowupResponses, UnifiedRecord};
use crate::capture::{CaptureStore, FollowupCapture};
use crate::schema::Arm;
use std::collections::{HashMap, HashSet};

pub struct RecordLinker;

impl RecordLinker {
    pub fn new() -> Self {
        Self
    }

    /// Produce one unified record per retained baseline row, in baseline
    /// input order.
    pub fn link(&self, store: &CaptureStore) -> Vec<UnifiedRecord> {
        let mut followups: HashMap<String, (Option<FollowupResponses>, Option<FollowupResponses>)> =
            HashMap::new();

        for arm in Arm::all() {
            let arm_joined = join_arm(store.followup1(arm), store.followup2(arm));
            for (code, pair) in arm_joined {
                // A code surfacing in both arms is a duplicate submission
                // across joins; the pair with the greatest entrance wins.
                let keep_existing = followups
                    .get(&code)
                    .map(|existing| pair_entrance(existing) > pair_entrance(&pair))
                    .unwrap_or(false);
                if !keep_existing {
                    followups.insert(code, pair);
                }
            }
        }

        let mut dropped_baseline = 0usize;
        let mut records = Vec::new();
        for capture in &store.baseline {
            let Some(access_code) = capture.access_code.clone() else {
                // Missing access code on a baseline submission marks a
                // corrupted link; hard discard.
                dropped_baseline += 1;
                continue;
            };

            let mut record = UnifiedRecord::from_baseline(capture, access_code);
            if let Some((f1, f2)) = followups.get(&record.access_code) {
                record.followup1 = f1.clone();
                record.followup2 = f2.clone();
            }
            records.push(record);
        }

        if dropped_baseline > 0 {
            log::warn!(
                "Discarded {} baseline rows with missing access codes",
                dropped_baseline
            );
        }
        let unmatched = followups
            .keys()
            .filter(|code| !records.iter().any(|r| &r.access_code == *code))
            .count();
        if unmatched > 0 {
            log::debug!("{} follow-up access codes never appear in baseline", unmatched);
        }

        records
    }
}

/// Latest-entrance survivor per access code. Rows without an access code are
/// unjoinable and fall away here. `>=` keeps the last occurrence on ties.
fn dedupe_latest(rows: &[FollowupCapture]) -> HashMap<String, FollowupResponses> {
    let mut survivors: HashMap<String, FollowupResponses> = HashMap::new();
    for capture in rows {
        let Some(row) = FollowupResponses::from_capture(capture) else {
            continue;
        };
        let replace = survivors
            .get(&row.access_code)
            .map(|existing| row.entered_at >= existing.entered_at)
            .unwrap_or(true);
        if replace {
            survivors.insert(row.access_code.clone(), row);
        }
    }
    survivors
}

/// Full outer join of one arm's two follow-up waves on access code, after
/// backfilling placeholder rows for wave-2-only codes.
fn join_arm(
    followup1: &[FollowupCapture],
    followup2: &[FollowupCapture],
) -> HashMap<String, (Option<FollowupResponses>, Option<FollowupResponses>)> {
    let mut wave1 = dedupe_latest(followup1);
    let wave2 = dedupe_latest(followup2);

    // Set difference, then one bulk append of placeholders.
    let wave2_only: Vec<String> = wave2
        .keys()
        .filter(|code| !wave1.contains_key(*code))
        .cloned()
        .collect();
    for code in &wave2_only {
        wave1.insert(code.clone(), FollowupResponses::placeholder(code));
    }

    let codes: HashSet<String> = wave1.keys().chain(wave2.keys()).cloned().collect();
    codes
        .into_iter()
        .map(|code| {
            let pair = (wave1.get(&code).cloned(), wave2.get(&code).cloned());
            (code, pair)
        })
        .collect()
}

/// Greatest entrance timestamp present anywhere in a joined pair.
fn pair_entrance(
    pair: &(Option<FollowupResponses>, Option<FollowupResponses>),
) -> Option<i64> {
    let first = pair.0.as_ref().and_then(|r| r.entered_at);
    let second = pair.1.as_ref().and_then(|r| r.entered_at);
    first.max(second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::BaselineCapture;
    use std::collections::BTreeMap;

    fn followup(access_code: Option<&str>, entered_at: i64) -> FollowupCapture {
        let mut responses = BTreeMap::new();
        responses.insert("mood_1".to_string(), serde_json::json!(entered_at));
        FollowupCapture {
            access_code: access_code.map(String::from),
            entered_at: Some(entered_at),
            exited_at: Some(entered_at + 600),
            finished: Some(true),
            responses,
        }
    }

    fn baseline(access_code: Option<&str>, entered_at: i64) -> BaselineCapture {
        BaselineCapture {
            access_code: access_code.map(String::from),
            entered_at,
            exited_at: Some(entered_at + 1200),
            finished: Some(true),
            r_code: Some("7AX".to_string()),
            s_code: Some("QW3RT9UP42".to_string()),
            ip_address: None,
            age: Some(29),
            birth_year: Some(1994),
            birth_month: Some(3),
            province: None,
            cannabis_ever: Some(3),
            cannabis_ever_confirm: Some(3),
            cannabis_freq_3mo: Some(4),
            cannabis_3mo: Some(1),
            cannabis_6mo: Some(1),
            items: BTreeMap::new(),
        }
    }

    fn store(
        baseline_rows: Vec<BaselineCapture>,
        f1c: Vec<FollowupCapture>,
        f2c: Vec<FollowupCapture>,
    ) -> CaptureStore {
        CaptureStore {
            baseline: baseline_rows,
            followup1_control: f1c,
            followup1_intervention: Vec::new(),
            followup2_control: f2c,
            followup2_intervention: Vec::new(),
        }
    }

    #[test]
    fn test_wave2_only_code_gets_placeholder_wave1_row() {
        let store = store(
            vec![baseline(Some("AC1"), 1000)],
            vec![],
            vec![followup(Some("AC1"), 5000)],
        );
        let records = RecordLinker::new().link(&store);
        assert_eq!(records.len(), 1);

        let f1 = records[0].followup1.as_ref().unwrap();
        assert!(f1.is_placeholder());
        assert_eq!(f1.access_code, "AC1");
        assert!(records[0].followup2.is_some());
    }

    #[test]
    fn test_duplicate_followups_keep_greatest_entrance() {
        let store = store(
            vec![baseline(Some("AC1"), 1000)],
            vec![
                followup(Some("AC1"), 5000),
                followup(Some("AC1"), 9000),
                followup(Some("AC1"), 7000),
            ],
            vec![],
        );
        let records = RecordLinker::new().link(&store);
        let f1 = records[0].followup1.as_ref().unwrap();
        assert_eq!(f1.entered_at, Some(9000));
    }

    #[test]
    fn test_duplicate_tie_keeps_last_occurrence() {
        let mut early = followup(Some("AC1"), 5000);
        early.responses.insert("order".to_string(), serde_json::json!("first"));
        let mut late = followup(Some("AC1"), 5000);
        late.responses.insert("order".to_string(), serde_json::json!("second"));

        let store = store(vec![baseline(Some("AC1"), 1000)], vec![early, late], vec![]);
        let records = RecordLinker::new().link(&store);
        let f1 = records[0].followup1.as_ref().unwrap();
        assert_eq!(f1.responses["order"], serde_json::json!("second"));
    }

    #[test]
    fn test_missing_access_codes_never_match() {
        let store = store(
            vec![baseline(Some("AC1"), 1000)],
            vec![followup(None, 5000)],
            vec![followup(None, 6000)],
        );
        let records = RecordLinker::new().link(&store);
        assert_eq!(records.len(), 1);
        assert!(records[0].followup1.is_none());
        assert!(records[0].followup2.is_none());
    }

    #[test]
    fn test_baseline_missing_access_code_is_discarded() {
        let store = store(
            vec![baseline(None, 1000), baseline(Some("AC2"), 2000)],
            vec![],
            vec![],
        );
        let records = RecordLinker::new().link(&store);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].access_code, "AC2");
    }

    #[test]
    fn test_no_followup_material_yields_all_missing() {
        let store = store(vec![baseline(Some("AC1"), 1000)], vec![], vec![]);
        let records = RecordLinker::new().link(&store);
        assert!(records[0].followup1.is_none());
        assert!(records[0].followup2.is_none());
    }

    #[test]
    fn test_duplicate_baseline_rows_both_survive() {
        let store = store(
            vec![baseline(Some("AC1"), 1000), baseline(Some("AC1"), 2000)],
            vec![followup(Some("AC1"), 5000)],
            vec![],
        );
        let records = RecordLinker::new().link(&store);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.followup1.is_some()));
    }

    #[test]
    fn test_both_waves_join_on_code() {
        let store = store(
            vec![baseline(Some("AC1"), 1000)],
            vec![followup(Some("AC1"), 5000)],
            vec![followup(Some("AC1"), 9000)],
        );
        let records = RecordLinker::new().link(&store);
        let record = &records[0];
        assert_eq!(record.followup1.as_ref().unwrap().entered_at, Some(5000));
        assert_eq!(record.followup2.as_ref().unwrap().entered_at, Some(9000));
    }
}
