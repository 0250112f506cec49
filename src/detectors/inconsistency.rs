//! Logical-inconsistency checks over screening and demographic items.

use crate::linkage::UnifiedRecord;
use crate::schema::{
    CANNABIS_EVER_NEVER, CANNABIS_FREQ_NONE, CANNABIS_USE_NO, WEEKS_PER_YEAR,
};
use chrono::{DateTime, NaiveDate};

pub struct InconsistencyDetector;

impl InconsistencyDetector {
    pub fn new() -> Self {
        Self
    }

    /// Write the screening and age flags. The province flag belongs to the
    /// location detector.
    pub fn apply(&self, records: &mut [UnifiedRecord]) {
        let mut flagged = 0usize;
        for record in records.iter_mut() {
            let incon_ever = record.cannabis_ever == Some(CANNABIS_EVER_NEVER)
                || record.cannabis_ever_confirm == Some(CANNABIS_EVER_NEVER);

            let incon_ever_agree = match (record.cannabis_ever, record.cannabis_ever_confirm) {
                (Some(first), Some(second)) => first != second,
                _ => false,
            };

            let incon_freq = record.cannabis_freq_3mo == Some(CANNABIS_FREQ_NONE);

            let incon_recent = record.cannabis_3mo == Some(CANNABIS_USE_NO)
                || record.cannabis_6mo == Some(CANNABIS_USE_NO);

            let incon_age = !age_consistent(record);

            record.flags.incon_ever = Some(incon_ever);
            record.flags.incon_ever_agree = Some(incon_ever_agree);
            record.flags.incon_freq = Some(incon_freq);
            record.flags.incon_recent = Some(incon_recent);
            record.flags.incon_age = Some(incon_age);

            flagged += (incon_ever || incon_ever_agree || incon_freq || incon_recent || incon_age)
                as usize;
        }
        log::info!("🔍 Inconsistency checks: {} records raised at least one flag", flagged);
    }
}

/// Reported age passes when it equals the computed age or trails it by
/// exactly one year (birthday passed since the reported figure). A record
/// that cannot demonstrate consistency (missing age or birth fields, or an
/// unrepresentable birth month) fails.
fn age_consistent(record: &UnifiedRecord) -> bool {
    let (Some(reported), Some(computed)) = (record.age, computed_age(record)) else {
        return false;
    };
    computed == reported || computed == reported + 1
}

/// Age in whole years from the first day of the birth month to the survey
/// date: round(weeks ÷ 52.18).
fn computed_age(record: &UnifiedRecord) -> Option<i64> {
    let birth_year = record.birth_year?;
    let birth_month = record.birth_month?;
    let birth = NaiveDate::from_ymd_opt(birth_year, birth_month, 1)?;
    let survey = DateTime::from_timestamp(record.entered_at, 0)?.date_naive();

    let weeks = (survey - birth).num_days() as f64 / 7.0;
    Some((weeks / WEEKS_PER_YEAR).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkage::QualityFlags;
    use std::collections::BTreeMap;

    // 2024-06-15 00:00:00 UTC
    const SURVEY_TS: i64 = 1_718_409_600;

    fn record() -> UnifiedRecord {
        UnifiedRecord {
            access_code: "AC1".to_string(),
            entered_at: SURVEY_TS,
            exited_at: None,
            finished: None,
            r_code: None,
            s_code: None,
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
            followup1: None,
            followup2: None,
            flags: QualityFlags::new(),
        }
    }

    fn run(record: UnifiedRecord) -> UnifiedRecord {
        let mut records = vec![record];
        InconsistencyDetector::new().apply(&mut records);
        records.pop().unwrap()
    }

    #[test]
    fn test_consistent_record_passes_everything() {
        let checked = run(record());
        assert_eq!(checked.flags.incon_ever, Some(false));
        assert_eq!(checked.flags.incon_ever_agree, Some(false));
        assert_eq!(checked.flags.incon_freq, Some(false));
        assert_eq!(checked.flags.incon_recent, Some(false));
        assert_eq!(checked.flags.incon_age, Some(false));
    }

    #[test]
    fn test_never_used_flags_on_either_screening_item() {
        let mut never = record();
        never.cannabis_ever = Some(CANNABIS_EVER_NEVER);
        assert_eq!(run(never).flags.incon_ever, Some(true));

        let mut confirm_never = record();
        confirm_never.cannabis_ever_confirm = Some(CANNABIS_EVER_NEVER);
        assert_eq!(run(confirm_never).flags.incon_ever, Some(true));
    }

    #[test]
    fn test_screening_disagreement_flags() {
        let mut disagree = record();
        disagree.cannabis_ever = Some(3);
        disagree.cannabis_ever_confirm = Some(4);
        assert_eq!(run(disagree).flags.incon_ever_agree, Some(true));

        let mut half_missing = record();
        half_missing.cannabis_ever_confirm = None;
        assert_eq!(run(half_missing).flags.incon_ever_agree, Some(false));
    }

    #[test]
    fn test_no_recent_use_flags() {
        let mut freq_none = record();
        freq_none.cannabis_freq_3mo = Some(CANNABIS_FREQ_NONE);
        assert_eq!(run(freq_none).flags.incon_freq, Some(true));

        let mut no_3mo = record();
        no_3mo.cannabis_3mo = Some(CANNABIS_USE_NO);
        assert_eq!(run(no_3mo).flags.incon_recent, Some(true));

        let mut no_6mo = record();
        no_6mo.cannabis_6mo = Some(CANNABIS_USE_NO);
        assert_eq!(run(no_6mo).flags.incon_recent, Some(true));
    }

    #[test]
    fn test_age_one_year_behind_computed_passes() {
        // Born 1994-03-01, surveyed 2024-06-15: computed age 30, reported 29.
        let checked = run(record());
        assert_eq!(checked.flags.incon_age, Some(false));
    }

    #[test]
    fn test_age_matching_computed_passes() {
        let mut exact = record();
        exact.age = Some(30);
        assert_eq!(run(exact).flags.incon_age, Some(false));
    }

    #[test]
    fn test_age_two_years_off_flags() {
        // Born 1993-03-01: computed age 31 against reported 29.
        let mut off = record();
        off.birth_year = Some(1993);
        assert_eq!(run(off).flags.incon_age, Some(true));

        // Computed below reported also flags.
        let mut young = record();
        young.age = Some(31);
        assert_eq!(run(young).flags.incon_age, Some(true));
    }

    #[test]
    fn test_missing_birth_fields_flag() {
        let mut no_year = record();
        no_year.birth_year = None;
        assert_eq!(run(no_year).flags.incon_age, Some(true));

        let mut no_age = record();
        no_age.age = None;
        assert_eq!(run(no_age).flags.incon_age, Some(true));

        let mut bad_month = record();
        bad_month.birth_month = Some(13);
        assert_eq!(run(bad_month).flags.incon_age, Some(true));
    }
}
