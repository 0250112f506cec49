//! Straight-lining (long-string) detection over the declared scales.

use crate::linkage::UnifiedRecord;
use crate::schema::{ScaleDef, SCALES, STRAIGHTLINE_THRESHOLD};

pub struct StraightLineDetector {
    threshold: usize,
}

impl StraightLineDetector {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn with_defaults() -> Self {
        Self::new(STRAIGHTLINE_THRESHOLD)
    }

    /// One boolean per scale per record; `sl_flag` set when strictly more
    /// than the threshold count of scales are straight-lined.
    pub fn apply(&self, records: &mut [UnifiedRecord]) {
        let mut flagged = 0usize;
        for record in records.iter_mut() {
            let straightlined = SCALES
                .iter()
                .filter(|scale| scale_straightlined(record, scale))
                .count();
            let sl_flag = straightlined > self.threshold;
            record.flags.sl_flag = Some(sl_flag);
            flagged += sl_flag as usize;
        }
        log::info!("📏 Straight-lining: {} records flagged", flagged);
    }
}

/// A scale is straight-lined when every counted item is present and every
/// counted item holds the identical value. Embedded non-scale items are
/// skipped; any missing counted item disqualifies the scale.
fn scale_straightlined(record: &UnifiedRecord, scale: &ScaleDef) -> bool {
    let mut first: Option<i64> = None;
    for item in scale.items {
        if scale.excluded.contains(item) {
            continue;
        }
        let Some(value) = record.item(item) else {
            return false;
        };
        match first {
            None => first = Some(value),
            Some(seen) if seen != value => return false,
            Some(_) => {}
        }
    }
    first.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkage::QualityFlags;
    use crate::schema;
    use std::collections::BTreeMap;

    /// Record with every scale item set to a varied, non-identical pattern.
    fn varied_record() -> UnifiedRecord {
        let mut items = BTreeMap::new();
        for (idx, item) in schema::scale_item_ids().iter().enumerate() {
            items.insert(item.to_string(), Some((idx % 3) as i64 + 1));
        }
        UnifiedRecord {
            access_code: "AC1".to_string(),
            entered_at: 1_700_000_000,
            exited_at: None,
            finished: None,
            r_code: None,
            s_code: None,
            ip_address: None,
            age: None,
            birth_year: None,
            birth_month: None,
            province: None,
            cannabis_ever: None,
            cannabis_ever_confirm: None,
            cannabis_freq_3mo: None,
            cannabis_3mo: None,
            cannabis_6mo: None,
            items,
            followup1: None,
            followup2: None,
            flags: QualityFlags::new(),
        }
    }

    fn straightline_scales(record: &mut UnifiedRecord, names: &[&str]) {
        for scale in SCALES.iter().filter(|s| names.contains(&s.name)) {
            for item in scale.items {
                record.items.insert(item.to_string(), Some(2));
            }
        }
    }

    #[test]
    fn test_three_of_five_scales_flag() {
        let mut record = varied_record();
        straightline_scales(&mut record, &["cudit", "sds", "phq"]);
        let mut records = vec![record];
        StraightLineDetector::with_defaults().apply(&mut records);
        assert_eq!(records[0].flags.sl_flag, Some(true));
    }

    #[test]
    fn test_two_of_five_scales_do_not_flag() {
        let mut record = varied_record();
        straightline_scales(&mut record, &["cudit", "sds"]);
        let mut records = vec![record];
        StraightLineDetector::with_defaults().apply(&mut records);
        assert_eq!(records[0].flags.sl_flag, Some(false));
    }

    #[test]
    fn test_missing_item_disqualifies_the_scale() {
        let mut record = varied_record();
        straightline_scales(&mut record, &["cudit", "sds", "phq"]);
        record.items.insert("phq_4".to_string(), None);
        let mut records = vec![record];
        StraightLineDetector::with_defaults().apply(&mut records);
        // phq no longer counts, leaving two scales.
        assert_eq!(records[0].flags.sl_flag, Some(false));
    }

    #[test]
    fn test_embedded_attention_item_is_ignored() {
        let mut record = varied_record();
        straightline_scales(&mut record, &["k10", "cudit", "aaq"]);
        // A deviating attention response must not break the k10 run.
        record.items.insert(schema::ATTENTION_ITEM.to_string(), Some(5));
        let mut records = vec![record];
        StraightLineDetector::with_defaults().apply(&mut records);
        assert_eq!(records[0].flags.sl_flag, Some(true));
    }

    #[test]
    fn test_varied_responses_never_flag() {
        let mut records = vec![varied_record()];
        StraightLineDetector::with_defaults().apply(&mut records);
        assert_eq!(records[0].flags.sl_flag, Some(false));
    }
}
