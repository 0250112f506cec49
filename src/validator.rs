//! Identity validation against the issued-code registry.
//!
//! Three independent flags per record, computed unconditionally; no identity
//! (test entries included) is exempt. Flags are not mutually exclusive: a
//! placeholder composite typically raises both `blank_code` and
//! `invalid_code`.

use crate::linkage::UnifiedRecord;
use crate::registry::IssuedCodeRegistry;
use crate::schema::{COMPOSITE_CODE_LEN, MISSING_CODE_PLACEHOLDER};
use std::collections::HashMap;

pub struct IdentityValidator;

impl IdentityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Write `invalid_code`, `blank_code` and `ac_duplicate` on every record.
    pub fn apply(&self, records: &mut [UnifiedRecord], registry: &IssuedCodeRegistry) {
        let mut code_counts: HashMap<String, usize> = HashMap::new();
        for record in records.iter() {
            *code_counts.entry(record.access_code.clone()).or_insert(0) += 1;
        }

        let mut invalid = 0usize;
        let mut blank = 0usize;
        let mut duplicated = 0usize;
        for record in records.iter_mut() {
            let composite = record.composite_code();

            let invalid_code = match &composite {
                Some(code) if !code.is_empty() => !registry.contains(code),
                _ => false,
            };
            let blank_code = match &composite {
                None => true,
                Some(code) => {
                    code.len() != COMPOSITE_CODE_LEN || code == MISSING_CODE_PLACEHOLDER
                }
            };
            let ac_duplicate = code_counts[record.access_code.as_str()] > 1;

            record.flags.invalid_code = Some(invalid_code);
            record.flags.blank_code = Some(blank_code);
            record.flags.ac_duplicate = Some(ac_duplicate);

            invalid += invalid_code as usize;
            blank += blank_code as usize;
            duplicated += ac_duplicate as usize;
        }

        log::info!(
            "🪪 Identity validation: {} invalid, {} blank, {} duplicated access codes",
            invalid,
            blank,
            duplicated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkage::QualityFlags;
    use std::collections::BTreeMap;

    fn record(access_code: &str, s_code: Option<&str>, r_code: Option<&str>) -> UnifiedRecord {
        UnifiedRecord {
            access_code: access_code.to_string(),
            entered_at: 1_700_000_000,
            exited_at: None,
            finished: None,
            r_code: r_code.map(String::from),
            s_code: s_code.map(String::from),
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
            items: BTreeMap::new(),
            followup1: None,
            followup2: None,
            flags: QualityFlags::new(),
        }
    }

    fn registry() -> IssuedCodeRegistry {
        IssuedCodeRegistry::from_pairs(vec![("7AX".to_string(), "QW3RT9UP42".to_string())])
    }

    #[test]
    fn test_registered_code_passes() {
        let mut records = vec![record("AC1", Some("QW3RT9UP42"), Some("7AX"))];
        IdentityValidator::new().apply(&mut records, &registry());
        assert_eq!(records[0].flags.invalid_code, Some(false));
        assert_eq!(records[0].flags.blank_code, Some(false));
        assert_eq!(records[0].flags.ac_duplicate, Some(false));
    }

    #[test]
    fn test_unregistered_code_is_invalid_but_not_blank() {
        let mut records = vec![record("AC1", Some("ZZZZZZZZZZ"), Some("9KZ"))];
        IdentityValidator::new().apply(&mut records, &registry());
        assert_eq!(records[0].flags.invalid_code, Some(true));
        assert_eq!(records[0].flags.blank_code, Some(false));
    }

    #[test]
    fn test_missing_half_is_blank_not_invalid() {
        let mut records = vec![record("AC1", Some("QW3RT9UP42"), None)];
        IdentityValidator::new().apply(&mut records, &registry());
        assert_eq!(records[0].flags.invalid_code, Some(false));
        assert_eq!(records[0].flags.blank_code, Some(true));
    }

    #[test]
    fn test_placeholder_literal_raises_both() {
        // Upstream placeholder halves survive parsing verbatim.
        let mut records = vec![record("AC1", Some("NA"), Some("NA"))];
        IdentityValidator::new().apply(&mut records, &registry());
        assert_eq!(records[0].flags.invalid_code, Some(true));
        assert_eq!(records[0].flags.blank_code, Some(true));
    }

    #[test]
    fn test_wrong_length_composite_is_blank() {
        let mut records = vec![record("AC1", Some("SHORT"), Some("7AX"))];
        IdentityValidator::new().apply(&mut records, &registry());
        assert_eq!(records[0].flags.blank_code, Some(true));
        assert_eq!(records[0].flags.invalid_code, Some(true));
    }

    #[test]
    fn test_duplicate_access_codes_flag_every_holder() {
        let mut records = vec![
            record("AC1", Some("QW3RT9UP42"), Some("7AX")),
            record("AC1", Some("QW3RT9UP42"), Some("7AX")),
            record("AC2", Some("QW3RT9UP42"), Some("7AX")),
        ];
        IdentityValidator::new().apply(&mut records, &registry());
        assert_eq!(records[0].flags.ac_duplicate, Some(true));
        assert_eq!(records[1].flags.ac_duplicate, Some(true));
        assert_eq!(records[2].flags.ac_duplicate, Some(false));
    }
}
