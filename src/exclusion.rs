//! Final exclusion decision: the OR of every quality flag.

use crate::linkage::UnifiedRecord;

#[derive(Debug)]
pub enum ExclusionError {
    /// A required upstream flag was never written; the run must abort.
    MissingFlag {
        access_code: String,
        flag: &'static str,
    },
}

impl std::fmt::Display for ExclusionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionError::MissingFlag { access_code, flag } => {
                write!(
                    f,
                    "record '{}' reached aggregation without flag '{}'",
                    access_code, flag
                )
            }
        }
    }
}

impl std::error::Error for ExclusionError {}

pub struct ExclusionAggregator;

impl ExclusionAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Compute `exclude` per record. Any single raised flag excludes; there
    /// is no weighting. Every flag except `incon_province` must already be
    /// written — `incon_province` may remain unset after a degraded lookup
    /// and then contributes nothing.
    pub fn apply(&self, records: &mut [UnifiedRecord]) -> Result<(), ExclusionError> {
        let mut excluded = 0usize;
        for record in records.iter_mut() {
            let flags = &record.flags;
            let required = [
                ("invalid_code", flags.invalid_code),
                ("blank_code", flags.blank_code),
                ("ac_duplicate", flags.ac_duplicate),
                ("speeder", flags.speeder),
                ("sl_flag", flags.sl_flag),
                ("incon_ever", flags.incon_ever),
                ("incon_ever_agree", flags.incon_ever_agree),
                ("incon_freq", flags.incon_freq),
                ("incon_recent", flags.incon_recent),
                ("incon_age", flags.incon_age),
                ("attncheck_fail", flags.attncheck_fail),
                ("withdrew", flags.withdrew),
            ];

            let mut exclude = false;
            for (name, value) in required {
                match value {
                    Some(raised) => exclude = exclude || raised,
                    None => {
                        return Err(ExclusionError::MissingFlag {
                            access_code: record.access_code.clone(),
                            flag: name,
                        })
                    }
                }
            }
            exclude = exclude || flags.incon_province.unwrap_or(false);

            record.flags.exclude = Some(exclude);
            excluded += exclude as usize;
        }

        log::info!(
            "⚖️ Exclusion: {} of {} records excluded",
            excluded,
            records.len()
        );
        Ok(())
    }
}
