//! Instructed-response attention check.

use crate::linkage::UnifiedRecord;
use crate::schema::{ATTENTION_EXPECTED, ATTENTION_ITEM};

pub struct AttentionDetector {
    expected: i64,
}

impl AttentionDetector {
    pub fn new(expected: i64) -> Self {
        Self { expected }
    }

    pub fn with_defaults() -> Self {
        Self::new(ATTENTION_EXPECTED)
    }

    /// Flag anything other than the designated response, a skipped item
    /// included.
    pub fn apply(&self, records: &mut [UnifiedRecord]) {
        let mut flagged = 0usize;
        for record in records.iter_mut() {
            let fail = record.item(ATTENTION_ITEM) != Some(self.expected);
            record.flags.attncheck_fail = Some(fail);
            flagged += fail as usize;
        }
        log::info!("🎯 Attention check: {} records failed", flagged);
    }
}
