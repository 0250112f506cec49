//! Location-consistency check: self-reported province against the region
//! resolved from the submission IP.

use crate::linkage::UnifiedRecord;
use std::collections::HashMap;

/// Canadian province and territory abbreviations as they appear in survey
/// exports, normalized to the region names the lookup service returns.
const PROVINCE_ALIASES: &[(&str, &str)] = &[
    ("ab", "alberta"),
    ("bc", "british columbia"),
    ("mb", "manitoba"),
    ("nb", "new brunswick"),
    ("nl", "newfoundland and labrador"),
    ("ns", "nova scotia"),
    ("nt", "northwest territories"),
    ("nu", "nunavut"),
    ("on", "ontario"),
    ("pe", "prince edward island"),
    ("qc", "quebec"),
    ("sk", "saskatchewan"),
    ("yt", "yukon"),
];

pub struct LocationDetector;

impl LocationDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compare each record's province against its resolved region.
    ///
    /// `regions` maps record identifier → lookup result, where the result is
    /// `Some(region)` or `Some(None)` for a definitive no-region answer.
    /// A record with no entry at all (lookup never resolved) keeps its flag
    /// unset; missing values on either side never flag.
    pub fn apply(
        &self,
        records: &mut [UnifiedRecord],
        regions: &HashMap<String, Option<String>>,
    ) {
        let mut flagged = 0usize;
        let mut unresolved = 0usize;
        for record in records.iter_mut() {
            let Some(lookup) = regions.get(&record.access_code) else {
                unresolved += 1;
                continue;
            };
            let mismatch = match (&record.province, lookup) {
                (Some(province), Some(region)) => normalize(province) != normalize(region),
                _ => false,
            };
            record.flags.incon_province = Some(mismatch);
            flagged += mismatch as usize;
        }
        log::info!(
            "🌐 Location consistency: {} mismatches, {} lookups unresolved",
            flagged,
            unresolved
        );
    }
}

fn normalize(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    for (abbrev, full) in PROVINCE_ALIASES {
        if lowered == *abbrev {
            return (*full).to_string();
        }
    }
    lowered
}
