//! Speeding detection against a median-derived plausibility cutoff.

use crate::linkage::UnifiedRecord;
use crate::schema::SPEEDER_CUTOFF_RATIO;

pub struct SpeedingDetector {
    cutoff_ratio: f64,
}

impl SpeedingDetector {
    pub fn new(cutoff_ratio: f64) -> Self {
        Self { cutoff_ratio }
    }

    pub fn with_defaults() -> Self {
        Self::new(SPEEDER_CUTOFF_RATIO)
    }

    /// Flag records whose baseline completion duration is at or below the
    /// cutoff. The cutoff is the ratio times the median of all non-missing
    /// durations in the current dataset, recomputed on every run.
    ///
    /// Returns the cutoff in seconds, `None` when no duration was available.
    pub fn apply(&self, records: &mut [UnifiedRecord]) -> Option<f64> {
        let mut durations: Vec<f64> = records
            .iter()
            .filter_map(|r| r.completion_secs())
            .map(|d| d as f64)
            .collect();

        let cutoff = median(&mut durations).map(|m| m * self.cutoff_ratio);

        let mut flagged = 0usize;
        for record in records.iter_mut() {
            let speeder = match (record.completion_secs(), cutoff) {
                (Some(duration), Some(cutoff)) => duration as f64 <= cutoff,
                _ => false,
            };
            record.flags.speeder = Some(speeder);
            flagged += speeder as usize;
        }

        match cutoff {
            Some(cutoff) => log::info!(
                "⏱️ Speeding: cutoff {:.0}s over {} durations, {} flagged",
                cutoff,
                durations.len(),
                flagged
            ),
            None => log::warn!("⏱️ Speeding: no completion durations available, nothing flagged"),
        }

        cutoff
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
