//! Pipeline engine: runs the reconciliation stages in dependency order.
//!
//! ```text
//! CaptureStore → RecordLinker
//!     ↓
//! IdentityValidator ─┐
//! SpeedingDetector   │ independent flag writers
//! StraightLine…      │ (disjoint columns, any order)
//! Inconsistency…     │
//! Location…          ┘
//!     ↓
//! ExclusionAggregator → recruitment counter upsert
//! ```
//!
//! The geolocation stage is the only external call: it resolves regions for
//! identifiers absent from the cache, persists new answers, and degrades to
//! cached-only on any service fault.

use crate::capture::{CaptureError, CaptureStore};
use crate::detectors::{
    AttentionDetector, InconsistencyDetector, LocationDetector, SpeedingDetector,
    StraightLineDetector,
};
use crate::exclusion::{ExclusionAggregator, ExclusionError};
use crate::geolocate::{GeoError, IpQuery, RegionLookup};
use crate::linkage::{RecordLinker, UnifiedRecord};
use crate::registry::{IssuedCodeRegistry, RegistryError};
use crate::schema::{self, SchemaError};
use crate::store::{StateStore, StoreError};
use crate::validator::IdentityValidator;
use std::collections::HashSet;

#[derive(Debug)]
pub enum PipelineError {
    Capture(CaptureError),
    Registry(RegistryError),
    Schema(SchemaError),
    Store(StoreError),
    Exclusion(ExclusionError),
    Io(std::io::Error),
}

impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::Capture(err)
    }
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        PipelineError::Registry(err)
    }
}

impl From<SchemaError> for PipelineError {
    fn from(err: SchemaError) -> Self {
        PipelineError::Schema(err)
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Store(err)
    }
}

impl From<ExclusionError> for PipelineError {
    fn from(err: ExclusionError) -> Self {
        PipelineError::Exclusion(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Capture(e) => write!(f, "capture fault: {}", e),
            PipelineError::Registry(e) => write!(f, "registry fault: {}", e),
            PipelineError::Schema(e) => write!(f, "schema fault: {}", e),
            PipelineError::Store(e) => write!(f, "state store fault: {}", e),
            PipelineError::Exclusion(e) => write!(f, "aggregation fault: {}", e),
            PipelineError::Io(e) => write!(f, "IO fault: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Simple counts reported after a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: usize,
    pub excluded: usize,
    pub eligible: usize,
    pub new_lookups: usize,
    pub speeder_cutoff_secs: Option<f64>,
}

pub struct ReconcilePipeline {
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl ReconcilePipeline {
    pub fn new() -> Self {
        Self::new_with_timestamp_fn(Box::new(|| chrono::Utc::now().timestamp()))
    }

    /// Deterministic timestamps for tests.
    pub fn new_with_timestamp_fn(now_fn: Box<dyn Fn() -> i64 + Send + Sync>) -> Self {
        Self { now_fn }
    }

    pub async fn run(
        &self,
        captures: &CaptureStore,
        registry: &IssuedCodeRegistry,
        withdrawals: &HashSet<String>,
        geo: Option<&dyn RegionLookup>,
        state: &StateStore,
    ) -> Result<(Vec<UnifiedRecord>, RunSummary), PipelineError> {
        schema::validate_scales()?;

        let mut records = RecordLinker::new().link(captures);
        log::info!("🔗 Linked {} unified records", records.len());

        IdentityValidator::new().apply(&mut records, registry);
        let speeder_cutoff_secs = SpeedingDetector::with_defaults().apply(&mut records);
        StraightLineDetector::with_defaults().apply(&mut records);
        InconsistencyDetector::new().apply(&mut records);
        AttentionDetector::with_defaults().apply(&mut records);

        let new_lookups = self.resolve_locations(&mut records, geo, state).await?;

        for record in records.iter_mut() {
            record.flags.withdrew = Some(withdrawals.contains(&record.access_code));
        }

        ExclusionAggregator::new().apply(&mut records)?;

        let excluded = records
            .iter()
            .filter(|r| r.flags.exclude == Some(true))
            .count();
        let eligible = records.len() - excluded;

        let now = (self.now_fn)();
        if let Some(date) = chrono::DateTime::from_timestamp(now, 0) {
            let date = date.format("%Y-%m-%d").to_string();
            state.upsert_recruitment(&date, eligible as i64, now)?;
            log::info!("📅 Recruitment log: {} eligible as of {}", eligible, date);
        } else {
            log::warn!("Clock returned an unrepresentable timestamp; recruitment log skipped");
        }

        let summary = RunSummary {
            records: records.len(),
            excluded,
            eligible,
            new_lookups,
            speeder_cutoff_secs,
        };
        Ok((records, summary))
    }

    /// Resolve regions for identifiers the cache has never seen, persist the
    /// new answers, and run the location detector over the merged view.
    /// Service faults degrade to cached-only coverage.
    async fn resolve_locations(
        &self,
        records: &mut [UnifiedRecord],
        geo: Option<&dyn RegionLookup>,
        state: &StateStore,
    ) -> Result<usize, PipelineError> {
        let mut cache = state.load_location_cache()?;

        let pending: Vec<IpQuery> = {
            let mut seen: HashSet<&str> = HashSet::new();
            records
                .iter()
                .filter(|r| !cache.contains_key(&r.access_code))
                .filter(|r| seen.insert(r.access_code.as_str()))
                .filter_map(|r| {
                    r.ip_address.as_ref().map(|ip| IpQuery {
                        identifier: r.access_code.clone(),
                        ip: ip.clone(),
                    })
                })
                .collect()
        };

        let mut new_lookups = 0usize;
        if !pending.is_empty() {
            match geo {
                Some(service) => match service.lookup_regions(&pending).await {
                    Ok(answers) => {
                        new_lookups = answers.len();
                        let entries: Vec<(String, Option<String>)> = answers
                            .into_iter()
                            .map(|a| (a.identifier, a.region))
                            .collect();
                        state.merge_location_cache(&entries, (self.now_fn)())?;
                        cache.extend(entries);
                    }
                    Err(GeoError::Unauthorized) => {
                        log::warn!(
                            "🌐 Geolocation token rejected; proceeding with cached regions only"
                        );
                    }
                    Err(err) => {
                        log::warn!("🌐 {}; proceeding with cached regions only", err);
                    }
                },
                None => {
                    log::info!(
                        "🌐 No geolocation service configured; {} identifiers stay unresolved",
                        pending.len()
                    );
                }
            }
        }

        LocationDetector::new().apply(records, &cache);
        Ok(new_lookups)
    }
}
