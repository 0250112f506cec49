//! Reconcile Binary - Survey Record Linkage and Quality Flagging
//!
//! Merges the five capture streams into one record per participant, runs the
//! identity validator and quality detectors, and writes the unified and
//! flagged datasets.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin reconcile
//! ```
//!
//! ## Environment Variables
//!
//! - CAPTURES_DIR - Directory holding the five stream JSONL files (default: data/captures)
//! - REGISTRY_PATH - Issued-code registry JSONL (default: data/issued_codes.jsonl)
//! - WITHDRAWALS_PATH - Opt-out access codes JSONL (default: data/withdrawals.jsonl)
//! - STATE_DB_PATH - SQLite state database (default: data/cohortflow.db)
//! - OUTPUT_DIR - Destination for unified.jsonl / flagged.jsonl (default: data/output)
//! - GEO_BASE_URL - Geolocation service base URL
//! - GEO_TOKEN - Geolocation access token (omit to run cache-only)
//! - RUST_LOG - Logging level (optional, default: info)

use cohortflow::capture::{load_withdrawals, CaptureStore};
use cohortflow::config::Config;
use cohortflow::geolocate::{HttpRegionLookup, RegionLookup};
use cohortflow::output;
use cohortflow::pipeline::ReconcilePipeline;
use cohortflow::registry::IssuedCodeRegistry;
use cohortflow::store::StateStore;
use std::fs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = Config::from_env();

    log::info!("🚀 Starting survey reconciliation");
    log::info!("   Captures: {}", config.captures_dir.display());
    log::info!("   Registry: {}", config.registry_path.display());
    log::info!("   State DB: {}", config.state_db_path.display());
    log::info!("   Output: {}", config.output_dir.display());
    log::info!(
        "   Geolocation: {}",
        if config.geo_token.is_some() {
            "configured"
        } else {
            "cache-only (no token)"
        }
    );

    let captures = CaptureStore::load_dir(&config.captures_dir)?;
    let registry = IssuedCodeRegistry::from_jsonl_file(&config.registry_path)?;
    log::info!("🪪 Registry loaded: {} issued pairs", registry.len());
    let withdrawals = load_withdrawals(&config.withdrawals_path)?;
    let state = StateStore::open(&config.state_db_path)?;

    let http_lookup = match &config.geo_token {
        Some(token) => Some(HttpRegionLookup::new(&config.geo_base_url, token)?),
        None => None,
    };
    let geo: Option<&dyn RegionLookup> =
        http_lookup.as_ref().map(|l| l as &dyn RegionLookup);

    let pipeline = ReconcilePipeline::new();
    let (records, summary) = pipeline
        .run(&captures, &registry, &withdrawals, geo, &state)
        .await?;

    fs::create_dir_all(&config.output_dir)?;
    output::write_unified(config.output_dir.join("unified.jsonl"), &records)?;
    output::write_flagged(config.output_dir.join("flagged.jsonl"), &records)?;

    log::info!("✅ Run complete");
    log::info!("   Records: {}", summary.records);
    log::info!("   Excluded: {}", summary.excluded);
    log::info!("   Eligible: {}", summary.eligible);
    log::info!("   New lookups: {}", summary.new_lookups);
    if let Some(cutoff) = summary.speeder_cutoff_secs {
        log::info!("   Speeding cutoff: {:.0}s", cutoff);
    }

    Ok(())
}
