use std::env;
use std::path::PathBuf;

/// Configuration loaded from environment variables.
///
/// All paths default to a conventional `data/` layout so a checkout with the
/// exported streams in place runs without a `.env` file. The geolocation
/// token has no default; without it the location stage runs cache-only.
pub struct Config {
    pub captures_dir: PathBuf,
    pub registry_path: PathBuf,
    pub withdrawals_path: PathBuf,
    pub state_db_path: PathBuf,
    pub output_dir: PathBuf,
    pub geo_base_url: String,
    pub geo_token: Option<String>,
    pub rust_log: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            captures_dir: env::var("CAPTURES_DIR")
                .unwrap_or_else(|_| "data/captures".to_string())
                .into(),
            registry_path: env::var("REGISTRY_PATH")
                .unwrap_or_else(|_| "data/issued_codes.jsonl".to_string())
                .into(),
            withdrawals_path: env::var("WITHDRAWALS_PATH")
                .unwrap_or_else(|_| "data/withdrawals.jsonl".to_string())
                .into(),
            state_db_path: env::var("STATE_DB_PATH")
                .unwrap_or_else(|_| "data/cohortflow.db".to_string())
                .into(),
            output_dir: env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "data/output".to_string())
                .into(),
            geo_base_url: env::var("GEO_BASE_URL")
                .unwrap_or_else(|_| "https://geo.example.org/v1".to_string()),
            geo_token: env::var("GEO_TOKEN").ok(),
            rust_log: env::var("RUST_LOG").ok(),
        }
    }
}
