//! Geolocation collaborator client.
//!
//! The service accepts a batch of IP addresses with an access token and
//! returns, per IP, a region name or an absence indicator. An invalid token
//! and an unreachable service are distinguishable faults; the pipeline
//! treats either as a degraded run, not an abort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug)]
pub enum GeoError {
    /// The access token was rejected.
    Unauthorized,
    /// Transport-level failure: unreachable, timeout, TLS.
    Http(reqwest::Error),
    /// The service answered with an unexpected status.
    Service { status: u16 },
}

impl From<reqwest::Error> for GeoError {
    fn from(err: reqwest::Error) -> Self {
        GeoError::Http(err)
    }
}

impl std::fmt::Display for GeoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoError::Unauthorized => write!(f, "geolocation token rejected"),
            GeoError::Http(e) => write!(f, "geolocation service unreachable: {}", e),
            GeoError::Service { status } => {
                write!(f, "geolocation service error: HTTP {}", status)
            }
        }
    }
}

impl std::error::Error for GeoError {}

/// One lookup request: the stable record identifier plus the IP to resolve.
#[derive(Debug, Clone)]
pub struct IpQuery {
    pub identifier: String,
    pub ip: String,
}

/// One resolved answer. `region` is `None` when the service definitively
/// knows no region for the IP.
#[derive(Debug, Clone)]
pub struct RegionAnswer {
    pub identifier: String,
    pub region: Option<String>,
}

/// Batch region resolution, keyed by stable record identifiers.
#[async_trait]
pub trait RegionLookup: Send + Sync {
    async fn lookup_regions(&self, batch: &[IpQuery]) -> Result<Vec<RegionAnswer>, GeoError>;
}

#[derive(Serialize)]
struct BatchQuery<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct BatchAnswer {
    #[serde(default)]
    status: String,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
}

/// HTTP implementation posting `POST {base_url}/batch` with a bearer token.
/// Answers come back in request order.
pub struct HttpRegionLookup {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRegionLookup {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl RegionLookup for HttpRegionLookup {
    async fn lookup_regions(&self, batch: &[IpQuery]) -> Result<Vec<RegionAnswer>, GeoError> {
        let url = format!("{}/batch", self.base_url.trim_end_matches('/'));
        let body: Vec<BatchQuery> = batch.iter().map(|q| BatchQuery { query: &q.ip }).collect();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GeoError::Unauthorized);
        }
        if !status.is_success() {
            return Err(GeoError::Service {
                status: status.as_u16(),
            });
        }

        let answers: Vec<BatchAnswer> = response.json().await?;
        let resolved = batch
            .iter()
            .zip(answers)
            .map(|(query, answer)| RegionAnswer {
                identifier: query.identifier.clone(),
                region: if answer.status == "success" {
                    answer.region_name
                } else {
                    None
                },
            })
            .collect();

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_answer_parsing() {
        let raw = r#"{"status":"success","regionName":"Ontario","query":"24.114.50.1"}"#;
        let answer: BatchAnswer = serde_json::from_str(raw).unwrap();
        assert_eq!(answer.status, "success");
        assert_eq!(answer.region_name.as_deref(), Some("Ontario"));
    }

    #[test]
    fn test_failed_answer_has_no_region() {
        let raw = r#"{"status":"fail","message":"private range","query":"10.0.0.1"}"#;
        let answer: BatchAnswer = serde_json::from_str(raw).unwrap();
        assert_eq!(answer.status, "fail");
        assert!(answer.region_name.is_none());
    }
}
