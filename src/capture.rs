//! Typed capture rows and JSONL stream loading.
//!
//! Each stream arrives as one JSON object per line with a declared column
//! set. A declared column absent from any row is a data-shape fault and
//! aborts the load; a `null` (or blank-string) value is an ordinary missing
//! value and becomes `None`. Identity-code fields are carried verbatim so
//! the validator can still see upstream placeholder literals.

use crate::schema::{self, Arm, Stream};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum CaptureError {
    Io(std::io::Error),
    Parse {
        stream: &'static str,
        line: usize,
        source: serde_json::Error,
    },
    MissingColumn {
        stream: &'static str,
        line: usize,
        column: &'static str,
    },
    BadValue {
        stream: &'static str,
        line: usize,
        column: String,
    },
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Io(e) => write!(f, "IO error: {}", e),
            CaptureError::Parse { stream, line, source } => {
                write!(f, "stream '{}' line {}: {}", stream, line, source)
            }
            CaptureError::MissingColumn { stream, line, column } => {
                write!(
                    f,
                    "stream '{}' line {}: declared column '{}' is absent",
                    stream, line, column
                )
            }
            CaptureError::BadValue { stream, line, column } => {
                write!(f, "stream '{}' line {}: column '{}' has an unusable value", stream, line, column)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// One baseline submission. Carries the identity code pair and raw IP;
/// follow-ups instead carry only the propagated access code.
#[derive(Debug, Clone)]
pub struct BaselineCapture {
    pub access_code: Option<String>,
    pub entered_at: i64,
    pub exited_at: Option<i64>,
    pub finished: Option<bool>,
    pub r_code: Option<String>,
    pub s_code: Option<String>,
    pub ip_address: Option<String>,
    pub age: Option<i64>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<u32>,
    pub province: Option<String>,
    pub cannabis_ever: Option<i64>,
    pub cannabis_ever_confirm: Option<i64>,
    pub cannabis_freq_3mo: Option<i64>,
    pub cannabis_3mo: Option<i64>,
    pub cannabis_6mo: Option<i64>,
    /// Scale item responses keyed by item id.
    pub items: BTreeMap<String, Option<i64>>,
}

/// One follow-up submission. Content fields beyond the link columns are
/// opaque to the core and re-emitted with an origin suffix.
#[derive(Debug, Clone)]
pub struct FollowupCapture {
    pub access_code: Option<String>,
    pub entered_at: Option<i64>,
    pub exited_at: Option<i64>,
    pub finished: Option<bool>,
    pub responses: BTreeMap<String, Value>,
}

/// Blank strings and nulls are both ordinary missing values.
fn opt_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn opt_i64(value: &Value) -> Option<i64> {
    value.as_i64()
}

/// Completion indicators arrive as booleans or 0/1 depending on export.
fn opt_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

impl BaselineCapture {
    pub fn from_json(value: &Value, line: usize) -> Result<Self, CaptureError> {
        let stream = Stream::Baseline.as_str();
        let object = value.as_object().ok_or(CaptureError::BadValue {
            stream,
            line,
            column: "<row>".to_string(),
        })?;

        for column in schema::baseline_columns() {
            if !object.contains_key(column) {
                return Err(CaptureError::MissingColumn { stream, line, column });
            }
        }

        let entered_at = object["entered_at"].as_i64().ok_or(CaptureError::BadValue {
            stream,
            line,
            column: "entered_at".to_string(),
        })?;

        let mut items = BTreeMap::new();
        for item in schema::scale_item_ids() {
            items.insert(item.to_string(), opt_i64(&object[item]));
        }

        Ok(Self {
            access_code: opt_string(&object["access_code"]),
            entered_at,
            exited_at: opt_i64(&object["exited_at"]),
            finished: opt_bool(&object["finished"]),
            r_code: opt_string(&object["r_code"]),
            s_code: opt_string(&object["s_code"]),
            ip_address: opt_string(&object["ip_address"]),
            age: opt_i64(&object["age"]),
            birth_year: opt_i64(&object["birth_year"]).map(|v| v as i32),
            birth_month: opt_i64(&object["birth_month"]).map(|v| v as u32),
            province: opt_string(&object["province"]),
            cannabis_ever: opt_i64(&object["cannabis_ever"]),
            cannabis_ever_confirm: opt_i64(&object["cannabis_ever_confirm"]),
            cannabis_freq_3mo: opt_i64(&object["cannabis_freq_3mo"]),
            cannabis_3mo: opt_i64(&object["cannabis_3mo"]),
            cannabis_6mo: opt_i64(&object["cannabis_6mo"]),
            items,
        })
    }
}

impl FollowupCapture {
    pub fn from_json(stream: Stream, value: &Value, line: usize) -> Result<Self, CaptureError> {
        let stream_name = stream.as_str();
        let object = value.as_object().ok_or(CaptureError::BadValue {
            stream: stream_name,
            line,
            column: "<row>".to_string(),
        })?;

        for &column in schema::FOLLOWUP_LINK_COLUMNS {
            if !object.contains_key(column) {
                return Err(CaptureError::MissingColumn {
                    stream: stream_name,
                    line,
                    column,
                });
            }
        }

        let entered_at = object["entered_at"].as_i64().ok_or(CaptureError::BadValue {
            stream: stream_name,
            line,
            column: "entered_at".to_string(),
        })?;

        let responses = object
            .iter()
            .filter(|(key, _)| !schema::FOLLOWUP_LINK_COLUMNS.contains(&key.as_str()))
            .map(|(key, val)| (key.clone(), val.clone()))
            .collect();

        Ok(Self {
            access_code: opt_string(&object["access_code"]),
            entered_at: Some(entered_at),
            exited_at: opt_i64(&object["exited_at"]),
            finished: opt_bool(&object["finished"]),
            responses,
        })
    }
}

/// In-memory copy of the five raw capture streams.
#[derive(Debug, Clone)]
pub struct CaptureStore {
    pub baseline: Vec<BaselineCapture>,
    pub followup1_control: Vec<FollowupCapture>,
    pub followup1_intervention: Vec<FollowupCapture>,
    pub followup2_control: Vec<FollowupCapture>,
    pub followup2_intervention: Vec<FollowupCapture>,
}

impl CaptureStore {
    /// Load all five streams from a directory of per-stream JSONL files.
    /// Shape validation happens here, before any linkage runs.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();

        let baseline = load_baseline(&dir.join(Stream::Baseline.file_name()))?;
        let followup1_control =
            load_followups(Stream::Followup1Control, &dir.join(Stream::Followup1Control.file_name()))?;
        let followup1_intervention = load_followups(
            Stream::Followup1Intervention,
            &dir.join(Stream::Followup1Intervention.file_name()),
        )?;
        let followup2_control =
            load_followups(Stream::Followup2Control, &dir.join(Stream::Followup2Control.file_name()))?;
        let followup2_intervention = load_followups(
            Stream::Followup2Intervention,
            &dir.join(Stream::Followup2Intervention.file_name()),
        )?;

        log::info!(
            "📥 Loaded captures: {} baseline, {}+{} follow-up 1, {}+{} follow-up 2",
            baseline.len(),
            followup1_control.len(),
            followup1_intervention.len(),
            followup2_control.len(),
            followup2_intervention.len()
        );

        Ok(Self {
            baseline,
            followup1_control,
            followup1_intervention,
            followup2_control,
            followup2_intervention,
        })
    }

    pub fn followup1(&self, arm: Arm) -> &[FollowupCapture] {
        match arm {
            Arm::Control => &self.followup1_control,
            Arm::Intervention => &self.followup1_intervention,
        }
    }

    pub fn followup2(&self, arm: Arm) -> &[FollowupCapture] {
        match arm {
            Arm::Control => &self.followup2_control,
            Arm::Intervention => &self.followup2_intervention,
        }
    }
}

fn parse_lines(stream: Stream, path: &Path) -> Result<Vec<(usize, Value)>, CaptureError> {
    let contents = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = idx + 1;
        let value: Value = serde_json::from_str(raw).map_err(|source| CaptureError::Parse {
            stream: stream.as_str(),
            line,
            source,
        })?;
        rows.push((line, value));
    }
    Ok(rows)
}

fn load_baseline(path: &Path) -> Result<Vec<BaselineCapture>, CaptureError> {
    parse_lines(Stream::Baseline, path)?
        .iter()
        .map(|(line, value)| BaselineCapture::from_json(value, *line))
        .collect()
}

fn load_followups(stream: Stream, path: &Path) -> Result<Vec<FollowupCapture>, CaptureError> {
    parse_lines(stream, path)?
        .iter()
        .map(|(line, value)| FollowupCapture::from_json(stream, value, *line))
        .collect()
}

/// Opt-out access codes supplied by the study coordinators, one
/// `{"access_code": …}` object per line.
pub fn load_withdrawals(path: impl AsRef<Path>) -> Result<HashSet<String>, CaptureError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("No withdrawal file found: {}", path.display());
        return Ok(HashSet::new());
    }

    let contents = fs::read_to_string(path)?;
    let mut codes = HashSet::new();
    for (idx, raw) in contents.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(raw).map_err(|source| CaptureError::Parse {
            stream: "withdrawals",
            line: idx + 1,
            source,
        })?;
        if let Some(code) = value.get("access_code").and_then(|v| v.as_str()) {
            if !code.trim().is_empty() {
                codes.insert(code.trim().to_string());
            }
        }
    }
    log::info!("Loaded {} withdrawal entries", codes.len());
    Ok(codes)
}
