//! The unified per-participant record and its quality flags.

use crate::capture::{BaselineCapture, FollowupCapture};
use serde_json::Value;
use std::collections::BTreeMap;

/// Follow-up material joined onto a unified record. A placeholder carries
/// only the access code; everything else is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowupResponses {
    pub access_code: String,
    pub entered_at: Option<i64>,
    pub exited_at: Option<i64>,
    pub finished: Option<bool>,
    pub responses: BTreeMap<String, Value>,
}

impl FollowupResponses {
    /// Synthesized follow-up-1 row for an access code seen only in
    /// follow-up 2: every field missing except the code itself.
    pub fn placeholder(access_code: &str) -> Self {
        Self {
            access_code: access_code.to_string(),
            entered_at: None,
            exited_at: None,
            finished: None,
            responses: BTreeMap::new(),
        }
    }

    /// Convert a parsed capture. Returns `None` when the capture has no
    /// access code; such rows can never join anything.
    pub fn from_capture(capture: &FollowupCapture) -> Option<Self> {
        let access_code = capture.access_code.clone()?;
        Some(Self {
            access_code,
            entered_at: capture.entered_at,
            exited_at: capture.exited_at,
            finished: capture.finished,
            responses: capture.responses.clone(),
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.entered_at.is_none() && self.responses.is_empty()
    }
}

/// Named booleans attached by the validator and detectors. `None` means the
/// owning stage has not run; for `incon_province` only, it also encodes a
/// lookup that never resolved. Each stage writes only its own fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityFlags {
    pub invalid_code: Option<bool>,
    pub blank_code: Option<bool>,
    pub ac_duplicate: Option<bool>,
    pub speeder: Option<bool>,
    pub sl_flag: Option<bool>,
    pub incon_ever: Option<bool>,
    pub incon_ever_agree: Option<bool>,
    pub incon_freq: Option<bool>,
    pub incon_recent: Option<bool>,
    pub incon_age: Option<bool>,
    pub incon_province: Option<bool>,
    pub attncheck_fail: Option<bool>,
    pub withdrew: Option<bool>,
    pub exclude: Option<bool>,
}

impl QualityFlags {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One row per surviving baseline identity: all baseline fields, optional
/// follow-up material per wave, and the flag set. Records are never deleted;
/// exclusion is a flag.
#[derive(Debug, Clone)]
pub struct UnifiedRecord {
    pub access_code: String,
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
    pub items: BTreeMap<String, Option<i64>>,
    pub followup1: Option<FollowupResponses>,
    pub followup2: Option<FollowupResponses>,
    pub flags: QualityFlags,
}

impl UnifiedRecord {
    /// Build from a baseline capture whose access code is present.
    pub fn from_baseline(capture: &BaselineCapture, access_code: String) -> Self {
        Self {
            access_code,
            entered_at: capture.entered_at,
            exited_at: capture.exited_at,
            finished: capture.finished,
            r_code: capture.r_code.clone(),
            s_code: capture.s_code.clone(),
            ip_address: capture.ip_address.clone(),
            age: capture.age,
            birth_year: capture.birth_year,
            birth_month: capture.birth_month,
            province: capture.province.clone(),
            cannabis_ever: capture.cannabis_ever,
            cannabis_ever_confirm: capture.cannabis_ever_confirm,
            cannabis_freq_3mo: capture.cannabis_freq_3mo,
            cannabis_3mo: capture.cannabis_3mo,
            cannabis_6mo: capture.cannabis_6mo,
            items: capture.items.clone(),
            followup1: None,
            followup2: None,
            flags: QualityFlags::new(),
        }
    }

    /// Composite identity key: S-code followed by R-code, present only when
    /// both halves are.
    pub fn composite_code(&self) -> Option<String> {
        match (&self.s_code, &self.r_code) {
            (Some(s), Some(r)) => Some(format!("{}{}", s, r)),
            _ => None,
        }
    }

    /// Baseline completion duration in seconds.
    pub fn completion_secs(&self) -> Option<i64> {
        self.exited_at.map(|exit| exit - self.entered_at)
    }

    pub fn item(&self, id: &str) -> Option<i64> {
        self.items.get(id).copied().flatten()
    }
}
