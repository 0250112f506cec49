//! Fixed study schema: capture streams, declared columns, scale item lists,
//! and response-code constants.
//!
//! The study collects one baseline and two follow-ups per arm. Column lists
//! and scale membership are declared statically here and validated once at
//! startup, never recomputed from column-name lookups at runtime.

/// The five capture streams delivered by the survey platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Baseline,
    Followup1Control,
    Followup1Intervention,
    Followup2Control,
    Followup2Intervention,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Baseline => "baseline",
            Stream::Followup1Control => "followup1_control",
            Stream::Followup1Intervention => "followup1_intervention",
            Stream::Followup2Control => "followup2_control",
            Stream::Followup2Intervention => "followup2_intervention",
        }
    }

    /// File name of the stream inside the captures directory.
    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.as_str())
    }

    pub fn all() -> [Stream; 5] {
        [
            Stream::Baseline,
            Stream::Followup1Control,
            Stream::Followup1Intervention,
            Stream::Followup2Control,
            Stream::Followup2Intervention,
        ]
    }
}

/// Study arm a follow-up stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arm {
    Control,
    Intervention,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Control => "control",
            Arm::Intervention => "intervention",
        }
    }

    pub fn all() -> [Arm; 2] {
        [Arm::Control, Arm::Intervention]
    }
}

/// Non-item columns every baseline row must carry.
pub const BASELINE_LINK_COLUMNS: &[&str] = &[
    "access_code",
    "entered_at",
    "exited_at",
    "finished",
    "r_code",
    "s_code",
    "ip_address",
    "age",
    "birth_year",
    "birth_month",
    "province",
    "cannabis_ever",
    "cannabis_ever_confirm",
    "cannabis_freq_3mo",
    "cannabis_3mo",
    "cannabis_6mo",
];

/// Columns every follow-up row must carry. Survey content beyond these is
/// passed through opaquely and re-emitted with an origin suffix.
pub const FOLLOWUP_LINK_COLUMNS: &[&str] = &[
    "access_code",
    "entered_at",
    "exited_at",
    "finished",
];

/// One straight-lining scale: a named, statically declared item range.
///
/// `excluded` names non-scale items embedded in the grid (the instructed
/// attention item sits inside the k10 block); they never count toward the
/// identical-response check.
pub struct ScaleDef {
    pub name: &'static str,
    pub items: &'static [&'static str],
    pub excluded: &'static [&'static str],
}

pub const SCALES: [ScaleDef; 5] = [
    ScaleDef {
        name: "cudit",
        items: &[
            "cudit_1", "cudit_2", "cudit_3", "cudit_4", "cudit_5", "cudit_6", "cudit_7", "cudit_8",
        ],
        excluded: &[],
    },
    ScaleDef {
        name: "sds",
        items: &["sds_1", "sds_2", "sds_3", "sds_4", "sds_5"],
        excluded: &[],
    },
    ScaleDef {
        name: "k10",
        items: &[
            "k10_1", "k10_2", "k10_3", "k10_4", "k10_5", "k10_attn", "k10_6", "k10_7", "k10_8",
            "k10_9", "k10_10",
        ],
        excluded: &["k10_attn"],
    },
    ScaleDef {
        name: "phq",
        items: &[
            "phq_1", "phq_2", "phq_3", "phq_4", "phq_5", "phq_6", "phq_7", "phq_8", "phq_9",
        ],
        excluded: &[],
    },
    ScaleDef {
        name: "aaq",
        items: &["aaq_1", "aaq_2", "aaq_3", "aaq_4", "aaq_5", "aaq_6", "aaq_7"],
        excluded: &[],
    },
];

/// The instructed-response item embedded in the k10 grid.
pub const ATTENTION_ITEM: &str = "k10_attn";

/// Response code participants are instructed to select on the attention item.
pub const ATTENTION_EXPECTED: i64 = 2;

/// "Never used" response code on the lifetime cannabis screening items.
pub const CANNABIS_EVER_NEVER: i64 = 1;

/// "None" response code on the past-3-month frequency item.
pub const CANNABIS_FREQ_NONE: i64 = 1;

/// "No" response code on the past-3-month / past-6-month use items (1 = yes).
pub const CANNABIS_USE_NO: i64 = 2;

/// Composite identity code length (10-char S-code followed by 3-char R-code).
pub const COMPOSITE_CODE_LEN: usize = 13;
pub const R_CODE_LEN: usize = 3;
pub const S_CODE_LEN: usize = 10;

/// Literal produced upstream when both identity sub-codes are absent.
pub const MISSING_CODE_PLACEHOLDER: &str = "NANA";

/// Straight-lining exclusion threshold: flagged on strictly more than this
/// many of the five scales. Fixed policy constant.
pub const STRAIGHTLINE_THRESHOLD: usize = 2;

/// Speeding cutoff as a fraction of the median completion duration.
pub const SPEEDER_CUTOFF_RATIO: f64 = 0.3;

/// Mean weeks per year used by the age-consistency computation.
pub const WEEKS_PER_YEAR: f64 = 52.18;

#[derive(Debug)]
pub enum SchemaError {
    ItemCollision {
        scale: &'static str,
        item: &'static str,
    },
    ExcludedItemNotInScale {
        scale: &'static str,
        item: &'static str,
    },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::ItemCollision { scale, item } => {
                write!(f, "scale '{}' item '{}' is already declared elsewhere", scale, item)
            }
            SchemaError::ExcludedItemNotInScale { scale, item } => {
                write!(f, "scale '{}' excludes '{}' which is not in its range", scale, item)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// All scale item ids, in declaration order. These are the remaining declared
/// baseline columns beyond [`BASELINE_LINK_COLUMNS`].
pub fn scale_item_ids() -> Vec<&'static str> {
    let mut ids = Vec::new();
    for scale in &SCALES {
        ids.extend_from_slice(scale.items);
    }
    ids
}

/// Every declared baseline column: link columns followed by scale items.
pub fn baseline_columns() -> Vec<&'static str> {
    let mut columns = BASELINE_LINK_COLUMNS.to_vec();
    columns.extend(scale_item_ids());
    columns
}

/// Validate the static scale declarations against the declared baseline
/// columns. Runs once at pipeline startup.
pub fn validate_scales() -> Result<(), SchemaError> {
    let mut seen: Vec<&'static str> = Vec::new();
    for scale in &SCALES {
        for &item in scale.items {
            if BASELINE_LINK_COLUMNS.contains(&item) || seen.contains(&item) {
                return Err(SchemaError::ItemCollision {
                    scale: scale.name,
                    item,
                });
            }
            seen.push(item);
        }
        for &excluded in scale.excluded {
            if !scale.items.contains(&excluded) {
                return Err(SchemaError::ExcludedItemNotInScale {
                    scale: scale.name,
                    item: excluded,
                });
            }
        }
    }
    Ok(())
}
