//! Issued-code registry: the fixed set of (R-code, S-code) pairs generated
//! before data collection. The core only reads membership; the registry is
//! immutable for the life of the study.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Symbols an R-code may use. Digits 1-9 plus A-K (I dropped for its
/// 1/l lookalike), X and Z.
pub const R_CODE_SYMBOLS: &str = "123456789ABCDEFGHJKXZ";

#[derive(Debug)]
pub enum RegistryError {
    Io(std::io::Error),
    Parse { line: usize, source: serde_json::Error },
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err)
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(e) => write!(f, "IO error: {}", e),
            RegistryError::Parse { line, source } => {
                write!(f, "registry line {}: {}", line, source)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug, Deserialize)]
struct IssuedPair {
    r_code: String,
    s_code: String,
}

/// Membership view over the issued pairs, keyed by the 13-character
/// composite key (S-code followed by R-code).
pub struct IssuedCodeRegistry {
    keys: HashSet<String>,
}

impl IssuedCodeRegistry {
    /// Number of pairs issued for the study.
    pub const EXPECTED_SIZE: usize = 10_000;

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let keys = pairs
            .into_iter()
            .map(|(r_code, s_code)| format!("{}{}", s_code, r_code))
            .collect();
        Self { keys }
    }

    /// Load the registry from a JSONL file of `{"r_code":…,"s_code":…}` rows.
    pub fn from_jsonl_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = fs::read_to_string(path)?;
        let mut pairs = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let pair: IssuedPair =
                serde_json::from_str(raw).map_err(|source| RegistryError::Parse {
                    line: idx + 1,
                    source,
                })?;
            if !is_valid_r_code(&pair.r_code) || !is_valid_s_code(&pair.s_code) {
                log::warn!(
                    "Registry line {} holds a malformed pair: r='{}' s='{}'",
                    idx + 1,
                    pair.r_code,
                    pair.s_code
                );
            }
            pairs.push((pair.r_code, pair.s_code));
        }

        let registry = Self::from_pairs(pairs);
        if registry.len() != Self::EXPECTED_SIZE {
            log::warn!(
                "Registry holds {} pairs, expected {}",
                registry.len(),
                Self::EXPECTED_SIZE
            );
        }
        Ok(registry)
    }

    /// Check a composite key against the issued set, verbatim.
    pub fn contains(&self, composite: &str) -> bool {
        self.keys.contains(composite)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub fn is_valid_r_code(code: &str) -> bool {
    code.len() == crate::schema::R_CODE_LEN
        && code.chars().all(|c| R_CODE_SYMBOLS.contains(c))
}

pub fn is_valid_s_code(code: &str) -> bool {
    code.len() == crate::schema::S_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
}
