//! Canonical combination identifiers.
//!
//! An id is the selected variant per axis, in axis declaration order:
//!
//! ```text
//! consumption=p90;capacity-outage=full;gas-stress=up20
//! ```
//!
//! A run with no active axes has the single combination `base`. The id is a
//! pure function of the selection and decodes back to it; [`CombinationId::digest`]
//! gives a short stable hash for compact storage keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CombinationError;
use crate::variant::validate_name;

/// Id used when no axis is active.
pub const BASE_ID: &str = "base";

/// Length of the hex digest.
pub const DIGEST_LEN: usize = 12;

/// Deterministic, decodable identifier of a scenario combination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CombinationId(String);

impl CombinationId {
    /// Encodes `(axis, variant)` pairs.
    ///
    /// Names are assumed valid (see [`validate_name`]); axes keep the given order.
    pub fn encode<'a, I>(selections: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let parts: Vec<String> = selections
            .into_iter()
            .map(|(axis, variant)| format!("{}={}", axis, variant))
            .collect();
        if parts.is_empty() {
            CombinationId(BASE_ID.to_string())
        } else {
            CombinationId(parts.join(";"))
        }
    }

    /// The id of the empty selection.
    pub fn base() -> Self {
        CombinationId(BASE_ID.to_string())
    }

    /// Decodes into `(axis, variant)` pairs in axis order.
    pub fn decode(&self) -> Vec<(String, String)> {
        if self.0 == BASE_ID {
            return Vec::new();
        }
        self.0
            .split(';')
            .filter_map(|part| part.split_once('='))
            .map(|(a, v)| (a.to_string(), v.to_string()))
            .collect()
    }

    /// Variant selected on `axis`.
    pub fn variant_for(&self, axis: &str) -> Option<String> {
        self.decode()
            .into_iter()
            .find(|(a, _)| a == axis)
            .map(|(_, v)| v)
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `DIGEST_LEN` hex characters of the SHA-256 of the id.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        let mut hex = hex::encode(hash);
        hex.truncate(DIGEST_LEN);
        hex
    }
}

impl fmt::Display for CombinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CombinationId {
    type Err = CombinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == BASE_ID {
            return Ok(Self::base());
        }
        let malformed = || CombinationError::MalformedId(s.to_string());
        let mut axes = Vec::new();
        for part in s.split(';') {
            let (axis, variant) = part.split_once('=').ok_or_else(malformed)?;
            validate_name(axis).map_err(|_| malformed())?;
            validate_name(variant).map_err(|_| malformed())?;
            if axes.contains(&axis) {
                return Err(malformed());
            }
            axes.push(axis);
        }
        Ok(CombinationId(s.to_string()))
    }
}

impl TryFrom<String> for CombinationId {
    type Error = CombinationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CombinationId> for String {
    fn from(id: CombinationId) -> Self {
        id.0
    }
}
