//! Comma-separated integer lists
//!
//! Unlocked pins, geopins and achievements are stored as text columns holding
//! a comma-separated list of award ids (`"1,4,7"`). Over the API they are
//! plain JSON arrays.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Award id every new profile starts with
pub const DEFAULT_AWARD_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid comma-separated integer list: '{0}'")]
pub struct IdListError(pub String);

/// Ordered list of award ids
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdList(Vec<i64>);

impl IdList {
    pub fn new(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    /// The list a fresh profile gets: just the default award
    pub fn starter() -> Self {
        Self(vec![DEFAULT_AWARD_ID])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    pub fn push(&mut self, id: i64) {
        self.0.push(id);
    }

    pub fn extend_from_slice(&mut self, ids: &[i64]) {
        self.0.extend_from_slice(ids);
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn first(&self) -> Option<i64> {
        self.0.first().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for IdList {
    type Err = IdListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        trimmed
            .split(',')
            .map(|part| {
                let part = part.trim();
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(IdListError(s.to_string()));
                }
                part.parse::<i64>().map_err(|_| IdListError(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl TryFrom<String> for IdList {
    type Error = IdListError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}
