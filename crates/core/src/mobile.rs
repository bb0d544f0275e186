//! Mobile number validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::limits::MOBILE_NUMBER_PATTERN;

/// Compiled mobile number regex (lazy initialization).
static MOBILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MOBILE_NUMBER_PATTERN).expect("invalid mobile number pattern"));

/// A validated mobile number in 11-digit local form (`01XXXXXXXXX`).
///
/// `+8801712345678`, `8801712345678` and `01712345678` all normalize to the
/// same value, so attempt counters cannot be sidestepped by reformatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MobileNumber(String);

impl MobileNumber {
    /// Parse and normalize a mobile number.
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        if compact.is_empty() {
            return Err(Error::validation("Mobile number is required"));
        }

        let caps = MOBILE_REGEX
            .captures(&compact)
            .ok_or_else(|| Error::validation("Invalid mobile number format"))?;

        Ok(Self(caps[1].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MobileNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MobileNumber> for String {
    fn from(value: MobileNumber) -> Self {
        value.0
    }
}
