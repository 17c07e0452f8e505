//! Scoped, human-readable identifiers.
//!
//! Every persisted object is named by a type tag ("prefix") plus a number that
//! is assigned in increasing order per `(prefix, owner)`. The wire form only
//! carries `{prefix, numeric}`; the owner travels with the request scope.
//!
//! Text form is `{prefix}-{numeric:04}`, e.g. `R-0001` or `CP-0012`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Pattern for the canonical text form.
const ID_PATTERN: &str = r"^([A-Za-z]+)-([0-9]+)$";

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ID_PATTERN).unwrap_or_else(|e| panic!("invalid ID_PATTERN: {e}")))
}

/// The wire identity of a domain object.
///
/// `numeric == 0` marks a draft that has not been assigned an identifier yet;
/// the default value is such a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjId {
    pub prefix: String,
    pub numeric: u64,
}

impl ObjId {
    pub fn new(prefix: impl Into<String>, numeric: u64) -> Self {
        Self {
            prefix: prefix.into(),
            numeric,
        }
    }

    /// A placeholder for an object of the given type that has no number yet.
    pub fn draft(prefix: impl Into<String>) -> Self {
        Self::new(prefix, 0)
    }

    pub fn is_assigned(&self) -> bool {
        self.numeric >= 1
    }

    /// Parse the canonical `{prefix}-{digits}` form.
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let caps = id_regex()
            .captures(text.trim())
            .ok_or_else(|| DomainError::invalid_id(text))?;
        let numeric: u64 = caps[2]
            .parse()
            .map_err(|_| DomainError::invalid_id(text))?;
        if numeric == 0 {
            return Err(DomainError::invalid_id(text));
        }
        Ok(Self::new(&caps[1], numeric))
    }

    /// Check that this is an assigned identifier with a well-formed prefix.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !is_valid_prefix(&self.prefix) {
            return Err(DomainError::invalid_id(format!(
                "prefix {:?} must be one or more ASCII letters",
                self.prefix
            )));
        }
        if !self.is_assigned() {
            return Err(DomainError::invalid_id(format!(
                "{} has not been assigned a number",
                self.prefix
            )));
        }
        Ok(())
    }

    /// Attach an owner scope.
    pub fn scoped(self, owner: OwnerId) -> Identifier {
        Identifier {
            obj_id: self,
            owner,
        }
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}", self.prefix, self.numeric)
    }
}

impl FromStr for ObjId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// True when `prefix` is one or more ASCII letters.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_alphabetic())
}

/// The tenant partition an object belongs to. `0` is the shared scope used by
/// single-user desktop sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct OwnerId(i64);

impl OwnerId {
    pub const SHARED: OwnerId = OwnerId(0);

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value < 0 {
            return Err(DomainError::validation(format!("owner must be non-negative, got {value}")));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_shared(self) -> bool {
        self.0 == 0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::SHARED
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for OwnerId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for i64 {
    fn from(owner: OwnerId) -> i64 {
        owner.0
    }
}

/// A fully scoped identifier: `(prefix, numeric, owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    pub obj_id: ObjId,
    pub owner: OwnerId,
}

impl Identifier {
    pub fn new(prefix: impl Into<String>, numeric: u64, owner: OwnerId) -> Self {
        ObjId::new(prefix, numeric).scoped(owner)
    }

    pub fn prefix(&self) -> &str {
        &self.obj_id.prefix
    }

    pub fn numeric(&self) -> u64 {
        self.obj_id.numeric
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (owner {})", self.obj_id, self.owner)
    }
}
