// src/models/section.rs

//! Tracked section data structures.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Catalog codes: ASCII alphanumerics and `&` (as in "A&AM").
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9&]+$").expect("catalog code pattern is valid"));

/// Location of one course section in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SectionId {
    /// Term code (e.g., "2010")
    pub term: String,

    /// School code (e.g., "ENG")
    pub school: String,

    /// Subject code (e.g., "EECS")
    pub subject: String,

    /// Catalog (course) number
    pub number: String,

    /// Section number (e.g., "001")
    pub section: String,
}

impl SectionId {
    pub fn new(
        term: impl Into<String>,
        school: impl Into<String>,
        subject: impl Into<String>,
        number: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            school: school.into(),
            subject: subject.into(),
            number: number.into(),
            section: section.into(),
        }
    }

    /// Trim every field and upper-case the subject code.
    pub fn normalized(&self) -> Self {
        Self {
            term: self.term.trim().to_string(),
            school: self.school.trim().to_string(),
            subject: self.subject.trim().to_uppercase(),
            number: self.number.trim().to_string(),
            section: self.section.trim().to_string(),
        }
    }

    /// Check that every field is a non-empty catalog code.
    ///
    /// Codes end up in URL paths and query strings, so only ASCII
    /// alphanumerics and `&` (as in "A&AM") are accepted.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("term", &self.term),
            ("school", &self.school),
            ("subject", &self.subject),
            ("number", &self.number),
            ("section", &self.section),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(AppError::validation(format!("{name} is empty")));
            }
            if !CODE_RE.is_match(value) {
                return Err(AppError::validation(format!(
                    "{name} '{value}' contains invalid characters"
                )));
            }
        }
        Ok(())
    }
}

/// Formats as "SUBJ NUM SEC".
impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.number, self.section)
    }
}

/// A section a subscriber wants monitored, with its last-known status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedSection {
    #[serde(flatten)]
    pub id: SectionId,

    /// Contact address notified on status changes
    pub subscriber: String,

    /// Whether the section was open at the last successful query
    pub open: bool,
}

impl TrackedSection {
    pub fn new(id: SectionId, subscriber: impl Into<String>, open: bool) -> Self {
        Self {
            id,
            subscriber: subscriber.into(),
            open,
        }
    }

    /// Stable record key derived from the location fields and subscriber.
    ///
    /// Hex SHA-256 so it is safe as a file name or object key.
    pub fn record_key(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            &self.id.term,
            &self.id.school,
            &self.id.subject,
            &self.id.number,
            &self.id.section,
            &self.subscriber,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Parsed availability of a section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityStatus {
    pub open: bool,
}

impl AvailabilityStatus {
    pub fn open() -> Self {
        Self { open: true }
    }

    pub fn closed() -> Self {
        Self { open: false }
    }
}
