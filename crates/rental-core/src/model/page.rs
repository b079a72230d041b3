//! Mapping between item numbers and wiki page ids.
//!
//! Item pages live directly under a namespace prefix such as
//! `lab:ausstattung:`; the trailing segment is the zero-padded item number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace prefix under which all item pages live, always `:`-terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Normalize `prefix` so that it ends in exactly one `:`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim().trim_end_matches(':');
        Self(format!("{trimmed}:"))
    }

    /// The prefix including its trailing `:`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0
    }

    /// The namespace name without the trailing `:` as the wiki API expects it.
    #[must_use]
    pub fn as_api_namespace(&self) -> &str {
        self.0.trim_end_matches(':')
    }

    /// Whether `page_id` lies inside this namespace.
    #[must_use]
    pub fn contains(&self, page_id: &str) -> bool {
        page_id.starts_with(&self.0)
    }

    /// The page id holding item `uid`.
    #[must_use]
    pub fn page_id(&self, uid: u32) -> String {
        format!("{}{uid:03}", self.0)
    }
}

impl From<String> for Namespace {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        value.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the item number from a page id.
///
/// Only the trailing `:`-separated segment counts. Returns `None` for pages
/// that are not items (`lab:ausstattung:readme`).
#[must_use]
pub fn uid_from_page_id(page_id: &str) -> Option<u32> {
    let segment = page_id.rsplit(':').next()?;
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
