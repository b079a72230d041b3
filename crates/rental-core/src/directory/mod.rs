//! Narrow view of the university directory used for authorization.
//!
//! Only the search primitive is modelled: a base DN, a scope, an equality
//! filter and a timeout. [`StaticDirectory`] answers searches from a TOML
//! file for offline deployments and tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Errors returned by a [`Directory`].
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The search did not complete within its time limit.
    #[error("directory search timed out after {0:?}")]
    Timeout(Duration),

    /// The directory could not be reached or refused the search.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// Directory data could not be decoded.
    #[error("invalid directory data: {0}")]
    Invalid(String),
}

/// Search scope relative to the base DN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The base entry itself.
    Base,
    /// Direct children of the base entry.
    OneLevel,
    /// The base entry and everything below it.
    #[default]
    Subtree,
}

/// Search filter. Renders in RFC 4515 string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    And(Vec<Self>),
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq(attribute.into(), value.into())
    }

    /// Whether `entry` satisfies the filter.
    ///
    /// Attribute names and values compare case-insensitively.
    #[must_use]
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::Eq(attribute, value) => entry
                .values(attribute)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Self::And(parts) => parts.iter().all(|part| part.matches(entry)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(attribute, value) => write!(f, "({attribute}={})", escape_value(value)),
            Self::And(parts) => {
                f.write_str("(&")?;
                for part in parts {
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Escape an assertion value per RFC 4515 section 3.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            other => out.push(other),
        }
    }
    out
}

/// One entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Values of `attribute`, matched case-insensitively.
    #[must_use]
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// First value of `attribute`, if any.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute).first().map(String::as_str)
    }
}

/// Directory search primitive.
pub trait Directory: Send + Sync {
    /// Entries under `base_dn` within `scope` that match `filter`.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Timeout`] if the search exceeds `timeout`, other
    /// variants if the directory cannot answer.
    fn search(
        &self,
        base_dn: &str,
        scope: Scope,
        filter: &Filter,
        timeout: Duration,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;
}

// ---------------------------------------------------------------------------
// StaticDirectory
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    entries: Vec<DirectoryEntry>,
}

/// In-memory directory backed by a fixed list of entries.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Vec<DirectoryEntry>,
}

impl StaticDirectory {
    #[must_use]
    pub const fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    /// Parse entries from TOML (`[[entries]]` tables with `dn` and
    /// `attributes`).
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Invalid`] if the document does not parse.
    pub fn from_toml_str(content: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile =
            toml::from_str(content).map_err(|e| DirectoryError::Invalid(e.to_string()))?;
        Ok(Self::new(file.entries))
    }

    /// Load entries from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let directory = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            entries = directory.entries.len(),
            "static directory loaded"
        );
        Ok(directory)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Directory for StaticDirectory {
    fn search(
        &self,
        base_dn: &str,
        scope: Scope,
        filter: &Filter,
        _timeout: Duration,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let base = rdns(base_dn);
        Ok(self
            .entries
            .iter()
            .filter(|entry| in_scope(&rdns(&entry.dn), &base, scope))
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }
}

fn rdns(dn: &str) -> Vec<String> {
    dn.split(',')
        .map(|rdn| rdn.trim().to_ascii_lowercase())
        .filter(|rdn| !rdn.is_empty())
        .collect()
}

fn in_scope(entry: &[String], base: &[String], scope: Scope) -> bool {
    if !entry.ends_with(base) {
        return false;
    }
    match scope {
        Scope::Base => entry.len() == base.len(),
        Scope::OneLevel => entry.len() == base.len() + 1,
        Scope::Subtree => true,
    }
}
