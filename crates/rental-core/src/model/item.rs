use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One value of a dataentry field as delivered by the wiki.
///
/// Multi-valued columns come back as lists; everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Scalar(String),
    List(Vec<String>),
}

impl RawValue {
    /// True for the wire encoding of "absent": an empty scalar or empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::List(items) => items.iter().all(String::is_empty),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Wiki-native key/value representation of an item page.
pub type RawRecord = BTreeMap<String, RawValue>;

/// Canonical record for one piece of inventory equipment.
///
/// Every field except `uid` is optional; `None` is the "no value" state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub uid: Option<u32>,
    pub typ: Option<Vec<String>>,
    pub name: Option<String>,
    pub standort: Option<String>,
    pub os: Option<String>,
    pub zubehoer: Option<String>,
    pub seriennummern: Option<String>,
    pub status: Option<String>,
    pub ausleiher: Option<String>,
    pub von: Option<NaiveDate>,
    pub bis: Option<NaiveDate>,
    pub anmerkungen: Option<String>,
    pub url: Option<String>,
}

impl Item {
    /// Whether `typ` carries the given tag.
    #[must_use]
    pub fn has_type(&self, tag: &str) -> bool {
        self.typ
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }
}

/// Operations a directory user may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ReadItem,
    ListItems,
    UpdateItem,
}

impl Operation {
    /// Operations every known user gets.
    pub const READ: [Self; 2] = [Self::ReadItem, Self::ListItems];
    /// Operations reserved for privileged groups.
    pub const WRITE: [Self; 1] = [Self::UpdateItem];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadItem => "read_item",
            Self::ListItems => "list_items",
            Self::UpdateItem => "update_item",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
