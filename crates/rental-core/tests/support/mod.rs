//! In-memory wiki and clock shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rental_core::cache::Clock;
use rental_core::mapper::FIELD_MAP;
use rental_core::model::{Namespace, RawRecord, RawValue};
use rental_core::wiki::{ChangedPage, WikiBackend, WikiError};

pub const NS: &str = "lab:ausstattung:";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

pub fn record(pairs: &[(&str, &str)]) -> RawRecord {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), RawValue::from(*v)))
        .collect()
}

pub fn item_record(name: &str, status: &str, types: &[&str]) -> RawRecord {
    let mut raw = record(&[
        ("Name", name),
        ("Status_devicestat", status),
        ("Standort", "FIL Werkstatt (PT 3.0.27)"),
    ]);
    raw.insert(
        "Typ_devicetypes".to_string(),
        RawValue::List(types.iter().map(ToString::to_string).collect()),
    );
    raw
}

// ---------------------------------------------------------------------------
// FakeWiki
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WikiState {
    pages: BTreeMap<String, RawRecord>,
    changes: Vec<(DateTime<Utc>, String)>,
    failing: BTreeSet<String>,
    vanishing: BTreeSet<String>,
    listing_down: bool,
    fetches: BTreeMap<String, usize>,
    saves: Vec<(String, RawRecord)>,
    now: Option<DateTime<Utc>>,
}

/// Wiki backend over a map of page id to record.
///
/// A page mapped to an empty record exists but has no dataentry block.
#[derive(Default)]
pub struct FakeWiki {
    state: Mutex<WikiState>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut WikiState) -> R) -> R {
        f(&mut self.state.lock().expect("fake wiki lock"))
    }

    /// Create a page without recording a change.
    pub fn seed(&self, page_id: &str, record: RawRecord) {
        self.with(|s| {
            s.pages.insert(page_id.to_string(), record);
        });
    }

    /// Create or replace a page and record a change at `when`.
    pub fn edit(&self, page_id: &str, record: RawRecord, when: DateTime<Utc>) {
        self.with(|s| {
            s.pages.insert(page_id.to_string(), record);
            s.changes.push((when, page_id.to_string()));
        });
    }

    /// Delete a page and record a change at `when`.
    pub fn delete(&self, page_id: &str, when: DateTime<Utc>) {
        self.with(|s| {
            s.pages.remove(page_id);
            s.changes.push((when, page_id.to_string()));
        });
    }

    /// Listed, but gone by the time it is fetched.
    pub fn vanish_on_fetch(&self, page_id: &str) {
        self.with(|s| {
            s.vanishing.insert(page_id.to_string());
        });
    }

    pub fn fail_page(&self, page_id: &str) {
        self.with(|s| {
            s.failing.insert(page_id.to_string());
        });
    }

    pub fn heal_page(&self, page_id: &str) {
        self.with(|s| {
            s.failing.remove(page_id);
        });
    }

    pub fn set_listing_down(&self, down: bool) {
        self.with(|s| s.listing_down = down);
    }

    /// Timestamp attached to changes produced by saves.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.with(|s| s.now = Some(now));
    }

    pub fn page(&self, page_id: &str) -> Option<RawRecord> {
        self.with(|s| s.pages.get(page_id).cloned())
    }

    pub fn fetch_count(&self, page_id: &str) -> usize {
        self.with(|s| s.fetches.get(page_id).copied().unwrap_or(0))
    }

    pub fn total_fetches(&self) -> usize {
        self.with(|s| s.fetches.values().sum())
    }

    pub fn saves(&self) -> Vec<(String, RawRecord)> {
        self.with(|s| s.saves.clone())
    }

    fn check(s: &WikiState, page_id: &str) -> Result<(), WikiError> {
        if s.failing.contains(page_id) {
            return Err(WikiError::Transport(format!("connection reset fetching {page_id}")));
        }
        Ok(())
    }
}

impl WikiBackend for FakeWiki {
    fn list_pages(&self, namespace: &Namespace) -> Result<Vec<String>, WikiError> {
        self.with(|s| {
            if s.listing_down {
                return Err(WikiError::Transport("listing unavailable".into()));
            }
            Ok(s.pages
                .keys()
                .filter(|id| namespace.contains(id))
                .cloned()
                .collect())
        })
    }

    fn list_changed_pages(&self, since: DateTime<Utc>) -> Result<Vec<ChangedPage>, WikiError> {
        self.with(|s| {
            if s.listing_down {
                return Err(WikiError::Transport("change feed unavailable".into()));
            }
            Ok(s.changes
                .iter()
                .filter(|(when, _)| *when >= since)
                .map(|(when, id)| ChangedPage {
                    page_id: id.clone(),
                    modified: Some(*when),
                })
                .collect())
        })
    }

    fn page_exists(&self, page_id: &str) -> Result<bool, WikiError> {
        self.with(|s| {
            Self::check(s, page_id)?;
            Ok(s.pages.contains_key(page_id) && !s.vanishing.contains(page_id))
        })
    }

    fn fetch_structured_record(&self, page_id: &str) -> Result<RawRecord, WikiError> {
        self.with(|s| {
            Self::check(s, page_id)?;
            *s.fetches.entry(page_id.to_string()).or_default() += 1;
            Ok(s.pages.get(page_id).cloned().unwrap_or_default())
        })
    }

    fn save_structured_record(&self, page_id: &str, record: &RawRecord) -> Result<(), WikiError> {
        self.with(|s| {
            Self::check(s, page_id)?;
            let when = s.now.unwrap_or_else(Utc::now);
            let Some(existing) = s.pages.get_mut(page_id).filter(|r| !r.is_empty()) else {
                return Err(WikiError::NoRecord(page_id.to_string()));
            };
            for (key, field) in FIELD_MAP {
                if field == rental_core::mapper::Field::Uid {
                    continue;
                }
                match record.get(key) {
                    Some(value) => {
                        existing.insert(key.to_string(), value.clone());
                    }
                    None => {
                        existing.remove(key);
                    }
                }
            }
            s.saves.push((page_id.to_string(), record.clone()));
            s.changes.push((when, page_id.to_string()));
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}
