//! In-memory mirror of the item pages, refreshed on access.
//!
//! [`InventoryCache`] maps item numbers to raw dataentry records and keeps a
//! single watermark: the local time at which the last successful refresh
//! retrieved its batch of changes.
//!
//! # Refresh modes
//!
//! 1. **Full rebuild**: list every page in the namespace, fetch each one
//!    into a fresh map, swap it in. Used on cold start and explicit purge.
//! 2. **Incremental**: ask the wiki for pages changed since the watermark,
//!    refetch the item pages among them and replace those entries.
//!
//! # Consistency
//!
//! - Refreshes are serialized by a gate mutex; wiki I/O happens while
//!   holding the gate but never while holding the state lock.
//! - The state is an `Arc` behind an `RwLock`. Writers publish a complete
//!   new state in one assignment, so a reader sees either the state before
//!   or after a refresh, never a half-applied one.
//! - Entries are replaced per uid as a whole; fields are never merged.
//! - Per-page failures are logged and skipped; only a failed listing call
//!   fails the refresh, which then leaves cache and watermark untouched.
//! - Watermarks come from the local [`Clock`] and never move backwards.

pub mod snapshot;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::model::{Namespace, RawRecord, uid_from_page_id};
use crate::wiki::{WikiBackend, WikiError};

// ---------------------------------------------------------------------------
// Watermark and clock
// ---------------------------------------------------------------------------

/// Point up to which the cache is known to be current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    #[must_use]
    pub const fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Unix seconds, as the wiki's change feed expects them.
    #[must_use]
    pub fn timestamp(self) -> i64 {
        self.0.timestamp()
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Source of local time for watermarks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// CacheState
// ---------------------------------------------------------------------------

/// An immutable view of the cache contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheState {
    entries: BTreeMap<u32, RawRecord>,
    watermark: Option<Watermark>,
}

impl CacheState {
    #[must_use]
    pub const fn new(entries: BTreeMap<u32, RawRecord>, watermark: Option<Watermark>) -> Self {
        Self { entries, watermark }
    }

    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<u32, RawRecord> {
        &self.entries
    }

    #[must_use]
    pub const fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    #[must_use]
    pub fn get(&self, uid: u32) -> Option<&RawRecord> {
        self.entries.get(&uid)
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

/// Counters for one refresh, logged when it completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RefreshStats {
    pages_seen: usize,
    fetched: usize,
    not_items: usize,
    missing: usize,
    failed: usize,
}

enum PageFetch {
    Record(RawRecord),
    Missing,
}

// ---------------------------------------------------------------------------
// InventoryCache
// ---------------------------------------------------------------------------

/// Process-wide cache of item records, shared by reference.
pub struct InventoryCache {
    backend: Arc<dyn WikiBackend>,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
    state: RwLock<Arc<CacheState>>,
    gate: Mutex<()>,
}

impl InventoryCache {
    /// Create an empty cache over `backend`, using the system clock.
    pub fn new(backend: Arc<dyn WikiBackend>, namespace: Namespace) -> Self {
        Self::with_clock(backend, namespace, Arc::new(SystemClock))
    }

    /// Create an empty cache with an explicit clock.
    pub fn with_clock(
        backend: Arc<dyn WikiBackend>,
        namespace: Namespace,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            namespace,
            clock,
            state: RwLock::new(Arc::new(CacheState::default())),
            gate: Mutex::new(()),
        }
    }

    /// Replace the contents with a previously saved state.
    pub fn restore(&self, state: CacheState) {
        let _gate = self.lock_gate();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(state);
    }

    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The current state. Later refreshes do not affect the returned value.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CacheState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn watermark(&self) -> Option<Watermark> {
        self.snapshot().watermark()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Look up `uid` without refreshing.
    #[must_use]
    pub fn get(&self, uid: u32) -> Option<RawRecord> {
        self.snapshot().get(uid).cloned()
    }

    /// Rebuild the whole cache from the namespace listing.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UpstreamUnavailable`] if the listing itself
    /// fails. Individual page failures are logged and skipped.
    pub fn rebuild_all(&self) -> Result<Watermark, InventoryError> {
        let _gate = self.lock_gate();
        self.rebuild_locked()
    }

    /// Refresh from the change feed since `watermark`; full rebuild if unset.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UpstreamUnavailable`] if the change feed or
    /// namespace listing cannot be retrieved.
    pub fn refresh_since(&self, watermark: Option<Watermark>) -> Result<Watermark, InventoryError> {
        let _gate = self.lock_gate();
        match watermark {
            None => self.rebuild_locked(),
            Some(since) => self.merge_changes_locked(since),
        }
    }

    /// Refresh from the stored watermark.
    ///
    /// # Errors
    ///
    /// Same as [`InventoryCache::refresh_since`].
    pub fn refresh(&self) -> Result<Watermark, InventoryError> {
        let _gate = self.lock_gate();
        match self.snapshot().watermark() {
            None => self.rebuild_locked(),
            Some(since) => self.merge_changes_locked(since),
        }
    }

    /// Fetch the page of `uid` directly and store the result.
    ///
    /// # Errors
    ///
    /// [`InventoryError::NotFound`] if the page does not exist or has no
    /// record (any stale entry is dropped), and
    /// [`InventoryError::UpstreamUnavailable`] on transport failure.
    pub fn fetch_one(&self, uid: u32) -> Result<RawRecord, InventoryError> {
        let _gate = self.lock_gate();
        let page_id = self.namespace.page_id(uid);
        match self.fetch_page(&page_id)? {
            PageFetch::Record(record) => {
                self.publish(|state| {
                    state.entries.insert(uid, record.clone());
                });
                Ok(record)
            }
            PageFetch::Missing => {
                self.publish(|state| {
                    state.entries.remove(&uid);
                });
                Err(InventoryError::NotFound { uid })
            }
        }
    }

    /// Replace the entry of `uid` after a successful write-back.
    pub fn store(&self, uid: u32, record: RawRecord) {
        let _gate = self.lock_gate();
        self.publish(|state| {
            state.entries.insert(uid, record);
        });
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a private copy of the state and publish it.
    fn publish(&self, change: impl FnOnce(&mut CacheState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        change(Arc::make_mut(&mut *guard));
    }

    /// Next watermark: the local clock, but never behind the current one.
    fn next_watermark(&self) -> Watermark {
        let now = Watermark(self.clock.now());
        self.snapshot()
            .watermark()
            .map_or(now, |previous| previous.max(now))
    }

    /// The uid of `page_id` if it is an item page directly in the namespace.
    fn item_uid(&self, page_id: &str) -> Option<u32> {
        let rest = page_id.strip_prefix(self.namespace.prefix())?;
        if rest.contains(':') {
            return None;
        }
        uid_from_page_id(page_id)
    }

    fn fetch_page(&self, page_id: &str) -> Result<PageFetch, WikiError> {
        if !self.backend.page_exists(page_id)? {
            return Ok(PageFetch::Missing);
        }
        let record = self.backend.fetch_structured_record(page_id)?;
        if record.is_empty() {
            return Ok(PageFetch::Missing);
        }
        Ok(PageFetch::Record(record))
    }

    fn rebuild_locked(&self) -> Result<Watermark, InventoryError> {
        let started = Instant::now();
        let pages = self.backend.list_pages(&self.namespace)?;
        let watermark = self.next_watermark();

        let mut stats = RefreshStats {
            pages_seen: pages.len(),
            ..RefreshStats::default()
        };
        let mut entries = BTreeMap::new();

        for page_id in pages {
            let Some(uid) = self.item_uid(&page_id) else {
                tracing::debug!(page_id, "not an item page, skipping");
                stats.not_items += 1;
                continue;
            };
            match self.fetch_page(&page_id) {
                Ok(PageFetch::Record(record)) => {
                    entries.insert(uid, record);
                    stats.fetched += 1;
                }
                Ok(PageFetch::Missing) => {
                    tracing::warn!(page_id, uid, "listed page has no record, skipping");
                    stats.missing += 1;
                }
                Err(e) => {
                    tracing::warn!(page_id, uid, error = %e, "page fetch failed, skipping");
                    stats.failed += 1;
                }
            }
        }

        let size = entries.len();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(CacheState::new(entries, Some(watermark)));

        tracing::info!(
            pages_seen = stats.pages_seen,
            fetched = stats.fetched,
            not_items = stats.not_items,
            missing = stats.missing,
            failed = stats.failed,
            cache_size = size,
            %watermark,
            elapsed_ms = started.elapsed().as_millis(),
            "full cache rebuild complete"
        );
        Ok(watermark)
    }

    fn merge_changes_locked(&self, since: Watermark) -> Result<Watermark, InventoryError> {
        let started = Instant::now();
        let changes = self.backend.list_changed_pages(since.as_datetime())?;
        let watermark = self.next_watermark();

        let changed: BTreeSet<String> = changes
            .into_iter()
            .map(|c| c.page_id)
            .filter(|page_id| self.namespace.contains(page_id))
            .collect();

        let mut stats = RefreshStats {
            pages_seen: changed.len(),
            ..RefreshStats::default()
        };
        let mut updates: Vec<(u32, Option<RawRecord>)> = Vec::new();

        for page_id in &changed {
            let Some(uid) = self.item_uid(page_id) else {
                tracing::debug!(page_id, "not an item page, skipping");
                stats.not_items += 1;
                continue;
            };
            match self.fetch_page(page_id) {
                Ok(PageFetch::Record(record)) => {
                    updates.push((uid, Some(record)));
                    stats.fetched += 1;
                }
                Ok(PageFetch::Missing) => {
                    tracing::warn!(page_id, uid, "changed page has no record, dropping it");
                    updates.push((uid, None));
                    stats.missing += 1;
                }
                Err(e) => {
                    tracing::warn!(page_id, uid, error = %e, "page fetch failed, skipping");
                    stats.failed += 1;
                }
            }
        }

        self.publish(|state| {
            for (uid, record) in updates {
                match record {
                    Some(record) => {
                        state.entries.insert(uid, record);
                    }
                    None => {
                        state.entries.remove(&uid);
                    }
                }
            }
            state.watermark = Some(watermark);
        });

        tracing::info!(
            changed_items = stats.pages_seen,
            fetched = stats.fetched,
            not_items = stats.not_items,
            missing = stats.missing,
            failed = stats.failed,
            %since,
            %watermark,
            elapsed_ms = started.elapsed().as_millis(),
            "incremental cache refresh complete"
        );
        Ok(watermark)
    }
}

impl fmt::Debug for InventoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        f.debug_struct("InventoryCache")
            .field("namespace", &self.namespace)
            .field("entries", &state.len())
            .field("watermark", &state.watermark())
            .finish_non_exhaustive()
    }
}
