//! Item queries and updates on top of the [`InventoryCache`].
//!
//! Read paths refresh the cache first and degrade to whatever is cached when
//! the wiki is unreachable. Write paths validate before anything reaches the
//! wiki, so a rejected update never changes a page.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{InventoryCache, Watermark};
use crate::error::InventoryError;
use crate::mapper;
use crate::model::{Item, RawRecord};
use crate::vocab;
use crate::wiki::WikiBackend;

/// Exact-match filters for [`ItemService::list_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Keep items whose `typ` contains this tag.
    pub item_type: Option<String>,
    /// Keep items whose `standort` equals this.
    pub location: Option<String>,
    /// Keep items whose `status` equals this.
    pub status: Option<String>,
}

impl ItemFilter {
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.item_type.as_deref().is_none_or(|t| item.has_type(t))
            && self
                .location
                .as_deref()
                .is_none_or(|l| item.standort.as_deref() == Some(l))
            && self
                .status
                .as_deref()
                .is_none_or(|s| item.status.as_deref() == Some(s))
    }
}

/// Acknowledgement of a successful update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAck {
    pub item_id: u32,
    pub item_name: Option<String>,
    /// The raw record written to the wiki.
    pub record: RawRecord,
}

/// Cache size and watermark after an explicit refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub last_checked: Watermark,
    pub cache_size: usize,
}

/// Lend an item to someone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentRequest {
    pub user_name: String,
    pub from_date: NaiveDate,
    pub to_date: Option<NaiveDate>,
    pub comment: Option<String>,
}

/// Take a lent item back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub user_name: String,
    pub comment: Option<String>,
}

/// Answers item queries from the cache and writes updates back to the wiki.
pub struct ItemService {
    cache: Arc<InventoryCache>,
    backend: Arc<dyn WikiBackend>,
    wiki_server: Option<String>,
}

impl ItemService {
    pub fn new(cache: Arc<InventoryCache>, backend: Arc<dyn WikiBackend>) -> Self {
        Self {
            cache,
            backend,
            wiki_server: None,
        }
    }

    /// Fill `Item::url` with links into the wiki at `server`.
    #[must_use]
    pub fn with_wiki_server(mut self, server: impl Into<String>) -> Self {
        self.wiki_server = Some(server.into().trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<InventoryCache> {
        &self.cache
    }

    /// Refresh, then return every cached item that passes `filter`.
    ///
    /// Items are returned in cache order. Records that fail to map are
    /// logged and left out.
    pub fn list_items(&self, filter: &ItemFilter) -> Vec<Item> {
        self.refresh_or_serve_stale();
        let state = self.cache.snapshot();
        state
            .entries()
            .iter()
            .filter_map(|(&uid, raw)| self.map_or_log(uid, raw))
            .filter(|item| filter.matches(item))
            .collect()
    }

    /// Refresh, then return items whose text fields contain `query`
    /// (case-insensitive).
    pub fn search_items(&self, query: &str) -> Vec<Item> {
        let needle = query.trim().to_lowercase();
        self.list_items(&ItemFilter::default())
            .into_iter()
            .filter(|item| needle.is_empty() || search_text(item).contains(&needle))
            .collect()
    }

    /// Return item `uid`, fetching it directly when forced or not cached.
    ///
    /// # Errors
    ///
    /// [`InventoryError::NotFound`] if the page has no record,
    /// [`InventoryError::UpstreamUnavailable`] if a needed fetch fails, and
    /// [`InventoryError::Validation`] if the record cannot be mapped.
    pub fn get_item(&self, uid: u32, force_purge: bool) -> Result<Item, InventoryError> {
        let raw = match self.cache.get(uid) {
            Some(raw) if !force_purge => raw,
            _ => self.cache.fetch_one(uid)?,
        };
        self.map(uid, &raw)
    }

    /// Validate `item`, write it to page `uid` and update the cache.
    ///
    /// The current record is read first; `status` and `typ` values it
    /// already holds are accepted even when they fall outside the
    /// vocabularies, so only newly written values are checked.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Validation`] before anything is written,
    /// [`InventoryError::NotFound`] if the item page does not exist, and
    /// [`InventoryError::UpstreamUnavailable`] if the write fails.
    pub fn update_item(&self, uid: u32, item: Item) -> Result<UpdateAck, InventoryError> {
        let current = match self.cache.get(uid) {
            Some(raw) => raw,
            None => self.cache.fetch_one(uid)?,
        };
        let baseline = mapper::to_item(uid, &current).ok();
        let item = validate_against(uid, item, baseline.as_ref())?;
        let record = mapper::to_raw(&item);

        let page_id = self.cache.namespace().page_id(uid);
        self.backend.save_structured_record(&page_id, &record)?;

        if let Err(e) = self.cache.fetch_one(uid) {
            tracing::warn!(uid, "re-reading updated page failed, caching written record: {e}");
            self.cache.store(uid, record.clone());
        }

        tracing::info!(uid, page_id, "item updated");
        Ok(UpdateAck {
            item_id: uid,
            item_name: item.name,
            record,
        })
    }

    /// Mark item `uid` as lent to `request.user_name`.
    ///
    /// A thin guarded transition, not a rental workflow: the page is re-read,
    /// the status guard is checked and the result is written through
    /// [`ItemService::update_item`]. There is no reservation or history.
    ///
    /// # Errors
    ///
    /// [`InventoryError::InvalidTransition`] if the item is already lent;
    /// otherwise the errors of [`ItemService::update_item`].
    pub fn rent_item(&self, uid: u32, request: &RentRequest) -> Result<Item, InventoryError> {
        let mut item = self.get_item(uid, true)?;
        if item.status.as_deref() == Some(vocab::STATUS_LENT) {
            return Err(InventoryError::InvalidTransition {
                uid,
                action: "rent",
                reason: format!(
                    "already lent to {}",
                    item.ausleiher.as_deref().unwrap_or("unknown borrower")
                ),
            });
        }
        let borrower = request.user_name.trim();
        if borrower.is_empty() {
            return Err(InventoryError::validation("ausleiher", "borrower must not be empty"));
        }

        item.ausleiher = Some(borrower.to_string());
        item.von = Some(request.from_date);
        item.bis = request.to_date;
        item.status = Some(vocab::STATUS_LENT.to_string());
        if let Some(comment) = request.comment.as_deref() {
            item.anmerkungen = append_note(item.anmerkungen.take(), comment);
        }

        self.update_item(uid, item)?;
        self.get_item(uid, false)
    }

    /// Mark item `uid` as returned and available again.
    ///
    /// Like [`ItemService::rent_item`], a guarded update and nothing more.
    ///
    /// # Errors
    ///
    /// [`InventoryError::InvalidTransition`] if the item is not lent;
    /// otherwise the errors of [`ItemService::update_item`].
    pub fn return_item(&self, uid: u32, request: &ReturnRequest) -> Result<Item, InventoryError> {
        let mut item = self.get_item(uid, true)?;
        if item.status.as_deref() != Some(vocab::STATUS_LENT) {
            return Err(InventoryError::InvalidTransition {
                uid,
                action: "return",
                reason: format!(
                    "status is {}",
                    item.status.as_deref().unwrap_or("unset")
                ),
            });
        }
        if item.ausleiher.as_deref() != Some(request.user_name.trim()) {
            tracing::info!(
                uid,
                borrower = item.ausleiher.as_deref().unwrap_or(""),
                returned_by = request.user_name.as_str(),
                "item returned by someone other than the borrower"
            );
        }

        item.ausleiher = None;
        item.von = None;
        item.bis = None;
        item.status = Some(vocab::STATUS_AVAILABLE.to_string());
        if let Some(comment) = request.comment.as_deref() {
            item.anmerkungen = append_note(item.anmerkungen.take(), comment);
        }

        self.update_item(uid, item)?;
        self.get_item(uid, false)
    }

    /// Incremental refresh from the stored watermark.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UpstreamUnavailable`] if the wiki is unreachable.
    pub fn update_cache(&self) -> Result<CacheStatus, InventoryError> {
        let last_checked = self.cache.refresh()?;
        Ok(CacheStatus {
            last_checked,
            cache_size: self.cache.len(),
        })
    }

    /// Drop everything and rebuild from the namespace listing.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UpstreamUnavailable`] if the wiki is unreachable.
    pub fn purge_cache(&self) -> Result<CacheStatus, InventoryError> {
        let last_checked = self.cache.rebuild_all()?;
        Ok(CacheStatus {
            last_checked,
            cache_size: self.cache.len(),
        })
    }

    fn refresh_or_serve_stale(&self) {
        if let Err(e) = self.cache.refresh() {
            tracing::warn!(
                cached = self.cache.len(),
                "cache refresh failed, serving cached items: {e}"
            );
        }
    }

    fn map(&self, uid: u32, raw: &RawRecord) -> Result<Item, InventoryError> {
        let mut item = mapper::to_item(uid, raw)?;
        if let Some(server) = &self.wiki_server {
            item.url = Some(format!(
                "{server}/doku.php?id={}",
                self.cache.namespace().page_id(uid)
            ));
        }
        Ok(item)
    }

    fn map_or_log(&self, uid: u32, raw: &RawRecord) -> Option<Item> {
        match self.map(uid, raw) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(uid, "skipping unmappable item: {e}");
                None
            }
        }
    }
}

/// Check and normalize an incoming item for page `uid`.
///
/// Blank strings become `None`, `uid` is pinned to the page and `url` is
/// dropped since neither is stored in the record. Every value must fit on a
/// single line of the dataentry block.
///
/// # Errors
///
/// Returns [`InventoryError::Validation`] naming the first offending field.
pub fn validate_update(uid: u32, item: Item) -> Result<Item, InventoryError> {
    validate_against(uid, item, None)
}

/// [`validate_update`], except that `status` and `typ` values already held
/// by `current` skip the vocabulary check.
fn validate_against(
    uid: u32,
    mut item: Item,
    current: Option<&Item>,
) -> Result<Item, InventoryError> {
    if let Some(body_uid) = item.uid
        && body_uid != uid
    {
        return Err(InventoryError::validation(
            "uid",
            format!("body uid {body_uid} does not match item {uid}"),
        ));
    }
    item.uid = Some(uid);
    item.url = None;

    for (field, slot) in [
        ("name", &mut item.name),
        ("standort", &mut item.standort),
        ("os", &mut item.os),
        ("zubehoer", &mut item.zubehoer),
        ("seriennummern", &mut item.seriennummern),
        ("status", &mut item.status),
        ("ausleiher", &mut item.ausleiher),
        ("anmerkungen", &mut item.anmerkungen),
    ] {
        *slot = slot
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if slot.as_deref().is_some_and(has_line_break) {
            return Err(InventoryError::validation(field, "must be a single line"));
        }
    }
    item.typ = item
        .typ
        .take()
        .map(|tags| {
            tags.into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|tags| !tags.is_empty());
    if item.typ.iter().flatten().any(|tag| has_line_break(tag)) {
        return Err(InventoryError::validation("typ", "tags must be single lines"));
    }

    let current_status = current.and_then(|c| c.status.as_deref());
    if let Some(status) = item.status.as_deref()
        && current_status != Some(status)
        && !vocab::is_known_status(status)
    {
        return Err(InventoryError::validation(
            "status",
            format!("unknown status '{status}'"),
        ));
    }
    let current_typ = current.and_then(|c| c.typ.as_deref()).unwrap_or_default();
    if let Some(tag) = item
        .typ
        .iter()
        .flatten()
        .find(|tag| !current_typ.contains(*tag) && !vocab::is_known_type(tag))
    {
        return Err(InventoryError::validation("typ", format!("unknown type '{tag}'")));
    }
    if let (Some(von), Some(bis)) = (item.von, item.bis)
        && bis < von
    {
        return Err(InventoryError::validation(
            "bis",
            format!("end {bis} is before start {von}"),
        ));
    }

    Ok(item)
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\n', '\r'])
}

fn append_note(existing: Option<String>, note: &str) -> Option<String> {
    let note = note.trim();
    match existing {
        _ if note.is_empty() => existing,
        Some(existing) if !existing.is_empty() => Some(format!("{existing}; {note}")),
        _ => Some(note.to_string()),
    }
}

fn search_text(item: &Item) -> String {
    let mut text = String::new();
    for part in [
        item.name.as_deref(),
        item.standort.as_deref(),
        item.seriennummern.as_deref(),
        item.anmerkungen.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        text.push_str(part);
        text.push('\n');
    }
    for tag in item.typ.iter().flatten() {
        text.push_str(tag);
        text.push('\n');
    }
    text.to_lowercase()
}
