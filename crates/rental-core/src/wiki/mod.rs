//! The wiki as seen by the inventory: a handful of page-level calls.

pub mod jsonrpc;

use chrono::{DateTime, Utc};

use crate::dataentry::DataentryError;
use crate::model::{Namespace, RawRecord};

pub use jsonrpc::JsonRpcWiki;

/// Errors returned by a [`WikiBackend`].
#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    /// The request never produced a usable HTTP response.
    #[error("wiki transport error: {0}")]
    Transport(String),

    /// The wiki answered with an API-level fault.
    #[error("wiki API error {code}: {message}")]
    Api { code: i64, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected wiki response: {0}")]
    Decode(String),

    /// A write targeted a page without a dataentry block.
    #[error("page {0} has no dataentry block")]
    NoRecord(String),

    /// The record cannot be written into the page's dataentry block.
    #[error("cannot write page {page_id}: {reason}")]
    Unwritable { page_id: String, reason: DataentryError },
}

/// One entry of the recent-changes feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPage {
    /// Full page id (`lab:ausstattung:042`).
    pub page_id: String,
    /// Time of the change as reported by the wiki.
    pub modified: Option<DateTime<Utc>>,
}

/// Page-level access to the wiki.
///
/// Implementations must be shareable across threads; the cache calls them
/// outside of its own locks.
pub trait WikiBackend: Send + Sync {
    /// All page ids below `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the wiki cannot be reached.
    fn list_pages(&self, namespace: &Namespace) -> Result<Vec<String>, WikiError>;

    /// Pages changed since `since`, across the whole wiki.
    ///
    /// # Errors
    ///
    /// Returns an error if the wiki cannot be reached.
    fn list_changed_pages(&self, since: DateTime<Utc>) -> Result<Vec<ChangedPage>, WikiError>;

    /// Whether `page_id` currently exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the wiki cannot be reached.
    fn page_exists(&self, page_id: &str) -> Result<bool, WikiError>;

    /// The dataentry record of `page_id`; empty when the page carries none.
    ///
    /// # Errors
    ///
    /// Returns an error if the wiki cannot be reached.
    fn fetch_structured_record(&self, page_id: &str) -> Result<RawRecord, WikiError>;

    /// Write `record` back into the dataentry block of `page_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the wiki cannot be reached or rejects the write.
    fn save_structured_record(&self, page_id: &str, record: &RawRecord) -> Result<(), WikiError>;
}
