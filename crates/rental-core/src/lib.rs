//! rental-core library.
//!
//! Equipment inventory kept as dataentry pages in a wiki: field mapping,
//! an incrementally refreshed cache of item records, item queries and
//! updates, and directory-backed authorization.

pub mod auth;
pub mod cache;
pub mod config;
pub mod dataentry;
pub mod directory;
pub mod error;
pub mod lock;
pub mod mapper;
pub mod model;
pub mod service;
pub mod vocab;
pub mod wiki;

pub use auth::{AuthLookup, UserPermissions};
pub use cache::{InventoryCache, Watermark};
pub use error::{ErrorCode, InventoryError};
pub use model::{Item, Namespace, Operation, RawRecord, RawValue};
pub use service::ItemService;
