pub mod item;
pub mod page;

pub use item::{Item, Operation, RawRecord, RawValue};
pub use page::{Namespace, uid_from_page_id};
