pub mod cache;
pub mod completions;
pub mod list;
pub mod rent;
pub mod search;
pub mod show;
pub mod update;
pub mod user;
pub mod vocab;
