//! `rental search`: free-text search over cached items.

use clap::Args;

use crate::context::Inventory;
use crate::output::{OutputMode, render_list};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Case-insensitive text matched against name, location, serials, notes and types.
    pub query: String,
}

/// Execute `rental search <query>`.
///
/// # Errors
///
/// Returns an error if output rendering fails.
pub fn run_search(args: &SearchArgs, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    let items = inventory.service.search_items(&args.query);
    inventory.persist();
    tracing::debug!(query = %args.query, hits = items.len(), "search finished");
    render_list(&items, output)?;
    Ok(())
}
