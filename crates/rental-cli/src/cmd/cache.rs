//! `rental cache`: explicit cache maintenance.

use std::io::Write;

use clap::Subcommand;
use rental_core::service::CacheStatus;

use crate::context::Inventory;
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    #[command(
        about = "Pull changes since the last check",
        after_help = "EXAMPLES:\n    # Incremental refresh\n    rental cache update"
    )]
    Update,

    #[command(
        about = "Drop the cache and rebuild it from the full listing",
        after_help = "EXAMPLES:\n    # Full rebuild, also deletes the saved snapshot first\n    rental cache purge"
    )]
    Purge,
}

/// Execute `rental cache <update|purge>`.
///
/// # Errors
///
/// Returns an error if the wiki cannot be reached or the snapshot cannot be
/// removed.
pub fn run_cache(command: &CacheCommand, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    let status = match command {
        CacheCommand::Update => inventory.service.update_cache(),
        CacheCommand::Purge => {
            inventory.forget_snapshot()?;
            inventory.service.purge_cache()
        }
    }
    .map_err(|e| fail(output, &e))?;
    inventory.persist();

    tracing::info!(
        size = status.cache_size,
        last_checked = %status.last_checked,
        "cache refreshed"
    );
    render_mode(output, &status, render_status_text, render_status_human)
}

fn render_status_human(status: &CacheStatus, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Cache")?;
    pretty_kv(w, "items", status.cache_size.to_string())?;
    pretty_kv(w, "last checked", status.last_checked.to_string())
}

fn render_status_text(status: &CacheStatus, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "cache_size\t{}", status.cache_size)?;
    writeln!(w, "last_checked\t{}", status.last_checked)
}
