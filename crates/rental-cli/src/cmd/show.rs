//! `rental show`: display all fields of one item.

use std::io::Write;

use clap::Args;
use rental_core::Item;

use crate::cmd::list::{types_label, uid_label};
use crate::context::Inventory;
use crate::output::{OutputMode, fail, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item number, as in the page name (`42` or `042`).
    pub uid: u32,

    /// Bypass the cache and fetch the page directly.
    #[arg(long)]
    pub fresh: bool,
}

/// Execute `rental show <uid>`.
///
/// # Errors
///
/// Returns an error if the item does not exist, the wiki cannot be reached
/// for an uncached item, or rendering fails.
pub fn run_show(args: &ShowArgs, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    let item = inventory
        .service
        .get_item(args.uid, args.fresh)
        .map_err(|e| fail(output, &e))?;
    inventory.persist();

    render_mode(output, &item, render_item_text, render_item_human)
}

fn fields(item: &Item) -> Vec<(&'static str, String)> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    vec![
        ("typ", types_label(item)),
        ("status", text(&item.status)),
        ("standort", text(&item.standort)),
        ("os", text(&item.os)),
        ("zubehoer", text(&item.zubehoer)),
        ("seriennummern", text(&item.seriennummern)),
        ("ausleiher", text(&item.ausleiher)),
        ("von", date(item.von)),
        ("bis", date(item.bis)),
        ("anmerkungen", text(&item.anmerkungen)),
        ("url", text(&item.url)),
    ]
}

pub(crate) fn render_item_human(item: &Item, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Item {}", uid_label(item)))?;
    writeln!(w, "{}", item.name.as_deref().unwrap_or("(unnamed)"))?;
    pretty_rule(w)?;
    for (key, value) in fields(item) {
        if !value.is_empty() {
            pretty_kv(w, key, value)?;
        }
    }
    Ok(())
}

pub(crate) fn render_item_text(item: &Item, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "uid\t{}", uid_label(item))?;
    writeln!(w, "name\t{}", item.name.as_deref().unwrap_or(""))?;
    for (key, value) in fields(item) {
        writeln!(w, "{key}\t{value}")?;
    }
    Ok(())
}
