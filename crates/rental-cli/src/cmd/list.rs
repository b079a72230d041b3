//! `rental list`: list items, optionally filtered by type, location or status.

use std::io::{self, Write};

use clap::Args;
use rental_core::Item;
use rental_core::service::ItemFilter;

use crate::context::Inventory;
use crate::output::{OutputMode, Renderable, render_list};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only items carrying this type tag (e.g. "Laptop").
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub item_type: Option<String>,

    /// Only items at this location.
    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// Only items with this status (e.g. "verfügbar").
    #[arg(long, short = 's')]
    pub status: Option<String>,
}

impl ListArgs {
    fn filter(&self) -> ItemFilter {
        ItemFilter {
            item_type: self.item_type.clone(),
            location: self.location.clone(),
            status: self.status.clone(),
        }
    }
}

pub(crate) fn uid_label(item: &Item) -> String {
    item.uid.map_or_else(|| "-".to_string(), |uid| format!("{uid:03}"))
}

pub(crate) fn types_label(item: &Item) -> String {
    item.typ.as_ref().map_or_else(String::new, |tags| tags.join(", "))
}

impl Renderable for Item {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let status = self.status.as_deref().unwrap_or("?");
        let name = self.name.as_deref().unwrap_or("(unnamed)");
        write!(w, "{:>4}  {status:<11} {name}", uid_label(self))?;
        let types = types_label(self);
        if !types.is_empty() {
            write!(w, "  [{types}]")?;
        }
        if let Some(borrower) = &self.ausleiher {
            write!(w, "  → {borrower}")?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            uid_label(self),
            self.status.as_deref().unwrap_or(""),
            types_label(self),
            self.name.as_deref().unwrap_or(""),
            self.standort.as_deref().unwrap_or(""),
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["UID", "STATUS", "TYPE", "NAME", "LOCATION"]
    }
}

/// Execute `rental list`.
///
/// # Errors
///
/// Returns an error if output rendering fails. Wiki failures degrade to the
/// cached items.
pub fn run_list(args: &ListArgs, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    let items = inventory.service.list_items(&args.filter());
    inventory.persist();
    render_list(&items, output)?;
    Ok(())
}
