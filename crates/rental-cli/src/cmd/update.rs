//! `rental update`: change selected fields of one item and write it back.

use std::io::Write;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rental_core::Item;
use rental_core::service::UpdateAck;

use crate::context::Inventory;
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render};

/// Fields that `--clear` can blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearField {
    Type,
    Location,
    Os,
    Accessories,
    Serials,
    Borrower,
    From,
    To,
    Notes,
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Item number.
    pub uid: u32,

    #[arg(long)]
    pub name: Option<String>,

    /// Type tag; repeat to set several. Replaces the existing tags.
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub types: Vec<String>,

    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// Operating system.
    #[arg(long)]
    pub os: Option<String>,

    #[arg(long)]
    pub accessories: Option<String>,

    /// Serial numbers, free text.
    #[arg(long)]
    pub serials: Option<String>,

    #[arg(long, short = 's')]
    pub status: Option<String>,

    #[arg(long)]
    pub borrower: Option<String>,

    /// Lent from (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Lent until (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Replace the notes.
    #[arg(long)]
    pub notes: Option<String>,

    /// Blank a field; may be repeated.
    #[arg(long, value_enum, value_name = "FIELD")]
    pub clear: Vec<ClearField>,
}

impl UpdateArgs {
    /// Overlay the flags onto `item`. Clears run after sets.
    fn apply(&self, mut item: Item) -> Item {
        if let Some(name) = &self.name {
            item.name = Some(name.clone());
        }
        if !self.types.is_empty() {
            item.typ = Some(self.types.clone());
        }
        set(&mut item.standort, self.location.as_ref());
        set(&mut item.os, self.os.as_ref());
        set(&mut item.zubehoer, self.accessories.as_ref());
        set(&mut item.seriennummern, self.serials.as_ref());
        set(&mut item.status, self.status.as_ref());
        set(&mut item.ausleiher, self.borrower.as_ref());
        set(&mut item.anmerkungen, self.notes.as_ref());
        if self.from.is_some() {
            item.von = self.from;
        }
        if self.to.is_some() {
            item.bis = self.to;
        }

        for field in &self.clear {
            match field {
                ClearField::Type => item.typ = None,
                ClearField::Location => item.standort = None,
                ClearField::Os => item.os = None,
                ClearField::Accessories => item.zubehoer = None,
                ClearField::Serials => item.seriennummern = None,
                ClearField::Borrower => item.ausleiher = None,
                ClearField::From => item.von = None,
                ClearField::To => item.bis = None,
                ClearField::Notes => item.anmerkungen = None,
            }
        }
        item
    }

    const fn is_noop(&self) -> bool {
        self.name.is_none()
            && self.types.is_empty()
            && self.location.is_none()
            && self.os.is_none()
            && self.accessories.is_none()
            && self.serials.is_none()
            && self.status.is_none()
            && self.borrower.is_none()
            && self.from.is_none()
            && self.to.is_none()
            && self.notes.is_none()
            && self.clear.is_empty()
    }
}

fn set(slot: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}

/// Execute `rental update <uid> [fields...]`.
///
/// The current record is fetched fresh from the wiki so the update is applied
/// to what the wiki holds now, not to a stale cache entry.
///
/// # Errors
///
/// Returns an error if no field was given, the item does not exist, the new
/// values fail validation, or the wiki rejects the write.
pub fn run_update(args: &UpdateArgs, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    if args.is_noop() {
        anyhow::bail!("nothing to update: pass at least one field flag");
    }

    let current = inventory
        .service
        .get_item(args.uid, true)
        .map_err(|e| fail(output, &e))?;
    let ack = inventory
        .service
        .update_item(args.uid, args.apply(current))
        .map_err(|e| fail(output, &e))?;
    inventory.persist();

    tracing::info!(uid = ack.item_id, "item updated");
    render(output, &ack, render_ack)
}

pub(crate) fn render_ack(ack: &UpdateAck, w: &mut dyn Write) -> std::io::Result<()> {
    let name = ack.item_name.as_deref().unwrap_or("(unnamed)");
    pretty_section(w, &format!("Updated item {:03} ({name})", ack.item_id))?;
    for (key, value) in &ack.record {
        pretty_kv(w, key, value.to_string())?;
    }
    Ok(())
}
