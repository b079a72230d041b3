//! `rental rent` and `rental return`: lend an item out and take it back.

use chrono::{Local, NaiveDate};
use clap::Args;
use rental_core::service::{RentRequest, ReturnRequest};

use crate::cmd::show::{render_item_human, render_item_text};
use crate::context::Inventory;
use crate::output::{OutputMode, fail, render_mode};

#[derive(Args, Debug)]
pub struct RentArgs {
    /// Item number.
    pub uid: u32,

    /// Who takes the item.
    #[arg(long, short = 'u')]
    pub user: String,

    /// First day of the loan (YYYY-MM-DD, default: today).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Agreed return date (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Appended to the item's notes.
    #[arg(long, short = 'm')]
    pub comment: Option<String>,
}

impl RentArgs {
    fn request(&self, today: NaiveDate) -> RentRequest {
        RentRequest {
            user_name: self.user.clone(),
            from_date: self.from.unwrap_or(today),
            to_date: self.to,
            comment: self.comment.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ReturnArgs {
    /// Item number.
    pub uid: u32,

    /// Who brings the item back.
    #[arg(long, short = 'u')]
    pub user: String,

    /// Appended to the item's notes.
    #[arg(long, short = 'm')]
    pub comment: Option<String>,
}

/// Execute `rental rent <uid> --user <name>`.
///
/// # Errors
///
/// Returns an error if the item is already lent, the dates are inconsistent,
/// or the wiki write fails.
pub fn run_rent(args: &RentArgs, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    let request = args.request(Local::now().date_naive());
    let item = inventory
        .service
        .rent_item(args.uid, &request)
        .map_err(|e| fail(output, &e))?;
    inventory.persist();

    tracing::info!(uid = args.uid, borrower = %request.user_name, "item lent");
    render_mode(output, &item, render_item_text, render_item_human)
}

/// Execute `rental return <uid> --user <name>`.
///
/// # Errors
///
/// Returns an error if the item is not lent or the wiki write fails.
pub fn run_return(args: &ReturnArgs, output: OutputMode, inventory: &Inventory) -> anyhow::Result<()> {
    let request = ReturnRequest {
        user_name: args.user.clone(),
        comment: args.comment.clone(),
    };
    let item = inventory
        .service
        .return_item(args.uid, &request)
        .map_err(|e| fail(output, &e))?;
    inventory.persist();

    tracing::info!(uid = args.uid, "item returned");
    render_mode(output, &item, render_item_text, render_item_human)
}
