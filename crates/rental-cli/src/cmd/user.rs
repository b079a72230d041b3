//! `rental user`: look up a directory user and the operations they may perform.

use std::io::Write;

use clap::Args;
use rental_core::UserPermissions;
use rental_core::config::Config;

use crate::context::open_auth;
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct UserArgs {
    /// Directory user id (e.g. "abc12345").
    pub user_id: String,
}

/// Execute `rental user <id>`.
///
/// # Errors
///
/// Returns an error if no directory is configured, the user is unknown, or
/// the directory misbehaves.
pub fn run_user(args: &UserArgs, output: OutputMode, config: &Config) -> anyhow::Result<()> {
    let auth = open_auth(config, output)?;
    let Some(user) = auth
        .lookup_user(&args.user_id)
        .map_err(|e| fail(output, &e))?
    else {
        render_error(
            output,
            &CliError::with_details(
                format!("user '{}' not found", args.user_id),
                "check the user id; directory timeouts also report not found",
                "user_not_found",
            ),
        )?;
        anyhow::bail!("user '{}' not found", args.user_id);
    };

    render_mode(output, &user, render_user_text, render_user_human)
}

fn allowed_label(user: &UserPermissions) -> String {
    user.allowed
        .iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_user_human(user: &UserPermissions, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("User {}", user.user_id))?;
    if let Some(name) = &user.name {
        pretty_kv(w, "name", name)?;
    }
    if let Some(email) = &user.email {
        pretty_kv(w, "email", email)?;
    }
    pretty_kv(w, "allowed", allowed_label(user))?;
    for group in &user.groups {
        pretty_kv(w, "group", group)?;
    }
    Ok(())
}

fn render_user_text(user: &UserPermissions, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "user_id\t{}", user.user_id)?;
    writeln!(w, "name\t{}", user.name.as_deref().unwrap_or(""))?;
    writeln!(w, "email\t{}", user.email.as_deref().unwrap_or(""))?;
    writeln!(w, "allowed\t{}", allowed_label(user))?;
    writeln!(w, "groups\t{}", user.groups.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rental_core::Operation;

    #[test]
    fn text_output_lists_operations() {
        let user = UserPermissions {
            user_id: "abc12345".into(),
            name: Some("Erika".into()),
            email: None,
            groups: vec!["mi-staff.mi.uni-regensburg.de".into()],
            allowed: vec![Operation::ReadItem, Operation::ListItems, Operation::UpdateItem],
        };
        let mut buf = Vec::new();
        render_user_text(&user, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("allowed\tread_item, list_items, update_item\n"));
        assert!(text.contains("email\t\n"));
    }
}
