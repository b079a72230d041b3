//! `rental vocab`: print the controlled vocabularies used for validation.

use std::io::Write;

use clap::{Args, ValueEnum};
use rental_core::vocab;

use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VocabKind {
    Locations,
    Statuses,
    Types,
}

impl VocabKind {
    const fn values(self) -> &'static [&'static str] {
        match self {
            Self::Locations => vocab::LOCATIONS,
            Self::Statuses => vocab::STATUSES,
            Self::Types => vocab::TYPES,
        }
    }

    const fn heading(self) -> &'static str {
        match self {
            Self::Locations => "Locations",
            Self::Statuses => "Statuses",
            Self::Types => "Types",
        }
    }
}

#[derive(Args, Debug)]
pub struct VocabArgs {
    #[arg(value_enum)]
    pub kind: VocabKind,
}

/// Execute `rental vocab <kind>`.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run_vocab(args: &VocabArgs, output: OutputMode) -> anyhow::Result<()> {
    let kind = args.kind;
    render_mode(
        output,
        &kind.values(),
        |values, w| write_plain(values, w),
        |values, w| {
            pretty_section(w, kind.heading())?;
            write_plain(values, w)
        },
    )
}

fn write_plain(values: &&[&str], w: &mut dyn Write) -> std::io::Result<()> {
    for value in *values {
        writeln!(w, "{value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_non_empty() {
        for kind in [VocabKind::Locations, VocabKind::Statuses, VocabKind::Types] {
            assert!(!kind.values().is_empty(), "{kind:?}");
        }
    }

    #[test]
    fn plain_output_is_one_value_per_line() {
        let mut buf = Vec::new();
        write_plain(&VocabKind::Statuses.values(), &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.lines().count(), vocab::STATUSES.len());
        assert!(text.lines().any(|l| l == vocab::STATUS_LENT));
    }
}
