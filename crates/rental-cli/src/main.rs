#![forbid(unsafe_code)]

mod cmd;
mod context;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::context::Inventory;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rental: equipment inventory on top of a DokuWiki namespace",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (ignored when RENTAL_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (pretty, text, json).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Config file (default: $RENTAL_CONFIG, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List inventory items",
        long_about = "List inventory items, refreshing the cache first. Falls back to cached items when the wiki is unreachable.",
        after_help = "EXAMPLES:\n    # Everything\n    rental list\n\n    # Available laptops\n    rental list --type Laptop --status verfügbar\n\n    # Emit machine-readable output\n    rental list --format json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one item",
        after_help = "EXAMPLES:\n    # Show item 42 from the cache\n    rental show 42\n\n    # Re-read the wiki page first\n    rental show 42 --fresh"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Search items by free text",
        after_help = "EXAMPLES:\n    # Case-insensitive substring search\n    rental search thinkpad"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Write",
        about = "Change fields of an item",
        after_help = "EXAMPLES:\n    # Move an item\n    rental update 42 --location Safe\n\n    # Mark as broken and drop the notes\n    rental update 42 --status defekt --clear notes"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Write",
        about = "Lend an item",
        after_help = "EXAMPLES:\n    # Lend item 7 starting today\n    rental rent 7 --user \"Erika Mustermann\" --to 2024-06-30"
    )]
    Rent(cmd::rent::RentArgs),

    #[command(
        next_help_heading = "Write",
        about = "Take a lent item back",
        after_help = "EXAMPLES:\n    # Return item 7\n    rental return 7 --user \"Erika Mustermann\" --comment \"Akku schwach\""
    )]
    Return(cmd::rent::ReturnArgs),

    #[command(
        next_help_heading = "Access",
        about = "Look up a directory user and their permissions",
        after_help = "EXAMPLES:\n    # Who is abc12345 and may they edit?\n    rental user abc12345"
    )]
    User(cmd::user::UserArgs),

    #[command(next_help_heading = "Maintenance", about = "Refresh or rebuild the item cache")]
    Cache {
        #[command(subcommand)]
        command: cmd::cache::CacheCommand,
    },

    #[command(
        next_help_heading = "Maintenance",
        about = "Print a controlled vocabulary",
        after_help = "EXAMPLES:\n    # Valid status values\n    rental vocab statuses"
    )]
    Vocab(cmd::vocab::VocabArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    rental completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Filter used when RENTAL_LOG is unset.
const fn default_filter(debug: bool) -> &'static str {
    if debug {
        "rental=debug,rental_core=debug,info"
    } else {
        "rental=info,rental_core=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RENTAL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(verbose || env::var("DEBUG").is_ok()))
    });

    let format = env::var("RENTAL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "starting");

    let output = cli.output_mode();

    match cli.command {
        Commands::Vocab(ref args) => cmd::vocab::run_vocab(args, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
        Commands::User(ref args) => {
            let config = context::load_config(cli.config.as_deref(), output)?;
            cmd::user::run_user(args, output, &config)
        }
        ref command => {
            let config = context::load_config(cli.config.as_deref(), output)?;
            let inventory = Inventory::open(&config)?;
            run_inventory_command(command, output, &inventory)
        }
    }
}

fn run_inventory_command(
    command: &Commands,
    output: OutputMode,
    inventory: &Inventory,
) -> anyhow::Result<()> {
    match command {
        Commands::List(args) => cmd::list::run_list(args, output, inventory),
        Commands::Show(args) => cmd::show::run_show(args, output, inventory),
        Commands::Search(args) => cmd::search::run_search(args, output, inventory),
        Commands::Update(args) => cmd::update::run_update(args, output, inventory),
        Commands::Rent(args) => cmd::rent::run_rent(args, output, inventory),
        Commands::Return(args) => cmd::rent::run_return(args, output, inventory),
        Commands::Cache { command } => cmd::cache::run_cache(command, output, inventory),
        Commands::User(_) | Commands::Vocab(_) | Commands::Completions(_) => {
            anyhow::bail!("command does not use the inventory")
        }
    }
}
