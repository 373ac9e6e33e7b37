mod categorizer;
mod cli;
mod error;
mod filter;
mod fmt;
mod importer;
mod logging;
mod models;
mod pipeline;
mod reconciler;
mod settings;
mod sheets;

use clap::Parser;

use cli::{Cli, Commands, RulesCommands};
use error::Result;

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init {
        uploads_dir,
        local_sheet,
        spreadsheet_id,
        force,
    } = &cli.command
    {
        return cli::init::run(
            &cli.config_path(),
            uploads_dir.clone(),
            local_sheet.clone(),
            spreadsheet_id.clone(),
            *force,
        );
    }

    let settings = cli.load_settings()?;
    if let Some(path) = logging::init(&settings.logging, cli.verbose)? {
        tracing::info!(log = %path.display(), config = %cli.config_path().display(), "budgetsync {}", env!("CARGO_PKG_VERSION"));
    }

    match &cli.command {
        Commands::Sync { uploads, dry_run } => cli::sync::run(&settings, uploads.as_deref(), *dry_run),
        Commands::Check { file } => cli::check::run(&settings, file),
        Commands::Formats => cli::formats::list(&settings),
        Commands::Rules { command } => match command {
            RulesCommands::List => cli::rules::list(&settings),
            RulesCommands::Test { description, account } => {
                cli::rules::test(&settings, description, account.as_deref())
            }
        },
        Commands::Init { .. } => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "run failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
