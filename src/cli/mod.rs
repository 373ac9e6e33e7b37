pub mod check;
pub mod formats;
pub mod init;
pub mod rules;
pub mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::settings::{load_settings, settings_path, shellexpand_path, Settings};

#[derive(Parser)]
#[command(
    name = "budgetsync",
    version,
    about = "Import bank CSV exports into a budget spreadsheet without duplicates."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/budgetsync/settings.json)
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Echo log output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .as_deref()
            .map(shellexpand_path)
            .unwrap_or_else(settings_path)
    }

    pub fn load_settings(&self) -> Result<Settings> {
        load_settings(&self.config_path())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default settings file.
    Init {
        /// Directory watched for bank exports
        #[arg(long = "uploads-dir")]
        uploads_dir: Option<String>,
        /// Use a local CSV file as the transaction log
        #[arg(long = "local-sheet", conflicts_with = "spreadsheet_id")]
        local_sheet: Option<String>,
        /// Use this Google spreadsheet as the transaction log
        #[arg(long = "spreadsheet-id")]
        spreadsheet_id: Option<String>,
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Import every CSV in the uploads directory and append new transactions.
    Sync {
        /// Directory of CSV exports (default: uploads_dir from settings)
        #[arg(long)]
        uploads: Option<String>,
        /// Reconcile and report, but do not write to the sheet
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Normalize and categorize one file without touching the sheet.
    Check {
        /// Path to a bank CSV export
        file: String,
    },
    /// List the registered bank formats.
    Formats,
    /// Inspect category rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in match order.
    List,
    /// Show which rule a description would match.
    Test {
        /// Transaction description to try
        description: String,
        /// Source account the transaction came from
        #[arg(long)]
        account: Option<String>,
    },
}
