use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{Result, SyncError};
use crate::fmt::{money, truncate};
use crate::models::TransactionRecord;
use crate::pipeline::{discover_files, Pipeline, RunSummary};
use crate::settings::{shellexpand_path, Settings};
use crate::sheets::open_sheet;

pub fn run(settings: &Settings, uploads: Option<&str>, dry_run: bool) -> Result<()> {
    let uploads_dir = shellexpand_path(uploads.unwrap_or(&settings.uploads_dir));
    let pipeline = Pipeline::from_settings(settings)?;
    let files = discover_files(&uploads_dir)?;
    let mut sheet = open_sheet(&settings.sheet)?;

    tracing::info!(
        files = files.len(),
        uploads = %uploads_dir.display(),
        sheet = %settings.sheet.describe(),
        dry_run,
        "sync started"
    );
    println!("Syncing {} file(s) into {}", files.len(), settings.sheet.describe());

    let report = pipeline.run(&files, sheet.as_mut(), dry_run);

    if dry_run && !report.new_rows.is_empty() {
        print_rows("Would append", &report.new_rows);
    }
    print_summary(&report.summary, dry_run);

    if report.is_success() {
        return Ok(());
    }
    if let Some(e) = report.error {
        return Err(e);
    }
    let skipped = report.summary.files_skipped.len();
    Err(SyncError::Other(format!("{skipped} file(s) were not recognized")))
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let mut table = Table::new();
    table.set_header(vec!["", "Count"]);
    let rows: [(&str, usize); 8] = [
        ("Files processed", summary.files_processed),
        ("Records normalized", summary.normalized),
        ("Malformed rows skipped", summary.malformed),
        ("Filtered out", summary.filtered),
        ("Already in sheet", summary.remote_duplicates),
        ("Duplicates in batch", summary.batch_duplicates),
        ("Uncategorized", summary.uncategorized),
        ("Appended", summary.appended),
    ];
    for (label, count) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    println!("Run summary\n{table}");

    if !summary.files_skipped.is_empty() {
        let mut skipped = Table::new();
        skipped.set_header(vec!["File", "Reason"]);
        for s in &summary.files_skipped {
            skipped.add_row(vec![Cell::new(&s.file), Cell::new(&s.reason)]);
        }
        println!("{}\n{skipped}", "Skipped files".yellow().bold());
    }

    if dry_run {
        println!("{}", "Dry run: nothing was written.".yellow());
    } else if summary.appended > 0 {
        println!("{}", format!("{} new transaction(s) appended.", summary.appended).green().bold());
    }
}

fn print_rows(title: &str, rows: &[TransactionRecord]) {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Amount", "Description", "Account", "Category"]);
    for r in rows {
        let amount = if r.is_debit() {
            money(r.amount).red().to_string()
        } else {
            money(r.amount).green().to_string()
        };
        table.add_row(vec![
            Cell::new(r.date.format("%Y-%m-%d")),
            Cell::new(amount),
            Cell::new(truncate(&r.description, 40)),
            Cell::new(&r.source_account),
            Cell::new(r.category.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{title}\n{table}");
}
