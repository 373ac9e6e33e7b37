use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::{money, truncate};
use crate::pipeline::Pipeline;
use crate::settings::{shellexpand_path, Settings};

pub fn run(settings: &Settings, file: &str) -> Result<()> {
    let path: PathBuf = shellexpand_path(file);
    let pipeline = Pipeline::from_settings(settings)?;
    let normalized = pipeline.registry.normalize_path(&path)?;

    println!(
        "{} matched {} ({})",
        normalized.file_name,
        normalized.format.name.bold(),
        normalized.format.key
    );

    let mut table = Table::new();
    table.set_header(vec!["Key", "Date", "Amount", "Description", "Category", ""]);
    let mut count = 0usize;
    for record in normalized.records() {
        count += 1;
        let filtered = pipeline.filter.is_excluded(&record.description);
        let record = pipeline.rules.resolve(record);
        table.add_row(vec![
            Cell::new(record.key().short()),
            Cell::new(record.date.format("%Y-%m-%d")),
            Cell::new(money(record.amount)),
            Cell::new(truncate(&record.description, 40)),
            Cell::new(record.category.as_deref().unwrap_or("-")),
            Cell::new(if filtered { "filtered" } else { "" }),
        ]);
    }
    println!("{count} record(s)\n{table}");

    let warnings = normalized.warnings();
    if !warnings.is_empty() {
        println!("{}", format!("{} row(s) skipped:", warnings.len()).yellow().bold());
        for w in &warnings {
            println!("  {w}");
        }
    }
    Ok(())
}
