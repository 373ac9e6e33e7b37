use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::importer::{AmountMapping, FormatRegistry, SignConvention};
use crate::settings::Settings;

pub fn list(settings: &Settings) -> Result<()> {
    let registry = FormatRegistry::new(settings.formats.clone());

    let mut table = Table::new();
    table.set_header(vec!["Key", "Name", "Header columns", "Amount", "Source account"]);
    for format in registry.iter() {
        let amount = match &format.amount {
            AmountMapping::Signed { column, convention: SignConvention::DebitNegative } => column.clone(),
            AmountMapping::Signed { column, convention: SignConvention::DebitPositive } => {
                format!("{column} (charges positive)")
            }
            AmountMapping::Split { debit, credit } => format!("{debit} / {credit}"),
        };
        table.add_row(vec![
            Cell::new(&format.key),
            Cell::new(&format.name),
            Cell::new(match &format.columns {
                Some(columns) => format!(
                    "(no header) {}; file name contains '{}'",
                    columns.join(", "),
                    format.filename_hint.as_deref().unwrap_or("")
                ),
                None => format.header_signature().join(", "),
            }),
            Cell::new(amount),
            Cell::new(format.source_account()),
        ]);
    }
    println!("Formats (checked in this order)\n{table}");
    Ok(())
}
