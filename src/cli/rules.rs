use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::RuleSet;
use crate::error::Result;
use crate::settings::Settings;

pub fn list(settings: &Settings) -> Result<()> {
    let rules = RuleSet::new(settings.rules.clone())?;
    if rules.is_empty() {
        println!("No rules configured. Add them under \"rules\" in the settings file.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Pattern", "Type", "Account", "Category"]);
    for (i, rule) in rules.rules().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&rule.pattern),
            Cell::new(rule.match_type),
            Cell::new(rule.source_account.as_deref().unwrap_or("any")),
            Cell::new(&rule.category),
        ]);
    }
    println!("Rules (first match wins)\n{table}");
    Ok(())
}

pub fn test(settings: &Settings, description: &str, account: Option<&str>) -> Result<()> {
    let rules = RuleSet::new(settings.rules.clone())?;
    match rules.find_match(description, account.unwrap_or("")) {
        Some(rule) => println!(
            "'{description}' \u{2192} {} (rule: {} '{}')",
            rule.category.green().bold(),
            rule.match_type,
            rule.pattern
        ),
        None => println!("'{description}' \u{2192} {}", "uncategorized".yellow()),
    }
    Ok(())
}
