use std::path::Path;

use crate::error::{Result, SyncError};
use crate::settings::{save_settings, shellexpand_path, Settings, SheetSettings};

pub fn run(
    config_path: &Path,
    uploads_dir: Option<String>,
    local_sheet: Option<String>,
    spreadsheet_id: Option<String>,
    force: bool,
) -> Result<()> {
    if config_path.exists() && !force {
        return Err(SyncError::Settings(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }

    let mut settings = Settings::default();
    if let Some(dir) = uploads_dir {
        settings.uploads_dir = dir;
    }
    let date_format = settings.sheet.date_format().to_string();
    if let Some(path) = local_sheet {
        settings.sheet = SheetSettings::Local { path, date_format };
    } else if let Some(spreadsheet_id) = spreadsheet_id {
        let defaults: SheetSettings = serde_json::from_value(serde_json::json!({
            "backend": "google",
            "spreadsheet_id": spreadsheet_id,
        }))?;
        settings.sheet = defaults;
    }

    save_settings(&settings, config_path)?;
    std::fs::create_dir_all(shellexpand_path(&settings.uploads_dir))?;

    println!("Wrote settings to {}", config_path.display());
    println!("Uploads:  {}", settings.uploads_dir);
    println!("Sheet:    {}", settings.sheet.describe());
    if let SheetSettings::Google { token_env, .. } = &settings.sheet {
        println!("Export an OAuth access token as {token_env} before running `budgetsync sync`.");
    }
    Ok(())
}
