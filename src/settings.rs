use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::categorizer::CategoryRule;
use crate::error::{Result, SyncError};
use crate::filter::TransactionFilter;
use crate::importer::BankFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    #[serde(default)]
    pub sheet: SheetSettings,
    /// Extra bank layouts, tried before the built-in ones.
    #[serde(default)]
    pub formats: Vec<BankFormat>,
    /// Ordered; first match wins.
    #[serde(default)]
    pub rules: Vec<CategoryRule>,
    #[serde(default)]
    pub filter: TransactionFilter,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            sheet: SheetSettings::default(),
            formats: Vec::new(),
            rules: Vec::new(),
            filter: TransactionFilter::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SheetSettings {
    Google {
        spreadsheet_id: String,
        /// A1 range of the transaction log, e.g. `Transactions!A2:E`.
        #[serde(default = "default_range")]
        range: String,
        /// Environment variable holding the OAuth access token.
        #[serde(default = "default_token_env")]
        token_env: String,
        #[serde(default = "default_api_base")]
        api_base: String,
        #[serde(default = "default_sheet_date_format")]
        date_format: String,
    },
    Local {
        path: String,
        #[serde(default = "default_sheet_date_format")]
        date_format: String,
    },
}

impl Default for SheetSettings {
    fn default() -> Self {
        SheetSettings::Local {
            path: default_data_dir().join("transactions.csv").to_string_lossy().to_string(),
            date_format: default_sheet_date_format(),
        }
    }
}

impl SheetSettings {
    pub fn date_format(&self) -> &str {
        match self {
            SheetSettings::Google { date_format, .. } | SheetSettings::Local { date_format, .. } => date_format,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SheetSettings::Google { spreadsheet_id, range, .. } => format!("Google Sheet {spreadsheet_id} ({range})"),
            SheetSettings::Local { path, .. } => format!("local sheet {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// One log file per run is written here when set.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            console: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_range() -> String {
    "Transactions!A2:E".to_string()
}

fn default_token_env() -> String {
    "BUDGETSYNC_SHEETS_TOKEN".to_string()
}

fn default_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_sheet_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_uploads_dir() -> String {
    default_data_dir().join("uploads").to_string_lossy().to_string()
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("budgetsync")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("budgetsync")
}

/// Missing file means defaults; a file that does not parse is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SyncError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| SyncError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}
