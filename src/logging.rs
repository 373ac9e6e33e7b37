use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, SyncError};
use crate::settings::{shellexpand_path, LoggingSettings};

pub fn log_file_name(started: NaiveDateTime) -> String {
    started.format("%Y-%m-%d_%H-%M-%S_budgetsync.log").to_string()
}

/// Install the global subscriber. Each run gets its own log file under
/// `settings.dir`; `RUST_LOG` overrides the configured level. Returns the
/// path of the log file, if one was opened.
pub fn init(settings: &LoggingSettings, console: bool) -> Result<Option<PathBuf>> {
    let console = console || settings.console;
    if settings.dir.is_none() && !console {
        return Ok(None);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| SyncError::Settings(format!("logging.level '{}': {e}", settings.level)))?;

    let mut log_path = None;
    let file_layer = match &settings.dir {
        Some(dir) => {
            let dir = shellexpand_path(dir);
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(log_file_name(chrono::Local::now().naive_local()));
            let file = std::fs::File::create(&path)?;
            log_path = Some(path);
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };
    let console_layer = console.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| SyncError::Other(format!("could not install logger: {e}")))?;

    Ok(log_path)
}
