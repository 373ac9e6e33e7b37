//! Remote budget sheet access.
//!
//! The pipeline only needs two operations from the sheet: read the identity
//! of every transaction already logged, and append new rows. Both live behind
//! [`SheetSync`] so the pipeline can run against Google Sheets, a local CSV
//! ledger, or an in-memory fake in tests.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::importer::{parse_amount, parse_date_lenient};
use crate::models::{TransactionKey, TransactionRecord};
use crate::settings::{shellexpand_path, SheetSettings};

pub trait SheetSync {
    /// Keys of every transaction currently in the transaction log.
    fn fetch_existing_keys(&self) -> Result<HashSet<TransactionKey>>;

    /// Append one row per record at the end of the transaction log.
    fn append_rows(&mut self, rows: &[TransactionRecord]) -> Result<()>;
}

/// Derive keys from raw sheet rows laid out as
/// date, amount, description, source account[, category]. Rows that do not
/// parse (headers, totals, notes) are skipped.
pub fn keys_from_rows<I>(rows: I, date_format: &str) -> HashSet<TransactionKey>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut keys = HashSet::new();
    let mut skipped = 0usize;
    for row in rows {
        match key_from_row(&row, date_format) {
            Some(key) => {
                keys.insert(key);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "ignored sheet rows that are not transactions");
    }
    keys
}

fn key_from_row(row: &[String], date_format: &str) -> Option<TransactionKey> {
    let [date, amount, description, source, ..] = row else {
        return None;
    };
    let date = parse_date_lenient(date, date_format)?;
    let amount = parse_amount(amount)?;
    let description = description.trim();
    if description.is_empty() {
        return None;
    }
    let record = TransactionRecord::new(date, amount, description, source);
    Some(record.key().clone())
}

pub fn open_sheet(settings: &SheetSettings) -> Result<Box<dyn SheetSync>> {
    match settings {
        SheetSettings::Local { path, date_format } => {
            Ok(Box::new(LocalSheet::new(shellexpand_path(path), date_format)))
        }
        #[cfg(feature = "google")]
        SheetSettings::Google { .. } => Ok(Box::new(GoogleSheetsClient::from_settings(settings)?)),
        #[cfg(not(feature = "google"))]
        SheetSettings::Google { .. } => Err(SyncError::Settings(
            "this build does not include Google Sheets support".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Local CSV ledger
// ---------------------------------------------------------------------------

/// A CSV file standing in for the spreadsheet's transaction log.
pub struct LocalSheet {
    path: PathBuf,
    date_format: String,
}

impl LocalSheet {
    pub fn new(path: PathBuf, date_format: &str) -> Self {
        Self {
            path,
            date_format: date_format.to_string(),
        }
    }
}

impl SheetSync for LocalSheet {
    fn fetch_existing_keys(&self) -> Result<HashSet<TransactionKey>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| SyncError::RemoteFetch(format!("{}: {e}", self.path.display())))?;
        let rows = rdr
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SyncError::RemoteFetch(format!("{}: {e}", self.path.display())))?;
        Ok(keys_from_rows(
            rows.iter().map(|r| r.iter().map(str::to_string).collect()),
            &self.date_format,
        ))
    }

    fn append_rows(&mut self, rows: &[TransactionRecord]) -> Result<()> {
        let append_err = |e: &dyn std::fmt::Display| SyncError::RemoteAppend(format!("{}: {e}", self.path.display()));
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| append_err(&e))?;
        }
        let unterminated = ends_mid_line(&self.path).map_err(|e| append_err(&e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| append_err(&e))?;
        if unterminated {
            file.write_all(b"\n").map_err(|e| append_err(&e))?;
        }
        let mut wtr = csv::Writer::from_writer(file);
        for record in rows {
            wtr.write_record(record.to_sheet_row(&self.date_format))
                .map_err(|e| append_err(&e))?;
        }
        wtr.flush().map_err(|e| append_err(&e))?;
        Ok(())
    }
}

/// True when the file exists, is non-empty and its last byte is not a newline.
fn ends_mid_line(path: &Path) -> std::io::Result<bool> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

// ---------------------------------------------------------------------------
// Google Sheets (REST v4)
// ---------------------------------------------------------------------------

#[cfg(feature = "google")]
pub use google::GoogleSheetsClient;

#[cfg(feature = "google")]
mod google {
    use std::collections::HashSet;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::{keys_from_rows, SheetSync};
    use crate::error::{Result, SyncError};
    use crate::models::{TransactionKey, TransactionRecord};
    use crate::settings::SheetSettings;

    const USER_AGENT: &str = concat!("budgetsync/", env!("CARGO_PKG_VERSION"));

    #[derive(Debug, Deserialize)]
    struct ValueRange {
        #[serde(default)]
        values: Vec<Vec<serde_json::Value>>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct AppendBody<'a> {
        major_dimension: &'a str,
        values: Vec<Vec<String>>,
    }

    /// Blocking client for one transaction-log range of one spreadsheet.
    pub struct GoogleSheetsClient {
        http: reqwest::blocking::Client,
        api_base: String,
        spreadsheet_id: String,
        range: String,
        token: String,
        date_format: String,
    }

    impl GoogleSheetsClient {
        pub fn new(api_base: &str, spreadsheet_id: &str, range: &str, token: &str, date_format: &str) -> Result<Self> {
            let http = reqwest::blocking::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(30))
                .build()?;
            Ok(Self {
                http,
                api_base: api_base.trim_end_matches('/').to_string(),
                spreadsheet_id: spreadsheet_id.to_string(),
                range: range.to_string(),
                token: token.to_string(),
                date_format: date_format.to_string(),
            })
        }

        /// The access token is read from the environment variable named in
        /// the settings; obtaining it is left to the caller's auth tooling.
        pub fn from_settings(settings: &SheetSettings) -> Result<Self> {
            let SheetSettings::Google {
                spreadsheet_id,
                range,
                token_env,
                api_base,
                date_format,
            } = settings
            else {
                return Err(SyncError::Settings("sheet backend is not google".to_string()));
            };
            if spreadsheet_id.trim().is_empty() {
                return Err(SyncError::Settings("sheet.spreadsheet_id is empty".to_string()));
            }
            let token = std::env::var(token_env)
                .map_err(|_| SyncError::Settings(format!("environment variable {token_env} is not set")))?;
            Self::new(api_base, spreadsheet_id, range, &token, date_format)
        }

        fn values_url(&self) -> String {
            format!(
                "{}/v4/spreadsheets/{}/values/{}",
                self.api_base, self.spreadsheet_id, self.range
            )
        }
    }

    /// Row cells for a `USER_ENTERED` append. Date and amount are left for
    /// Sheets to parse; text cells get a leading apostrophe so they are
    /// stored verbatim and read back unchanged (`00123`, `1/2`, `=x`, `+ x`).
    fn user_entered_row(record: &TransactionRecord, date_format: &str) -> Vec<String> {
        let mut cells = record.to_sheet_row(date_format);
        for cell in cells.iter_mut().skip(2).filter(|c| !c.is_empty()) {
            cell.insert(0, '\'');
        }
        cells
    }

    fn cell_text(value: serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    impl SheetSync for GoogleSheetsClient {
        fn fetch_existing_keys(&self) -> Result<HashSet<TransactionKey>> {
            let resp = self
                .http
                .get(self.values_url())
                .bearer_auth(&self.token)
                .send()
                .map_err(|e| SyncError::RemoteFetch(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(SyncError::RemoteFetch(format!("HTTP {}: {}", status.as_u16(), body.trim())));
            }
            let range: ValueRange = resp
                .json()
                .map_err(|e| SyncError::RemoteFetch(format!("unexpected response: {e}")))?;
            tracing::info!(rows = range.values.len(), range = %self.range, "fetched sheet rows");
            Ok(keys_from_rows(
                range
                    .values
                    .into_iter()
                    .map(|row| row.into_iter().map(cell_text).collect()),
                &self.date_format,
            ))
        }

        fn append_rows(&mut self, rows: &[TransactionRecord]) -> Result<()> {
            let url = format!(
                "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
                self.values_url()
            );
            let body = AppendBody {
                major_dimension: "ROWS",
                values: rows.iter().map(|r| user_entered_row(r, &self.date_format)).collect(),
            };
            let resp = self
                .http
                .post(url)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .map_err(|e| SyncError::RemoteAppend(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(SyncError::RemoteAppend(format!("HTTP {}: {}", status.as_u16(), body.trim())));
            }
            tracing::info!(rows = rows.len(), range = %self.range, "appended rows");
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;
        use httpmock::prelude::*;
        use rust_decimal::Decimal;
        use serde_json::json;

        const VALUES_PATH: &str = "/v4/spreadsheets/sheet-1/values/Transactions!A2:E";

        fn client(server: &MockServer) -> GoogleSheetsClient {
            GoogleSheetsClient::new(&server.base_url(), "sheet-1", "Transactions!A2:E", "tok", "%m/%d/%Y").unwrap()
        }

        fn record(day: u32, cents: i64, desc: &str) -> TransactionRecord {
            TransactionRecord::new(
                NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                Decimal::new(cents, 2),
                desc,
                "chase_checking",
            )
        }

        #[test]
        fn test_fetch_existing_keys() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(GET).path(VALUES_PATH).header("authorization", "Bearer tok");
                then.status(200).json_body(json!({
                    "range": "Transactions!A2:E40",
                    "majorDimension": "ROWS",
                    "values": [
                        ["01/06/2024", "-$100.00", "RENT", "chase_checking", "Housing"],
                        ["01/07/2024", -12.5, "LUNCH", "chase_checking"],
                        ["Total", "", ""]
                    ]
                }));
            });

            let keys = client(&server).fetch_existing_keys().unwrap();
            mock.assert();
            assert_eq!(keys.len(), 2);
            assert!(keys.contains(record(6, -10000, "RENT").key()));
            assert!(keys.contains(record(7, -1250, "LUNCH").key()));
        }

        #[test]
        fn test_fetch_empty_range_has_no_values_field() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path(VALUES_PATH);
                then.status(200).json_body(json!({"range": "Transactions!A2:E", "majorDimension": "ROWS"}));
            });
            assert!(client(&server).fetch_existing_keys().unwrap().is_empty());
        }

        #[test]
        fn test_fetch_failure_is_remote_fetch_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path(VALUES_PATH);
                then.status(404).body("Requested entity was not found.");
            });
            let err = client(&server).fetch_existing_keys().err().unwrap();
            match err {
                SyncError::RemoteFetch(msg) => assert!(msg.contains("404"), "{msg}"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_append_rows_posts_user_entered_values() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path(format!("{VALUES_PATH}:append"))
                    .query_param("valueInputOption", "USER_ENTERED")
                    .query_param("insertDataOption", "INSERT_ROWS")
                    .header("authorization", "Bearer tok")
                    .json_body(json!({
                        "majorDimension": "ROWS",
                        "values": [
                            ["01/05/2024", "-42.50", "'COFFEE SHOP", "'chase_checking", "'Dining"],
                            ["01/06/2024", "-100.00", "'RENT", "'chase_checking", ""],
                            ["01/07/2024", "-9.99", "'00123", "'chase_checking", ""]
                        ]
                    }));
                then.status(200).json_body(json!({"spreadsheetId": "sheet-1"}));
            });

            let rows = vec![
                record(5, -4250, "COFFEE SHOP").with_category("Dining"),
                record(6, -10000, "RENT"),
                record(7, -999, "00123"),
            ];
            client(&server).append_rows(&rows).unwrap();
            mock.assert();
        }

        #[test]
        fn test_text_cells_survive_the_round_trip() {
            let tricky = ["00123", "1/2", "=HYPERLINK(\"x\")", "+ DEPOSIT", "-5"];
            for desc in tricky {
                let rec = record(8, -100, desc);
                let row = user_entered_row(&rec, "%m/%d/%Y");
                assert_eq!(row[2], format!("'{desc}"));
                assert_eq!(row[3], "'chase_checking");
                assert_eq!(row[4], "");

                // Sheets drops the apostrophe when it stores the cell as text.
                let stored: Vec<String> = row.iter().map(|c| c.trim_start_matches('\'').to_string()).collect();
                let keys = keys_from_rows(vec![stored], "%m/%d/%Y");
                assert!(keys.contains(rec.key()), "{desc}");
            }
        }

        #[test]
        fn test_append_rejection_is_remote_append_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path(format!("{VALUES_PATH}:append"));
                then.status(403).body("The caller does not have permission");
            });
            let err = client(&server).append_rows(&[record(5, -4250, "COFFEE SHOP")]).err().unwrap();
            match err {
                SyncError::RemoteAppend(msg) => assert!(msg.contains("403"), "{msg}"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_from_settings_requires_token_env() {
            let settings = SheetSettings::Google {
                spreadsheet_id: "abc".to_string(),
                range: "Transactions!A2:E".to_string(),
                token_env: "BUDGETSYNC_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
                api_base: "http://localhost".to_string(),
                date_format: "%Y-%m-%d".to_string(),
            };
            assert!(matches!(GoogleSheetsClient::from_settings(&settings), Err(SyncError::Settings(_))));
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory fake
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) use fake::MemorySheet;

#[cfg(test)]
mod fake {
    use std::collections::HashSet;

    use super::SheetSync;
    use crate::error::{Result, SyncError};
    use crate::models::{TransactionKey, TransactionRecord};

    #[derive(Default)]
    pub(crate) struct MemorySheet {
        pub rows: Vec<TransactionRecord>,
        pub fail_fetch: bool,
        pub fail_append: bool,
        pub append_calls: usize,
    }

    impl MemorySheet {
        pub fn with_rows(rows: Vec<TransactionRecord>) -> Self {
            Self {
                rows,
                ..Self::default()
            }
        }
    }

    impl SheetSync for MemorySheet {
        fn fetch_existing_keys(&self) -> Result<HashSet<TransactionKey>> {
            if self.fail_fetch {
                return Err(SyncError::RemoteFetch("sheet unavailable".to_string()));
            }
            Ok(self.rows.iter().map(|r| r.key().clone()).collect())
        }

        fn append_rows(&mut self, rows: &[TransactionRecord]) -> Result<()> {
            self.append_calls += 1;
            if self.fail_append {
                return Err(SyncError::RemoteAppend("write rejected".to_string()));
            }
            self.rows.extend_from_slice(rows);
            Ok(())
        }
    }
}
