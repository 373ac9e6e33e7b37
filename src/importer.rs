use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RowParseError, SyncError};
use crate::models::TransactionRecord;

/// How many leading records may precede the header row (bank preambles).
const HEADER_SCAN_LIMIT: usize = 15;

/// Fallback layouts accepted when reading dates back from the sheet.
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%Y/%m/%d"];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '"' | '$') && !c.is_whitespace())
        .collect();
    let (negative, s) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s.as_str()),
    };
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    let value = Decimal::from_str(s).ok()?;
    Some(if negative { -value.abs() } else { value })
}

pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Parse a date with the preferred layout first, then the common fallbacks.
pub fn parse_date_lenient(raw: &str, preferred: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    std::iter::once(preferred)
        .chain(FALLBACK_DATE_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn normalize_header(field: &str) -> String {
    field.trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Format descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Money out is already negative in the export.
    #[default]
    DebitNegative,
    /// Charges are exported as positive numbers and must be flipped.
    DebitPositive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AmountMapping {
    Signed {
        column: String,
        #[serde(default)]
        convention: SignConvention,
    },
    Split {
        debit: String,
        credit: String,
    },
}

fn default_date_formats() -> Vec<String> {
    vec!["%m/%d/%Y".to_string(), "%Y-%m-%d".to_string()]
}

/// A registered bank export layout: header signature, column mapping and
/// sign/date conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankFormat {
    pub key: String,
    pub name: String,
    /// Written to the sheet as the source account; defaults to `key`.
    #[serde(default)]
    pub source_account: Option<String>,
    /// Substring of the file name that favours this format when several match.
    #[serde(default)]
    pub filename_hint: Option<String>,
    pub date_column: String,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    pub description_column: String,
    pub amount: AmountMapping,
    /// Extra header columns that must be present for the format to match.
    #[serde(default)]
    pub signature: Vec<String>,
    /// Column names for exports that have no header row. Such a format is
    /// only chosen through `filename_hint`, after header detection fails.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl BankFormat {
    pub fn source_account(&self) -> &str {
        self.source_account.as_deref().unwrap_or(&self.key)
    }

    pub fn header_signature(&self) -> Vec<&str> {
        let mut cols = vec![self.date_column.as_str(), self.description_column.as_str()];
        match &self.amount {
            AmountMapping::Signed { column, .. } => cols.push(column),
            AmountMapping::Split { debit, credit } => {
                cols.push(debit);
                cols.push(credit);
            }
        }
        cols.extend(self.signature.iter().map(String::as_str));
        cols
    }

    pub fn matches_header(&self, header: &StringRecord) -> bool {
        if self.columns.is_some() {
            return false;
        }
        let names: Vec<String> = header.iter().map(normalize_header).collect();
        self.header_signature()
            .iter()
            .all(|col| names.contains(&normalize_header(col)))
    }

    fn hinted_by(&self, file_name: &str) -> bool {
        self.filename_hint
            .as_deref()
            .is_some_and(|hint| file_name.to_lowercase().contains(&hint.to_lowercase()))
    }

    fn resolve_columns(&self, header: &StringRecord) -> Option<ColumnMap> {
        let names: Vec<String> = header.iter().map(normalize_header).collect();
        let idx = |col: &str| names.iter().position(|n| *n == normalize_header(col));
        let amount = match &self.amount {
            AmountMapping::Signed { column, convention } => AmountColumns::Signed {
                index: idx(column)?,
                convention: *convention,
            },
            AmountMapping::Split { debit, credit } => AmountColumns::Split {
                debit: idx(debit)?,
                credit: idx(credit)?,
            },
        };
        Some(ColumnMap {
            date: idx(&self.date_column)?,
            description: idx(&self.description_column)?,
            amount,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum AmountColumns {
    Signed { index: usize, convention: SignConvention },
    Split { debit: usize, credit: usize },
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    description: usize,
    amount: AmountColumns,
}

fn signed(key: &str, name: &str, hint: &str, date: &str, amount: &str, convention: SignConvention, signature: &[&str]) -> BankFormat {
    BankFormat {
        key: key.to_string(),
        name: name.to_string(),
        source_account: None,
        filename_hint: Some(hint.to_string()),
        date_column: date.to_string(),
        date_formats: default_date_formats(),
        description_column: "Description".to_string(),
        amount: AmountMapping::Signed {
            column: amount.to_string(),
            convention,
        },
        signature: signature.iter().map(|s| s.to_string()).collect(),
        columns: None,
    }
}

pub fn builtin_formats() -> Vec<BankFormat> {
    vec![
        signed("chase_checking", "Chase Checking", "chase", "Posting Date", "Amount",
            SignConvention::DebitNegative, &["Details", "Balance"]),
        signed("chase_credit", "Chase Credit Card", "chase", "Transaction Date", "Amount",
            SignConvention::DebitNegative, &["Post Date", "Category", "Type"]),
        signed("bofa_checking", "Bank of America Checking", "bofa", "Date", "Amount",
            SignConvention::DebitNegative, &["Running Bal."]),
        signed("amex", "American Express", "amex", "Date", "Amount",
            SignConvention::DebitPositive, &["Reference"]),
        BankFormat {
            key: "capital_one".to_string(),
            name: "Capital One".to_string(),
            source_account: None,
            filename_hint: Some("capital".to_string()),
            date_column: "Transaction Date".to_string(),
            date_formats: default_date_formats(),
            description_column: "Description".to_string(),
            amount: AmountMapping::Split {
                debit: "Debit".to_string(),
                credit: "Credit".to_string(),
            },
            signature: vec!["Posted Date".to_string(), "Card No.".to_string()],
            columns: None,
        },
        BankFormat {
            key: "generic".to_string(),
            name: "Generic date/name/cost/payment".to_string(),
            source_account: None,
            filename_hint: None,
            date_column: "date".to_string(),
            date_formats: FALLBACK_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
            description_column: "name".to_string(),
            amount: AmountMapping::Split {
                debit: "cost".to_string(),
                credit: "payment".to_string(),
            },
            signature: Vec::new(),
            columns: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct FormatRegistry {
    formats: Vec<BankFormat>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FormatRegistry {
    /// User-defined formats are consulted before the built-in ones.
    pub fn new(custom: Vec<BankFormat>) -> Self {
        let mut formats = custom;
        formats.extend(builtin_formats());
        Self { formats }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BankFormat> {
        self.formats.iter()
    }

    /// Pick the format for a header row. Filename hints break ties first,
    /// then the larger header signature, then registration order.
    pub fn detect(&self, header: &StringRecord, file_name: &str) -> Option<&BankFormat> {
        self.formats
            .iter()
            .enumerate()
            .filter(|(_, f)| f.matches_header(header))
            .min_by_key(|(idx, f)| {
                (
                    std::cmp::Reverse(f.hinted_by(file_name)),
                    std::cmp::Reverse(f.header_signature().len()),
                    *idx,
                )
            })
            .map(|(_, f)| f)
    }

    /// Headerless layouts are picked by file name alone.
    fn detect_headerless(&self, file_name: &str) -> Option<(&BankFormat, StringRecord)> {
        self.formats.iter().find_map(|f| match &f.columns {
            Some(columns) if f.hinted_by(file_name) => Some((f, StringRecord::from(columns.clone()))),
            _ => None,
        })
    }

    /// Detect the file's format and split it into header and data rows.
    pub fn normalize(&self, file_path: &Path, contents: &str) -> Result<NormalizedFile> {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let format_error = |reason: String| SyncError::Format {
            file: file_name.clone(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(contents.as_bytes());

        let mut records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
        let mut detected = None;
        let mut scanned = 0usize;
        for (idx, record) in records.iter().enumerate() {
            if scanned == HEADER_SCAN_LIMIT {
                break;
            }
            if is_blank(record) {
                continue;
            }
            scanned += 1;
            if let Some(format) = self.detect(record, &file_name) {
                detected = Some((format, record.clone(), idx + 1));
                break;
            }
        }
        if scanned == 0 {
            return Err(format_error("file has no rows".to_string()));
        }

        let detected = detected.or_else(|| {
            self.detect_headerless(&file_name)
                .map(|(format, header)| (format, header, 0))
        });
        let Some((format, header, data_start)) = detected else {
            return Err(format_error(format!(
                "no registered format matches the first {scanned} row(s)"
            )));
        };
        let columns = format
            .resolve_columns(&header)
            .ok_or_else(|| format_error(format!("header is missing columns for {}", format.key)))?;

        let data = records.split_off(data_start);

        Ok(NormalizedFile {
            file_name: file_name.clone(),
            format: format.clone(),
            columns,
            data,
        })
    }

    pub fn normalize_path(&self, file_path: &Path) -> Result<NormalizedFile> {
        let bytes = std::fs::read(file_path)?;
        let contents = String::from_utf8_lossy(&bytes);
        self.normalize(file_path, &contents)
    }
}

// ---------------------------------------------------------------------------
// Normalized output
// ---------------------------------------------------------------------------

/// A recognised file. Rows are converted lazily; every call to [`rows`]
/// starts again from the first data row.
///
/// [`rows`]: NormalizedFile::rows
pub struct NormalizedFile {
    pub file_name: String,
    pub format: BankFormat,
    columns: ColumnMap,
    data: Vec<StringRecord>,
}

impl NormalizedFile {
    pub fn rows(&self) -> impl Iterator<Item = std::result::Result<TransactionRecord, RowParseError>> + '_ {
        self.data
            .iter()
            .filter(|r| !is_blank(r))
            .map(move |r| self.parse_row(r))
    }

    pub fn records(&self) -> impl Iterator<Item = TransactionRecord> + '_ {
        self.rows().filter_map(|r| r.ok())
    }

    pub fn warnings(&self) -> Vec<RowParseError> {
        self.rows().filter_map(|r| r.err()).collect()
    }

    fn parse_row(&self, record: &StringRecord) -> std::result::Result<TransactionRecord, RowParseError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let fail = |reason: String| RowParseError { line, reason };
        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

        let raw_date = field(self.columns.date);
        let date = parse_date(raw_date, &self.format.date_formats)
            .ok_or_else(|| fail(format!("unparsable date '{raw_date}'")))?;

        let description = field(self.columns.description);
        if description.is_empty() {
            return Err(fail("empty description".to_string()));
        }

        let amount = match self.columns.amount {
            AmountColumns::Signed { index, convention } => {
                let raw = field(index);
                let value = parse_amount(raw).ok_or_else(|| fail(format!("unparsable amount '{raw}'")))?;
                match convention {
                    SignConvention::DebitNegative => value,
                    SignConvention::DebitPositive => -value,
                }
            }
            AmountColumns::Split { debit, credit } => {
                let parse_opt = |idx: usize| -> std::result::Result<Option<Decimal>, RowParseError> {
                    let raw = field(idx);
                    if raw.is_empty() {
                        return Ok(None);
                    }
                    parse_amount(raw)
                        .map(|v| (!v.is_zero()).then_some(v))
                        .ok_or_else(|| fail(format!("unparsable amount '{raw}'")))
                };
                match (parse_opt(debit)?, parse_opt(credit)?) {
                    (Some(d), None) => -d.abs(),
                    (None, Some(c)) => c.abs(),
                    (Some(d), Some(c)) => c.abs() - d.abs(),
                    (None, None) => return Err(fail("no debit or credit amount".to_string())),
                }
            }
        };

        Ok(TransactionRecord::new(date, amount, description, self.format.source_account()))
    }
}
