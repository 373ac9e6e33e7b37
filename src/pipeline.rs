use std::path::{Path, PathBuf};

use crate::categorizer::RuleSet;
use crate::error::{Result, SyncError};
use crate::filter::TransactionFilter;
use crate::importer::FormatRegistry;
use crate::models::TransactionRecord;
use crate::reconciler::reconcile;
use crate::settings::Settings;
use crate::sheets::SheetSync;

/// CSV exports in `dir`, sorted by file name. The extension check is
/// case-insensitive; a missing or empty directory is an error.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SyncError::Other(format!(
            "uploads directory {} does not exist",
            dir.display()
        )));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("csv"))
        })
        .collect();
    if files.is_empty() {
        return Err(SyncError::Other(format!("no CSV files found in {}", dir.display())));
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_skipped: Vec<SkippedFile>,
    /// Rows that parsed into a transaction, filtered ones included.
    pub normalized: usize,
    pub malformed: usize,
    pub filtered: usize,
    pub remote_duplicates: usize,
    pub batch_duplicates: usize,
    /// New rows with no category.
    pub uncategorized: usize,
    pub appended: usize,
}

/// Outcome of one run. The summary covers whatever work completed before a
/// remote failure, if there was one.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Rows that are new to the sheet. On a dry run these were not sent.
    pub new_rows: Vec<TransactionRecord>,
    pub error: Option<SyncError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.summary.files_skipped.is_empty()
    }
}

pub struct Pipeline {
    pub registry: FormatRegistry,
    pub rules: RuleSet,
    pub filter: TransactionFilter,
}

impl Pipeline {
    pub fn new(registry: FormatRegistry, rules: RuleSet, filter: TransactionFilter) -> Self {
        Self {
            registry,
            rules,
            filter,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            FormatRegistry::new(settings.formats.clone()),
            RuleSet::new(settings.rules.clone())?,
            settings.filter.clone(),
        ))
    }

    /// Normalize and categorize every file, then reconcile the whole batch
    /// against the sheet once and append what is new in a single write.
    pub fn run(&self, files: &[PathBuf], sheet: &mut dyn SheetSync, dry_run: bool) -> RunReport {
        let mut summary = RunSummary::default();
        let batch = self.collect(files, &mut summary);

        let finish = |summary: RunSummary, new_rows: Vec<TransactionRecord>, error: Option<SyncError>| RunReport {
            summary,
            new_rows,
            error,
        };

        if batch.is_empty() {
            tracing::info!("no transactions to reconcile");
            return finish(summary, Vec::new(), None);
        }

        let existing = match sheet.fetch_existing_keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(error = %e, "could not read existing transactions; nothing appended");
                return finish(summary, Vec::new(), Some(e));
            }
        };
        tracing::info!(existing = existing.len(), "loaded existing transaction keys");

        let result = reconcile(batch, &existing);
        summary.remote_duplicates = result.remote_duplicates;
        summary.batch_duplicates = result.batch_duplicates;
        summary.uncategorized = result.fresh.iter().filter(|r| r.category.is_none()).count();
        let fresh = result.fresh;

        if fresh.is_empty() {
            tracing::info!("sheet is already up to date");
            return finish(summary, fresh, None);
        }
        if dry_run {
            tracing::info!(rows = fresh.len(), "dry run; not appending");
            return finish(summary, fresh, None);
        }

        match sheet.append_rows(&fresh) {
            Ok(()) => {
                summary.appended = fresh.len();
                tracing::info!(rows = summary.appended, "appended new transactions");
                finish(summary, fresh, None)
            }
            Err(e) => {
                tracing::error!(error = %e, rows = fresh.len(), "append failed");
                finish(summary, fresh, Some(e))
            }
        }
    }

    fn collect(&self, files: &[PathBuf], summary: &mut RunSummary) -> Vec<TransactionRecord> {
        let mut batch = Vec::new();
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let normalized = match self.registry.normalize_path(path) {
                Ok(n) => n,
                Err(e) => {
                    let reason = match &e {
                        SyncError::Format { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    tracing::warn!(file = %file_name, %reason, "skipping file");
                    summary.files_skipped.push(SkippedFile {
                        file: file_name,
                        reason,
                    });
                    continue;
                }
            };

            summary.files_processed += 1;
            let before = batch.len();
            for row in normalized.rows() {
                match row {
                    Ok(record) => {
                        summary.normalized += 1;
                        if self.filter.is_excluded(&record.description) {
                            tracing::debug!(file = %file_name, description = %record.description, "filtered");
                            summary.filtered += 1;
                            continue;
                        }
                        batch.push(self.rules.resolve(record));
                    }
                    Err(w) => {
                        tracing::warn!(file = %file_name, "skipped row {w}");
                        summary.malformed += 1;
                    }
                }
            }
            tracing::info!(
                file = %file_name,
                format = %normalized.format.key,
                records = batch.len() - before,
                "normalized file"
            );
        }
        batch
    }
}
