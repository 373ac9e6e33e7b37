use std::collections::HashSet;

use crate::models::{TransactionKey, TransactionRecord};

pub struct Reconciliation {
    /// Records to append, in input order.
    pub fresh: Vec<TransactionRecord>,
    pub remote_duplicates: usize,
    pub batch_duplicates: usize,
}

/// Keep the records whose key is neither in `existing` nor already seen
/// earlier in `records`.
pub fn reconcile(records: Vec<TransactionRecord>, existing: &HashSet<TransactionKey>) -> Reconciliation {
    let mut seen: HashSet<TransactionKey> = HashSet::with_capacity(records.len());
    let mut fresh = Vec::with_capacity(records.len());
    let mut remote_duplicates = 0usize;
    let mut batch_duplicates = 0usize;

    for record in records {
        if existing.contains(record.key()) {
            tracing::debug!(
                date = %record.date,
                amount = %record.amount,
                description = %record.description,
                "already in sheet"
            );
            remote_duplicates += 1;
            continue;
        }
        if !seen.insert(record.key().clone()) {
            tracing::debug!(
                date = %record.date,
                amount = %record.amount,
                description = %record.description,
                "duplicate within batch"
            );
            batch_duplicates += 1;
            continue;
        }
        fresh.push(record);
    }

    Reconciliation {
        fresh,
        remote_duplicates,
        batch_duplicates,
    }
}
