use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic identity of a transaction, used for duplicate detection
/// across runs and within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionKey(String);

impl TransactionKey {
    /// SHA-256 over the canonical text of the four identifying fields.
    pub fn derive(date: NaiveDate, amount: Decimal, description: &str, source_account: &str) -> Self {
        let canonical = format!(
            "{}|{}|{}|{}",
            date.format("%Y-%m-%d"),
            canonical_amount(amount),
            description.trim(),
            source_account.trim(),
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        TransactionKey(hex::encode(hasher.finalize()))
    }

    /// First 12 hex digits, enough to eyeball in tables and logs.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two decimal places, and never "-0.00".
pub fn canonical_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded.is_zero() {
        return "0.00".to_string();
    }
    format!("{rounded:.2}")
}

/// Canonical normalized transaction, independent of the source bank format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    /// Negative = money out (debit), positive = money in (credit).
    pub amount: Decimal,
    pub description: String,
    pub source_account: String,
    pub category: Option<String>,
    key: TransactionKey,
}

impl TransactionRecord {
    pub fn new(date: NaiveDate, amount: Decimal, description: &str, source_account: &str) -> Self {
        let amount = amount.round_dp(2);
        let description = description.trim().to_string();
        let source_account = source_account.trim().to_string();
        let key = TransactionKey::derive(date, amount, &description, &source_account);
        Self {
            date,
            amount,
            description,
            source_account,
            category: None,
            key,
        }
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Cells in sheet column order: date, amount, description, source account, category.
    pub fn to_sheet_row(&self, date_format: &str) -> Vec<String> {
        vec![
            self.date.format(date_format).to_string(),
            canonical_amount(self.amount),
            self.description.clone(),
            self.source_account.clone(),
            self.category.clone().unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = TransactionRecord::new(date(2024, 1, 5), dec("-42.50"), "COFFEE SHOP", "chase_checking");
        let b = TransactionRecord::new(date(2024, 1, 5), dec("-42.50"), "COFFEE SHOP", "chase_checking");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string().len(), 64);
    }

    #[test]
    fn test_key_changes_with_each_field() {
        let base = TransactionRecord::new(date(2024, 1, 5), dec("-42.50"), "COFFEE SHOP", "chase");
        let variants = [
            TransactionRecord::new(date(2024, 1, 6), dec("-42.50"), "COFFEE SHOP", "chase"),
            TransactionRecord::new(date(2024, 1, 5), dec("-42.51"), "COFFEE SHOP", "chase"),
            TransactionRecord::new(date(2024, 1, 5), dec("42.50"), "COFFEE SHOP", "chase"),
            TransactionRecord::new(date(2024, 1, 5), dec("-42.50"), "Coffee Shop", "chase"),
            TransactionRecord::new(date(2024, 1, 5), dec("-42.50"), "COFFEE SHOP", "amex"),
        ];
        for v in &variants {
            assert_ne!(base.key(), v.key(), "{v:?}");
        }
    }

    #[test]
    fn test_key_ignores_category_and_amount_scale() {
        let a = TransactionRecord::new(date(2024, 1, 5), dec("-42.5"), "RENT", "chase");
        let b = TransactionRecord::new(date(2024, 1, 5), dec("-42.500"), "  RENT ", "chase")
            .with_category("Housing");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_canonical_amount() {
        assert_eq!(canonical_amount(dec("-42.5")), "-42.50");
        assert_eq!(canonical_amount(dec("100")), "100.00");
        assert_eq!(canonical_amount(dec("-0.00")), "0.00");
        assert_eq!(canonical_amount(dec("1.005")), "1.00");
    }

    #[test]
    fn test_to_sheet_row() {
        let r = TransactionRecord::new(date(2024, 1, 5), dec("-42.50"), "COFFEE SHOP", "chase");
        assert_eq!(
            r.to_sheet_row("%m/%d/%Y"),
            vec!["01/05/2024", "-42.50", "COFFEE SHOP", "chase", ""]
        );
        let r = r.with_category("Dining");
        assert_eq!(r.to_sheet_row("%Y-%m-%d")[4], "Dining");
    }
}
