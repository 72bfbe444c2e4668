//! Input validation.
//!
//! Raw records arrive as strings. Validation trims every field, strips
//! currency formatting from amounts and accepts a handful of timestamp
//! layouts. The first bad row aborts the whole batch.

use crate::types::Transaction;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use flowtrace_core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Untyped transaction record as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction identifier.
    pub transaction_id: String,
    /// Sending account.
    pub sender_id: String,
    /// Receiving account.
    pub receiver_id: String,
    /// Amount, possibly formatted (`"$1,250.00"`).
    pub amount: String,
    /// Timestamp.
    pub timestamp: String,
}

impl RawTransaction {
    /// Create a raw record.
    #[must_use]
    pub fn new(
        transaction_id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        amount: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            amount: amount.into(),
            timestamp: timestamp.into(),
        }
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Validate a batch of raw records.
pub fn validate_records(rows: &[RawTransaction]) -> Result<Vec<Transaction>> {
    rows.iter()
        .enumerate()
        .map(|(row, raw)| validate_record(row, raw))
        .collect()
}

/// Validate one record. `row` is used for error reporting only.
pub fn validate_record(row: usize, raw: &RawTransaction) -> Result<Transaction> {
    let id = required(row, "transaction_id", &raw.transaction_id)?;
    let sender = required(row, "sender_id", &raw.sender_id)?;
    let receiver = required(row, "receiver_id", &raw.receiver_id)?;
    let amount = parse_amount(&raw.amount).map_err(|r| EngineError::input(row, "amount", r))?;
    let timestamp =
        parse_timestamp(&raw.timestamp).map_err(|r| EngineError::input(row, "timestamp", r))?;

    Ok(Transaction {
        id,
        sender,
        receiver,
        amount,
        timestamp,
    })
}

fn required(row: usize, field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::input(row, field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Parse an amount, tolerating `$`, thousands separators and whitespace.
pub fn parse_amount(value: &str) -> std::result::Result<f64, String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err("must not be empty".to_string());
    }

    let amount: f64 = cleaned
        .parse()
        .map_err(|_| format!("not a number: '{}'", value.trim()))?;

    if !amount.is_finite() {
        return Err(format!("must be finite, got '{}'", value.trim()));
    }
    if amount < 0.0 {
        return Err(format!("must not be negative, got {}", amount));
    }
    Ok(amount)
}

/// Parse a timestamp into Unix seconds. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> std::result::Result<i64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc().timestamp());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp());
        }
    }

    Err(format!("unrecognized timestamp '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(amount: &str, timestamp: &str) -> RawTransaction {
        RawTransaction::new("T1", " A ", "B", amount, timestamp)
    }

    #[test]
    fn test_valid_record() {
        let txs = validate_records(&[raw("1500.50", "2024-01-15 10:30:00")]).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].sender, "A");
        assert_eq!(txs[0].amount, 1500.50);
        assert_eq!(txs[0].timestamp, 1_705_314_600);
    }

    #[test]
    fn test_amount_formatting_is_stripped() {
        assert_eq!(parse_amount("$1,250.00").unwrap(), 1250.0);
        assert_eq!(parse_amount(" 9 999 ").unwrap(), 9999.0);
        assert_eq!(parse_amount("0").unwrap(), 0.0);
    }

    #[test]
    fn test_bad_amounts() {
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("inf").is_err());
        assert!(parse_amount("  ").is_err());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = 1_705_314_600;
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15T12:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15T10:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15 10:30").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15").unwrap(), 1_705_276_800);
        assert!(parse_timestamp("15/01/2024").is_err());
    }

    #[test]
    fn test_first_bad_row_aborts_batch() {
        let rows = vec![
            raw("100", "2024-01-15 10:30:00"),
            raw("100", "yesterday"),
            raw("oops", "2024-01-15 10:30:00"),
        ];
        let err = validate_records(&rows).unwrap_err();
        match err {
            EngineError::InputError { row, field, .. } => {
                assert_eq!(row, 1);
                assert_eq!(field, "timestamp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_id_rejected() {
        let rows = vec![RawTransaction::new("T1", "", "B", "10", "2024-01-15")];
        let err = validate_records(&rows).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InputError {
                field: "sender_id",
                ..
            }
        ));
    }
}
