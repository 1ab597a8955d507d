use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::db::Store;
use crate::error::Result;
use crate::models::{Direction, Transaction};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    merchant: String,
    amount: String,
    #[serde(rename = "type", default)]
    type_code: String,
    #[serde(default)]
    check_number: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportResult {
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// ISO dates, or US month/day/year.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

/// Sign gives income or expense; a transfer type code overrides it.
pub fn direction_for(signed_amount: f64, type_code: &str) -> Direction {
    match type_code.trim().to_uppercase().as_str() {
        "XFER" | "TRANSFER" => Direction::Transfer,
        _ if signed_amount < 0.0 => Direction::Expense,
        _ if signed_amount > 0.0 => Direction::Income,
        _ => Direction::Unknown,
    }
}

pub fn content_hash(account: &str, date: NaiveDate, signed_amount: f64, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{account}|{}|{signed_amount:.2}|{}",
        date.format("%Y-%m-%d"),
        description.trim()
    ));
    hex::encode(hasher.finalize())
}

fn to_transaction(row: CsvRow, account: &str) -> Option<Transaction> {
    let date = parse_date(&row.date)?;
    let signed = parse_amount(&row.amount)?;
    let merchant = if row.merchant.trim().is_empty() {
        row.description.trim().to_string()
    } else {
        row.merchant.trim().to_string()
    };
    if merchant.is_empty() {
        return None;
    }
    Some(Transaction {
        id: 0,
        date,
        content_hash: content_hash(account, date, signed, &row.description),
        description: row.description.trim().to_string(),
        merchant,
        amount: signed.abs(),
        direction: direction_for(signed, &row.type_code),
        account: account.to_string(),
        type_code: row.type_code.trim().to_uppercase(),
        check_number: row.check_number.filter(|c| !c.trim().is_empty()),
    })
}

pub fn import_file(store: &Store, file_path: &Path, account: &str) -> Result<ImportResult> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    let mut result = ImportResult::default();
    for (line, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let txn = match record {
            Ok(row) => to_transaction(row, account),
            Err(e) => {
                debug!(line = line + 2, "unreadable row: {e}");
                None
            }
        };
        let Some(txn) = txn else {
            warn!(line = line + 2, "skipping malformed row");
            result.invalid += 1;
            continue;
        };
        if store.insert_transaction(&txn)? {
            result.imported += 1;
        } else {
            result.duplicates += 1;
        }
    }
    Ok(result)
}
