use chrono::NaiveDate;
use ledgerdrop_core::{PeriodKey, TransactionType};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::csv::RawRecord;
use crate::rules::CategoryRuleEngine;

/// External date format of bank-statement exports.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// The amount cell after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountField {
    Missing,
    /// Present but not a number; kept so the clean gate can name the problem.
    Malformed(String),
    Value(Decimal),
}

impl AmountField {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            AmountField::Value(d) => Some(*d),
            _ => None,
        }
    }
}

pub fn parse_amount(raw: Option<&str>) -> AmountField {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return AmountField::Missing;
    };
    // rust_decimal accepts `_` digit separators; statement exports never use them.
    if s.contains('_') {
        return AmountField::Malformed(s.to_string());
    }
    let parsed = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s));
    match parsed {
        Ok(d) => AmountField::Value(d),
        Err(_) => AmountField::Malformed(s.to_string()),
    }
}

/// Sign of the amount decides the direction; no amount means `Unknown`.
pub fn derive_transaction_type(amount: Option<Decimal>) -> TransactionType {
    match amount {
        None => TransactionType::Unknown,
        Some(a) if a.is_zero() => TransactionType::Neutral,
        Some(a) if a.is_sign_negative() => TransactionType::Debit,
        Some(_) => TransactionType::Credit,
    }
}

/// Parse against exactly one format. `None` means the row will be dropped.
pub fn normalize_date(raw: Option<&str>, format: &str) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), format).ok())
}

/// A row with category and direction assigned, date still in source form.
#[derive(Debug, Clone)]
pub struct TransformedRow {
    pub raw_date: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category: String,
    pub transaction_type: TransactionType,
    pub amount: AmountField,
}

pub fn transform_row(raw: RawRecord, rules: &CategoryRuleEngine) -> TransformedRow {
    let category = rules.categorize(raw.description.as_deref()).to_string();
    let amount = parse_amount(raw.amount.as_deref());
    let transaction_type = derive_transaction_type(amount.value());
    TransformedRow {
        raw_date: raw.date,
        transaction_date: None,
        description: raw.description,
        category,
        transaction_type,
        amount,
    }
}

/// Parse every row's date, dropping rows that do not parse.
/// Returns the surviving rows and the number dropped.
pub fn normalize_dates(rows: Vec<TransformedRow>, format: &str) -> (Vec<TransformedRow>, usize) {
    let before = rows.len();
    let kept: Vec<TransformedRow> = rows
        .into_iter()
        .filter_map(|mut row| {
            row.transaction_date = normalize_date(row.raw_date.as_deref(), format);
            row.transaction_date.map(|_| row)
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Final output shape before the clean gate. Fields stay optional so the
/// gate, not the type system, is what proves completeness.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedRecord {
    pub transaction_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub amount: AmountField,
    pub period_key: Option<PeriodKey>,
}

pub fn shape_record(row: TransformedRow) -> ShapedRecord {
    ShapedRecord {
        period_key: row.transaction_date.map(PeriodKey::from_date),
        transaction_date: row.transaction_date,
        description: row.description,
        category: Some(row.category).filter(|c| !c.is_empty()),
        transaction_type: Some(row.transaction_type),
        amount: row.amount,
    }
}
