use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::period::PeriodKey;

/// Category assigned when no rule matches or the description is blank.
pub const OTHER_CATEGORY: &str = "Other";

/// Direction of a transaction, derived from the sign of its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Credit,
    Debit,
    Neutral,
    Unknown,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Credit => "Credit",
            TransactionType::Debit => "Debit",
            TransactionType::Neutral => "Neutral",
            TransactionType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(TransactionType::Credit),
            "Debit" => Ok(TransactionType::Debit),
            "Neutral" => Ok(TransactionType::Neutral),
            "Unknown" => Ok(TransactionType::Unknown),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

/// A transaction that has passed the clean gate and is ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub transaction_date: NaiveDate,
    /// Absent descriptions stay absent; they only force the `Other` category.
    pub description: Option<String>,
    pub category: String,
    pub transaction_type: TransactionType,
    /// Sign-preserving; negative is money out.
    pub amount: Decimal,
    pub period_key: PeriodKey,
}

impl CleanRecord {
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}
