use ledgerdrop_core::{CleanRecord, DateRange, TransactionType};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    /// `None` when the sum does not fit in a `Decimal`.
    pub total: Option<Decimal>,
}

/// Per-batch distribution, logged after each file and printed by `process`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    /// `None` when the sum does not fit in a `Decimal`.
    pub net_total: Option<Decimal>,
    pub date_range: Option<DateRange>,
    /// Most frequent category first; ties broken by name.
    pub categories: Vec<CategoryTotal>,
    pub transaction_types: Vec<(TransactionType, usize)>,
}

/// Render a summary total, spelling out an overflowed sum.
pub fn format_total(total: Option<Decimal>) -> String {
    total.map_or_else(|| "overflow".to_string(), |t| t.to_string())
}

fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a))
}

pub fn summarize(records: &[CleanRecord]) -> BatchSummary {
    let mut by_category: BTreeMap<&str, (usize, Option<Decimal>)> = BTreeMap::new();
    for r in records {
        let entry = by_category
            .entry(r.category.as_str())
            .or_insert((0, Some(Decimal::ZERO)));
        entry.0 += 1;
        entry.1 = entry.1.and_then(|t| t.checked_add(r.amount));
    }
    let mut categories: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, (count, total))| CategoryTotal {
            category: category.to_string(),
            count,
            total,
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

    let transaction_types = [
        TransactionType::Credit,
        TransactionType::Debit,
        TransactionType::Neutral,
        TransactionType::Unknown,
    ]
    .into_iter()
    .map(|t| (t, records.iter().filter(|r| r.transaction_type == t).count()))
    .filter(|(_, n)| *n > 0)
    .collect();

    BatchSummary {
        rows: records.len(),
        net_total: checked_sum(records.iter().map(|r| r.amount)),
        date_range: DateRange::spanning(records.iter().map(|r| r.transaction_date)),
        categories,
        transaction_types,
    }
}
