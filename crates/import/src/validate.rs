use ledgerdrop_core::CleanRecord;
use std::collections::HashSet;
use std::fmt;

use crate::csv::{RawBatch, RawRecord, REQUIRED_COLUMNS};
use crate::pipeline::PipelineError;
use crate::transform::{AmountField, ShapedRecord};

/// Post-transform invariants, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    RowsRemain,
    NoNullDates,
    NoNullAmounts,
    AmountIsNumeric,
    CategoriesAssigned,
    TransactionTypesAssigned,
    PeriodKeysAssigned,
}

impl QualityCheck {
    pub const ALL: [QualityCheck; 7] = [
        QualityCheck::RowsRemain,
        QualityCheck::NoNullDates,
        QualityCheck::NoNullAmounts,
        QualityCheck::AmountIsNumeric,
        QualityCheck::CategoriesAssigned,
        QualityCheck::TransactionTypesAssigned,
        QualityCheck::PeriodKeysAssigned,
    ];

    fn passes(self, batch: &[ShapedRecord]) -> bool {
        match self {
            QualityCheck::RowsRemain => !batch.is_empty(),
            QualityCheck::NoNullDates => batch.iter().all(|r| r.transaction_date.is_some()),
            QualityCheck::NoNullAmounts => {
                batch.iter().all(|r| r.amount != AmountField::Missing)
            }
            QualityCheck::AmountIsNumeric => {
                batch.iter().all(|r| !matches!(r.amount, AmountField::Malformed(_)))
            }
            QualityCheck::CategoriesAssigned => batch.iter().all(|r| r.category.is_some()),
            QualityCheck::TransactionTypesAssigned => {
                batch.iter().all(|r| r.transaction_type.is_some())
            }
            QualityCheck::PeriodKeysAssigned => batch.iter().all(|r| r.period_key.is_some()),
        }
    }
}

impl fmt::Display for QualityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityCheck::RowsRemain => "Rows remain after date parsing",
            QualityCheck::NoNullDates => "No nulls in date",
            QualityCheck::NoNullAmounts => "No nulls in amount",
            QualityCheck::AmountIsNumeric => "Amount is numeric",
            QualityCheck::CategoriesAssigned => "All categories assigned",
            QualityCheck::TransactionTypesAssigned => "All transaction types assigned",
            QualityCheck::PeriodKeysAssigned => "All period keys assigned",
        };
        f.write_str(s)
    }
}

/// Structural gate: required columns present, at least one row.
pub fn validate_raw(batch: &RawBatch) -> Result<(), PipelineError> {
    let missing = batch.missing_columns(&REQUIRED_COLUMNS);
    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }
    if batch.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(())
}

/// Drop rows identical across every original column, keeping the first
/// occurrence. Returns the survivors in input order and the number removed.
pub fn dedupe(records: Vec<RawRecord>) -> (Vec<RawRecord>, usize) {
    let before = records.len();
    let mut seen: HashSet<RawRecord> = HashSet::with_capacity(before);
    let mut kept = Vec::with_capacity(before);
    for record in records {
        if seen.contains(&record) {
            continue;
        }
        seen.insert(record.clone());
        kept.push(record);
    }
    let removed = before - kept.len();
    (kept, removed)
}

/// Quality gate. Either every record converts or the whole batch fails with
/// the first violated check.
pub fn validate_clean(batch: Vec<ShapedRecord>) -> Result<Vec<CleanRecord>, PipelineError> {
    if let Some(check) = QualityCheck::ALL.into_iter().find(|c| !c.passes(&batch)) {
        return Err(PipelineError::Quality(check));
    }

    let mut clean = Vec::with_capacity(batch.len());
    for record in batch {
        let (
            Some(transaction_date),
            Some(category),
            Some(transaction_type),
            AmountField::Value(amount),
            Some(period_key),
        ) = (
            record.transaction_date,
            record.category,
            record.transaction_type,
            record.amount,
            record.period_key,
        )
        else {
            unreachable!("every check in QualityCheck::ALL passed, so all fields are present");
        };
        clean.push(CleanRecord {
            transaction_date,
            description: record.description,
            category,
            transaction_type,
            amount,
            period_key,
        });
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::read_batch;
    use chrono::NaiveDate;
    use ledgerdrop_core::{PeriodKey, TransactionType};
    use rust_decimal::Decimal;

    fn shaped(amount: AmountField) -> ShapedRecord {
        ShapedRecord {
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            description: Some("STARBUCKS".to_string()),
            category: Some("Food & Dining".to_string()),
            transaction_type: Some(TransactionType::Debit),
            amount,
            period_key: PeriodKey::new(2024, 1),
        }
    }

    fn good() -> ShapedRecord {
        shaped(AmountField::Value(Decimal::new(-450, 2)))
    }

    // ── raw gate ──────────────────────────────────────────────────────────────

    #[test]
    fn raw_gate_passes_complete_batch() {
        let batch = read_batch(
            b"date,description,category,transaction_type,amount\n01/05/2024,X,,,1\n".as_ref(),
        )
        .unwrap();
        assert!(validate_raw(&batch).is_ok());
    }

    #[test]
    fn raw_gate_names_missing_columns() {
        let batch =
            read_batch(b"date,description,category,transaction_type\n01/05/2024,X,,\n".as_ref())
                .unwrap();
        match validate_raw(&batch) {
            Err(PipelineError::Schema { missing }) => assert_eq!(missing, vec!["amount"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn raw_gate_checks_columns_before_emptiness() {
        let batch = read_batch(b"date\n".as_ref()).unwrap();
        assert!(matches!(validate_raw(&batch), Err(PipelineError::Schema { .. })));
    }

    #[test]
    fn raw_gate_rejects_empty_batch() {
        let batch =
            read_batch(b"date,description,category,transaction_type,amount\n".as_ref()).unwrap();
        assert!(matches!(validate_raw(&batch), Err(PipelineError::EmptyInput)));
    }

    // ── dedupe ────────────────────────────────────────────────────────────────

    #[test]
    fn dedupe_removes_exact_duplicates_in_order() {
        let batch = read_batch(
            b"date,description,category,transaction_type,amount\n\
              01/05/2024,A,,,1\n\
              01/06/2024,B,,,2\n\
              01/05/2024,A,,,1\n\
              01/05/2024,A,Food,,1\n"
                .as_ref(),
        )
        .unwrap();
        let (kept, removed) = dedupe(batch.records);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].description.as_deref(), Some("A"));
        assert_eq!(kept[1].description.as_deref(), Some("B"));
        // Differs only in a passthrough column, so it is not a duplicate.
        assert_eq!(kept[2].passthrough[0].as_deref(), Some("Food"));
    }

    #[test]
    fn dedupe_is_idempotent() {
        let batch = read_batch(
            b"date,description,category,transaction_type,amount\n\
              01/05/2024,A,,,1\n\
              01/05/2024,A,,,1\n\
              01/07/2024,,,,\n\
              01/07/2024,,,,\n"
                .as_ref(),
        )
        .unwrap();
        let (once, removed_once) = dedupe(batch.records);
        let (twice, removed_twice) = dedupe(once.clone());
        assert_eq!(removed_once, 2);
        assert_eq!(removed_twice, 0);
        assert_eq!(once, twice);
    }

    // ── clean gate ────────────────────────────────────────────────────────────

    #[test]
    fn clean_gate_converts_valid_batch() {
        let clean = validate_clean(vec![good(), good()]).unwrap();
        assert_eq!(clean.len(), 2);
        assert_eq!(clean[0].amount, Decimal::new(-450, 2));
        assert_eq!(clean[0].period_key.to_string(), "2024-01");
    }

    #[test]
    fn clean_gate_rejects_empty_batch() {
        assert!(matches!(
            validate_clean(Vec::new()),
            Err(PipelineError::Quality(QualityCheck::RowsRemain))
        ));
    }

    #[test]
    fn clean_gate_missing_amount_fails_whole_batch() {
        let result = validate_clean(vec![good(), shaped(AmountField::Missing)]);
        assert!(matches!(
            result,
            Err(PipelineError::Quality(QualityCheck::NoNullAmounts))
        ));
    }

    #[test]
    fn clean_gate_malformed_amount() {
        let result = validate_clean(vec![shaped(AmountField::Malformed("$1".into()))]);
        assert!(matches!(
            result,
            Err(PipelineError::Quality(QualityCheck::AmountIsNumeric))
        ));
    }

    #[test]
    fn clean_gate_reports_first_failing_check() {
        let mut bad = shaped(AmountField::Missing);
        bad.transaction_date = None;
        bad.category = None;
        let err = validate_clean(vec![bad]).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: No nulls in date");
    }

    #[test]
    fn clean_gate_unassigned_category_and_type() {
        let mut no_category = good();
        no_category.category = None;
        assert!(matches!(
            validate_clean(vec![no_category]),
            Err(PipelineError::Quality(QualityCheck::CategoriesAssigned))
        ));

        let mut no_type = good();
        no_type.transaction_type = None;
        assert!(matches!(
            validate_clean(vec![no_type]),
            Err(PipelineError::Quality(QualityCheck::TransactionTypesAssigned))
        ));
    }

    #[test]
    fn passing_batch_has_no_nulls() {
        let clean = validate_clean(vec![good(), shaped(AmountField::Value(Decimal::ZERO))]).unwrap();
        for r in &clean {
            assert!(!r.category.is_empty());
            assert_ne!(r.transaction_date, NaiveDate::MIN);
        }
    }
}
