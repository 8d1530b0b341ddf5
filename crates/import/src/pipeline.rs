use ledgerdrop_core::CleanRecord;
use std::fmt;
use thiserror::Error;

use crate::csv::RawBatch;
use crate::rules::CategoryRuleEngine;
use crate::transform::{self, DEFAULT_DATE_FORMAT};
use crate::validate::{self, QualityCheck};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("Input contains no data rows")]
    EmptyInput,
    #[error("Validation failed: {0}")]
    Quality(QualityCheck),
}

/// Progress of one batch through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Loaded,
    RawValidated,
    Deduplicated,
    Transformed,
    DatesNormalized,
    Shaped,
    CleanValidated,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    /// Rows dropped because their date did not match the configured format.
    pub invalid_dates_dropped: usize,
    pub records: Vec<CleanRecord>,
}

/// Orchestrates: raw gate → dedupe → categorize/derive type → parse dates →
/// shape → clean gate.
///
/// Pure over its inputs: no files, folders or stores are touched.
#[derive(Debug)]
pub struct IngestPipeline {
    rules: CategoryRuleEngine,
    date_format: String,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(CategoryRuleEngine::default(), DEFAULT_DATE_FORMAT)
    }
}

impl IngestPipeline {
    pub fn new(rules: CategoryRuleEngine, date_format: &str) -> Self {
        Self {
            rules,
            date_format: date_format.to_string(),
        }
    }

    pub fn rules(&self) -> &CategoryRuleEngine {
        &self.rules
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn run(&self, batch: RawBatch) -> Result<PipelineReport, PipelineError> {
        let mut stage = PipelineStage::Loaded;
        let input_rows = batch.len();
        tracing::debug!(rows = input_rows, %stage, "batch loaded");

        let result = self.run_stages(batch, &mut stage);
        match &result {
            Ok(report) => tracing::info!(
                input_rows,
                duplicates_removed = report.duplicates_removed,
                invalid_dates_dropped = report.invalid_dates_dropped,
                clean_rows = report.records.len(),
                "transformation complete"
            ),
            Err(e) => tracing::warn!(failed_after = %stage, error = %e, "batch rejected"),
        }
        result
    }

    fn run_stages(
        &self,
        batch: RawBatch,
        stage: &mut PipelineStage,
    ) -> Result<PipelineReport, PipelineError> {
        let input_rows = batch.len();

        validate::validate_raw(&batch)?;
        advance(stage, PipelineStage::RawValidated);

        let (records, duplicates_removed) = validate::dedupe(batch.records);
        if duplicates_removed > 0 {
            tracing::warn!(duplicates_removed, "removed duplicate rows");
        }
        advance(stage, PipelineStage::Deduplicated);

        let rows: Vec<_> = records
            .into_iter()
            .map(|r| transform::transform_row(r, &self.rules))
            .collect();
        advance(stage, PipelineStage::Transformed);

        let (rows, invalid_dates_dropped) = transform::normalize_dates(rows, &self.date_format);
        if invalid_dates_dropped > 0 {
            tracing::warn!(
                invalid_dates_dropped,
                format = %self.date_format,
                "dropped rows with unparseable dates"
            );
        }
        advance(stage, PipelineStage::DatesNormalized);

        let shaped: Vec<_> = rows.into_iter().map(transform::shape_record).collect();
        advance(stage, PipelineStage::Shaped);

        let records = validate::validate_clean(shaped)?;
        advance(stage, PipelineStage::CleanValidated);

        advance(stage, PipelineStage::Done);
        Ok(PipelineReport {
            input_rows,
            duplicates_removed,
            invalid_dates_dropped,
            records,
        })
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    tracing::debug!(from = %stage, to = %next, "pipeline stage");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::read_batch;
    use chrono::NaiveDate;
    use ledgerdrop_core::TransactionType;
    use rust_decimal::Decimal;

    const HEADER: &str = "date,description,category,transaction_type,amount\n";

    fn run(body: &str) -> Result<PipelineReport, PipelineError> {
        let csv = format!("{HEADER}{body}");
        let batch = read_batch(csv.as_bytes()).unwrap();
        IngestPipeline::default().run(batch)
    }

    #[test]
    fn single_starbucks_debit() {
        let report = run("01/05/2024,STARBUCKS #123,,,-4.50\n").unwrap();
        assert_eq!(report.records.len(), 1);
        let r = &report.records[0];
        assert_eq!(r.transaction_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(r.category, "Food & Dining");
        assert_eq!(r.transaction_type, TransactionType::Debit);
        assert_eq!(r.amount, Decimal::new(-450, 2));
        assert_eq!(r.period_key.to_string(), "2024-01");
    }

    #[test]
    fn zero_amount_blank_description() {
        let report = run("03/10/2024,,,,0\n").unwrap();
        let r = &report.records[0];
        assert_eq!(r.transaction_type, TransactionType::Neutral);
        assert_eq!(r.category, "Other");
        assert_eq!(r.description, None);
    }

    #[test]
    fn missing_amount_column_is_schema_error() {
        let batch = read_batch(
            b"date,description,category,transaction_type\n01/05/2024,STARBUCKS,,\n".as_ref(),
        )
        .unwrap();
        let err = IngestPipeline::default().run(batch).unwrap_err();
        assert!(matches!(&err, PipelineError::Schema { missing } if missing == &["amount"]));
        assert_eq!(err.to_string(), "Missing required columns: amount");
    }

    #[test]
    fn identical_rows_are_collapsed() {
        let report = run("01/05/2024,UBER TRIP,,,-12.00\n01/05/2024,UBER TRIP,,,-12.00\n").unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.input_rows, 2);
    }

    #[test]
    fn bad_date_row_is_dropped_and_batch_succeeds() {
        let report = run(
            "01/05/2024,STARBUCKS,,,-4.50\n\
             2024-13-01,NETFLIX,,,-15.99\n\
             01/15/2024,PAYCHECK ACME,,,2500.00\n",
        )
        .unwrap();
        assert_eq!(report.invalid_dates_dropped, 1);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].category, "Income");
        assert_eq!(report.records[1].transaction_type, TransactionType::Credit);
    }

    #[test]
    fn all_dates_bad_fails_batch() {
        let err = run("nope,STARBUCKS,,,-4.50\n").unwrap_err();
        assert!(matches!(err, PipelineError::Quality(QualityCheck::RowsRemain)));
    }

    #[test]
    fn empty_file_fails() {
        assert!(matches!(run(""), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn missing_amount_value_fails_whole_batch() {
        let err = run("01/05/2024,STARBUCKS,,,-4.50\n01/06/2024,COFFEE,,,\n").unwrap_err();
        assert!(matches!(err, PipelineError::Quality(QualityCheck::NoNullAmounts)));
    }

    #[test]
    fn underscore_amount_is_not_numeric() {
        let err = run("01/05/2024,RENT,,,1_000\n").unwrap_err();
        assert!(matches!(err, PipelineError::Quality(QualityCheck::AmountIsNumeric)));
    }

    #[test]
    fn input_category_and_type_are_overwritten() {
        let report = run("01/05/2024,NETFLIX,Groceries,Credit,-15.99\n").unwrap();
        let r = &report.records[0];
        assert_eq!(r.category, "Entertainment");
        assert_eq!(r.transaction_type, TransactionType::Debit);
    }

    #[test]
    fn extra_columns_are_tolerated() {
        let csv = "date,description,category,transaction_type,amount,account\n\
                   01/05/2024,RENT MARCH,,,-1500,checking\n";
        let batch = read_batch(csv.as_bytes()).unwrap();
        let report = IngestPipeline::default().run(batch).unwrap();
        assert_eq!(report.records[0].category, "Bills");
    }

    #[test]
    fn custom_date_format() {
        let pipeline = IngestPipeline::new(CategoryRuleEngine::default(), "%Y-%m-%d");
        let batch = read_batch(format!("{HEADER}2024-02-03,X,,,1\n").as_bytes()).unwrap();
        let report = pipeline.run(batch).unwrap();
        assert_eq!(report.records[0].period_key.to_string(), "2024-02");
    }

    #[test]
    fn output_preserves_input_order() {
        let report = run("01/03/2024,C,,,3\n01/01/2024,A,,,1\n01/02/2024,B,,,2\n").unwrap();
        let descs: Vec<_> = report
            .records
            .iter()
            .map(|r| r.description.as_deref().unwrap())
            .collect();
        assert_eq!(descs, vec!["C", "A", "B"]);
    }
}
