use ledgerdrop_core::{CleanRecord, PersistenceError, TransactionSink};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct CleanRow<'a> {
    transaction_date: String,
    transaction_desc: &'a str,
    category: &'a str,
    transaction_type: &'a str,
    amount: String,
    month_year: String,
}

impl<'a> From<&'a CleanRecord> for CleanRow<'a> {
    fn from(r: &'a CleanRecord) -> Self {
        CleanRow {
            transaction_date: r.transaction_date.to_string(),
            transaction_desc: r.description_or_empty(),
            category: &r.category,
            transaction_type: r.transaction_type.as_str(),
            amount: r.amount.to_string(),
            month_year: r.period_key.to_string(),
        }
    }
}

/// Render records as CSV with a header row.
pub fn to_csv_bytes(records: &[CleanRecord]) -> Result<Vec<u8>, PersistenceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        writer
            .write_record([
                "transaction_date",
                "transaction_desc",
                "category",
                "transaction_type",
                "amount",
                "month_year",
            ])
            .map_err(|e| PersistenceError::Backend(e.to_string()))?;
    }
    for r in records {
        writer
            .serialize(CleanRow::from(r))
            .map_err(|e| PersistenceError::Backend(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| PersistenceError::Backend(e.to_string()))
}

/// [`TransactionSink`] that writes each batch to
/// `<output_dir>/CLEANED_<YYYYMMDD_HHMMSS>_<source name>`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn output_path(&self, source_name: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.output_dir
            .join(format!("CLEANED_{timestamp}_{source_name}"))
    }
}

impl TransactionSink for CsvSink {
    async fn insert_batch(
        &self,
        source_name: &str,
        records: &[CleanRecord],
    ) -> Result<u64, PersistenceError> {
        let bytes = to_csv_bytes(records)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_path(source_name);
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(path = %path.display(), rows = records.len(), "wrote cleaned csv");
        Ok(records.len() as u64)
    }
}
