use std::future::Future;
use thiserror::Error;

use super::transaction::CleanRecord;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store accepted {accepted} of {expected} rows")]
    ShortWrite { accepted: u64, expected: u64 },
}

/// Insert contract for the downstream store.
///
/// A batch is accepted whole or not at all; any error is treated by the
/// caller as a failure of the entire source file.
pub trait TransactionSink {
    /// Insert `records` in order and return the number of rows accepted.
    ///
    /// `source_name` is the original file name, for sinks that derive output
    /// names from it.
    fn insert_batch(
        &self,
        source_name: &str,
        records: &[CleanRecord],
    ) -> impl Future<Output = Result<u64, PersistenceError>> + Send;
}
