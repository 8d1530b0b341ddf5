use ledgerdrop_core::PersistenceError;
use ledgerdrop_import::{LoadError, PipelineError};
use thiserror::Error;

/// Everything that can send a file to the failed directory.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}
