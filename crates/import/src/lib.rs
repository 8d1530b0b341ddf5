pub mod csv;
pub mod pipeline;
pub mod rules;
pub mod summary;
pub mod transform;
pub mod validate;

pub use csv::{read_batch, LoadError, RawBatch, RawRecord, REQUIRED_COLUMNS};
pub use pipeline::{IngestPipeline, PipelineError, PipelineReport, PipelineStage};
pub use rules::{default_rules, CategoryRule, CategoryRuleEngine, MatchType, RuleError};
pub use summary::{format_total, summarize, BatchSummary, CategoryTotal};
pub use transform::{derive_transaction_type, AmountField, DEFAULT_DATE_FORMAT};
pub use validate::QualityCheck;
