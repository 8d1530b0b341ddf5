pub mod period;
pub mod sink;
pub mod transaction;

pub use period::{DateRange, PeriodKey};
pub use sink::{PersistenceError, TransactionSink};
pub use transaction::{CleanRecord, TransactionType, OTHER_CATEGORY};
