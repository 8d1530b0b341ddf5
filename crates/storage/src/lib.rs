pub mod csv_sink;
pub mod db;

pub use csv_sink::CsvSink;
pub use db::{
    count_transactions, create_db, create_memory_db, insert_transactions, latest_transactions,
    DbPool, SqliteStore, StoreError,
};
