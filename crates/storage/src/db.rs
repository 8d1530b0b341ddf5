use chrono::NaiveDate;
use ledgerdrop_core::{CleanRecord, PeriodKey, PersistenceError, TransactionSink};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Private in-memory database; one connection so every query sees the same data.
pub async fn create_memory_db() -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_date TEXT NOT NULL,
            transaction_desc TEXT,
            category TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            amount TEXT NOT NULL,
            month_year TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_transaction_date ON transactions(transaction_date)",
        "CREATE INDEX IF NOT EXISTS idx_category ON transactions(category)",
        "CREATE INDEX IF NOT EXISTS idx_month_year ON transactions(month_year)",
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}

/// Insert every record inside one database transaction.
pub async fn insert_transactions(pool: &DbPool, records: &[CleanRecord]) -> Result<u64, sqlx::Error> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for r in records {
        let result = sqlx::query(
            "INSERT INTO transactions (transaction_date, transaction_desc, category, transaction_type, amount, month_year) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(r.transaction_date.to_string())
        .bind(r.description.as_deref())
        .bind(r.category.as_str())
        .bind(r.transaction_type.as_str())
        .bind(r.amount.to_string())
        .bind(r.period_key.to_string())
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;

    Ok(inserted)
}

pub async fn count_transactions(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Most recent rows by transaction date, then insertion order.
pub async fn latest_transactions(pool: &DbPool, limit: i64) -> Result<Vec<CleanRecord>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, String, Option<String>, String, String, String, String)>(
        "SELECT id, transaction_date, transaction_desc, category, transaction_type, amount, month_year FROM transactions ORDER BY transaction_date DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| -> Result<CleanRecord, StoreError> {
            let corrupt = |reason: String| StoreError::CorruptRow { id: r.0, reason };
            Ok(CleanRecord {
                transaction_date: NaiveDate::parse_from_str(&r.1, "%Y-%m-%d")
                    .map_err(|e| corrupt(e.to_string()))?,
                description: r.2.clone(),
                category: r.3.clone(),
                transaction_type: r.4.parse().map_err(corrupt)?,
                amount: Decimal::from_str(&r.5).map_err(|e| corrupt(e.to_string()))?,
                period_key: PeriodKey::from_str(&r.6).map_err(corrupt)?,
            })
        })
        .collect()
}

/// [`TransactionSink`] backed by the SQLite `transactions` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl TransactionSink for SqliteStore {
    async fn insert_batch(
        &self,
        source_name: &str,
        records: &[CleanRecord],
    ) -> Result<u64, PersistenceError> {
        let inserted = insert_transactions(&self.pool, records)
            .await
            .map_err(|e| PersistenceError::Backend(e.to_string()))?;
        let expected = records.len() as u64;
        if inserted != expected {
            return Err(PersistenceError::ShortWrite {
                accepted: inserted,
                expected,
            });
        }
        tracing::info!(source = source_name, rows = inserted, "inserted into sqlite");
        Ok(inserted)
    }
}
