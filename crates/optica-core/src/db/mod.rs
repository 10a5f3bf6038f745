//! Database layer for optica.

mod schema;
mod branches;
mod catalog;
mod patients;
mod visits;
mod payments;
mod status_history;
mod reports;
mod support;

pub use schema::*;
pub use reports::*;

use std::path::Path;
use std::str::FromStr;

use rusqlite::{ffi, Connection, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// Stored data violates a CHECK/NOT NULL rule or cannot be decoded
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Duplicate key, dangling reference, or a lost optimistic-version race
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, ref message) = err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| code.to_string());
                return match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                        DbError::Constraint(detail)
                    }
                    _ => DbError::Conflict(detail),
                };
            }
        }
        DbError::Sqlite(err)
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that takes the database write lock up front.
    ///
    /// Dropping the transaction without `commit` rolls it back.
    pub fn write_transaction(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

pub(crate) fn decimal_to_sql(value: Decimal) -> String {
    value.to_string()
}

pub(crate) fn parse_decimal(raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| DbError::Constraint(format!("Invalid decimal '{}': {}", raw, e)))
}

pub(crate) fn parse_opt_decimal(raw: Option<String>) -> DbResult<Option<Decimal>> {
    raw.as_deref().map(parse_decimal).transpose()
}

/// Decode a stored enum column.
pub(crate) fn parse_stored<T>(raw: &str) -> DbResult<T>
where
    T: FromStr<Err = String>,
{
    raw.parse().map_err(DbError::Constraint)
}
