//! SQLite storage bootstrap, statements and the relational backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the object store.
//! - Apply schema migrations in deterministic order.
//! - Build positional statements and map the object graph onto tables.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - The backend never reads or writes store data before migrations succeed.
//! - Read-only connections never migrate; they require the latest schema.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
pub(crate) mod sqlite_backend;
pub mod statement;

pub use open::{open_db, open_db_in_memory, open_db_read_only};
pub use statement::{Param, Statement, StatementKind};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A read-only connection found a schema that still needs migrating.
    OutdatedSchema {
        db_version: u32,
        latest_supported: u32,
    },
    /// Positional parameter index past the template's placeholders.
    ParameterOutOfRange { index: usize, count: usize },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::OutdatedSchema {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} needs migrating to {latest_supported}, which a read-only store cannot do"
            ),
            Self::ParameterOutOfRange { index, count } => write!(
                f,
                "parameter index {index} is out of range for a statement with {count} placeholders"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. }
            | Self::OutdatedSchema { .. }
            | Self::ParameterOutOfRange { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
