//! Schema versioning for the relational store.
//!
//! # Responsibility
//! - Order the embedded schema scripts and tag each with its version.
//! - Bring a writable connection up to the newest schema in one transaction.
//! - Refuse schemas this build cannot read.
//!
//! # Invariants
//! - Script versions start at 1 and increase by exactly one.
//! - `PRAGMA user_version` always equals the last script applied.
//! - A database ahead of this build is never touched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// Embedded schema scripts; entry `i` moves the schema to version `i + 1`.
const SCHEMA_SCRIPTS: &[&str] = &[
    include_str!("0001_init.sql"),
    include_str!("0002_edge_lookup.sql"),
];

/// Where a database's schema sits relative to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaPosition {
    Current,
    Behind(u32),
}

/// Returns the newest schema version this build knows.
pub fn latest_version() -> u32 {
    SCHEMA_SCRIPTS.len() as u32
}

fn schema_position(conn: &Connection) -> DbResult<SchemaPosition> {
    let db_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest_supported = latest_version();
    match db_version.cmp(&latest_supported) {
        std::cmp::Ordering::Greater => Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }),
        std::cmp::Ordering::Equal => Ok(SchemaPosition::Current),
        std::cmp::Ordering::Less => Ok(SchemaPosition::Behind(db_version)),
    }
}

/// Runs every script above the database's current version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let SchemaPosition::Behind(from) = schema_position(conn)? else {
        return Ok(());
    };

    let tx = conn.transaction()?;
    for (version, script) in (1..).zip(SCHEMA_SCRIPTS).skip(from as usize) {
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;
    info!(
        "event=db_migrate module=db status=ok from={from} to={}",
        latest_version()
    );
    Ok(())
}

/// Fails unless the schema is exactly at the latest version.
pub fn ensure_latest(conn: &Connection) -> DbResult<()> {
    match schema_position(conn)? {
        SchemaPosition::Current => Ok(()),
        SchemaPosition::Behind(db_version) => Err(DbError::OutdatedSchema {
            db_version,
            latest_supported: latest_version(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, ensure_latest, latest_version};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn blank_database_reaches_latest_and_reruns_are_no_ops() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            ensure_latest(&conn),
            Err(DbError::OutdatedSchema { db_version: 0, .. })
        ));

        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();
        ensure_latest(&conn).unwrap();
        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn newer_schema_is_left_untouched() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", latest_version() + 1)
            .unwrap();
        assert!(matches!(
            apply_migrations(&mut conn),
            Err(DbError::UnsupportedSchemaVersion { .. })
        ));
        let tables: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(tables, 0);
    }
}
