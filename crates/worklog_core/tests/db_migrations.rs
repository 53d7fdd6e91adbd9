use rusqlite::Connection;
use worklog_core::db::migrations::latest_version;
use worklog_core::db::{open_db, open_db_in_memory, open_db_read_only, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["store_meta", "objects", "properties", "edges"] {
        assert_table_exists(&conn, table);
    }
    let next_oid: String = conn
        .query_row("SELECT value FROM store_meta WHERE key = 'next_oid'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(next_oid, "1");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worklog.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let meta_rows: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))
        .unwrap();
    assert_eq!(meta_rows, 2);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn read_only_open_refuses_to_migrate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.db");
    drop(Connection::open(&path).unwrap());

    match open_db_read_only(&path).unwrap_err() {
        DbError::OutdatedSchema {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 0);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }

    drop(open_db(&path).unwrap());
    let conn = open_db_read_only(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert!(conn
        .execute("INSERT INTO objects (oid, kind) VALUES (1, 'user')", [])
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
