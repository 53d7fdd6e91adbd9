use rusqlite::Connection;
use std::path::{Path, PathBuf};
use worklog_core::{
    AccountSpec, ActivityRules, ActivitySpec, Entity, Named, NamedSpec, Store, StoreAddress,
    StoreError, StoreOptions, User, UserSpec, WorkSpec, Workload,
};

fn address(dir: &Path) -> (PathBuf, StoreAddress) {
    let path = dir.join("worklog.db");
    (path.clone(), StoreAddress::Sqlite(path))
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn mutations_are_written_through_before_close() {
    let dir = tempfile::tempdir().unwrap();
    let (path, address) = address(dir.path());
    let store = Store::open(&address, &StoreOptions::default()).unwrap();

    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    let account = store.create_account(&user, AccountSpec::new("ann")).unwrap();
    let activity = store.create_public_activity(ActivitySpec::new("Coding")).unwrap();
    store
        .create_work(&account, &activity, WorkSpec::new(10, 20))
        .unwrap();

    let raw = Connection::open(&path).unwrap();
    assert_eq!(count(&raw, "SELECT COUNT(*) FROM objects"), 4);
    assert_eq!(count(&raw, "SELECT COUNT(*) FROM edges"), 3);
    assert_eq!(
        count(
            &raw,
            "SELECT CAST(value AS INTEGER) FROM store_meta WHERE key = 'next_oid'"
        ),
        5
    );

    user.set_real_name("Ann Lee").unwrap();
    let stored: String = raw
        .query_row(
            "SELECT value FROM properties WHERE oid = ?1 AND name = 'real-name'",
            [user.oid().get() as i64],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "Ann Lee");

    account.destroy().unwrap();
    assert_eq!(count(&raw, "SELECT COUNT(*) FROM objects"), 2);
    assert_eq!(count(&raw, "SELECT COUNT(*) FROM edges"), 0);
    assert_eq!(count(&raw, "SELECT COUNT(*) FROM properties WHERE name = 'login'"), 0);
    store.close().unwrap();
}

#[test]
fn properties_are_fetched_on_first_read_and_then_cached() {
    let dir = tempfile::tempdir().unwrap();
    let (path, address) = address(dir.path());
    let store = Store::open(&address, &StoreOptions::default()).unwrap();
    let stream = store.create_work_stream(NamedSpec::new("Support")).unwrap();
    let oid = stream.oid();
    store.close().unwrap();

    let store = Store::open(&address, &StoreOptions::default()).unwrap();
    let raw = Connection::open(&path).unwrap();
    raw
        .execute(
            "UPDATE properties SET value = 'Helpdesk' WHERE oid = ?1 AND name = 'display-name'",
            [oid.get() as i64],
        )
        .unwrap();

    let stream = &store.work_streams().unwrap()[0];
    assert_eq!(stream.display_name().unwrap(), "Helpdesk");

    raw
        .execute(
            "UPDATE properties SET value = 'Changed behind the store' WHERE oid = ?1 AND name = 'display-name'",
            [oid.get() as i64],
        )
        .unwrap();
    assert_eq!(stream.display_name().unwrap(), "Helpdesk");
    store.close().unwrap();
}

#[test]
fn reopened_graph_keeps_edges_and_oids() {
    let dir = tempfile::tempdir().unwrap();
    let (_, address) = address(dir.path());
    let store = Store::open(&address, &StoreOptions::default()).unwrap();
    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    let account = store.create_account(&user, AccountSpec::new("ann")).unwrap();
    let activity = store.create_public_activity(ActivitySpec::new("Coding")).unwrap();
    let stream = store.create_work_stream(NamedSpec::new("Ops")).unwrap();
    activity.add_workload(&stream).unwrap();
    store
        .create_work(&account, &activity, WorkSpec::new(10, 20))
        .unwrap();
    let next_oid = store.next_oid();
    store.close().unwrap();

    let store = Store::open(&address, &StoreOptions::read_only()).unwrap();
    store.validate().unwrap();
    assert_eq!(store.next_oid(), next_oid);
    let user: User = store.find(user.oid()).unwrap();
    let account = &user.accounts().unwrap()[0];
    assert_eq!(account.login().unwrap(), "ann");
    let activity = &store.public_activities().unwrap()[0];
    assert_eq!(activity.works().unwrap(), account.works().unwrap());
    assert_eq!(stream.oid(), activity.workloads().unwrap()[0].oid());
    let stream = &store.work_streams().unwrap()[0];
    assert_eq!(stream.activities().unwrap()[0].oid(), activity.oid());
}

#[test]
fn sqlite_store_exports_to_xml() {
    let dir = tempfile::tempdir().unwrap();
    let (_, address) = address(dir.path());
    let store = Store::open(&address, &StoreOptions::default()).unwrap();
    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    store.create_account(&user, AccountSpec::new("ann")).unwrap();
    store.close().unwrap();

    let store = Store::open(&address, &StoreOptions::read_only()).unwrap();
    let xml_path = dir.path().join("export.xml");
    store.export_to_file(&xml_path).unwrap();

    let exported = Store::open(&StoreAddress::File(xml_path), &StoreOptions::read_only()).unwrap();
    assert_eq!(exported.count_by_kind(), store.count_by_kind());
    assert_eq!(exported.next_oid(), store.next_oid());
    let account = exported.find_account_by_login("ann").unwrap().unwrap();
    assert_eq!(account.user().unwrap().real_name().unwrap(), "Ann");
}

#[test]
fn in_memory_sqlite_store_works_end_to_end() {
    let store = Store::open(&StoreAddress::SqliteInMemory, &StoreOptions::default()).unwrap();
    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    store.create_account(&user, AccountSpec::new("ann")).unwrap();
    assert!(matches!(
        store.create_account(&user, AccountSpec::new("ann")),
        Err(StoreError::AlreadyExists { .. })
    ));
    assert_eq!(store.live_count(), 2);
    store.close().unwrap();
}

#[test]
fn read_only_open_requires_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let (path, address) = address(dir.path());
    assert!(matches!(
        Store::open(&address, &StoreOptions::read_only()),
        Err(StoreError::DoesNotExist { .. })
    ));
    assert!(!path.exists());
}

#[test]
fn foreign_format_version_and_unknown_roles_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, address) = address(dir.path());
    Store::open(&address, &StoreOptions::default())
        .unwrap()
        .close()
        .unwrap();

    let raw = Connection::open(&path).unwrap();
    raw
        .execute("UPDATE store_meta SET value = '9' WHERE key = 'format_version'", [])
        .unwrap();
    match Store::open(&address, &StoreOptions::default()) {
        Err(StoreError::UnsupportedFormatVersion { found, .. }) => assert_eq!(found, "9"),
        other => panic!("unexpected result: {other:?}"),
    }

    raw
        .execute_batch(
            "UPDATE store_meta SET value = '1' WHERE key = 'format_version';
             INSERT INTO objects (oid, kind) VALUES (1, 'work-stream'), (2, 'beneficiary');
             INSERT INTO edges (from_oid, role, to_oid) VALUES (1, 'sponsors', 2);",
        )
        .unwrap();
    assert!(matches!(
        Store::open(&address, &StoreOptions::default()),
        Err(StoreError::Corrupt { .. })
    ));
}

#[test]
fn invalid_stored_value_is_rejected_on_first_read() {
    let dir = tempfile::tempdir().unwrap();
    let (path, address) = address(dir.path());
    let store = Store::open(&address, &StoreOptions::default()).unwrap();
    let stream = store.create_work_stream(NamedSpec::new("Support")).unwrap();
    let oid = stream.oid();
    store.close().unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE properties SET value = '' WHERE oid = ?1 AND name = 'display-name'",
        [oid.get() as i64],
    )
    .unwrap();

    let store = Store::open(&address, &StoreOptions::default()).unwrap();
    let stream = &store.work_streams().unwrap()[0];
    match stream.display_name() {
        Err(StoreError::Corrupt { reason, .. }) => assert!(reason.contains("must not be empty")),
        other => panic!("unexpected result: {other:?}"),
    }
    store.validate().unwrap();
}
