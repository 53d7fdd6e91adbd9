use std::path::Path;
use worklog_core::{
    AccountSpec, ActivityRef, ActivityRules, ActivitySpec, Completable, Entity, EntityKind,
    EventSpec, Hierarchical, Named, NamedSpec, Principal, PrivateTask, ProjectSpec, Store,
    StoreAddress, StoreError, StoreOptions, TaskSpec, User, UserSpec, WorkSpec, Workload,
};

fn open(path: &Path) -> Store {
    Store::open(&StoreAddress::File(path.to_path_buf()), &StoreOptions::default()).unwrap()
}

#[test]
fn graph_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worklog.xml");

    let store = open(&path);
    let mut spec = UserSpec::new("Ann <Lee> & co");
    spec.email_addresses = vec!["ann@example.org".to_string(), "lee@example.org".to_string()];
    let user = store.create_user(spec).unwrap();
    let account = store.create_account(&user, AccountSpec::new("ann")).unwrap();
    let mut coding = ActivitySpec::new("Coding");
    coding.timeout = Some(90);
    coding.require_comment_on_finish = true;
    let activity = store.create_public_activity(coding).unwrap();
    let private = store
        .create_private_activity(&user, ActivitySpec::new("Reading"))
        .unwrap();
    let task = store.create_private_task(&user, TaskSpec::new("Taxes")).unwrap();
    let subtask = store
        .create_private_subtask(&task, TaskSpec::new("Receipts"))
        .unwrap();
    subtask.set_completed(true).unwrap();
    let project = store.create_project(None, ProjectSpec::new("Apollo")).unwrap();
    let phase = store
        .create_project(Some(&project), ProjectSpec::new("Phase \"1\""))
        .unwrap();
    let stream = store.create_work_stream(NamedSpec::new("Support")).unwrap();
    let beneficiary = store.create_beneficiary(NamedSpec::new("ACME")).unwrap();
    let review = store.create_activity_type(NamedSpec::new("Review")).unwrap();
    activity.add_workload(&phase).unwrap();
    activity.add_workload(&stream).unwrap();
    activity.add_activity_type(&review).unwrap();
    phase.add_beneficiary(&beneficiary).unwrap();
    user.permit_workload(&stream).unwrap();
    let mut work_spec = WorkSpec::new(1_700_000_000_000, 1_700_000_360_000);
    work_spec.comment = "line one\nline two".to_string();
    let work = store.create_work(&account, &subtask, work_spec).unwrap();
    store
        .create_event(&account, EventSpec::new(1_700_000_000_000, "started"))
        .unwrap();
    let next_oid = store.next_oid();
    let counts = store.count_by_kind();
    store.close().unwrap();
    assert!(!dir.path().join("worklog.xml.lock").exists());

    let store = open(&path);
    assert_eq!(store.next_oid(), next_oid);
    assert_eq!(store.count_by_kind(), counts);
    store.validate().unwrap();

    let user: User = store.find(user.oid()).unwrap();
    assert_eq!(user.real_name().unwrap(), "Ann <Lee> & co");
    assert_eq!(user.email_addresses().unwrap().len(), 2);
    assert_eq!(user.private_activities().unwrap().len(), 1);
    assert_eq!(
        user.private_activities().unwrap()[0].display_name().unwrap(),
        "Reading"
    );
    assert_eq!(user.permitted_workloads().unwrap().len(), 1);
    assert_eq!(private.oid(), user.private_activities().unwrap()[0].oid());

    let account = store.find_account_by_login("ann").unwrap().unwrap();
    assert_eq!(account.user().unwrap(), user);
    assert_eq!(account.events().unwrap()[0].summary().unwrap(), "started");

    let reloaded = &account.works().unwrap()[0];
    assert_eq!(reloaded.oid(), work.oid());
    assert_eq!(reloaded.start().unwrap(), 1_700_000_000_000);
    assert_eq!(reloaded.comment().unwrap(), "line one\nline two");
    match reloaded.activity().unwrap() {
        Some(ActivityRef::PrivateTask(found)) => {
            assert_eq!(found.oid(), subtask.oid());
            assert!(found.completed().unwrap());
            assert_eq!(found.owner().unwrap(), user);
            let parent: PrivateTask = found.parent().unwrap().unwrap();
            assert_eq!(parent.oid(), task.oid());
        }
        other => panic!("unexpected activity {other:?}"),
    }

    let activity = store.public_activities().unwrap().remove(0);
    assert_eq!(activity.timeout().unwrap(), Some(90));
    assert!(activity.requires_comment_on_finish().unwrap());
    assert_eq!(activity.workloads().unwrap().len(), 2);
    assert_eq!(activity.activity_types().unwrap()[0].display_name().unwrap(), "Review");

    let project = store
        .projects()
        .unwrap()
        .into_iter()
        .find(|project| project.parent().unwrap().is_none())
        .unwrap();
    let phase = &project.children().unwrap()[0];
    assert_eq!(phase.display_name().unwrap(), "Phase \"1\"");
    assert_eq!(phase.beneficiaries().unwrap().len(), 1);
    assert_eq!(phase.activities().unwrap()[0].kind(), EntityKind::PublicActivity);
}

#[test]
fn second_writer_is_locked_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worklog.xml");
    let first = open(&path);

    let err = Store::open(&StoreAddress::File(path.clone()), &StoreOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::StoreLocked { .. }));

    let reader = Store::open(&StoreAddress::File(path.clone()), &StoreOptions::read_only());
    assert!(matches!(reader, Err(StoreError::DoesNotExist { .. })));

    first.close().unwrap();
    open(&path).close().unwrap();
}

#[test]
fn foreign_format_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.xml");
    std::fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8"?><worklog format-version="7" next-oid="1"/>"#,
    )
    .unwrap();

    let err = Store::open(&StoreAddress::File(path.clone()), &StoreOptions::read_only()).unwrap_err();
    match err {
        StoreError::UnsupportedFormatVersion { found, expected, .. } => {
            assert_eq!(found, "7");
            assert_eq!(expected, worklog_core::FORMAT_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_is_created_only_when_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.xml");
    let options = StoreOptions {
        create_if_missing: false,
        ..StoreOptions::default()
    };
    let err = Store::open(&StoreAddress::File(path.clone()), &options).unwrap_err();
    assert!(matches!(err, StoreError::DoesNotExist { .. }));

    let store = open(&path);
    store.close().unwrap();
    assert!(path.exists());
}
