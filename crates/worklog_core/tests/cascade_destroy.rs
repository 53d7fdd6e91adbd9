use worklog_core::{
    AccountSpec, ActivityRules, ActivitySpec, ChangeKind, Entity, EventSpec, Hierarchical, Named,
    NamedSpec, ProjectSpec, Role, Store, StoreError, TaskSpec, UserSpec, WorkSpec, Workload,
};

#[test]
fn destroying_account_severs_work_from_surviving_activity() {
    let store = Store::create_in_memory();
    let activity = store
        .create_public_activity(ActivitySpec::new("Coding"))
        .unwrap();
    let held = activity.retain().unwrap();
    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    let account = store.create_account(&user, AccountSpec::new("ann")).unwrap();
    let work = store
        .create_work(&account, &activity, WorkSpec::new(1_000, 2_000))
        .unwrap();
    let event = store
        .create_event(&account, EventSpec::new(1_500, "login"))
        .unwrap();
    assert_eq!(held.works().unwrap(), vec![work.clone()]);
    assert_eq!(store.inspect(activity.oid()).unwrap().reference_count, 2);

    account.destroy().unwrap();

    assert!(!work.is_live());
    assert!(!event.is_live());
    assert!(held.is_live());
    assert!(held.works().unwrap().is_empty());
    assert_eq!(store.inspect(activity.oid()).unwrap().reference_count, 1);
    assert!(user.accounts().unwrap().is_empty());
    store.validate().unwrap();
}

#[test]
fn destroying_activity_leaves_work_without_activity() {
    let store = Store::create_in_memory();
    let activity = store
        .create_public_activity(ActivitySpec::new("Review"))
        .unwrap();
    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    let account = store.create_account(&user, AccountSpec::new("ann")).unwrap();
    let work = store
        .create_work(&account, &activity, WorkSpec::new(0, 10))
        .unwrap();

    activity.destroy().unwrap();

    assert!(work.is_live());
    assert!(work.activity().unwrap().is_none());
    assert_eq!(work.account().unwrap(), account);
}

#[test]
fn project_subtree_is_destroyed_depth_first() {
    let store = Store::create_in_memory();
    let root = store.create_project(None, ProjectSpec::new("Root")).unwrap();
    let child = store
        .create_project(Some(&root), ProjectSpec::new("Child"))
        .unwrap();
    let grandchild = store
        .create_project(Some(&child), ProjectSpec::new("Grandchild"))
        .unwrap();
    let stream = store.create_work_stream(NamedSpec::new("Ops")).unwrap();
    let beneficiary = store
        .create_beneficiary(NamedSpec::new("ACME"))
        .unwrap();
    grandchild.add_beneficiary(&beneficiary).unwrap();
    stream.add_beneficiary(&beneficiary).unwrap();

    let events = store.subscribe().unwrap();
    root.destroy().unwrap();

    let destroyed: Vec<_> = events
        .try_iter()
        .filter(|event| event.change == ChangeKind::Destroyed)
        .map(|event| event.oid)
        .collect();
    assert_eq!(destroyed, vec![grandchild.oid(), child.oid(), root.oid()]);
    assert_eq!(store.projects().unwrap(), Vec::new());
    let workloads = beneficiary
        .object()
        .peers(Role::BeneficiaryWorkloads)
        .unwrap();
    assert_eq!(workloads, vec![stream.object().clone()]);
    assert!(stream.is_live());
}

#[test]
fn nested_public_tasks_follow_their_parent() {
    let store = Store::create_in_memory();
    let parent = store
        .create_public_task(None, TaskSpec::new("Release"))
        .unwrap();
    let child = store
        .create_public_task(Some(&parent), TaskSpec::new("Changelog"))
        .unwrap();
    assert_eq!(child.parent().unwrap(), Some(parent.clone()));
    assert_eq!(parent.children().unwrap(), vec![child.clone()]);

    parent.destroy().unwrap();
    assert!(!child.is_live());
    assert!(matches!(
        child.display_name(),
        Err(StoreError::InstanceDead { .. })
    ));
}
