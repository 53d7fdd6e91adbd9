//! Per-kind accessors and capability assembly.

use crate::entity::capability::{
    ActivityRules, Completable, Hierarchical, Named, Principal, Workload,
};
use crate::entity::refs::{ActivityRef, WorkloadRef};
use crate::entity::sealed::Sealed;
use crate::entity::{
    Account, ActivityType, Beneficiary, Entity, Event, ObjectHandle, PrivateActivity,
    PrivateTask, Project, PublicActivity, PublicTask, User, Work, WorkStream,
};
use crate::error::{PropertyValueError, StoreResult};
use crate::model::{EntityKind, Oid, Property, Role, Value};
use crate::store::graph;
use crate::store::state::StoreState;

impl Principal for User {}
impl Principal for Account {}

impl Named for PublicActivity {}
impl Named for PrivateActivity {}
impl Named for PublicTask {}
impl Named for PrivateTask {}
impl Named for Project {}
impl Named for WorkStream {}
impl Named for Beneficiary {}
impl Named for ActivityType {}

impl ActivityRules for PublicActivity {}
impl ActivityRules for PrivateActivity {}
impl ActivityRules for PublicTask {}
impl ActivityRules for PrivateTask {}

impl Completable for PublicTask {}
impl Completable for PrivateTask {}
impl Completable for Project {}

impl Workload for Project {}
impl Workload for WorkStream {}

impl Hierarchical for PublicTask {
    const PARENT_ROLE: Role = Role::TaskParent;
    const CHILDREN_ROLE: Role = Role::TaskChildren;
}

impl Hierarchical for Project {
    const PARENT_ROLE: Role = Role::ProjectParent;
    const CHILDREN_ROLE: Role = Role::ProjectChildren;
}

impl User {
    pub fn real_name(&self) -> StoreResult<String> {
        self.object().get_text(Property::RealName)
    }

    pub fn set_real_name(&self, name: &str) -> StoreResult<()> {
        self.object().set(Property::RealName, Value::from(name))
    }

    pub fn accounts(&self) -> StoreResult<Vec<Account>> {
        self.object().typed_peers(Role::UserAccounts)
    }

    pub fn private_activities(&self) -> StoreResult<Vec<PrivateActivity>> {
        self.object().typed_peers(Role::UserPrivateActivities)
    }

    /// Top-level private tasks; nested ones hang off their parents.
    pub fn private_tasks(&self) -> StoreResult<Vec<PrivateTask>> {
        self.object().typed_peers(Role::UserPrivateTasks)
    }

    pub fn permitted_workloads(&self) -> StoreResult<Vec<WorkloadRef>> {
        Ok(self
            .object()
            .peers(Role::UserPermittedWorkloads)?
            .into_iter()
            .filter_map(WorkloadRef::from_object)
            .collect())
    }

    pub fn permit_workload<W: Workload>(&self, workload: &W) -> StoreResult<()> {
        self.object()
            .link(Role::UserPermittedWorkloads, workload.object())
    }

    pub fn revoke_workload<W: Workload>(&self, workload: &W) -> StoreResult<()> {
        self.object()
            .unlink(Role::UserPermittedWorkloads, workload.object())
    }
}

impl Account {
    pub fn login(&self) -> StoreResult<String> {
        self.object().get_text(Property::Login)
    }

    /// # Errors
    /// - `AlreadyExists` when another account uses `login`.
    pub fn set_login(&self, login: &str) -> StoreResult<()> {
        self.object().set(Property::Login, Value::from(login))
    }

    pub fn user(&self) -> StoreResult<User> {
        Ok(User::from_object(
            self.object().required_peer(Role::AccountUser)?,
        ))
    }

    pub fn works(&self) -> StoreResult<Vec<Work>> {
        self.object().typed_peers(Role::AccountWorks)
    }

    pub fn events(&self) -> StoreResult<Vec<Event>> {
        self.object().typed_peers(Role::AccountEvents)
    }
}

impl PrivateActivity {
    pub fn owner(&self) -> StoreResult<User> {
        Ok(User::from_object(
            self.object().required_peer(Role::PrivateActivityOwner)?,
        ))
    }
}

/// Owner of a private task: the first owner edge found walking up the parents.
fn private_task_owner(state: &StoreState, oid: Oid) -> Option<Oid> {
    let mut current = oid;
    for _ in 0..=state.objects.live_len() {
        let slot = state.objects.live(current)?;
        if let Some(owner) = slot.first_peer(Role::PrivateTaskOwner) {
            return Some(owner);
        }
        current = slot.first_peer(Role::TaskParent)?;
    }
    None
}

impl PrivateTask {
    pub fn owner(&self) -> StoreResult<User> {
        let oid = self.oid();
        let store = self.store();
        let owner = store.read(|state| {
            state.ensure_live(oid)?;
            private_task_owner(state, oid).ok_or_else(|| {
                crate::error::StoreError::corrupt(
                    state.address.clone(),
                    format!("private-task #{oid} has no owner"),
                )
            })
        })?;
        Ok(User::from_object(ObjectHandle::new(
            store.clone(),
            owner,
            EntityKind::User,
        )))
    }
}

impl Hierarchical for PrivateTask {
    const PARENT_ROLE: Role = Role::TaskParent;
    const CHILDREN_ROLE: Role = Role::TaskChildren;

    /// Private tasks stay within their owner's tree: a nested task drops its
    /// direct owner edge, a task moved to the top level gets it back.
    fn set_parent(&self, parent: Option<&Self>) -> StoreResult<()> {
        if let Some(parent) = parent {
            self.store().ensure_same_store(parent.object())?;
        }
        let oid = self.oid();
        let parent_oid = parent.map(Entity::oid);
        self.store().write(|state| {
            state.ensure_live(oid)?;
            let owner = private_task_owner(state, oid);
            match parent_oid {
                Some(parent_oid) => {
                    state.ensure_live(parent_oid)?;
                    if graph::is_ancestor(state, oid, parent_oid, Role::TaskParent) {
                        return Err(PropertyValueError::new(
                            EntityKind::PrivateTask,
                            Role::TaskParent.name(),
                            format!("#{parent_oid}"),
                            "parent would create a cycle",
                        )
                        .into());
                    }
                    if private_task_owner(state, parent_oid) != owner {
                        return Err(PropertyValueError::new(
                            EntityKind::PrivateTask,
                            Role::TaskParent.name(),
                            format!("#{parent_oid}"),
                            "parent belongs to another user",
                        )
                        .into());
                    }
                    graph::link(state, oid, Role::TaskParent, parent_oid)?;
                    if let Some(owner) = owner {
                        graph::unlink(state, oid, Role::PrivateTaskOwner, owner)?;
                    }
                    Ok(())
                }
                None => {
                    let current = state
                        .objects
                        .live(oid)
                        .and_then(|slot| slot.first_peer(Role::TaskParent));
                    if let Some(current) = current {
                        // Link the owner first so the task never sits without one.
                        if let Some(owner) = owner {
                            graph::link(state, oid, Role::PrivateTaskOwner, owner)?;
                        }
                        graph::unlink(state, oid, Role::TaskParent, current)?;
                    }
                    Ok(())
                }
            }
        })
    }
}

impl Work {
    pub fn start(&self) -> StoreResult<i64> {
        self.object().get_timestamp(Property::Start)
    }

    pub fn finish(&self) -> StoreResult<i64> {
        self.object().get_timestamp(Property::Finish)
    }

    /// Replaces both ends of the interval in one validated write.
    pub fn set_interval(&self, start: i64, finish: i64) -> StoreResult<()> {
        self.object().set_many(vec![
            (Property::Start, Value::Timestamp(start)),
            (Property::Finish, Value::Timestamp(finish)),
        ])
    }

    pub fn comment(&self) -> StoreResult<String> {
        self.object().get_text(Property::Comment)
    }

    pub fn set_comment(&self, comment: &str) -> StoreResult<()> {
        self.object().set(Property::Comment, Value::from(comment))
    }

    pub fn account(&self) -> StoreResult<Account> {
        Ok(Account::from_object(
            self.object().required_peer(Role::WorkAccount)?,
        ))
    }

    /// `None` once the activity has been destroyed.
    pub fn activity(&self) -> StoreResult<Option<ActivityRef>> {
        Ok(self
            .object()
            .peer(Role::WorkActivity)?
            .and_then(ActivityRef::from_object))
    }

    pub fn set_activity<A: ActivityRules>(&self, activity: &A) -> StoreResult<()> {
        self.object().link(Role::WorkActivity, activity.object())
    }
}

impl Event {
    pub fn occurred_at(&self) -> StoreResult<i64> {
        self.object().get_timestamp(Property::OccurredAt)
    }

    pub fn set_occurred_at(&self, occurred_at: i64) -> StoreResult<()> {
        self.object()
            .set(Property::OccurredAt, Value::Timestamp(occurred_at))
    }

    pub fn summary(&self) -> StoreResult<String> {
        self.object().get_text(Property::Summary)
    }

    pub fn set_summary(&self, summary: &str) -> StoreResult<()> {
        self.object().set(Property::Summary, Value::from(summary))
    }

    pub fn account(&self) -> StoreResult<Account> {
        Ok(Account::from_object(
            self.object().required_peer(Role::EventAccount)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::entity::{ActivityRules, Entity, Hierarchical, Named, Workload};
    use crate::error::StoreError;
    use crate::store::{ActivitySpec, NamedSpec, ProjectSpec, Store, TaskSpec, UserSpec};

    #[test]
    fn project_parent_rejects_cycles() {
        let store = Store::create_in_memory();
        let root = store.create_project(None, ProjectSpec::new("Root")).unwrap();
        let child = store
            .create_project(Some(&root), ProjectSpec::new("Child"))
            .unwrap();
        let err = root.set_parent(Some(&child)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPropertyValue(_)));
        assert!(root.set_parent(Some(&root)).is_err());

        child.set_parent(None).unwrap();
        assert!(root.children().unwrap().is_empty());
        assert_eq!(child.parent().unwrap(), None);
    }

    #[test]
    fn private_task_moves_keep_exactly_one_owner_edge() {
        let store = Store::create_in_memory();
        let user = store.create_user(UserSpec::new("Ann")).unwrap();
        let first = store
            .create_private_task(&user, TaskSpec::new("First"))
            .unwrap();
        let second = store
            .create_private_task(&user, TaskSpec::new("Second"))
            .unwrap();

        second.set_parent(Some(&first)).unwrap();
        assert_eq!(user.private_tasks().unwrap(), vec![first.clone()]);
        assert_eq!(second.owner().unwrap(), user);

        second.set_parent(None).unwrap();
        assert_eq!(user.private_tasks().unwrap().len(), 2);
        store.validate().unwrap();
    }

    #[test]
    fn associations_are_visible_from_both_ends() {
        let store = Store::create_in_memory();
        let activity = store
            .create_public_activity(ActivitySpec::new("Coding"))
            .unwrap();
        let stream = store.create_work_stream(NamedSpec::new("Support")).unwrap();
        activity.add_workload(&stream).unwrap();

        let activities = stream.activities().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].oid(), activity.oid());
        assert_eq!(activities[0].display_name().unwrap(), "Coding");

        activity.remove_workload(&stream).unwrap();
        assert!(stream.activities().unwrap().is_empty());
    }
}
