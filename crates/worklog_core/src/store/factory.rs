//! Entity factories.
//!
//! Every factory validates the complete property set, allocates the next
//! OID, wires the mandatory edges and records the creation with the
//! backend before returning the typed handle.

use crate::entity::sealed::Sealed;
use crate::entity::{
    Account, ActivityRules, ActivityType, Beneficiary, Entity, Event, ObjectHandle,
    PrivateActivity, PrivateTask, Project, PublicActivity, PublicTask, User, Work, WorkStream,
};
use crate::error::{PropertyValueError, StoreResult};
use crate::model::{EntityKind, Oid, Property, Role, Value};
use crate::persist::Mutation;
use crate::store::graph;
use crate::store::notify::ChangeKind;
use crate::store::state::StoreState;
use crate::store::table::{PropertyCell, Slot};
use crate::store::Store;
use crate::validate::rules;
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub real_name: String,
    pub enabled: bool,
    pub email_addresses: Vec<String>,
}

impl UserSpec {
    pub fn new(real_name: impl Into<String>) -> Self {
        Self {
            real_name: real_name.into(),
            enabled: true,
            email_addresses: Vec::new(),
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::Enabled, Value::Bool(self.enabled)),
            (
                Property::EmailAddresses,
                Value::TextList(self.email_addresses.clone()),
            ),
            (Property::RealName, Value::Text(self.real_name.clone())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub login: String,
    pub enabled: bool,
    pub email_addresses: Vec<String>,
}

impl AccountSpec {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            enabled: true,
            email_addresses: Vec::new(),
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::Enabled, Value::Bool(self.enabled)),
            (
                Property::EmailAddresses,
                Value::TextList(self.email_addresses.clone()),
            ),
            (Property::Login, Value::Text(self.login.clone())),
        ]
    }
}

/// Properties shared by every activity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySpec {
    pub display_name: String,
    pub description: String,
    /// Minutes after which a running work item is considered abandoned.
    pub timeout: Option<u32>,
    pub require_comment_on_start: bool,
    pub require_comment_on_finish: bool,
}

impl ActivitySpec {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: String::new(),
            timeout: None,
            require_comment_on_start: false,
            require_comment_on_finish: false,
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::DisplayName, Value::Text(self.display_name.clone())),
            (Property::Description, Value::Text(self.description.clone())),
            (Property::Timeout, Value::Minutes(self.timeout)),
            (
                Property::RequireCommentOnStart,
                Value::Bool(self.require_comment_on_start),
            ),
            (
                Property::RequireCommentOnFinish,
                Value::Bool(self.require_comment_on_finish),
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub activity: ActivitySpec,
    pub completed: bool,
}

impl TaskSpec {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            activity: ActivitySpec::new(display_name),
            completed: false,
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        let mut properties = self.activity.properties();
        properties.push((Property::Completed, Value::Bool(self.completed)));
        properties
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSpec {
    pub display_name: String,
    pub description: String,
    pub completed: bool,
}

impl ProjectSpec {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: String::new(),
            completed: false,
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::DisplayName, Value::Text(self.display_name.clone())),
            (Property::Description, Value::Text(self.description.clone())),
            (Property::Completed, Value::Bool(self.completed)),
        ]
    }
}

/// Work streams, beneficiaries and activity types carry only a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSpec {
    pub display_name: String,
    pub description: String,
}

impl NamedSpec {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: String::new(),
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::DisplayName, Value::Text(self.display_name.clone())),
            (Property::Description, Value::Text(self.description.clone())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSpec {
    /// UTC epoch milliseconds.
    pub start: i64,
    /// UTC epoch milliseconds; never before `start`.
    pub finish: i64,
    pub comment: String,
}

impl WorkSpec {
    pub fn new(start: i64, finish: i64) -> Self {
        Self {
            start,
            finish,
            comment: String::new(),
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::Start, Value::Timestamp(self.start)),
            (Property::Finish, Value::Timestamp(self.finish)),
            (Property::Comment, Value::Text(self.comment.clone())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub occurred_at: i64,
    pub summary: String,
}

impl EventSpec {
    pub fn new(occurred_at: i64, summary: impl Into<String>) -> Self {
        Self {
            occurred_at,
            summary: summary.into(),
        }
    }

    fn properties(&self) -> Vec<(Property, Value)> {
        vec![
            (Property::OccurredAt, Value::Timestamp(self.occurred_at)),
            (Property::Summary, Value::Text(self.summary.clone())),
        ]
    }
}

/// Creates one object with its initial edges.
///
/// Peers are checked before the OID is allocated, so a rejected request
/// leaves no trace in the store.
fn create_object(
    state: &mut StoreState,
    kind: EntityKind,
    supplied: Vec<(Property, Value)>,
    edges: &[(Role, Oid)],
) -> StoreResult<Oid> {
    let mut properties = Vec::new();
    for property in kind.properties() {
        let value = supplied
            .iter()
            .find(|(candidate, _)| *candidate == property)
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| property.default_value());
        rules::check_value(kind, property, &value)?;
        properties.push((property, value));
    }
    rules::check_object(kind, &properties)?;
    if let Some((_, login)) = properties
        .iter()
        .find(|(property, _)| *property == Property::Login)
    {
        state.ensure_login_unique(login, None)?;
    }

    for (role, peer) in edges {
        let peer_kind = state.kind_of(*peer)?;
        let descriptor = role.descriptor();
        if !kind.has_role(*role)
            || !peer_kind.has_role(descriptor.inverse)
            || !descriptor.accepts(kind, peer_kind)
        {
            return Err(PropertyValueError::new(
                kind,
                descriptor.name,
                format!("{peer_kind} #{peer}"),
                "peer kind is not allowed for this relationship",
            )
            .into());
        }
    }

    let oid = state.allocate_oid()?;
    let mut slot = Slot::new(oid, kind);
    for (property, value) in &properties {
        slot.properties
            .insert(*property, PropertyCell::Loaded(value.clone()));
    }
    state.objects.insert_live(slot);
    state.record(Mutation::Created {
        oid,
        kind,
        properties,
    });
    state.post(kind, oid, ChangeKind::Created);

    for (role, peer) in edges {
        graph::link(state, oid, *role, *peer)?;
    }
    debug!("event=object_create module=store status=ok kind={kind} oid={oid}");
    Ok(oid)
}

impl Store {
    fn create<T: Entity>(
        &self,
        supplied: Vec<(Property, Value)>,
        peers: &[(Role, &ObjectHandle)],
    ) -> StoreResult<T> {
        for (_, peer) in peers {
            self.ensure_same_store(peer)?;
        }
        let edges: Vec<(Role, Oid)> = peers.iter().map(|(role, peer)| (*role, peer.oid())).collect();
        let oid = self.write(|state| create_object(state, T::KIND, supplied, &edges))?;
        Ok(T::from_object(ObjectHandle::new(self.clone(), oid, T::KIND)))
    }

    pub fn create_user(&self, spec: UserSpec) -> StoreResult<User> {
        self.create(spec.properties(), &[])
    }

    /// Creates an account owned by `user`.
    ///
    /// # Errors
    /// - `AlreadyExists` when the login is taken.
    pub fn create_account(&self, user: &User, spec: AccountSpec) -> StoreResult<Account> {
        self.create(spec.properties(), &[(Role::AccountUser, user.object())])
    }

    pub fn create_public_activity(&self, spec: ActivitySpec) -> StoreResult<PublicActivity> {
        self.create(spec.properties(), &[])
    }

    pub fn create_private_activity(
        &self,
        owner: &User,
        spec: ActivitySpec,
    ) -> StoreResult<PrivateActivity> {
        self.create(
            spec.properties(),
            &[(Role::PrivateActivityOwner, owner.object())],
        )
    }

    /// Creates a public task, nested under `parent` when given.
    pub fn create_public_task(
        &self,
        parent: Option<&PublicTask>,
        spec: TaskSpec,
    ) -> StoreResult<PublicTask> {
        match parent {
            Some(parent) => self.create(spec.properties(), &[(Role::TaskParent, parent.object())]),
            None => self.create(spec.properties(), &[]),
        }
    }

    /// Creates a root private task owned by `owner`.
    pub fn create_private_task(&self, owner: &User, spec: TaskSpec) -> StoreResult<PrivateTask> {
        self.create(spec.properties(), &[(Role::PrivateTaskOwner, owner.object())])
    }

    /// Creates a private task nested under `parent`; it shares the parent's owner.
    pub fn create_private_subtask(
        &self,
        parent: &PrivateTask,
        spec: TaskSpec,
    ) -> StoreResult<PrivateTask> {
        self.create(spec.properties(), &[(Role::TaskParent, parent.object())])
    }

    pub fn create_project(
        &self,
        parent: Option<&Project>,
        spec: ProjectSpec,
    ) -> StoreResult<Project> {
        match parent {
            Some(parent) => {
                self.create(spec.properties(), &[(Role::ProjectParent, parent.object())])
            }
            None => self.create(spec.properties(), &[]),
        }
    }

    pub fn create_work_stream(&self, spec: NamedSpec) -> StoreResult<WorkStream> {
        self.create(spec.properties(), &[])
    }

    pub fn create_beneficiary(&self, spec: NamedSpec) -> StoreResult<Beneficiary> {
        self.create(spec.properties(), &[])
    }

    pub fn create_activity_type(&self, spec: NamedSpec) -> StoreResult<ActivityType> {
        self.create(spec.properties(), &[])
    }

    /// Records work done through `account` on `activity`.
    pub fn create_work<A: ActivityRules>(
        &self,
        account: &Account,
        activity: &A,
        spec: WorkSpec,
    ) -> StoreResult<Work> {
        self.create(
            spec.properties(),
            &[
                (Role::WorkAccount, account.object()),
                (Role::WorkActivity, activity.object()),
            ],
        )
    }

    pub fn create_event(&self, account: &Account, spec: EventSpec) -> StoreResult<Event> {
        self.create(spec.properties(), &[(Role::EventAccount, account.object())])
    }
}
