//! Capability traits.
//!
//! Each trait maps one capability group onto typed accessors with default
//! bodies; a kind opts in with an empty `impl`.

use crate::entity::refs::{ActivityRef, WorkloadRef};
use crate::entity::{ActivityType, Beneficiary, Entity, User, Work};
use crate::error::{PropertyValueError, StoreResult};
use crate::model::{Property, Role, Value};
use crate::store::graph;

/// Enabled flag and contact addresses of users and accounts.
pub trait Principal: Entity {
    fn enabled(&self) -> StoreResult<bool> {
        self.object().get_bool(Property::Enabled)
    }

    fn set_enabled(&self, enabled: bool) -> StoreResult<()> {
        self.object().set(Property::Enabled, Value::Bool(enabled))
    }

    fn email_addresses(&self) -> StoreResult<Vec<String>> {
        self.object().get_text_list(Property::EmailAddresses)
    }

    fn set_email_addresses(&self, addresses: Vec<String>) -> StoreResult<()> {
        self.object()
            .set(Property::EmailAddresses, Value::TextList(addresses))
    }
}

pub trait Named: Entity {
    fn display_name(&self) -> StoreResult<String> {
        self.object().get_text(Property::DisplayName)
    }

    fn set_display_name(&self, name: &str) -> StoreResult<()> {
        self.object().set(Property::DisplayName, Value::from(name))
    }

    fn description(&self) -> StoreResult<String> {
        self.object().get_text(Property::Description)
    }

    fn set_description(&self, description: &str) -> StoreResult<()> {
        self.object()
            .set(Property::Description, Value::from(description))
    }
}

/// Anything work can be recorded against: activities and tasks.
pub trait ActivityRules: Named {
    fn timeout(&self) -> StoreResult<Option<u32>> {
        self.object().get_minutes(Property::Timeout)
    }

    fn set_timeout(&self, minutes: Option<u32>) -> StoreResult<()> {
        self.object().set(Property::Timeout, Value::Minutes(minutes))
    }

    fn requires_comment_on_start(&self) -> StoreResult<bool> {
        self.object().get_bool(Property::RequireCommentOnStart)
    }

    fn set_requires_comment_on_start(&self, required: bool) -> StoreResult<()> {
        self.object()
            .set(Property::RequireCommentOnStart, Value::Bool(required))
    }

    fn requires_comment_on_finish(&self) -> StoreResult<bool> {
        self.object().get_bool(Property::RequireCommentOnFinish)
    }

    fn set_requires_comment_on_finish(&self, required: bool) -> StoreResult<()> {
        self.object()
            .set(Property::RequireCommentOnFinish, Value::Bool(required))
    }

    /// Work items recorded against this activity.
    fn works(&self) -> StoreResult<Vec<Work>> {
        self.object().typed_peers(Role::ActivityWorks)
    }

    fn workloads(&self) -> StoreResult<Vec<WorkloadRef>> {
        Ok(self
            .object()
            .peers(Role::ActivityWorkloads)?
            .into_iter()
            .filter_map(WorkloadRef::from_object)
            .collect())
    }

    fn add_workload<W: Workload>(&self, workload: &W) -> StoreResult<()> {
        self.object()
            .link(Role::ActivityWorkloads, workload.object())
    }

    fn remove_workload<W: Workload>(&self, workload: &W) -> StoreResult<()> {
        self.object()
            .unlink(Role::ActivityWorkloads, workload.object())
    }

    fn activity_types(&self) -> StoreResult<Vec<ActivityType>> {
        self.object().typed_peers(Role::ActivityActivityTypes)
    }

    fn add_activity_type(&self, activity_type: &ActivityType) -> StoreResult<()> {
        self.object()
            .link(Role::ActivityActivityTypes, activity_type.object())
    }

    fn remove_activity_type(&self, activity_type: &ActivityType) -> StoreResult<()> {
        self.object()
            .unlink(Role::ActivityActivityTypes, activity_type.object())
    }
}

pub trait Completable: Entity {
    fn completed(&self) -> StoreResult<bool> {
        self.object().get_bool(Property::Completed)
    }

    fn set_completed(&self, completed: bool) -> StoreResult<()> {
        self.object().set(Property::Completed, Value::Bool(completed))
    }
}

/// Projects and work streams: what activities are carried out for.
pub trait Workload: Named {
    fn activities(&self) -> StoreResult<Vec<ActivityRef>> {
        Ok(self
            .object()
            .peers(Role::WorkloadActivities)?
            .into_iter()
            .filter_map(ActivityRef::from_object)
            .collect())
    }

    fn beneficiaries(&self) -> StoreResult<Vec<Beneficiary>> {
        self.object().typed_peers(Role::WorkloadBeneficiaries)
    }

    fn add_beneficiary(&self, beneficiary: &Beneficiary) -> StoreResult<()> {
        self.object()
            .link(Role::WorkloadBeneficiaries, beneficiary.object())
    }

    fn remove_beneficiary(&self, beneficiary: &Beneficiary) -> StoreResult<()> {
        self.object()
            .unlink(Role::WorkloadBeneficiaries, beneficiary.object())
    }

    /// Users allowed to record work against this workload.
    fn permitted_users(&self) -> StoreResult<Vec<User>> {
        self.object().typed_peers(Role::WorkloadPermittedUsers)
    }
}

/// Self-nesting kinds: tasks and projects.
pub trait Hierarchical: Entity {
    const PARENT_ROLE: Role;
    const CHILDREN_ROLE: Role;

    fn parent(&self) -> StoreResult<Option<Self>> {
        Ok(self
            .object()
            .peer(Self::PARENT_ROLE)?
            .and_then(|parent| parent.downcast::<Self>()))
    }

    /// Direct children, in OID order.
    fn children(&self) -> StoreResult<Vec<Self>> {
        self.object().typed_peers(Self::CHILDREN_ROLE)
    }

    /// Moves this object under `parent`, or to the top level with `None`.
    ///
    /// # Errors
    /// - `InvalidPropertyValue` when `parent` is this object or one of its
    ///   descendants.
    fn set_parent(&self, parent: Option<&Self>) -> StoreResult<()> {
        let object = self.object();
        match parent {
            Some(parent) => {
                object.store().ensure_same_store(parent.object())?;
                let (oid, parent_oid) = (object.oid(), parent.oid());
                object.store().write(|state| {
                    state.ensure_live(oid)?;
                    if graph::is_ancestor(state, oid, parent_oid, Self::PARENT_ROLE) {
                        return Err(PropertyValueError::new(
                            Self::KIND,
                            Self::PARENT_ROLE.name(),
                            format!("#{parent_oid}"),
                            "parent would create a cycle",
                        )
                        .into());
                    }
                    graph::link(state, oid, Self::PARENT_ROLE, parent_oid)
                })
            }
            None => match object.peer(Self::PARENT_ROLE)? {
                Some(current) => object.unlink(Self::PARENT_ROLE, &current),
                None => Ok(()),
            },
        }
    }
}
