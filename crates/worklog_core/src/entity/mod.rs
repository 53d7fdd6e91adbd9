//! Typed entity handles.
//!
//! # Responsibility
//! - Expose each entity kind as a cheap, cloneable handle resolved through
//!   the store's live index on every access.
//! - Assemble per-kind behavior from capability traits.
//! - Provide counted holders (`Retained`) for callers that must keep a
//!   destroyed object addressable until they let go.
//!
//! # Invariants
//! - Plain handles never touch reference counts.
//! - A `Retained` adds exactly one reference on creation and on clone, and
//!   releases exactly one on drop.
//! - Every accessor fails with `InstanceDead` once the object is destroyed.

mod capability;
mod kinds;
mod refs;

pub use capability::{ActivityRules, Completable, Hierarchical, Named, Principal, Workload};
pub use refs::{ActivityRef, WorkloadRef};

use crate::error::{StoreError, StoreResult};
use crate::model::{EntityKind, Oid, Property, Role, Value};
use crate::store::graph;
use crate::store::Store;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

pub(crate) mod sealed {
    use super::ObjectHandle;

    pub trait Sealed {
        /// Wraps a handle already known to carry the implementing kind.
        fn from_object(object: ObjectHandle) -> Self;
    }
}

/// Untyped handle: store, OID and kind.
#[derive(Clone)]
pub struct ObjectHandle {
    store: Store,
    oid: Oid,
    kind: EntityKind,
}

impl Debug for ObjectHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.oid)
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid && self.store.id() == other.store.id()
    }
}

impl Eq for ObjectHandle {}

impl ObjectHandle {
    pub(crate) fn new(store: Store, oid: Oid, kind: EntityKind) -> Self {
        Self { store, oid, kind }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_live(&self) -> bool {
        self.store.with_state(|state| state.objects.is_live(self.oid))
    }

    /// Destroys the object and everything it aggregates.
    pub fn destroy(&self) -> StoreResult<()> {
        self.store.destroy_object(self.oid)
    }

    /// Narrows to a typed handle when the kind matches.
    pub fn downcast<T: Entity>(&self) -> Option<T> {
        (self.kind == T::KIND).then(|| T::from_object(self.clone()))
    }

    /// Reads any property of this object.
    pub fn get(&self, property: Property) -> StoreResult<Value> {
        self.store.read(|state| state.property(self.oid, property))
    }

    /// Writes any property of this object after validation.
    pub fn set(&self, property: Property, value: Value) -> StoreResult<()> {
        self.store
            .write(|state| state.set_property(self.oid, property, value))
    }

    pub(crate) fn set_many(&self, changes: Vec<(Property, Value)>) -> StoreResult<()> {
        self.store
            .write(|state| state.set_properties(self.oid, changes))
    }

    fn typed<R>(
        &self,
        property: Property,
        extract: impl FnOnce(&Value) -> Option<R>,
    ) -> StoreResult<R> {
        let value = self.get(property)?;
        extract(&value).ok_or_else(|| {
            StoreError::corrupt(
                self.store.address(),
                format!("{} #{} property {property} has the wrong type", self.kind, self.oid),
            )
        })
    }

    pub(crate) fn get_bool(&self, property: Property) -> StoreResult<bool> {
        self.typed(property, Value::as_bool)
    }

    pub(crate) fn get_text(&self, property: Property) -> StoreResult<String> {
        self.typed(property, |value| value.as_text().map(str::to_string))
    }

    pub(crate) fn get_timestamp(&self, property: Property) -> StoreResult<i64> {
        self.typed(property, Value::as_timestamp)
    }

    pub(crate) fn get_minutes(&self, property: Property) -> StoreResult<Option<u32>> {
        self.typed(property, Value::as_minutes)
    }

    pub(crate) fn get_text_list(&self, property: Property) -> StoreResult<Vec<String>> {
        self.typed(property, |value| value.as_text_list().map(<[String]>::to_vec))
    }

    /// Live peers along `role`, in OID order.
    pub fn peers(&self, role: Role) -> StoreResult<Vec<ObjectHandle>> {
        let peers = self.store.read(|state| {
            let slot = state.ensure_live(self.oid)?;
            Ok(slot
                .peers(role)
                .filter_map(|peer| state.objects.live(peer).map(|slot| (peer, slot.kind)))
                .collect::<Vec<_>>())
        })?;
        Ok(peers
            .into_iter()
            .map(|(oid, kind)| ObjectHandle::new(self.store.clone(), oid, kind))
            .collect())
    }

    pub(crate) fn peer(&self, role: Role) -> StoreResult<Option<ObjectHandle>> {
        Ok(self.peers(role)?.into_iter().next())
    }

    /// Peer along a single-valued role that must be present.
    pub(crate) fn required_peer(&self, role: Role) -> StoreResult<ObjectHandle> {
        self.peer(role)?.ok_or_else(|| {
            StoreError::corrupt(
                self.store.address(),
                format!("{} #{} has no {role}", self.kind, self.oid),
            )
        })
    }

    pub(crate) fn typed_peers<T: Entity>(&self, role: Role) -> StoreResult<Vec<T>> {
        Ok(self
            .peers(role)?
            .iter()
            .filter_map(|peer| peer.downcast::<T>())
            .collect())
    }

    pub(crate) fn link(&self, role: Role, other: &ObjectHandle) -> StoreResult<()> {
        self.store.ensure_same_store(other)?;
        self.store
            .write(|state| graph::link(state, self.oid, role, other.oid))
    }

    pub(crate) fn unlink(&self, role: Role, other: &ObjectHandle) -> StoreResult<()> {
        self.store.ensure_same_store(other)?;
        self.store.write(|state| {
            state.ensure_live(self.oid)?;
            graph::unlink(state, self.oid, role, other.oid)
        })
    }
}

/// Behavior shared by every typed handle.
pub trait Entity: sealed::Sealed + Clone + Debug {
    const KIND: EntityKind;

    fn object(&self) -> &ObjectHandle;

    fn oid(&self) -> Oid {
        self.object().oid()
    }

    fn store(&self) -> &Store {
        self.object().store()
    }

    fn is_live(&self) -> bool {
        self.object().is_live()
    }

    fn destroy(&self) -> StoreResult<()> {
        self.object().destroy()
    }

    /// Takes a counted reference that keeps the object addressable after
    /// destruction until the holder is dropped.
    fn retain(&self) -> StoreResult<Retained<Self>> {
        self.store().add_reference(self.oid())?;
        Ok(Retained {
            entity: self.clone(),
        })
    }
}

/// Counted holder of a typed handle.
pub struct Retained<T: Entity> {
    entity: T,
}

impl<T: Entity> Retained<T> {
    pub fn get(&self) -> &T {
        &self.entity
    }
}

impl<T: Entity> Clone for Retained<T> {
    fn clone(&self) -> Self {
        self.entity.store().with_state(|state| state.add_reference(self.entity.oid()));
        Self {
            entity: self.entity.clone(),
        }
    }
}

impl<T: Entity> Drop for Retained<T> {
    fn drop(&mut self) {
        self.entity.store().release_reference(self.entity.oid());
    }
}

impl<T: Entity> Deref for Retained<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

impl<T: Entity> Debug for Retained<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Retained").field(&self.entity).finish()
    }
}

macro_rules! entity_handles {
    ($($(#[$meta:meta])* $name:ident => $kind:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Clone, PartialEq, Eq)]
            pub struct $name(ObjectHandle);

            impl sealed::Sealed for $name {
                fn from_object(object: ObjectHandle) -> Self {
                    debug_assert_eq!(object.kind(), EntityKind::$kind);
                    Self(object)
                }
            }

            impl Entity for $name {
                const KIND: EntityKind = EntityKind::$kind;

                fn object(&self) -> &ObjectHandle {
                    &self.0
                }
            }

            impl Debug for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}({})", stringify!($name), self.0.oid())
                }
            }
        )+
    };
}

entity_handles! {
    /// A person using the application.
    User => User;
    /// A login through which a user records work.
    Account => Account;
    PublicActivity => PublicActivity;
    /// An activity visible only to its owning user.
    PrivateActivity => PrivateActivity;
    PublicTask => PublicTask;
    PrivateTask => PrivateTask;
    Project => Project;
    WorkStream => WorkStream;
    Beneficiary => Beneficiary;
    ActivityType => ActivityType;
    /// A time interval spent on an activity.
    Work => Work;
    Event => Event;
}
