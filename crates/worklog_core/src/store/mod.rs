//! Embedded object store.
//!
//! # Responsibility
//! - Own the live index, the graveyard, the OID allocator and the backend
//!   of one store behind a single reentrant guard.
//! - Open stores from an address, load them in two phases and validate them.
//! - Hand out typed handles; every handle keeps the store state alive.
//!
//! # Invariants
//! - Every public operation holds the guard for its whole duration.
//! - Mutations are handed to the backend before the operation returns.
//! - Change events are dispatched after the mutation's bookkeeping is done.
//!
//! # See also
//! - `store::graph` for edge maintenance and cascading destruction.

pub(crate) mod factory;
pub(crate) mod graph;
pub mod lifecycle;
pub mod notify;
pub(crate) mod state;
pub(crate) mod table;

pub use factory::{
    AccountSpec, ActivitySpec, EventSpec, NamedSpec, ProjectSpec, TaskSpec, UserSpec, WorkSpec,
};
pub use lifecycle::ObjectState;
pub use notify::{ChangeEvent, ChangeKind, StoreId};

use crate::config::{StoreAddress, StoreOptions};
use crate::db::sqlite_backend::SqliteBackend;
use crate::entity::sealed::Sealed;
use crate::entity::{
    Account, ActivityType, Beneficiary, Entity, ObjectHandle, Project, PublicActivity,
    PublicTask, User, WorkStream,
};
use crate::error::{StoreError, StoreResult};
use crate::model::{EntityKind, Oid, Property, Value};
use crate::persist::document;
use crate::persist::file::{write_atomically, FileBackend};
use crate::persist::{Backend, MemoryBackend};
use crate::validate::integrity;
use crossbeam_channel::Receiver;
use log::{error, info};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use state::StoreState;
use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

const MEMORY_ADDRESS: &str = "memory:";

/// Diagnostic snapshot of one object's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStatus {
    pub state: ObjectState,
    pub reference_count: u32,
    pub is_live: bool,
}

struct StoreShared {
    id: StoreId,
    address: String,
    guard: ReentrantMutex<RefCell<StoreState>>,
}

/// Shared handle to one open store.
///
/// Clones refer to the same store. The state outlives `close()` for as long
/// as any clone or entity handle exists, so late reference releases stay safe.
#[derive(Clone)]
pub struct Store {
    shared: Arc<StoreShared>,
}

/// Holds the store guard across a caller-defined sequence of operations.
///
/// Store calls made on the holding thread re-enter the guard; other threads
/// block until it is dropped.
pub struct StoreLock<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<StoreState>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.shared.id)
            .field("address", &self.shared.address)
            .finish()
    }
}

impl Store {
    /// Opens the store at `address`, loading and validating its contents.
    ///
    /// # Errors
    /// - `StoreLocked` when another process holds a file store.
    /// - `UnsupportedFormatVersion` / `Corrupt` when the persisted graph is unreadable.
    /// - `Io` / `Custom` for file-system and driver failures.
    pub fn open(address: &StoreAddress, options: &StoreOptions) -> StoreResult<Self> {
        let backend: Box<dyn Backend> = match address {
            StoreAddress::File(path) => Box::new(FileBackend::open(path, options)?),
            StoreAddress::Sqlite(path) => Box::new(SqliteBackend::open(path, options)?),
            StoreAddress::SqliteInMemory => Box::new(SqliteBackend::open_in_memory()?),
        };
        let store = Self::with_backend(address.to_string(), backend, options)?;
        info!(
            "event=store_open module=store status=ok address={} read_only={} objects={}",
            store.shared.address,
            options.read_only,
            store.live_count()
        );
        Ok(store)
    }

    /// Creates a transient store that persists nothing.
    pub fn create_in_memory() -> Self {
        let state = StoreState::new(
            MEMORY_ADDRESS.to_string(),
            Box::new(MemoryBackend),
            false,
            cfg!(debug_assertions),
        );
        Self::from_state(state)
    }

    fn with_backend(
        address: String,
        backend: Box<dyn Backend>,
        options: &StoreOptions,
    ) -> StoreResult<Self> {
        let mut state = StoreState::new(
            address.clone(),
            backend,
            options.read_only,
            options.verify_after_mutation,
        );
        let graph = state.backend.load()?;
        let loaded = graph.objects.len();
        if let Err(err) = state.install(graph).and_then(|_| integrity::verify_store(&state)) {
            error!(
                "event=store_load module=store status=error address={address} code={}",
                err.code()
            );
            return Err(err);
        }
        info!("event=store_load module=store status=ok address={address} objects={loaded}");
        Ok(Self::from_state(state))
    }

    fn from_state(state: StoreState) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                id: state.id,
                address: state.address.clone(),
                guard: ReentrantMutex::new(RefCell::new(state)),
            }),
        }
    }

    pub fn id(&self) -> StoreId {
        self.shared.id
    }

    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Acquires the store guard until the returned value is dropped.
    pub fn lock(&self) -> StoreLock<'_> {
        StoreLock {
            _guard: self.shared.guard.lock(),
        }
    }

    /// Runs a read-only operation under the guard.
    pub(crate) fn read<R>(
        &self,
        operation: impl FnOnce(&mut StoreState) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let guard = self.shared.guard.lock();
        let mut state = guard.borrow_mut();
        state.ensure_open()?;
        operation(&mut state)
    }

    /// Runs a mutation under the guard, then commits, notifies and verifies.
    ///
    /// Steps completed before a failure stay applied and are committed.
    pub(crate) fn write<R>(
        &self,
        operation: impl FnOnce(&mut StoreState) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let guard = self.shared.guard.lock();
        let mut state = guard.borrow_mut();
        state.ensure_writable()?;

        let outcome = operation(&mut state);
        let committed = state.commit();
        state.notifier.dispatch();
        if let Err(err) = &committed {
            error!(
                "event=store_commit module=store status=error address={} code={}",
                state.address,
                err.code()
            );
        }
        let value = outcome?;
        committed?;
        if state.verify {
            integrity::verify_store(&state)?;
        }
        Ok(value)
    }

    /// Runs under the guard without requiring the store to be open.
    pub(crate) fn with_state<R>(&self, operation: impl FnOnce(&mut StoreState) -> R) -> R {
        let guard = self.shared.guard.lock();
        let mut state = guard.borrow_mut();
        operation(&mut state)
    }

    /// Flushes and closes the store. Later operations fail with `StoreClosed`.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> StoreResult<()> {
        self.with_state(|state| {
            if !state.open {
                return Ok(());
            }
            state.open = false;
            let committed = state.commit();
            let flushed = if state.read_only {
                Ok(())
            } else {
                let next_oid = state.next_oid;
                state.backend.flush(&state.objects, next_oid)
            };
            let closed = state.backend.close();
            state.notifier.dispatch();
            let result = committed.and(flushed).and(closed);
            match &result {
                Ok(()) => info!(
                    "event=store_close module=store status=ok address={}",
                    state.address
                ),
                Err(err) => error!(
                    "event=store_close module=store status=error address={} code={}",
                    state.address,
                    err.code()
                ),
            }
            result
        })
    }

    pub fn is_open(&self) -> bool {
        self.with_state(|state| state.open)
    }

    pub fn is_read_only(&self) -> bool {
        self.with_state(|state| state.read_only)
    }

    /// Subscribes to change events of this store.
    pub fn subscribe(&self) -> StoreResult<Receiver<ChangeEvent>> {
        self.read(|state| Ok(state.notifier.subscribe()))
    }

    /// Runs the integrity walk on demand.
    pub fn validate(&self) -> StoreResult<()> {
        self.read(|state| {
            let result = integrity::verify_store(state);
            match &result {
                Ok(()) => info!(
                    "event=validate module=validate status=ok address={} objects={}",
                    state.address,
                    state.objects.live_len()
                ),
                Err(err) => error!(
                    "event=validate module=validate status=error address={} code={}",
                    state.address,
                    err.code()
                ),
            }
            result
        })
    }

    pub fn live_count(&self) -> usize {
        self.with_state(|state| state.objects.live_len())
    }

    pub fn graveyard_count(&self) -> usize {
        self.with_state(|state| state.objects.graveyard_len())
    }

    /// OID the next created object will receive.
    pub fn next_oid(&self) -> Oid {
        self.with_state(|state| Oid::new(state.next_oid))
    }

    /// Number of live objects per kind, in kind order; absent kinds are skipped.
    pub fn count_by_kind(&self) -> Vec<(EntityKind, usize)> {
        self.with_state(|state| {
            EntityKind::ALL
                .iter()
                .map(|kind| (*kind, state.objects.live_oids_of(*kind).len()))
                .filter(|(_, count)| *count > 0)
                .collect()
        })
    }

    /// Lifecycle snapshot of an object in either index; `None` once deallocated.
    pub fn inspect(&self, oid: Oid) -> Option<ObjectStatus> {
        self.with_state(|state| {
            state.objects.get(oid).map(|slot| ObjectStatus {
                state: slot.lifecycle.state(),
                reference_count: slot.lifecycle.reference_count(),
                is_live: slot.lifecycle.is_live(),
            })
        })
    }

    /// Looks up any live object.
    ///
    /// # Errors
    /// - `InstanceDead` for an OID that was allocated and destroyed.
    /// - `DoesNotExist` for an OID that was never allocated.
    pub fn find_by_oid(&self, oid: Oid) -> StoreResult<ObjectHandle> {
        let kind = self.read(|state| state.kind_of(oid))?;
        Ok(ObjectHandle::new(self.clone(), oid, kind))
    }

    /// Looks up a live object of a known kind.
    pub fn find<T: Entity>(&self, oid: Oid) -> StoreResult<T> {
        self.find_by_oid(oid)?
            .downcast::<T>()
            .ok_or_else(|| StoreError::DoesNotExist {
                what: T::KIND.tag(),
                key: oid.to_string(),
            })
    }

    fn all_of<T: Entity>(&self) -> StoreResult<Vec<T>> {
        let oids = self.read(|state| Ok(state.objects.live_oids_of(T::KIND)))?;
        Ok(oids
            .into_iter()
            .map(|oid| T::from_object(ObjectHandle::new(self.clone(), oid, T::KIND)))
            .collect())
    }

    pub fn users(&self) -> StoreResult<Vec<User>> {
        self.all_of()
    }

    pub fn accounts(&self) -> StoreResult<Vec<Account>> {
        self.all_of()
    }

    pub fn public_activities(&self) -> StoreResult<Vec<PublicActivity>> {
        self.all_of()
    }

    /// Every public task, nested ones included.
    pub fn public_tasks(&self) -> StoreResult<Vec<PublicTask>> {
        self.all_of()
    }

    /// Every project, nested ones included.
    pub fn projects(&self) -> StoreResult<Vec<Project>> {
        self.all_of()
    }

    pub fn work_streams(&self) -> StoreResult<Vec<WorkStream>> {
        self.all_of()
    }

    pub fn beneficiaries(&self) -> StoreResult<Vec<Beneficiary>> {
        self.all_of()
    }

    pub fn activity_types(&self) -> StoreResult<Vec<ActivityType>> {
        self.all_of()
    }

    /// Finds the account with `login`, or `None`.
    pub fn find_account_by_login(&self, login: &str) -> StoreResult<Option<Account>> {
        let wanted = Value::from(login);
        let found = self.read(|state| {
            for oid in state.objects.live_oids_of(EntityKind::Account) {
                if state.property(oid, Property::Login)? == wanted {
                    return Ok(Some(oid));
                }
            }
            Ok(None)
        })?;
        Ok(found.map(|oid| {
            Account::from_object(ObjectHandle::new(self.clone(), oid, EntityKind::Account))
        }))
    }

    /// Writes the whole graph as an XML document at `path`.
    ///
    /// Lazily cached properties are fetched first, so this also converts a
    /// relational store into a file store.
    pub fn export_to_file(&self, path: &Path) -> StoreResult<()> {
        let text = self.read(|state| {
            state.load_all_properties()?;
            let root = document::write_document(&state.address, &state.objects, state.next_oid)?;
            root.to_xml_string()
                .map_err(|err| StoreError::corrupt(state.address.clone(), err.to_string()))
        })?;
        write_atomically(path, &text)?;
        info!(
            "event=store_export module=store status=ok address={} target={}",
            self.shared.address,
            path.display()
        );
        Ok(())
    }

    /// Destroys a live object and its aggregated children.
    pub(crate) fn destroy_object(&self, oid: Oid) -> StoreResult<()> {
        self.write(|state| graph::destroy(state, oid))
    }

    /// Adds an external reference to a live object.
    pub(crate) fn add_reference(&self, oid: Oid) -> StoreResult<()> {
        self.with_state(|state| {
            state.ensure_live(oid)?;
            state.add_reference(oid);
            Ok(())
        })
    }

    /// Releases an external reference; valid after destroy and after close.
    pub(crate) fn release_reference(&self, oid: Oid) {
        self.with_state(|state| state.release(oid));
    }

    pub(crate) fn ensure_same_store(&self, object: &ObjectHandle) -> StoreResult<()> {
        if object.store().id() == self.id() {
            Ok(())
        } else {
            Err(StoreError::ForeignObject { oid: object.oid() })
        }
    }
}
