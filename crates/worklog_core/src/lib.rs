//! Embedded object store for the worklog time tracker.
//! Typed live handles over an in-memory graph, persisted as XML or SQLite.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod model;
pub mod persist;
pub mod store;
pub mod validate;

pub use config::{AddressError, StoreAddress, StoreOptions};
pub use entity::{
    Account, ActivityRef, ActivityRules, ActivityType, Beneficiary, Completable, Entity, Event,
    Hierarchical, Named, ObjectHandle, Principal, PrivateActivity, PrivateTask, Project,
    PublicActivity, PublicTask, Retained, User, Work, WorkStream, Workload, WorkloadRef,
};
pub use error::{PropertyValueError, StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{EntityKind, Oid, Property, Role, Value};
pub use persist::FORMAT_VERSION;
pub use store::{
    AccountSpec, ActivitySpec, ChangeEvent, ChangeKind, EventSpec, NamedSpec, ObjectState,
    ObjectStatus, ProjectSpec, Store, StoreId, StoreLock, TaskSpec, UserSpec, WorkSpec,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
