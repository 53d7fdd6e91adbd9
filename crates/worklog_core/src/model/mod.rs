//! Static schema of the object store.
//!
//! # Responsibility
//! - Name entity kinds, their properties and their relationship roles.
//! - Decide relationship semantics at compile time through descriptor
//!   tables instead of runtime type inspection.
//!
//! # Invariants
//! - Descriptor tables are declared in enum order and indexed by discriminant.

pub mod kind;
pub mod oid;
pub mod property;
pub mod role;

pub use kind::{Capability, EntityKind, KindDescriptor};
pub use oid::Oid;
pub use property::{Property, Value, ValueType};
pub use role::{EdgeKind, Multiplicity, PeerKinds, Persistence, Role, RoleDescriptor, Side};
