//! Persistence backends and the tree-structured document format.
//!
//! # Responsibility
//! - Define the contract every backend fulfils for the store.
//! - Host the XML element tree, the document codec and the file backend.
//!
//! # Invariants
//! - Backends never mutate the in-memory graph; they only load it and
//!   record mutations the store has already applied.
//! - Only the persisted end of an edge is ever recorded.

pub(crate) mod document;
pub(crate) mod file;
pub(crate) mod xml;

use crate::error::StoreResult;
use crate::model::{EntityKind, Oid, Property, Role, Value};
use crate::store::table::ObjectTable;

/// Current version of the persisted formats.
pub const FORMAT_VERSION: u32 = 1;

/// One applied mutation, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mutation {
    Created {
        oid: Oid,
        kind: EntityKind,
        properties: Vec<(Property, Value)>,
    },
    PropertyChanged {
        oid: Oid,
        property: Property,
        value: Value,
    },
    Linked {
        from: Oid,
        role: Role,
        to: Oid,
    },
    Unlinked {
        from: Oid,
        role: Role,
        to: Oid,
    },
    Destroyed {
        oid: Oid,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadedObject {
    pub(crate) oid: Oid,
    pub(crate) kind: EntityKind,
    /// `None` leaves every property cell unloaded for lazy fetching.
    pub(crate) properties: Option<Vec<(Property, Value)>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadedEdge {
    pub(crate) from: Oid,
    pub(crate) role: Role,
    pub(crate) to: Oid,
}

/// Object graph as read from a backend, before installation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LoadedGraph {
    pub(crate) next_oid: u64,
    pub(crate) objects: Vec<LoadedObject>,
    /// Owner-side aggregation edges.
    pub(crate) aggregations: Vec<LoadedEdge>,
    /// Persisted-side association edges.
    pub(crate) associations: Vec<LoadedEdge>,
}

/// Storage behind one store.
pub(crate) trait Backend: Send {
    /// Reads the persisted graph.
    fn load(&mut self) -> StoreResult<LoadedGraph>;

    /// Reads one property that was left unloaded.
    fn fetch_property(&mut self, oid: Oid, property: Property) -> StoreResult<Value>;

    /// Records mutations already applied in memory.
    fn apply(&mut self, mutations: &[Mutation]) -> StoreResult<()>;

    /// Makes recorded mutations durable.
    fn flush(&mut self, objects: &ObjectTable, next_oid: u64) -> StoreResult<()>;

    /// Releases backend resources; later calls are not expected.
    fn close(&mut self) -> StoreResult<()>;
}

/// Backend of transient stores: nothing is loaded and nothing is kept.
#[derive(Debug, Default)]
pub(crate) struct MemoryBackend;

impl Backend for MemoryBackend {
    fn load(&mut self) -> StoreResult<LoadedGraph> {
        Ok(LoadedGraph {
            next_oid: 1,
            ..LoadedGraph::default()
        })
    }

    fn fetch_property(&mut self, oid: Oid, property: Property) -> StoreResult<Value> {
        Err(crate::error::StoreError::corrupt(
            "memory",
            format!("property {property} of #{oid} was never loaded"),
        ))
    }

    fn apply(&mut self, _mutations: &[Mutation]) -> StoreResult<()> {
        Ok(())
    }

    fn flush(&mut self, _objects: &ObjectTable, _next_oid: u64) -> StoreResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
