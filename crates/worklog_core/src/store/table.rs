//! Live index and graveyard.
//!
//! # Invariants
//! - A slot sits in `live` while its lifecycle is live, in `graveyard` once
//!   dead but still referenced, and nowhere once collected.
//! - An OID is never present in both maps.

use crate::model::{EntityKind, Oid, Property, Role, Value};
use crate::store::lifecycle::Lifecycle;
use std::collections::{BTreeMap, BTreeSet};

/// Cached property cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PropertyCell {
    Loaded(Value),
    /// Not fetched from the backend yet.
    Unloaded,
}

impl PropertyCell {
    pub(crate) fn loaded(&self) -> Option<&Value> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::Unloaded => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) oid: Oid,
    pub(crate) kind: EntityKind,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) properties: BTreeMap<Property, PropertyCell>,
    pub(crate) edges: BTreeMap<Role, BTreeSet<Oid>>,
}

impl Slot {
    pub(crate) fn new(oid: Oid, kind: EntityKind) -> Self {
        Self {
            oid,
            kind,
            lifecycle: Lifecycle::new(),
            properties: kind
                .properties()
                .map(|property| (property, PropertyCell::Unloaded))
                .collect(),
            edges: BTreeMap::new(),
        }
    }

    pub(crate) fn peers(&self, role: Role) -> impl Iterator<Item = Oid> + '_ {
        self.edges.get(&role).into_iter().flatten().copied()
    }

    pub(crate) fn first_peer(&self, role: Role) -> Option<Oid> {
        self.peers(role).next()
    }

    pub(crate) fn has_edge(&self, role: Role, peer: Oid) -> bool {
        self.edges.get(&role).is_some_and(|peers| peers.contains(&peer))
    }

    /// Every `(role, peer)` pair, in role order.
    pub(crate) fn edge_list(&self) -> Vec<(Role, Oid)> {
        self.edges
            .iter()
            .flat_map(|(role, peers)| peers.iter().map(move |peer| (*role, *peer)))
            .collect()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub(crate) fn insert_edge(&mut self, role: Role, peer: Oid) -> bool {
        self.edges.entry(role).or_default().insert(peer)
    }

    pub(crate) fn remove_edge(&mut self, role: Role, peer: Oid) -> bool {
        let Some(peers) = self.edges.get_mut(&role) else {
            return false;
        };
        let removed = peers.remove(&peer);
        if peers.is_empty() {
            self.edges.remove(&role);
        }
        removed
    }

    pub(crate) fn property(&self, property: Property) -> Option<&Value> {
        self.properties.get(&property).and_then(PropertyCell::loaded)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ObjectTable {
    live: BTreeMap<Oid, Slot>,
    graveyard: BTreeMap<Oid, Slot>,
}

impl ObjectTable {
    pub(crate) fn insert_live(&mut self, slot: Slot) {
        debug_assert!(!self.graveyard.contains_key(&slot.oid));
        self.live.insert(slot.oid, slot);
    }

    /// Looks up a slot in either index.
    pub(crate) fn get(&self, oid: Oid) -> Option<&Slot> {
        self.live.get(&oid).or_else(|| self.graveyard.get(&oid))
    }

    pub(crate) fn get_mut(&mut self, oid: Oid) -> Option<&mut Slot> {
        match self.live.get_mut(&oid) {
            Some(slot) => Some(slot),
            None => self.graveyard.get_mut(&oid),
        }
    }

    pub(crate) fn live(&self, oid: Oid) -> Option<&Slot> {
        self.live.get(&oid)
    }

    pub(crate) fn live_mut(&mut self, oid: Oid) -> Option<&mut Slot> {
        self.live.get_mut(&oid)
    }

    pub(crate) fn is_live(&self, oid: Oid) -> bool {
        self.live.contains_key(&oid)
    }

    pub(crate) fn in_graveyard(&self, oid: Oid) -> bool {
        self.graveyard.contains_key(&oid)
    }

    /// Moves a live slot to the graveyard and marks it dead.
    pub(crate) fn bury(&mut self, oid: Oid) -> bool {
        let Some(mut slot) = self.live.remove(&oid) else {
            return false;
        };
        slot.lifecycle.mark_dead();
        self.graveyard.insert(oid, slot);
        true
    }

    /// Drops a graveyard slot once it is collectable.
    pub(crate) fn collect(&mut self, oid: Oid) -> Option<Slot> {
        let collectable = self
            .graveyard
            .get(&oid)
            .is_some_and(|slot| slot.lifecycle.is_collectable());
        if collectable {
            self.graveyard.remove(&oid)
        } else {
            None
        }
    }

    pub(crate) fn live_slots(&self) -> impl Iterator<Item = &Slot> {
        self.live.values()
    }

    pub(crate) fn live_slots_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.live.values_mut()
    }

    pub(crate) fn graveyard_slots(&self) -> impl Iterator<Item = &Slot> {
        self.graveyard.values()
    }

    pub(crate) fn live_len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn graveyard_len(&self) -> usize {
        self.graveyard.len()
    }

    pub(crate) fn live_oids_of(&self, kind: EntityKind) -> Vec<Oid> {
        self.live
            .values()
            .filter(|slot| slot.kind == kind)
            .map(|slot| slot.oid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectTable, Slot};
    use crate::model::{EntityKind, Oid, Role};

    #[test]
    fn bury_moves_between_indices_and_collect_requires_zero_references() {
        let mut table = ObjectTable::default();
        let oid = Oid::new(7);
        table.insert_live(Slot::new(oid, EntityKind::Beneficiary));
        table.get_mut(oid).unwrap().lifecycle.add_reference();

        assert!(table.bury(oid));
        assert!(!table.is_live(oid));
        assert!(table.in_graveyard(oid));
        assert!(table.collect(oid).is_none());

        table.get_mut(oid).unwrap().lifecycle.remove_reference();
        assert!(table.collect(oid).is_some());
        assert!(table.get(oid).is_none());
        assert_eq!(table.graveyard_len(), 0);
    }

    #[test]
    fn removing_last_peer_drops_role_entry() {
        let mut slot = Slot::new(Oid::new(1), EntityKind::User);
        assert!(slot.insert_edge(Role::UserAccounts, Oid::new(2)));
        assert!(!slot.insert_edge(Role::UserAccounts, Oid::new(2)));
        assert_eq!(slot.edge_count(), 1);
        assert!(slot.remove_edge(Role::UserAccounts, Oid::new(2)));
        assert!(slot.edges.is_empty());
    }

    #[test]
    fn new_slot_starts_with_unloaded_cells_for_every_property() {
        let slot = Slot::new(Oid::new(1), EntityKind::Work);
        assert_eq!(slot.properties.len(), EntityKind::Work.properties().count());
        assert!(slot.properties.values().all(|cell| cell.loaded().is_none()));
    }
}
