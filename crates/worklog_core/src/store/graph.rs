//! Association and aggregation bookkeeping.
//!
//! # Responsibility
//! - Install and remove edges on both ends at once, keeping reference
//!   counts equal to the number of structural reasons to keep an object.
//! - Destroy objects with their aggregated children.
//!
//! # Invariants
//! - Installing an edge adds one reference on each end; removing it
//!   releases both.
//! - Children are destroyed before their owner becomes dead.
//! - A destroyed object carries no edges.

use crate::error::{PropertyValueError, StoreResult};
use crate::model::{Multiplicity, Oid, Role, Side};
use crate::persist::Mutation;
use crate::store::notify::ChangeKind;
use crate::store::state::StoreState;
use log::debug;

/// Installs `from --role--> to` together with its inverse.
pub(crate) fn link(state: &mut StoreState, from: Oid, role: Role, to: Oid) -> StoreResult<()> {
    let descriptor = role.descriptor();
    let from_kind = state.kind_of(from)?;
    let to_kind = state.kind_of(to)?;

    if !from_kind.has_role(role)
        || !to_kind.has_role(descriptor.inverse)
        || !descriptor.accepts(from_kind, to_kind)
    {
        return Err(PropertyValueError::new(
            from_kind,
            descriptor.name,
            format!("{to_kind} #{to}"),
            "peer kind is not allowed for this relationship",
        )
        .into());
    }
    if from == to {
        return Err(PropertyValueError::new(
            from_kind,
            descriptor.name,
            format!("#{to}"),
            "an object cannot be related to itself",
        )
        .into());
    }
    if state
        .objects
        .live(from)
        .is_some_and(|slot| slot.has_edge(role, to))
    {
        return Ok(());
    }

    if descriptor.multiplicity == Multiplicity::One {
        if let Some(current) = state.objects.live(from).and_then(|slot| slot.first_peer(role)) {
            unlink(state, from, role, current)?;
        }
    }
    let inverse = descriptor.inverse;
    if inverse.descriptor().multiplicity == Multiplicity::One {
        if let Some(current) = state.objects.live(to).and_then(|slot| slot.first_peer(inverse)) {
            unlink(state, to, inverse, current)?;
        }
    }

    if let Some(slot) = state.objects.live_mut(from) {
        slot.insert_edge(role, to);
    }
    if let Some(slot) = state.objects.live_mut(to) {
        slot.insert_edge(inverse, from);
    }
    state.add_reference(to);
    state.add_reference(from);

    state.record(persisted_end(from, role, to, true));
    state.post(from_kind, from, ChangeKind::Modified);
    state.post(to_kind, to, ChangeKind::Modified);
    Ok(())
}

/// Removes `from --role--> to` together with its inverse; absent edges are ignored.
pub(crate) fn unlink(state: &mut StoreState, from: Oid, role: Role, to: Oid) -> StoreResult<()> {
    let removed = state
        .objects
        .get_mut(from)
        .is_some_and(|slot| slot.remove_edge(role, to));
    if !removed {
        return Ok(());
    }
    if let Some(slot) = state.objects.get_mut(to) {
        slot.remove_edge(role.inverse(), from);
    }

    state.record(persisted_end(from, role, to, false));
    for oid in [from, to] {
        if let Some(kind) = state.objects.live(oid).map(|slot| slot.kind) {
            state.post(kind, oid, ChangeKind::Modified);
        }
    }
    state.release(to);
    state.release(from);
    Ok(())
}

fn persisted_end(from: Oid, role: Role, to: Oid, linked: bool) -> Mutation {
    let (from, role, to) = if role.descriptor().is_persisted() {
        (from, role, to)
    } else {
        (to, role.inverse(), from)
    };
    if linked {
        Mutation::Linked { from, role, to }
    } else {
        Mutation::Unlinked { from, role, to }
    }
}

/// Destroys a live object: owned children first, then every remaining
/// edge, then the object itself.
pub(crate) fn destroy(state: &mut StoreState, oid: Oid) -> StoreResult<()> {
    let slot = state.ensure_live(oid)?;
    let kind = slot.kind;
    let children: Vec<Oid> = slot
        .edge_list()
        .into_iter()
        .filter(|(role, _)| role.descriptor().side == Side::Owner)
        .map(|(_, child)| child)
        .collect();

    for child in children {
        if state.objects.is_live(child) {
            destroy(state, child)?;
        }
    }

    let remaining = state
        .objects
        .live(oid)
        .map(|slot| slot.edge_list())
        .unwrap_or_default();
    for (role, peer) in remaining {
        unlink(state, oid, role, peer)?;
    }

    state.record(Mutation::Destroyed { oid });
    state.objects.bury(oid);
    state.post(kind, oid, ChangeKind::Destroyed);

    let still_referenced = state
        .objects
        .get(oid)
        .map(|slot| slot.lifecycle.reference_count())
        .unwrap_or(0);
    debug!(
        "event=object_destroy module=store status=ok kind={kind} oid={oid} references={still_referenced}"
    );
    state.objects.collect(oid);
    Ok(())
}

/// Walks `parent_role` upward from `start`; true when `target` is reached.
pub(crate) fn is_ancestor(state: &StoreState, target: Oid, start: Oid, parent_role: Role) -> bool {
    let mut current = Some(start);
    let mut steps = 0usize;
    while let Some(oid) = current {
        if oid == target {
            return true;
        }
        steps += 1;
        if steps > state.objects.live_len() {
            // Already cyclic; the validator reports it.
            return true;
        }
        current = state
            .objects
            .live(oid)
            .and_then(|slot| slot.first_peer(parent_role));
    }
    false
}
