//! Store-wide integrity walk.
//!
//! # Invariants
//! - The walk only reads; unloaded property cells are skipped rather than
//!   fetched.
//! - The first violation found is reported as `Corrupt`.

use crate::error::{StoreError, StoreResult};
use crate::model::{Multiplicity, Oid, Role, Side};
use crate::store::state::StoreState;
use crate::store::table::Slot;
use crate::validate::rules;
use log::{debug, error};

/// Walks the live index and the graveyard.
pub(crate) fn verify_store(state: &StoreState) -> StoreResult<()> {
    let result = walk(state);
    match &result {
        Ok(()) => debug!(
            "event=validate module=validate status=ok address={} live={} graveyard={}",
            state.address,
            state.objects.live_len(),
            state.objects.graveyard_len()
        ),
        Err(err) => error!(
            "event=validate module=validate status=error address={} code={}",
            state.address,
            err.code()
        ),
    }
    result
}

fn walk(state: &StoreState) -> StoreResult<()> {
    let fail = |reason: String| -> StoreResult<()> {
        Err(StoreError::corrupt(state.address.clone(), reason))
    };

    for slot in state.objects.live_slots() {
        if let Err(reason) = check_slot(state, slot) {
            return fail(reason);
        }
    }
    for slot in state.objects.graveyard_slots() {
        if slot.lifecycle.is_live() {
            return fail(format!("{} #{} is in the graveyard but live", slot.kind, slot.oid));
        }
        if slot.edge_count() > 0 {
            return fail(format!("dead {} #{} still has edges", slot.kind, slot.oid));
        }
        if slot.lifecycle.reference_count() == 0 {
            return fail(format!("dead {} #{} is unreferenced but not collected", slot.kind, slot.oid));
        }
    }
    Ok(())
}

fn check_slot(state: &StoreState, slot: &Slot) -> Result<(), String> {
    let (kind, oid) = (slot.kind, slot.oid);
    if !slot.lifecycle.is_live() {
        return Err(format!("{kind} #{oid} is in the live index but dead"));
    }
    if !slot.lifecycle.is_consistent() {
        return Err(format!(
            "{kind} #{oid} has state {:?} with {} references",
            slot.lifecycle.state(),
            slot.lifecycle.reference_count()
        ));
    }
    if oid.get() == 0 || oid.get() >= state.next_oid {
        return Err(format!("{kind} #{oid} is outside the allocated range"));
    }

    for (property, cell) in &slot.properties {
        if let Some(value) = cell.loaded() {
            rules::check_value(kind, *property, value).map_err(|err| err.to_string())?;
        }
    }
    let loaded: Option<Vec<_>> = slot
        .properties
        .iter()
        .map(|(property, cell)| cell.loaded().map(|value| (*property, value.clone())))
        .collect();
    if let Some(properties) = loaded {
        rules::check_object(kind, &properties).map_err(|err| err.to_string())?;
    }

    let mut owners = 0;
    for (role, peers) in &slot.edges {
        let descriptor = role.descriptor();
        if !kind.has_role(*role) {
            return Err(format!("{kind} #{oid} carries foreign role {role}"));
        }
        if descriptor.multiplicity == Multiplicity::One && peers.len() > 1 {
            return Err(format!("{kind} #{oid} has {} peers for {role}", peers.len()));
        }
        if descriptor.side == Side::Owned {
            owners += peers.len();
        }
        for peer in peers {
            check_edge(state, oid, *role, *peer)?;
        }
    }
    if owners > 1 {
        return Err(format!("{kind} #{oid} has {owners} owners"));
    }

    for group in kind.descriptor().required {
        let present: usize = group.iter().map(|role| slot.peers(*role).count()).sum();
        if present != 1 {
            let names: Vec<&str> = group.iter().map(|role| role.name()).collect();
            return Err(format!(
                "{kind} #{oid} needs exactly one of [{}], found {present}",
                names.join(", ")
            ));
        }
    }

    let edges = slot.edge_count();
    if (slot.lifecycle.reference_count() as usize) < edges {
        return Err(format!(
            "{kind} #{oid} has {} references for {edges} edges",
            slot.lifecycle.reference_count()
        ));
    }

    for parent_role in [Role::TaskParent, Role::ProjectParent] {
        if kind.has_role(parent_role) && has_parent_cycle(state, oid, parent_role) {
            return Err(format!("{kind} #{oid} is its own ancestor"));
        }
    }
    Ok(())
}

fn check_edge(state: &StoreState, oid: Oid, role: Role, peer: Oid) -> Result<(), String> {
    let Some(peer_slot) = state.objects.live(peer) else {
        return Err(format!("#{oid} {role} points at missing or dead #{peer}"));
    };
    let carrier = state
        .objects
        .live(oid)
        .map(|slot| slot.kind)
        .ok_or_else(|| format!("#{oid} vanished during the walk"))?;
    if !role.descriptor().accepts(carrier, peer_slot.kind) {
        return Err(format!(
            "#{oid} {role} points at {} #{peer}, which the role does not accept",
            peer_slot.kind
        ));
    }
    if !peer_slot.has_edge(role.inverse(), oid) {
        return Err(format!(
            "#{oid} {role} #{peer} lacks the inverse {}",
            role.inverse()
        ));
    }
    Ok(())
}

fn has_parent_cycle(state: &StoreState, start: Oid, parent_role: Role) -> bool {
    let mut current = state
        .objects
        .live(start)
        .and_then(|slot| slot.first_peer(parent_role));
    let mut steps = 0;
    while let Some(oid) = current {
        if oid == start || steps > state.objects.live_len() {
            return true;
        }
        steps += 1;
        current = state
            .objects
            .live(oid)
            .and_then(|slot| slot.first_peer(parent_role));
    }
    false
}
