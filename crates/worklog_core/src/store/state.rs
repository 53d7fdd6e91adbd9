//! Mutable store state guarded by the store's reentrant lock.

use crate::error::{PropertyValueError, StoreError, StoreResult};
use crate::model::{EntityKind, Multiplicity, Oid, Property, Role, Value};
use crate::persist::{Backend, LoadedGraph, Mutation};
use crate::store::graph;
use crate::store::notify::{ChangeEvent, ChangeKind, Notifier, StoreId};
use crate::store::table::{ObjectTable, PropertyCell, Slot};
use crate::validate::rules;
use log::debug;

pub(crate) struct StoreState {
    pub(crate) id: StoreId,
    pub(crate) address: String,
    pub(crate) open: bool,
    pub(crate) read_only: bool,
    pub(crate) verify: bool,
    pub(crate) next_oid: u64,
    pub(crate) objects: ObjectTable,
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) journal: Vec<Mutation>,
    pub(crate) notifier: Notifier,
}

impl StoreState {
    pub(crate) fn new(
        address: String,
        backend: Box<dyn Backend>,
        read_only: bool,
        verify: bool,
    ) -> Self {
        Self {
            id: StoreId::generate(),
            address,
            open: true,
            read_only,
            verify,
            next_oid: 1,
            objects: ObjectTable::default(),
            backend,
            journal: Vec::new(),
            notifier: Notifier::default(),
        }
    }

    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::StoreClosed {
                address: self.address.clone(),
            })
        }
    }

    pub(crate) fn ensure_writable(&self) -> StoreResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(StoreError::ReadOnly {
                address: self.address.clone(),
            });
        }
        Ok(())
    }

    /// Error for an OID that is not in the live index.
    pub(crate) fn missing(&self, oid: Oid) -> StoreError {
        if let Some(slot) = self.objects.get(oid) {
            return StoreError::InstanceDead {
                kind: Some(slot.kind),
                oid,
            };
        }
        if oid.get() >= 1 && oid.get() < self.next_oid {
            StoreError::InstanceDead { kind: None, oid }
        } else {
            StoreError::DoesNotExist {
                what: "object",
                key: oid.to_string(),
            }
        }
    }

    pub(crate) fn ensure_live(&self, oid: Oid) -> StoreResult<&Slot> {
        self.objects.live(oid).ok_or_else(|| self.missing(oid))
    }

    pub(crate) fn kind_of(&self, oid: Oid) -> StoreResult<EntityKind> {
        self.ensure_live(oid).map(|slot| slot.kind)
    }

    pub(crate) fn allocate_oid(&mut self) -> StoreResult<Oid> {
        let oid = Oid::new(self.next_oid);
        self.next_oid = self
            .next_oid
            .checked_add(1)
            .ok_or_else(|| StoreError::corrupt(self.address.clone(), "object id space exhausted"))?;
        Ok(oid)
    }

    pub(crate) fn add_reference(&mut self, oid: Oid) {
        if let Some(slot) = self.objects.get_mut(oid) {
            slot.lifecycle.add_reference();
        }
    }

    /// Releases one reference and deallocates the object once dead and unreferenced.
    pub(crate) fn release(&mut self, oid: Oid) {
        let Some(slot) = self.objects.get_mut(oid) else {
            return;
        };
        slot.lifecycle.remove_reference();
        if let Some(slot) = self.objects.collect(oid) {
            debug!(
                "event=object_deallocate module=store status=ok kind={} oid={}",
                slot.kind, slot.oid
            );
        }
    }

    pub(crate) fn record(&mut self, mutation: Mutation) {
        self.journal.push(mutation);
    }

    pub(crate) fn post(&mut self, kind: EntityKind, oid: Oid, change: ChangeKind) {
        self.notifier.post(ChangeEvent {
            store: self.id,
            kind,
            oid,
            change,
        });
    }

    /// Reads a property, fetching it from the backend on first access.
    pub(crate) fn property(&mut self, oid: Oid, property: Property) -> StoreResult<Value> {
        let slot = self.ensure_live(oid)?;
        let kind = slot.kind;
        match slot.properties.get(&property) {
            Some(PropertyCell::Loaded(value)) => return Ok(value.clone()),
            Some(PropertyCell::Unloaded) => {}
            None => {
                return Err(StoreError::corrupt(
                    self.address.clone(),
                    format!("{kind} #{oid} has no property {property}"),
                ))
            }
        }

        let value = self.backend.fetch_property(oid, property)?;
        rules::check_value(kind, property, &value).map_err(|err| {
            StoreError::corrupt(self.address.clone(), format!("{kind} #{oid}: {err}"))
        })?;
        if let Some(slot) = self.objects.live_mut(oid) {
            slot.properties
                .insert(property, PropertyCell::Loaded(value.clone()));
        }
        Ok(value)
    }

    /// Fetches every unloaded property of every live object.
    pub(crate) fn load_all_properties(&mut self) -> StoreResult<()> {
        let pending: Vec<(Oid, Property)> = self
            .objects
            .live_slots()
            .flat_map(|slot| {
                slot.properties
                    .iter()
                    .filter(|(_, cell)| cell.loaded().is_none())
                    .map(move |(property, _)| (slot.oid, *property))
            })
            .collect();
        for (oid, property) in pending {
            self.property(oid, property)?;
        }
        Ok(())
    }

    /// Validates and applies one property write.
    pub(crate) fn set_property(
        &mut self,
        oid: Oid,
        property: Property,
        value: Value,
    ) -> StoreResult<()> {
        self.set_properties(oid, vec![(property, value)])
    }

    /// Validates a group of property writes against the object rules as a
    /// whole, then applies the ones that change anything.
    pub(crate) fn set_properties(
        &mut self,
        oid: Oid,
        changes: Vec<(Property, Value)>,
    ) -> StoreResult<()> {
        let kind = self.kind_of(oid)?;
        for (property, value) in &changes {
            if !kind.has_property(*property) {
                return Err(PropertyValueError::new(
                    kind,
                    property.name(),
                    value.encode(),
                    "property does not apply to this kind",
                )
                .into());
            }
            rules::check_value(kind, *property, value)?;
        }

        let mut candidate = Vec::new();
        for other in kind.properties() {
            let current = match changes.iter().find(|(property, _)| *property == other) {
                Some((_, value)) => value.clone(),
                None => self.property(oid, other)?,
            };
            candidate.push((other, current));
        }
        rules::check_object(kind, &candidate)?;
        if let Some((_, login)) = changes.iter().find(|(property, _)| *property == Property::Login) {
            self.ensure_login_unique(login, Some(oid))?;
        }

        let mut modified = false;
        for (property, value) in changes {
            if self.property(oid, property)? == value {
                continue;
            }
            if let Some(slot) = self.objects.live_mut(oid) {
                slot.properties
                    .insert(property, PropertyCell::Loaded(value.clone()));
            }
            self.record(Mutation::PropertyChanged {
                oid,
                property,
                value,
            });
            modified = true;
        }
        if modified {
            self.post(kind, oid, ChangeKind::Modified);
        }
        Ok(())
    }

    pub(crate) fn ensure_login_unique(&mut self, login: &Value, except: Option<Oid>) -> StoreResult<()> {
        let accounts = self.objects.live_oids_of(EntityKind::Account);
        for account in accounts {
            if Some(account) == except {
                continue;
            }
            if &self.property(account, Property::Login)? == login {
                return Err(StoreError::AlreadyExists {
                    what: "account login",
                    key: login.encode(),
                });
            }
        }
        Ok(())
    }

    /// Hands the journal to the backend and makes it durable.
    pub(crate) fn commit(&mut self) -> StoreResult<()> {
        if self.journal.is_empty() {
            return Ok(());
        }
        let mutations = std::mem::take(&mut self.journal);
        self.backend.apply(&mutations)?;
        self.backend.flush(&self.objects, self.next_oid)
    }

    /// Installs a loaded graph: objects first, then aggregations, then
    /// associations resolved against the populated live index.
    pub(crate) fn install(&mut self, graph: LoadedGraph) -> StoreResult<()> {
        let mut highest = 0;
        for object in graph.objects {
            if self.objects.get(object.oid).is_some() {
                return Err(StoreError::corrupt(
                    self.address.clone(),
                    format!("object id {} is used twice", object.oid),
                ));
            }
            highest = highest.max(object.oid.get());
            let mut slot = Slot::new(object.oid, object.kind);
            if let Some(properties) = object.properties {
                for (property, value) in properties {
                    if !object.kind.has_property(property) {
                        return Err(StoreError::corrupt(
                            self.address.clone(),
                            format!("{} #{} has no property {property}", object.kind, object.oid),
                        ));
                    }
                    slot.properties.insert(property, PropertyCell::Loaded(value));
                }
                if let Some((property, _)) = slot
                    .properties
                    .iter()
                    .find(|(_, cell)| cell.loaded().is_none())
                {
                    return Err(StoreError::corrupt(
                        self.address.clone(),
                        format!("{} #{} lacks property {property}", object.kind, object.oid),
                    ));
                }
            }
            self.objects.insert_live(slot);
        }
        self.next_oid = graph.next_oid.max(highest + 1).max(1);

        for edge in graph.aggregations.into_iter().chain(graph.associations) {
            if !self.objects.is_live(edge.from) || !self.objects.is_live(edge.to) {
                return Err(StoreError::corrupt(
                    self.address.clone(),
                    format!(
                        "edge {} from #{} to #{} names an unknown object",
                        edge.role, edge.from, edge.to
                    ),
                ));
            }
            let descriptor = edge.role.descriptor();
            let occupied = |oid: Oid, role: Role| {
                role.descriptor().multiplicity == Multiplicity::One
                    && self
                        .objects
                        .live(oid)
                        .is_some_and(|slot| slot.first_peer(role).is_some())
            };
            if occupied(edge.from, edge.role) || occupied(edge.to, descriptor.inverse) {
                return Err(StoreError::corrupt(
                    self.address.clone(),
                    format!(
                        "edge {} from #{} to #{} exceeds a single-valued role",
                        edge.role, edge.from, edge.to
                    ),
                ));
            }
            graph::link(self, edge.from, edge.role, edge.to).map_err(|err| {
                StoreError::corrupt(self.address.clone(), format!("cannot install edge: {err}"))
            })?;
        }

        self.journal.clear();
        self.notifier.discard_pending();
        Ok(())
    }
}
