//! XML document codec for the object graph.
//!
//! # Responsibility
//! - Render the live graph as one element per object: properties and
//!   reference roles as attributes, owned objects as nested children.
//! - Read a document back into a `LoadedGraph` without resolving any edge.
//!
//! # Invariants
//! - The format version is checked before any entity element is parsed.
//! - Only persisted role ends appear in the document.
//! - Anything the codec does not recognise is corruption, never skipped.

use crate::error::{StoreError, StoreResult};
use crate::model::{EntityKind, Multiplicity, Oid, Persistence, Property, Role, Side, Value};
use crate::persist::xml::Element;
use crate::persist::{LoadedEdge, LoadedGraph, LoadedObject, FORMAT_VERSION};
use crate::store::table::{ObjectTable, Slot};

const ROOT: &str = "worklog";
const FORMAT_VERSION_ATTR: &str = "format-version";
const NEXT_OID_ATTR: &str = "next-oid";
const OID_ATTR: &str = "oid";

/// Builds the document tree for every live object.
pub(crate) fn write_document(
    address: &str,
    objects: &ObjectTable,
    next_oid: u64,
) -> StoreResult<Element> {
    let mut root = Element::new(ROOT);
    root.push_attribute(FORMAT_VERSION_ATTR, FORMAT_VERSION.to_string());
    root.push_attribute(NEXT_OID_ATTR, next_oid.to_string());

    for slot in objects.live_slots() {
        let owned = slot
            .edges
            .keys()
            .any(|role| role.descriptor().side == Side::Owned);
        if !owned {
            root.children.push(object_element(address, objects, slot)?);
        }
    }
    Ok(root)
}

fn object_element(address: &str, objects: &ObjectTable, slot: &Slot) -> StoreResult<Element> {
    let mut element = Element::new(slot.kind.tag());
    element.push_attribute(OID_ATTR, slot.oid.to_string());

    for property in slot.kind.properties() {
        let value = slot.property(property).ok_or_else(|| {
            StoreError::corrupt(
                address,
                format!("{} #{} property {property} is not loaded", slot.kind, slot.oid),
            )
        })?;
        element.push_attribute(property.name(), value.encode());
    }

    for role in slot.kind.roles() {
        if role.descriptor().persistence != Persistence::Reference {
            continue;
        }
        let peers: Vec<String> = slot.peers(*role).map(|peer| peer.to_string()).collect();
        if !peers.is_empty() {
            element.push_attribute(role.name(), peers.join(","));
        }
    }

    for role in slot.kind.roles() {
        if role.descriptor().persistence != Persistence::Nested {
            continue;
        }
        for child in slot.peers(*role) {
            let child_slot = objects.live(child).ok_or_else(|| {
                StoreError::corrupt(
                    address,
                    format!("{} #{} owns missing #{child}", slot.kind, slot.oid),
                )
            })?;
            element
                .children
                .push(object_element(address, objects, child_slot)?);
        }
    }
    Ok(element)
}

/// Parses a document, rejecting foreign format versions up front.
pub(crate) fn read_document(address: &str, text: &str) -> StoreResult<LoadedGraph> {
    let corrupt = |reason: String| StoreError::corrupt(address, reason);

    let header = Element::parse_root(text).map_err(|err| corrupt(err.to_string()))?;
    if header.name != ROOT {
        return Err(corrupt(format!("root element is `{}`, expected `{ROOT}`", header.name)));
    }
    let version = header.attribute(FORMAT_VERSION_ATTR).unwrap_or("none");
    if version.parse::<u32>().ok() != Some(FORMAT_VERSION) {
        return Err(StoreError::UnsupportedFormatVersion {
            address: address.to_string(),
            found: version.to_string(),
            expected: FORMAT_VERSION,
        });
    }

    let root = Element::parse(text).map_err(|err| corrupt(err.to_string()))?;
    let next_oid = root
        .attribute(NEXT_OID_ATTR)
        .and_then(|value| value.parse::<u64>().ok())
        .ok_or_else(|| corrupt(format!("root element lacks a valid `{NEXT_OID_ATTR}`")))?;

    let mut graph = LoadedGraph {
        next_oid,
        ..LoadedGraph::default()
    };
    for child in &root.children {
        read_object(address, child, None, &mut graph)?;
    }
    Ok(graph)
}

fn read_object(
    address: &str,
    element: &Element,
    owner: Option<(Oid, EntityKind)>,
    graph: &mut LoadedGraph,
) -> StoreResult<()> {
    let corrupt = |reason: String| StoreError::corrupt(address, reason);

    let kind = EntityKind::from_tag(&element.name)
        .ok_or_else(|| corrupt(format!("unknown element `{}`", element.name)))?;
    let oid: Oid = element
        .attribute(OID_ATTR)
        .and_then(|value| value.parse().ok())
        .filter(|oid: &Oid| oid.get() > 0)
        .ok_or_else(|| corrupt(format!("`{kind}` element lacks a valid oid")))?;

    let mut properties = Vec::new();
    for property in kind.properties() {
        let text = element
            .attribute(property.name())
            .ok_or_else(|| corrupt(format!("{kind} #{oid} lacks `{property}`")))?;
        let value = Value::decode(property.value_type(), text)
            .map_err(|reason| corrupt(format!("{kind} #{oid} `{property}`: {reason}")))?;
        properties.push((property, value));
    }

    for (name, value) in &element.attributes {
        if name == OID_ATTR || Property::from_name(name).is_some_and(|p| kind.has_property(p)) {
            continue;
        }
        let role = Role::from_name(name)
            .filter(|role| {
                kind.has_role(*role) && role.descriptor().persistence == Persistence::Reference
            })
            .ok_or_else(|| corrupt(format!("{kind} #{oid} has unknown attribute `{name}`")))?;
        let peers = parse_oid_list(value)
            .ok_or_else(|| corrupt(format!("{kind} #{oid} `{name}` is not an oid list")))?;
        if role.descriptor().multiplicity == Multiplicity::One && peers.len() > 1 {
            return Err(corrupt(format!("{kind} #{oid} `{name}` names several objects")));
        }
        for peer in peers {
            graph.associations.push(LoadedEdge {
                from: oid,
                role,
                to: peer,
            });
        }
    }

    if let Some((owner_oid, owner_kind)) = owner {
        let role = owner_kind
            .roles()
            .iter()
            .copied()
            .find(|role| {
                let descriptor = role.descriptor();
                descriptor.persistence == Persistence::Nested
                    && descriptor.accepts(owner_kind, kind)
                    && kind.has_role(descriptor.inverse)
            })
            .ok_or_else(|| corrupt(format!("{kind} #{oid} cannot be nested in {owner_kind}")))?;
        graph.aggregations.push(LoadedEdge {
            from: owner_oid,
            role,
            to: oid,
        });
    }

    graph.objects.push(LoadedObject {
        oid,
        kind,
        properties: Some(properties),
    });
    for child in &element.children {
        read_object(address, child, Some((oid, kind)), graph)?;
    }
    Ok(())
}

fn parse_oid_list(value: &str) -> Option<Vec<Oid>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<Oid>().ok())
        .collect()
}
