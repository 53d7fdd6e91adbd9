//! Relationship roles and their compile-time edge descriptors.
//!
//! # Responsibility
//! - Describe every relationship end: its inverse, whether it owns, is owned
//!   or merely references, its multiplicity and its persisted form.
//!
//! # Invariants
//! - `r.descriptor().inverse.descriptor().inverse == r` for every role.
//! - Exactly one end of each pair is persisted (`Nested` or `Reference`);
//!   the other end is `Derived` and rebuilt when the edge is installed.
//! - An aggregation pair is always `Owner` on one end and `Owned` on the other.

use crate::model::kind::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One end of a relationship, seen from the entity that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    UserAccounts,
    AccountUser,
    UserPrivateActivities,
    PrivateActivityOwner,
    UserPrivateTasks,
    PrivateTaskOwner,
    AccountWorks,
    WorkAccount,
    AccountEvents,
    EventAccount,
    TaskChildren,
    TaskParent,
    ProjectChildren,
    ProjectParent,
    WorkActivity,
    ActivityWorks,
    ActivityWorkloads,
    WorkloadActivities,
    ActivityActivityTypes,
    ActivityTypeActivities,
    WorkloadBeneficiaries,
    BeneficiaryWorkloads,
    UserPermittedWorkloads,
    WorkloadPermittedUsers,
}

/// Aggregations cascade destruction; associations only sever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Aggregation,
    Association,
}

/// Position of the carrying entity within its relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Carrier exclusively owns its peers.
    Owner,
    /// Carrier is owned by its (single) peer.
    Owned,
    /// Neither end owns the other.
    Peer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    One,
    Many,
}

/// How an edge end appears in persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Peers are nested child elements / owner-side edge rows.
    Nested,
    /// Peers are listed by OID.
    Reference,
    /// Not persisted; rebuilt from the inverse end.
    Derived,
}

/// Entity kinds allowed at the far end of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKinds {
    Only(&'static [EntityKind]),
    /// Peer must have the same kind as the carrier (task hierarchies).
    SameKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDescriptor {
    pub role: Role,
    /// Persisted name: XML attribute for references, `edges.role` in SQL.
    pub name: &'static str,
    pub inverse: Role,
    pub side: Side,
    pub multiplicity: Multiplicity,
    pub persistence: Persistence,
    pub peers: PeerKinds,
}

impl RoleDescriptor {
    pub fn edge_kind(&self) -> EdgeKind {
        match self.side {
            Side::Owner | Side::Owned => EdgeKind::Aggregation,
            Side::Peer => EdgeKind::Association,
        }
    }

    /// Returns whether `peer` may sit at the far end when `carrier` holds this role.
    pub fn accepts(&self, carrier: EntityKind, peer: EntityKind) -> bool {
        match self.peers {
            PeerKinds::Only(kinds) => kinds.contains(&peer),
            PeerKinds::SameKind => carrier == peer,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persistence != Persistence::Derived
    }
}

const ACTIVITY_KINDS: &[EntityKind] = &[
    EntityKind::PublicActivity,
    EntityKind::PrivateActivity,
    EntityKind::PublicTask,
    EntityKind::PrivateTask,
];

const WORKLOAD_KINDS: &[EntityKind] = &[EntityKind::Project, EntityKind::WorkStream];

const fn owner(role: Role, name: &'static str, inverse: Role, peer: &'static [EntityKind]) -> RoleDescriptor {
    RoleDescriptor {
        role,
        name,
        inverse,
        side: Side::Owner,
        multiplicity: Multiplicity::Many,
        persistence: Persistence::Nested,
        peers: PeerKinds::Only(peer),
    }
}

const fn owned(role: Role, name: &'static str, inverse: Role, peer: &'static [EntityKind]) -> RoleDescriptor {
    RoleDescriptor {
        role,
        name,
        inverse,
        side: Side::Owned,
        multiplicity: Multiplicity::One,
        persistence: Persistence::Derived,
        peers: PeerKinds::Only(peer),
    }
}

const fn peer(
    role: Role,
    name: &'static str,
    inverse: Role,
    multiplicity: Multiplicity,
    persistence: Persistence,
    peers: &'static [EntityKind],
) -> RoleDescriptor {
    RoleDescriptor {
        role,
        name,
        inverse,
        side: Side::Peer,
        multiplicity,
        persistence,
        peers: PeerKinds::Only(peers),
    }
}

const DESCRIPTORS: &[RoleDescriptor] = &[
    owner(Role::UserAccounts, "user-accounts", Role::AccountUser, &[EntityKind::Account]),
    owned(Role::AccountUser, "account-user", Role::UserAccounts, &[EntityKind::User]),
    owner(
        Role::UserPrivateActivities,
        "user-private-activities",
        Role::PrivateActivityOwner,
        &[EntityKind::PrivateActivity],
    ),
    owned(
        Role::PrivateActivityOwner,
        "private-activity-owner",
        Role::UserPrivateActivities,
        &[EntityKind::User],
    ),
    owner(
        Role::UserPrivateTasks,
        "user-private-tasks",
        Role::PrivateTaskOwner,
        &[EntityKind::PrivateTask],
    ),
    owned(
        Role::PrivateTaskOwner,
        "private-task-owner",
        Role::UserPrivateTasks,
        &[EntityKind::User],
    ),
    owner(Role::AccountWorks, "account-works", Role::WorkAccount, &[EntityKind::Work]),
    owned(Role::WorkAccount, "work-account", Role::AccountWorks, &[EntityKind::Account]),
    owner(Role::AccountEvents, "account-events", Role::EventAccount, &[EntityKind::Event]),
    owned(Role::EventAccount, "event-account", Role::AccountEvents, &[EntityKind::Account]),
    RoleDescriptor {
        role: Role::TaskChildren,
        name: "task-children",
        inverse: Role::TaskParent,
        side: Side::Owner,
        multiplicity: Multiplicity::Many,
        persistence: Persistence::Nested,
        peers: PeerKinds::SameKind,
    },
    RoleDescriptor {
        role: Role::TaskParent,
        name: "task-parent",
        inverse: Role::TaskChildren,
        side: Side::Owned,
        multiplicity: Multiplicity::One,
        persistence: Persistence::Derived,
        peers: PeerKinds::SameKind,
    },
    owner(
        Role::ProjectChildren,
        "project-children",
        Role::ProjectParent,
        &[EntityKind::Project],
    ),
    owned(
        Role::ProjectParent,
        "project-parent",
        Role::ProjectChildren,
        &[EntityKind::Project],
    ),
    peer(
        Role::WorkActivity,
        "activity",
        Role::ActivityWorks,
        Multiplicity::One,
        Persistence::Reference,
        ACTIVITY_KINDS,
    ),
    peer(
        Role::ActivityWorks,
        "activity-works",
        Role::WorkActivity,
        Multiplicity::Many,
        Persistence::Derived,
        &[EntityKind::Work],
    ),
    peer(
        Role::ActivityWorkloads,
        "workloads",
        Role::WorkloadActivities,
        Multiplicity::Many,
        Persistence::Reference,
        WORKLOAD_KINDS,
    ),
    peer(
        Role::WorkloadActivities,
        "workload-activities",
        Role::ActivityWorkloads,
        Multiplicity::Many,
        Persistence::Derived,
        ACTIVITY_KINDS,
    ),
    peer(
        Role::ActivityActivityTypes,
        "activity-types",
        Role::ActivityTypeActivities,
        Multiplicity::Many,
        Persistence::Reference,
        &[EntityKind::ActivityType],
    ),
    peer(
        Role::ActivityTypeActivities,
        "activity-type-activities",
        Role::ActivityActivityTypes,
        Multiplicity::Many,
        Persistence::Derived,
        ACTIVITY_KINDS,
    ),
    peer(
        Role::WorkloadBeneficiaries,
        "beneficiaries",
        Role::BeneficiaryWorkloads,
        Multiplicity::Many,
        Persistence::Reference,
        &[EntityKind::Beneficiary],
    ),
    peer(
        Role::BeneficiaryWorkloads,
        "beneficiary-workloads",
        Role::WorkloadBeneficiaries,
        Multiplicity::Many,
        Persistence::Derived,
        WORKLOAD_KINDS,
    ),
    peer(
        Role::UserPermittedWorkloads,
        "permitted-workloads",
        Role::WorkloadPermittedUsers,
        Multiplicity::Many,
        Persistence::Reference,
        WORKLOAD_KINDS,
    ),
    peer(
        Role::WorkloadPermittedUsers,
        "permitted-users",
        Role::UserPermittedWorkloads,
        Multiplicity::Many,
        Persistence::Derived,
        &[EntityKind::User],
    ),
];

impl Role {
    /// Descriptor table entry for this role.
    pub fn descriptor(self) -> &'static RoleDescriptor {
        // The table is declared in enum order.
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn inverse(self) -> Role {
        self.descriptor().inverse
    }

    pub fn from_name(name: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.name == name)
            .map(|descriptor| descriptor.role)
    }

    pub fn all() -> impl Iterator<Item = Role> {
        DESCRIPTORS.iter().map(|descriptor| descriptor.role)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{EdgeKind, Persistence, Role, Side};

    #[test]
    fn descriptor_table_matches_enum_order() {
        for role in Role::all() {
            assert_eq!(role.descriptor().role, role);
        }
    }

    #[test]
    fn inverses_are_symmetric_and_single_persisted() {
        for role in Role::all() {
            let descriptor = role.descriptor();
            let inverse = descriptor.inverse.descriptor();
            assert_eq!(inverse.inverse, role, "{role}");
            assert_eq!(descriptor.edge_kind(), inverse.edge_kind(), "{role}");
            let persisted = [descriptor.persistence, inverse.persistence]
                .iter()
                .filter(|persistence| **persistence != Persistence::Derived)
                .count();
            assert_eq!(persisted, 1, "{role}");
        }
    }

    #[test]
    fn aggregation_pairs_pair_owner_with_owned() {
        for role in Role::all() {
            let descriptor = role.descriptor();
            if descriptor.edge_kind() != EdgeKind::Aggregation {
                continue;
            }
            let inverse = descriptor.inverse.descriptor();
            match descriptor.side {
                Side::Owner => assert_eq!(inverse.side, Side::Owned),
                Side::Owned => assert_eq!(inverse.side, Side::Owner),
                Side::Peer => unreachable!("aggregations never have peer sides"),
            }
        }
    }

    #[test]
    fn names_are_unique() {
        for role in Role::all() {
            assert_eq!(Role::from_name(role.name()), Some(role));
        }
    }
}
