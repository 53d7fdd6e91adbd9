//! Entity kinds and their type descriptors.
//!
//! A kind is assembled from capability groups rather than an inheritance
//! chain: a public task is `Named + ActivityRules + Completable`, so its
//! persisted form is exactly the activity form plus the completion flag.

use crate::model::property::Property;
use crate::model::role::Role;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    User,
    Account,
    PublicActivity,
    PrivateActivity,
    PublicTask,
    PrivateTask,
    Project,
    WorkStream,
    Beneficiary,
    ActivityType,
    Work,
    Event,
}

/// Group of properties shared by several kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Principal,
    UserDetails,
    AccountDetails,
    Named,
    ActivityRules,
    Completable,
    Interval,
    Occurrence,
}

impl Capability {
    pub fn properties(self) -> &'static [Property] {
        match self {
            Self::Principal => &[Property::Enabled, Property::EmailAddresses],
            Self::UserDetails => &[Property::RealName],
            Self::AccountDetails => &[Property::Login],
            Self::Named => &[Property::DisplayName, Property::Description],
            Self::ActivityRules => &[
                Property::Timeout,
                Property::RequireCommentOnStart,
                Property::RequireCommentOnFinish,
            ],
            Self::Completable => &[Property::Completed],
            Self::Interval => &[Property::Start, Property::Finish, Property::Comment],
            Self::Occurrence => &[Property::OccurredAt, Property::Summary],
        }
    }
}

/// Static type descriptor; one per kind.
#[derive(Debug)]
pub struct KindDescriptor {
    pub kind: EntityKind,
    /// Element name in the XML document and `objects.kind` in SQL.
    pub tag: &'static str,
    pub capabilities: &'static [Capability],
    pub roles: &'static [Role],
    /// Each group names roles of which exactly one must be installed.
    pub required: &'static [&'static [Role]],
}

const ACTIVITY_ROLES: &[Role] = &[
    Role::ActivityWorkloads,
    Role::ActivityActivityTypes,
    Role::ActivityWorks,
];

const DESCRIPTORS: &[KindDescriptor] = &[
    KindDescriptor {
        kind: EntityKind::User,
        tag: "user",
        capabilities: &[Capability::Principal, Capability::UserDetails],
        roles: &[
            Role::UserAccounts,
            Role::UserPrivateActivities,
            Role::UserPrivateTasks,
            Role::UserPermittedWorkloads,
        ],
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::Account,
        tag: "account",
        capabilities: &[Capability::Principal, Capability::AccountDetails],
        roles: &[Role::AccountUser, Role::AccountWorks, Role::AccountEvents],
        required: &[&[Role::AccountUser]],
    },
    KindDescriptor {
        kind: EntityKind::PublicActivity,
        tag: "public-activity",
        capabilities: &[Capability::Named, Capability::ActivityRules],
        roles: ACTIVITY_ROLES,
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::PrivateActivity,
        tag: "private-activity",
        capabilities: &[Capability::Named, Capability::ActivityRules],
        roles: &[
            Role::PrivateActivityOwner,
            Role::ActivityWorkloads,
            Role::ActivityActivityTypes,
            Role::ActivityWorks,
        ],
        required: &[&[Role::PrivateActivityOwner]],
    },
    KindDescriptor {
        kind: EntityKind::PublicTask,
        tag: "public-task",
        capabilities: &[
            Capability::Named,
            Capability::ActivityRules,
            Capability::Completable,
        ],
        roles: &[
            Role::TaskParent,
            Role::TaskChildren,
            Role::ActivityWorkloads,
            Role::ActivityActivityTypes,
            Role::ActivityWorks,
        ],
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::PrivateTask,
        tag: "private-task",
        capabilities: &[
            Capability::Named,
            Capability::ActivityRules,
            Capability::Completable,
        ],
        roles: &[
            Role::PrivateTaskOwner,
            Role::TaskParent,
            Role::TaskChildren,
            Role::ActivityWorkloads,
            Role::ActivityActivityTypes,
            Role::ActivityWorks,
        ],
        // Root private tasks hang off their user; nested ones off their parent.
        required: &[&[Role::PrivateTaskOwner, Role::TaskParent]],
    },
    KindDescriptor {
        kind: EntityKind::Project,
        tag: "project",
        capabilities: &[Capability::Named, Capability::Completable],
        roles: &[
            Role::ProjectParent,
            Role::ProjectChildren,
            Role::WorkloadActivities,
            Role::WorkloadBeneficiaries,
            Role::WorkloadPermittedUsers,
        ],
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::WorkStream,
        tag: "work-stream",
        capabilities: &[Capability::Named],
        roles: &[
            Role::WorkloadActivities,
            Role::WorkloadBeneficiaries,
            Role::WorkloadPermittedUsers,
        ],
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::Beneficiary,
        tag: "beneficiary",
        capabilities: &[Capability::Named],
        roles: &[Role::BeneficiaryWorkloads],
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::ActivityType,
        tag: "activity-type",
        capabilities: &[Capability::Named],
        roles: &[Role::ActivityTypeActivities],
        required: &[],
    },
    KindDescriptor {
        kind: EntityKind::Work,
        tag: "work",
        capabilities: &[Capability::Interval],
        roles: &[Role::WorkAccount, Role::WorkActivity],
        required: &[&[Role::WorkAccount]],
    },
    KindDescriptor {
        kind: EntityKind::Event,
        tag: "event",
        capabilities: &[Capability::Occurrence],
        roles: &[Role::EventAccount],
        required: &[&[Role::EventAccount]],
    },
];

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        Self::User,
        Self::Account,
        Self::PublicActivity,
        Self::PrivateActivity,
        Self::PublicTask,
        Self::PrivateTask,
        Self::Project,
        Self::WorkStream,
        Self::Beneficiary,
        Self::ActivityType,
        Self::Work,
        Self::Event,
    ];

    pub fn descriptor(self) -> &'static KindDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn tag(self) -> &'static str {
        self.descriptor().tag
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.tag == tag)
            .map(|descriptor| descriptor.kind)
    }

    /// Properties in persisted order: capability by capability.
    pub fn properties(self) -> impl Iterator<Item = Property> {
        self.descriptor()
            .capabilities
            .iter()
            .flat_map(|capability| capability.properties().iter().copied())
    }

    pub fn has_property(self, property: Property) -> bool {
        self.properties().any(|candidate| candidate == property)
    }

    pub fn has_capability(self, capability: Capability) -> bool {
        self.descriptor().capabilities.contains(&capability)
    }

    pub fn roles(self) -> &'static [Role] {
        self.descriptor().roles
    }

    pub fn has_role(self, role: Role) -> bool {
        self.roles().contains(&role)
    }

    pub fn is_activity(self) -> bool {
        matches!(
            self,
            Self::PublicActivity | Self::PrivateActivity | Self::PublicTask | Self::PrivateTask
        )
    }

    pub fn is_workload(self) -> bool {
        matches!(self, Self::Project | Self::WorkStream)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
