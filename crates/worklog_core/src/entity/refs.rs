//! Tagged handles for relationships whose peer may be one of several kinds.

use crate::entity::sealed::Sealed;
use crate::entity::{
    ActivityRules, Entity, Named, ObjectHandle, PrivateActivity, PrivateTask, Project,
    PublicActivity, PublicTask, WorkStream,
};
use crate::error::StoreResult;
use crate::model::{EntityKind, Oid};

/// Any kind work can be recorded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityRef {
    PublicActivity(PublicActivity),
    PrivateActivity(PrivateActivity),
    PublicTask(PublicTask),
    PrivateTask(PrivateTask),
}

impl ActivityRef {
    pub(crate) fn from_object(object: ObjectHandle) -> Option<Self> {
        match object.kind() {
            EntityKind::PublicActivity => {
                Some(Self::PublicActivity(PublicActivity::from_object(object)))
            }
            EntityKind::PrivateActivity => {
                Some(Self::PrivateActivity(PrivateActivity::from_object(object)))
            }
            EntityKind::PublicTask => Some(Self::PublicTask(PublicTask::from_object(object))),
            EntityKind::PrivateTask => Some(Self::PrivateTask(PrivateTask::from_object(object))),
            _ => None,
        }
    }

    pub fn object(&self) -> &ObjectHandle {
        match self {
            Self::PublicActivity(activity) => activity.object(),
            Self::PrivateActivity(activity) => activity.object(),
            Self::PublicTask(task) => task.object(),
            Self::PrivateTask(task) => task.object(),
        }
    }

    pub fn oid(&self) -> Oid {
        self.object().oid()
    }

    pub fn kind(&self) -> EntityKind {
        self.object().kind()
    }

    pub fn display_name(&self) -> StoreResult<String> {
        match self {
            Self::PublicActivity(activity) => activity.display_name(),
            Self::PrivateActivity(activity) => activity.display_name(),
            Self::PublicTask(task) => task.display_name(),
            Self::PrivateTask(task) => task.display_name(),
        }
    }

    pub fn timeout(&self) -> StoreResult<Option<u32>> {
        match self {
            Self::PublicActivity(activity) => activity.timeout(),
            Self::PrivateActivity(activity) => activity.timeout(),
            Self::PublicTask(task) => task.timeout(),
            Self::PrivateTask(task) => task.timeout(),
        }
    }
}

/// A project or a work stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadRef {
    Project(Project),
    WorkStream(WorkStream),
}

impl WorkloadRef {
    pub(crate) fn from_object(object: ObjectHandle) -> Option<Self> {
        match object.kind() {
            EntityKind::Project => Some(Self::Project(Project::from_object(object))),
            EntityKind::WorkStream => Some(Self::WorkStream(WorkStream::from_object(object))),
            _ => None,
        }
    }

    pub fn object(&self) -> &ObjectHandle {
        match self {
            Self::Project(project) => project.object(),
            Self::WorkStream(stream) => stream.object(),
        }
    }

    pub fn oid(&self) -> Oid {
        self.object().oid()
    }

    pub fn display_name(&self) -> StoreResult<String> {
        match self {
            Self::Project(project) => project.display_name(),
            Self::WorkStream(stream) => stream.display_name(),
        }
    }
}
