//! Error taxonomy for store operations.
//!
//! # Responsibility
//! - Give every failure mode of the object store a typed, matchable variant.
//! - Carry the store address wherever a diagnostic needs it.
//!
//! # Invariants
//! - Store operations fail fast; nothing in this crate retries.
//! - Corruption is always surfaced, never repaired silently.

use crate::db::DbError;
use crate::model::{EntityKind, Oid};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Rejected property or edge value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValueError {
    /// Entity kind the value was proposed for.
    pub kind: EntityKind,
    /// Property or role name as it appears in the persisted form.
    pub field: &'static str,
    /// Offending value, rendered for diagnostics.
    pub value: String,
    /// Human-readable rule that was violated.
    pub reason: String,
}

impl PropertyValueError {
    pub fn new(
        kind: EntityKind,
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl Display for PropertyValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid value `{}` for {}.{}: {}",
            self.value,
            self.kind.tag(),
            self.field,
            self.reason
        )
    }
}

impl Error for PropertyValueError {}

/// Errors raised by the object store and its backends.
#[derive(Debug)]
pub enum StoreError {
    /// Operation targeted an entity that has been destroyed.
    InstanceDead { kind: Option<EntityKind>, oid: Oid },
    /// Operation attempted on a closed store.
    StoreClosed { address: String },
    /// Mutation attempted on a store opened read-only.
    ReadOnly { address: String },
    /// A validator rejected a proposed value.
    InvalidPropertyValue(PropertyValueError),
    /// Uniqueness violation.
    AlreadyExists { what: &'static str, key: String },
    /// Lookup failure.
    DoesNotExist { what: &'static str, key: String },
    /// Structural inconsistency found in persisted or in-memory state.
    Corrupt { address: String, reason: String },
    /// Persisted document carries a format version this build cannot read.
    UnsupportedFormatVersion {
        address: String,
        found: String,
        expected: u32,
    },
    /// Handle belongs to another store.
    ForeignObject { oid: Oid },
    /// Another process holds the store's lock file.
    StoreLocked { address: String },
    /// File-system failure on the store's backing file.
    Io {
        address: String,
        source: std::io::Error,
    },
    /// Native driver failure, reported with the driver's own message.
    Custom(DbError),
}

impl StoreError {
    pub(crate) fn corrupt(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            address: address.into(),
            source,
        }
    }

    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InstanceDead { .. } => "instance_dead",
            Self::StoreClosed { .. } => "store_closed",
            Self::ReadOnly { .. } => "store_read_only",
            Self::InvalidPropertyValue(_) => "invalid_property_value",
            Self::AlreadyExists { .. } => "already_exists",
            Self::DoesNotExist { .. } => "does_not_exist",
            Self::Corrupt { .. } => "store_corrupt",
            Self::UnsupportedFormatVersion { .. } => "unsupported_format_version",
            Self::ForeignObject { .. } => "foreign_object",
            Self::StoreLocked { .. } => "store_locked",
            Self::Io { .. } => "io",
            Self::Custom(_) => "custom",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstanceDead {
                kind: Some(kind),
                oid,
            } => write!(f, "{} #{oid} has been destroyed", kind.tag()),
            Self::InstanceDead { kind: None, oid } => write!(f, "object #{oid} has been destroyed"),
            Self::StoreClosed { address } => write!(f, "store `{address}` is closed"),
            Self::ReadOnly { address } => write!(f, "store `{address}` is read-only"),
            Self::InvalidPropertyValue(err) => write!(f, "{err}"),
            Self::AlreadyExists { what, key } => write!(f, "{what} `{key}` already exists"),
            Self::DoesNotExist { what, key } => write!(f, "{what} `{key}` does not exist"),
            Self::Corrupt { address, reason } => {
                write!(f, "store `{address}` is corrupt: {reason}")
            }
            Self::UnsupportedFormatVersion {
                address,
                found,
                expected,
            } => write!(
                f,
                "store `{address}` has format version `{found}`, expected `{expected}`"
            ),
            Self::ForeignObject { oid } => {
                write!(f, "object #{oid} belongs to a different store")
            }
            Self::StoreLocked { address } => {
                write!(f, "store `{address}` is locked by another process")
            }
            Self::Io { address, source } => write!(f, "i/o error on `{address}`: {source}"),
            Self::Custom(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPropertyValue(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Custom(err) => Some(err),
            Self::InstanceDead { .. }
            | Self::StoreClosed { .. }
            | Self::ReadOnly { .. }
            | Self::AlreadyExists { .. }
            | Self::DoesNotExist { .. }
            | Self::Corrupt { .. }
            | Self::UnsupportedFormatVersion { .. }
            | Self::ForeignObject { .. }
            | Self::StoreLocked { .. } => None,
        }
    }
}

impl From<PropertyValueError> for StoreError {
    fn from(value: PropertyValueError) -> Self {
        Self::InvalidPropertyValue(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Custom(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Custom(DbError::Sqlite(value))
    }
}
