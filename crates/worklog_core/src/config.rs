//! Store addressing and open options.
//!
//! # Responsibility
//! - Parse the external address of a store into a backend selection.
//! - Carry per-store options that callers may load from their own settings.
//!
//! # Invariants
//! - `StoreAddress::parse(&a.to_string())` yields `a`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file:";
const SQLITE_SCHEME: &str = "sqlite:";
const SQLITE_MEMORY: &str = "sqlite::memory:";

/// External address of a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreAddress {
    /// XML document on disk.
    File(PathBuf),
    /// SQLite database on disk.
    Sqlite(PathBuf),
    /// Private SQLite database living as long as the store.
    SqliteInMemory,
}

/// Address parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    Empty,
    UnknownExtension(String),
}

impl Display for AddressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "store address must not be empty"),
            Self::UnknownExtension(value) => write!(
                f,
                "cannot infer store backend from `{value}`; use a file: or sqlite: prefix"
            ),
        }
    }
}

impl std::error::Error for AddressError {}

impl StoreAddress {
    /// Parses `file:<path>`, `sqlite:<path>`, `sqlite::memory:` or a bare path
    /// whose extension selects the backend.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if trimmed == SQLITE_MEMORY {
            return Ok(Self::SqliteInMemory);
        }
        if let Some(path) = trimmed.strip_prefix(FILE_SCHEME) {
            return non_empty_path(path).map(Self::File);
        }
        if let Some(path) = trimmed.strip_prefix(SQLITE_SCHEME) {
            return non_empty_path(path).map(Self::Sqlite);
        }

        let path = Path::new(trimmed);
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("xml") => Ok(Self::File(path.to_path_buf())),
            Some("db" | "sqlite" | "sqlite3") => Ok(Self::Sqlite(path.to_path_buf())),
            _ => Err(AddressError::UnknownExtension(trimmed.to_string())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) | Self::Sqlite(path) => Some(path.as_path()),
            Self::SqliteInMemory => None,
        }
    }
}

fn non_empty_path(path: &str) -> Result<PathBuf, AddressError> {
    if path.trim().is_empty() {
        return Err(AddressError::Empty);
    }
    Ok(PathBuf::from(path))
}

impl Display for StoreAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{FILE_SCHEME}{}", path.display()),
            Self::Sqlite(path) => write!(f, "{SQLITE_SCHEME}{}", path.display()),
            Self::SqliteInMemory => f.write_str(SQLITE_MEMORY),
        }
    }
}

/// Options applied when opening a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Refuse every mutation; file stores also skip the lock file.
    pub read_only: bool,
    /// Start an empty store when the backing file does not exist yet.
    pub create_if_missing: bool,
    /// Run the integrity walk after every mutation.
    pub verify_after_mutation: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            create_if_missing: true,
            verify_after_mutation: cfg!(debug_assertions),
        }
    }
}

impl StoreOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            create_if_missing: false,
            ..Self::default()
        }
    }
}
