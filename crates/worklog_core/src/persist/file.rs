//! XML file backend.
//!
//! # Responsibility
//! - Guard the document with a `<path>.lock` file for writable stores.
//! - Load the whole document eagerly; rewrite it after every completed
//!   mutation through a temp file and a rename.
//!
//! # Invariants
//! - A writable store owns the lock file for its whole lifetime.
//! - The document on disk is always either the previous or the new
//!   version, never a partial write.

use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::model::{Oid, Property, Value};
use crate::persist::document::{read_document, write_document};
use crate::persist::{Backend, LoadedGraph, Mutation};
use crate::store::table::ObjectTable;
use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const LOCK_SUFFIX: &str = ".lock";

pub(crate) struct FileBackend {
    path: PathBuf,
    address: String,
    lock_path: Option<PathBuf>,
    create_if_missing: bool,
    dirty: bool,
}

impl FileBackend {
    /// Claims the lock file unless the store is read-only.
    ///
    /// # Errors
    /// - `StoreLocked` when the lock file already exists.
    pub(crate) fn open(path: &Path, options: &StoreOptions) -> StoreResult<Self> {
        let address = format!("file:{}", path.display());
        let lock_path = if options.read_only {
            None
        } else {
            Some(acquire_lock(path, &address)?)
        };
        Ok(Self {
            path: path.to_path_buf(),
            address,
            lock_path,
            create_if_missing: options.create_if_missing,
            dirty: false,
        })
    }

    fn release_lock(&mut self) {
        if let Some(lock_path) = self.lock_path.take() {
            if let Err(err) = fs::remove_file(&lock_path) {
                warn!(
                    "event=store_unlock module=persist status=error path={} error={err}",
                    lock_path.display()
                );
            }
        }
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

fn acquire_lock(path: &Path, address: &str) -> StoreResult<PathBuf> {
    let lock_path = lock_path_for(path);
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&lock_path)
    {
        Ok(mut file) => {
            // Diagnostics only; ownership is the file's existence.
            let _ = writeln!(file, "{}", std::process::id());
            Ok(lock_path)
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(StoreError::StoreLocked {
            address: address.to_string(),
        }),
        Err(err) => Err(StoreError::io(address, err)),
    }
}

/// Replaces `path` with `text` through a sibling temp file.
pub(crate) fn write_atomically(path: &Path, text: &str) -> StoreResult<()> {
    let address = path.display().to_string();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(directory).map_err(|err| StoreError::io(&address, err))?;
    file.write_all(text.as_bytes())
        .and_then(|_| file.as_file().sync_all())
        .map_err(|err| StoreError::io(&address, err))?;
    file.persist(path)
        .map_err(|err| StoreError::io(&address, err.error))?;
    Ok(())
}

impl Backend for FileBackend {
    fn load(&mut self) -> StoreResult<LoadedGraph> {
        match fs::read_to_string(&self.path) {
            Ok(text) => read_document(&self.address, &text),
            Err(err) if err.kind() == ErrorKind::NotFound && self.create_if_missing => {
                info!(
                    "event=store_create module=persist status=ok path={}",
                    self.path.display()
                );
                self.dirty = true;
                Ok(LoadedGraph {
                    next_oid: 1,
                    ..LoadedGraph::default()
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::DoesNotExist {
                what: "store file",
                key: self.path.display().to_string(),
            }),
            Err(err) => Err(StoreError::io(&self.address, err)),
        }
    }

    fn fetch_property(&mut self, oid: Oid, property: Property) -> StoreResult<Value> {
        Err(StoreError::corrupt(
            &self.address,
            format!("property {property} of #{oid} was not loaded from the document"),
        ))
    }

    fn apply(&mut self, mutations: &[Mutation]) -> StoreResult<()> {
        if !mutations.is_empty() {
            self.dirty = true;
        }
        Ok(())
    }

    fn flush(&mut self, objects: &ObjectTable, next_oid: u64) -> StoreResult<()> {
        if !self.dirty || self.lock_path.is_none() {
            return Ok(());
        }
        let text = write_document(&self.address, objects, next_oid)?
            .to_xml_string()
            .map_err(|err| StoreError::corrupt(&self.address, err.to_string()))?;
        write_atomically(&self.path, &text)?;
        self.dirty = false;
        info!(
            "event=store_save module=persist status=ok path={} objects={} bytes={}",
            self.path.display(),
            objects.live_len(),
            text.len()
        );
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.release_lock();
        Ok(())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        self.release_lock();
    }
}

#[cfg(test)]
mod tests {
    use super::{lock_path_for, write_atomically};
    use std::path::Path;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/work.xml")),
            Path::new("/data/work.xml.lock")
        );
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        write_atomically(&path, "first").unwrap();
        write_atomically(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
