//! Relational backend over the migrated SQLite schema.
//!
//! # Responsibility
//! - Load object skeletons and persisted edges; leave properties unloaded.
//! - Fetch single properties on first read.
//! - Write every committed mutation immediately, one transaction per commit.
//!
//! # Invariants
//! - Owner-side edge rows are aggregations; every other row is an association.
//! - `store_meta.next_oid` never moves backwards.

use super::statement::Statement;
use super::{open_db, open_db_in_memory, open_db_read_only};
use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::model::{EntityKind, Oid, Persistence, Property, Role, Value};
use crate::persist::{Backend, LoadedEdge, LoadedGraph, LoadedObject, Mutation, FORMAT_VERSION};
use crate::store::table::ObjectTable;
use log::debug;
use rusqlite::Connection;
use std::path::Path;

const META_FORMAT_VERSION: &str = "format_version";
const META_NEXT_OID: &str = "next_oid";

pub(crate) struct SqliteBackend {
    conn: Connection,
    address: String,
    saved_next_oid: u64,
}

impl SqliteBackend {
    /// Opens (and migrates, unless read-only) the database at `path`.
    pub(crate) fn open(path: &Path, options: &StoreOptions) -> StoreResult<Self> {
        let address = format!("sqlite:{}", path.display());
        if !path.exists() && (options.read_only || !options.create_if_missing) {
            return Err(StoreError::DoesNotExist {
                what: "store database",
                key: path.display().to_string(),
            });
        }
        let conn = if options.read_only {
            open_db_read_only(path)?
        } else {
            open_db(path)?
        };
        Ok(Self {
            conn,
            address,
            saved_next_oid: 0,
        })
    }

    pub(crate) fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
            address: "sqlite::memory:".to_string(),
            saved_next_oid: 0,
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::corrupt(&self.address, reason)
    }

    fn stored_oid(&self, value: i64) -> StoreResult<Oid> {
        u64::try_from(value)
            .ok()
            .filter(|value| *value > 0)
            .map(Oid::new)
            .ok_or_else(|| self.corrupt(format!("invalid stored oid {value}")))
    }

    fn meta(&self, key: &str) -> StoreResult<Option<String>> {
        let mut select = Statement::new("SELECT value FROM store_meta WHERE key = ?");
        select.set(0, key)?;
        let mut values = select.query(&self.conn, |row| row.get::<_, String>(0))?;
        Ok(values.pop())
    }
}

fn oid_param(oid: Oid) -> StoreResult<i64> {
    i64::try_from(oid.get()).map_err(|_| StoreError::DoesNotExist {
        what: "object",
        key: oid.to_string(),
    })
}

fn apply_one(conn: &Connection, mutation: &Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::Created {
            oid,
            kind,
            properties,
        } => {
            let mut insert = Statement::new("INSERT INTO objects (oid, kind) VALUES (?, ?)");
            insert.set(0, oid_param(*oid)?)?.set(1, kind.tag())?;
            insert.execute(conn)?;

            let mut insert_property =
                Statement::new("INSERT INTO properties (oid, name, value) VALUES (?, ?, ?)");
            insert_property.set(0, oid_param(*oid)?)?;
            for (property, value) in properties {
                insert_property
                    .set(1, property.name())?
                    .set(2, value.encode())?;
                insert_property.execute(conn)?;
            }
        }
        Mutation::PropertyChanged {
            oid,
            property,
            value,
        } => {
            let mut update =
                Statement::new("UPDATE properties SET value = ? WHERE oid = ? AND name = ?");
            update
                .set(0, value.encode())?
                .set(1, oid_param(*oid)?)?
                .set(2, property.name())?;
            if update.execute(conn)? == 0 {
                let mut insert =
                    Statement::new("INSERT INTO properties (oid, name, value) VALUES (?, ?, ?)");
                insert
                    .set(0, oid_param(*oid)?)?
                    .set(1, property.name())?
                    .set(2, value.encode())?;
                insert.execute(conn)?;
            }
        }
        Mutation::Linked { from, role, to } => {
            let mut insert = Statement::new(
                "INSERT OR IGNORE INTO edges (from_oid, role, to_oid) VALUES (?, ?, ?)",
            );
            insert
                .set(0, oid_param(*from)?)?
                .set(1, role.name())?
                .set(2, oid_param(*to)?)?;
            insert.execute(conn)?;
        }
        Mutation::Unlinked { from, role, to } => {
            let mut delete =
                Statement::new("DELETE FROM edges WHERE from_oid = ? AND role = ? AND to_oid = ?");
            delete
                .set(0, oid_param(*from)?)?
                .set(1, role.name())?
                .set(2, oid_param(*to)?)?;
            delete.execute(conn)?;
        }
        Mutation::Destroyed { oid } => {
            let mut delete = Statement::new("DELETE FROM objects WHERE oid = ?");
            delete.set(0, oid_param(*oid)?)?;
            delete.execute(conn)?;
        }
    }
    Ok(())
}

impl Backend for SqliteBackend {
    fn load(&mut self) -> StoreResult<LoadedGraph> {
        let version = self.meta(META_FORMAT_VERSION)?.unwrap_or_else(|| "none".to_string());
        if version.parse::<u32>().ok() != Some(FORMAT_VERSION) {
            return Err(StoreError::UnsupportedFormatVersion {
                address: self.address.clone(),
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let next_oid = self
            .meta(META_NEXT_OID)?
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .ok_or_else(|| self.corrupt("store_meta lacks a valid next_oid"))?;

        let rows = Statement::new("SELECT oid, kind FROM objects ORDER BY oid")
            .query(&self.conn, |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut objects = Vec::with_capacity(rows.len());
        for (oid, tag) in rows {
            let oid = self.stored_oid(oid)?;
            let kind = EntityKind::from_tag(&tag)
                .ok_or_else(|| self.corrupt(format!("object #{oid} has unknown kind `{tag}`")))?;
            objects.push(LoadedObject {
                oid,
                kind,
                properties: None,
            });
        }

        let rows = Statement::new(
            "SELECT from_oid, role, to_oid FROM edges ORDER BY from_oid, role, to_oid",
        )
        .query(&self.conn, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut aggregations = Vec::new();
        let mut associations = Vec::new();
        for (from, name, to) in rows {
            let role = Role::from_name(&name)
                .ok_or_else(|| self.corrupt(format!("edge row has unknown role `{name}`")))?;
            let edge = LoadedEdge {
                from: self.stored_oid(from)?,
                role,
                to: self.stored_oid(to)?,
            };
            match role.descriptor().persistence {
                Persistence::Nested => aggregations.push(edge),
                Persistence::Reference => associations.push(edge),
                Persistence::Derived => {
                    return Err(self.corrupt(format!("edge row stores derived role `{name}`")))
                }
            }
        }

        self.saved_next_oid = next_oid;
        Ok(LoadedGraph {
            next_oid,
            objects,
            aggregations,
            associations,
        })
    }

    fn fetch_property(&mut self, oid: Oid, property: Property) -> StoreResult<Value> {
        let mut select = Statement::new("SELECT value FROM properties WHERE oid = ? AND name = ?");
        select.set(0, oid_param(oid)?)?.set(1, property.name())?;
        let text = select
            .query(&self.conn, |row| row.get::<_, String>(0))?
            .pop()
            .ok_or_else(|| self.corrupt(format!("#{oid} has no stored `{property}`")))?;
        debug!("event=property_fetch module=db status=ok oid={oid} property={property}");
        Value::decode(property.value_type(), &text)
            .map_err(|reason| self.corrupt(format!("#{oid} `{property}`: {reason}")))
    }

    fn apply(&mut self, mutations: &[Mutation]) -> StoreResult<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for mutation in mutations {
            apply_one(&tx, mutation)?;
        }
        tx.commit()?;
        debug!(
            "event=store_write module=db status=ok mutations={}",
            mutations.len()
        );
        Ok(())
    }

    fn flush(&mut self, _objects: &ObjectTable, next_oid: u64) -> StoreResult<()> {
        if next_oid <= self.saved_next_oid {
            return Ok(());
        }
        let mut update = Statement::new("UPDATE store_meta SET value = ? WHERE key = ?");
        update.set(0, next_oid.to_string())?.set(1, META_NEXT_OID)?;
        if update.execute(&self.conn)? != 1 {
            return Err(self.corrupt("store_meta lacks a next_oid row"));
        }
        self.saved_next_oid = next_oid;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteBackend;
    use crate::model::{EntityKind, Oid, Property, Role, Value};
    use crate::persist::{Backend, Mutation};
    use crate::store::table::ObjectTable;

    #[test]
    fn fresh_database_loads_empty_graph() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        let graph = backend.load().unwrap();
        assert_eq!(graph.next_oid, 1);
        assert!(graph.objects.is_empty());
    }

    #[test]
    fn applied_mutations_reload_as_skeletons() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        backend.load().unwrap();
        backend
            .apply(&[
                Mutation::Created {
                    oid: Oid::new(1),
                    kind: EntityKind::WorkStream,
                    properties: vec![
                        (Property::DisplayName, Value::from("Support")),
                        (Property::Description, Value::from("")),
                    ],
                },
                Mutation::Created {
                    oid: Oid::new(2),
                    kind: EntityKind::Beneficiary,
                    properties: vec![
                        (Property::DisplayName, Value::from("ACME")),
                        (Property::Description, Value::from("")),
                    ],
                },
                Mutation::Linked {
                    from: Oid::new(1),
                    role: Role::WorkloadBeneficiaries,
                    to: Oid::new(2),
                },
                Mutation::PropertyChanged {
                    oid: Oid::new(1),
                    property: Property::DisplayName,
                    value: Value::from("Helpdesk"),
                },
            ])
            .unwrap();
        backend.flush(&ObjectTable::default(), 3).unwrap();

        let graph = backend.load().unwrap();
        assert_eq!(graph.next_oid, 3);
        assert_eq!(graph.objects.len(), 2);
        assert!(graph.objects.iter().all(|object| object.properties.is_none()));
        assert_eq!(graph.associations.len(), 1);
        assert_eq!(
            backend
                .fetch_property(Oid::new(1), Property::DisplayName)
                .unwrap(),
            Value::from("Helpdesk")
        );
    }
}
