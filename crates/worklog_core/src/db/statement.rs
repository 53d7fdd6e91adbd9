//! Positional SQL statements with typed parameters.
//!
//! # Responsibility
//! - Split a template at `?` placeholders outside quoted literals.
//! - Track a typed value per placeholder and render the final SQL text.
//! - Bind and run the rendered text on a connection.
//!
//! # Invariants
//! - Parameter indices are 0-based and bounded by the placeholder count.
//! - The rendered text is rebuilt only when some parameter's type tag
//!   changes; value changes alone reuse it.
//! - `Null` parameters render as the literal `NULL`; every other parameter
//!   renders as the numbered placeholder `?N` (N = index + 1).

use super::{DbError, DbResult};
use rusqlite::{Connection, Row};

/// Leading keyword of a statement template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    fn classify(template: &str) -> Self {
        let keyword = template
            .trim_start()
            .split(|ch: char| !ch.is_ascii_alphabetic())
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "WITH" => Self::Select,
            "INSERT" | "REPLACE" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// Value bound to one placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Param {
    #[default]
    Null,
    Integer(i64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
    Null,
    Integer,
    Text,
    Bool,
}

impl Param {
    fn tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Null,
            Self::Integer(_) => TypeTag::Integer,
            Self::Text(_) => TypeTag::Text,
            Self::Bool(_) => TypeTag::Bool,
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// SQL template with `?` placeholders and one typed value per placeholder.
#[derive(Debug, Clone)]
pub struct Statement {
    kind: StatementKind,
    /// Template text between placeholders; always `params.len() + 1` long.
    fragments: Vec<String>,
    params: Vec<Param>,
    rendered_tags: Vec<TypeTag>,
    text: String,
}

impl Statement {
    /// Parses `template`; every parameter starts as `Null`.
    pub fn new(template: &str) -> Self {
        let fragments = split_template(template);
        let count = fragments.len() - 1;
        let mut statement = Self {
            kind: StatementKind::classify(template),
            fragments,
            params: vec![Param::Null; count],
            rendered_tags: vec![TypeTag::Null; count],
            text: String::new(),
        };
        statement.render();
        statement
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Final SQL text for the current parameter types.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn param(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }

    /// Sets the parameter at 0-based `index`.
    ///
    /// # Errors
    /// - `ParameterOutOfRange` when `index` has no placeholder.
    pub fn set(&mut self, index: usize, value: impl Into<Param>) -> DbResult<&mut Self> {
        let count = self.params.len();
        let slot = self
            .params
            .get_mut(index)
            .ok_or(DbError::ParameterOutOfRange { index, count })?;
        *slot = value.into();
        if slot.tag() != self.rendered_tags[index] {
            self.render();
        }
        Ok(self)
    }

    /// Runs the statement and returns the number of changed rows.
    pub fn execute(&self, conn: &Connection) -> DbResult<usize> {
        let mut prepared = conn.prepare(&self.text)?;
        self.bind(&mut prepared)?;
        Ok(prepared.raw_execute()?)
    }

    /// Runs the statement and maps every result row.
    pub fn query<T>(
        &self,
        conn: &Connection,
        mut map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> DbResult<Vec<T>> {
        let mut prepared = conn.prepare(&self.text)?;
        self.bind(&mut prepared)?;
        let mut rows = prepared.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(map(row)?);
        }
        Ok(out)
    }

    fn bind(&self, prepared: &mut rusqlite::Statement<'_>) -> DbResult<()> {
        for (index, param) in self.params.iter().enumerate() {
            let position = index + 1;
            match param {
                Param::Null => {}
                Param::Integer(value) => prepared.raw_bind_parameter(position, *value)?,
                Param::Text(value) => prepared.raw_bind_parameter(position, value.as_str())?,
                Param::Bool(value) => prepared.raw_bind_parameter(position, *value)?,
            }
        }
        Ok(())
    }

    fn render(&mut self) {
        let mut text = String::with_capacity(self.fragments.iter().map(String::len).sum());
        for (index, fragment) in self.fragments.iter().enumerate() {
            text.push_str(fragment);
            if let Some(param) = self.params.get(index) {
                match param {
                    Param::Null => text.push_str("NULL"),
                    _ => {
                        text.push('?');
                        text.push_str(&(index + 1).to_string());
                    }
                }
                self.rendered_tags[index] = param.tag();
            }
        }
        self.text = text;
    }
}

fn split_template(template: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in template.chars() {
        match (quote, ch) {
            (None, '?') => fragments.push(std::mem::take(&mut current)),
            (None, '\'' | '"') => {
                quote = Some(ch);
                current.push(ch);
            }
            (Some(open), _) if ch == open => {
                quote = None;
                current.push(ch);
            }
            _ => current.push(ch),
        }
    }
    fragments.push(current);
    fragments
}

#[cfg(test)]
mod tests {
    use super::{Param, Statement, StatementKind};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn classifies_leading_keyword() {
        assert_eq!(Statement::new("  select 1").kind(), StatementKind::Select);
        assert_eq!(
            Statement::new("INSERT INTO t VALUES (?)").kind(),
            StatementKind::Insert
        );
        assert_eq!(Statement::new("update t set a = ?").kind(), StatementKind::Update);
        assert_eq!(Statement::new("DELETE FROM t").kind(), StatementKind::Delete);
        assert_eq!(Statement::new("PRAGMA user_version").kind(), StatementKind::Other);
    }

    #[test]
    fn placeholders_inside_quotes_are_literal() {
        let statement = Statement::new("SELECT '?', \"a?b\" FROM t WHERE x = ? AND y = ?");
        assert_eq!(statement.parameter_count(), 2);
        assert_eq!(
            statement.text(),
            "SELECT '?', \"a?b\" FROM t WHERE x = NULL AND y = NULL"
        );
    }

    #[test]
    fn text_follows_parameter_types() {
        let mut statement = Statement::new("UPDATE t SET a = ?, b = ? WHERE id = ?");
        statement.set(0, 7_i64).unwrap();
        statement.set(2, "k").unwrap();
        assert_eq!(statement.text(), "UPDATE t SET a = ?1, b = NULL WHERE id = ?3");

        statement.set(0, 8_i64).unwrap();
        assert_eq!(statement.text(), "UPDATE t SET a = ?1, b = NULL WHERE id = ?3");

        statement.set(0, Param::Null).unwrap();
        assert_eq!(statement.text(), "UPDATE t SET a = NULL, b = NULL WHERE id = ?3");
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut statement = Statement::new("SELECT ?");
        let err = statement.set(1, true).unwrap_err();
        assert!(matches!(
            err,
            DbError::ParameterOutOfRange { index: 1, count: 1 }
        ));
    }

    #[test]
    fn executes_and_queries_with_bound_values() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, flag INTEGER);")
            .unwrap();

        let mut insert = Statement::new("INSERT INTO t (id, name, flag) VALUES (?, ?, ?)");
        insert.set(0, 1_i64).unwrap().set(1, "one").unwrap().set(2, true).unwrap();
        assert_eq!(insert.execute(&conn).unwrap(), 1);
        insert.set(0, 2_i64).unwrap().set(1, Param::Null).unwrap();
        assert_eq!(insert.execute(&conn).unwrap(), 1);

        let mut select = Statement::new("SELECT name FROM t WHERE flag = ? ORDER BY id");
        select.set(0, true).unwrap();
        let names = select
            .query(&conn, |row| row.get::<_, Option<String>>(0))
            .unwrap();
        assert_eq!(names, vec![Some("one".to_string()), None]);
    }
}
