use std::collections::{BTreeMap, BTreeSet};

use madrasa_common::{Error, Result};
use rusqlite::Connection;

/// Tables and their columns as they exist in the database at one moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl SchemaSnapshot {
    pub(crate) fn insert_table<I, S>(&mut self, table: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(table.into(), columns.into_iter().map(Into::into).collect());
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Read-only view of the live schema.
pub struct SchemaInspector<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn table_names(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            )
            .map_err(|e| Error::Connection(format!("failed to list tables: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Connection(format!("failed to list tables: {e}")))?;

        rows.collect::<rusqlite::Result<_>>()
            .map_err(|e| Error::Connection(format!("failed to read table name: {e}")))
    }

    /// Columns of `table`; empty when the table does not exist.
    pub fn column_names(&self, table: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(|e| Error::Connection(format!("failed to inspect {table}: {e}")))?;

        let rows = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Connection(format!("failed to inspect {table}: {e}")))?;

        rows.collect::<rusqlite::Result<_>>()
            .map_err(|e| Error::Connection(format!("failed to read column of {table}: {e}")))
    }

    pub fn snapshot(&self) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::default();
        for table in self.table_names()? {
            let columns = self.column_names(&table)?;
            snapshot.insert_table(table, columns);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lists_tables_and_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user (id INTEGER PRIMARY KEY AUTOINCREMENT, first_name TEXT);
             CREATE TABLE masala (id INTEGER PRIMARY KEY, title TEXT, content TEXT);",
        )
        .unwrap();

        let snapshot = SchemaInspector::new(&conn).snapshot().unwrap();
        assert_eq!(snapshot.table_names().collect::<Vec<_>>(), vec!["masala", "user"]);
        assert!(snapshot.has_column("user", "first_name"));
        assert!(snapshot.has_column("masala", "content"));
        assert!(!snapshot.has_column("user", "sms_count"));
    }

    #[test]
    fn internal_sqlite_tables_are_hidden() {
        let conn = Connection::open_in_memory().unwrap();
        // AUTOINCREMENT creates sqlite_sequence behind the scenes.
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT);")
            .unwrap();

        let tables = SchemaInspector::new(&conn).table_names().unwrap();
        assert_eq!(tables.into_iter().collect::<Vec<_>>(), vec!["t".to_string()]);
    }

    #[test]
    fn columns_of_missing_table_are_empty() {
        let conn = Connection::open_in_memory().unwrap();
        let columns = SchemaInspector::new(&conn).column_names("nope").unwrap();
        assert!(columns.is_empty());
    }

    #[test]
    fn empty_database_gives_empty_snapshot() {
        let conn = Connection::open_in_memory().unwrap();
        let snapshot = SchemaInspector::new(&conn).snapshot().unwrap();
        assert!(snapshot.is_empty());
    }
}
