//! Declarative table models for every table the application owns.
//!
//! Each model is a table name plus idempotent `CREATE ... IF NOT EXISTS`
//! DDL. [`create_all`] brings a database up to the declared set of tables
//! without touching tables that already exist.

use madrasa_common::{Error, Result};
use rusqlite::Connection;
use tracing::info;

/// A table declared by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableModel {
    pub name: &'static str,
    pub ddl: &'static str,
}

pub const USER: TableModel = TableModel {
    name: "user",
    ddl: "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            phone_number TEXT NOT NULL UNIQUE,
            email TEXT,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'student',
            is_active INTEGER NOT NULL DEFAULT 1,
            sms_count INTEGER DEFAULT 0,
            last_login TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
};

pub const MASALA: TableModel = TableModel {
    name: "masala",
    ddl: "CREATE TABLE IF NOT EXISTS masala (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            excerpt TEXT,
            author_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            category TEXT,
            image_url TEXT,
            is_published INTEGER NOT NULL DEFAULT 1,
            views_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_masala_published_created
            ON masala(is_published, created_at);

        CREATE INDEX IF NOT EXISTS idx_masala_author
            ON masala(author_id, created_at);",
};

pub const SMS_LOG: TableModel = TableModel {
    name: "sms_log",
    ddl: "CREATE TABLE IF NOT EXISTS sms_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            phone_number TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'sent',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sms_log_user
            ON sms_log(user_id, created_at);",
};

pub const SESSIONS: TableModel = TableModel {
    name: "sessions",
    ddl: "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
};

/// All application tables, parents before children.
pub const MODELS: &[TableModel] = &[USER, MASALA, SMS_LOG, SESSIONS];

/// Create every model whose table does not exist yet. Returns the names of
/// the tables that were created.
pub fn create_all(conn: &Connection, models: &[TableModel]) -> Result<Vec<&'static str>> {
    let mut created = Vec::new();
    for model in models {
        let exists: bool = conn
            .query_row(
                "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [model.name],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to check table {}: {e}", model.name)))?;

        conn.execute_batch(model.ddl)
            .map_err(|e| Error::Database(format!("failed to create {}: {e}", model.name)))?;

        if !exists {
            info!("created table {}", model.name);
            created.push(model.name);
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_all_reports_only_new_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let created = create_all(&conn, MODELS).unwrap();
        assert_eq!(created, vec!["user", "masala", "sms_log", "sessions"]);

        let created = create_all(&conn, MODELS).unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn create_all_leaves_existing_tables_untouched() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user (id INTEGER PRIMARY KEY, first_name TEXT NOT NULL, last_name TEXT,
                phone_number TEXT, email TEXT, password_hash TEXT, role TEXT, is_active INTEGER,
                last_login TEXT, created_at TEXT);",
        )
        .unwrap();

        let created = create_all(&conn, MODELS).unwrap();
        assert_eq!(created, vec!["masala", "sms_log", "sessions"]);

        let has_sms_count: bool = conn
            .query_row(
                "SELECT count(*) > 0 FROM pragma_table_info('user') WHERE name = 'sms_count'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!has_sms_count);
    }
}
