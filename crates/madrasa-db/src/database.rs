use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use madrasa_common::{Error, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, Row};
use tracing::info;

use crate::migrations::{self, MigrationAction};
use crate::schema::{self, MODELS};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;";

/// Application database: users, Masala posts, SMS log and login sessions.
///
/// Opening a `Database` creates any declared table that is missing, but
/// never alters an existing one; column additions are left to the
/// migration command.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(PRAGMAS)
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;
        schema::create_all(&conn, MODELS)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    /// Schema changes the migration command would still apply.
    pub fn pending_migrations(&self) -> Result<Vec<MigrationAction>> {
        let conn = self.connection()?;
        migrations::pending_actions(&conn, &migrations::desired_schema())
    }
}

/// Open an existing database file for schema migration.
///
/// Unlike [`Database::open`] this neither creates the file nor any tables,
/// so pointing the migration at a wrong path fails instead of producing a
/// fresh database.
pub fn open_for_migration(db_path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(db_path, flags).map_err(|e| {
        Error::Connection(format!(
            "failed to open database at {}: {e}",
            db_path.display()
        ))
    })?;
    conn.execute_batch(PRAGMAS)
        .map_err(|e| Error::Connection(format!("failed to set pragmas: {e}")))?;
    Ok(conn)
}

/// Parse a stored timestamp. Rows written by this crate are RFC 3339;
/// SQLite's `datetime('now')` and older application rows are naive UTC
/// `YYYY-MM-DD HH:MM:SS`, optionally with a fractional second.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Read a timestamp column. Unparseable values are a conversion error,
/// never a substituted time.
pub(crate) fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| invalid_timestamp(idx, &raw))
}

pub(crate) fn optional_datetime_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| invalid_timestamp(idx, &raw)),
        None => Ok(None),
    }
}

fn invalid_timestamp(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid timestamp: {raw:?}").into(),
    )
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
