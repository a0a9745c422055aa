use chrono::{DateTime, Utc};
use madrasa_common::{Error, Result, Role};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::database::{Database, datetime_column, now_timestamp, optional_datetime_column};

/// A row of the `user` table, without the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub sms_count: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

const USER_COLUMNS: &str = "id, first_name, last_name, phone_number, email, role, is_active,
    sms_count, last_login, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(5)?;
    Ok(UserRecord {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phone_number: row.get(3)?,
        email: row.get(4)?,
        role: role.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
        })?,
        is_active: row.get(6)?,
        sms_count: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        last_login: optional_datetime_column(row, 8)?,
        created_at: datetime_column(row, 9)?,
    })
}

impl Database {
    pub fn create_user(&self, user: &NewUser) -> Result<UserRecord> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO user (first_name, last_name, phone_number, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.first_name,
                user.last_name,
                user.phone_number,
                user.email,
                user.password_hash,
                user.role.as_str(),
                now_timestamp(),
            ],
        )
        .map_err(|e| Error::Database(format!("failed to create user: {e}")))?;

        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_user(id)?
            .ok_or_else(|| Error::Database(format!("user {id} vanished after insert")))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRecord>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(|e| Error::Database(format!("failed to load user: {e}")))
    }

    /// The active user with this phone number, and their password hash.
    pub fn find_login(&self, phone_number: &str) -> Result<Option<(UserRecord, String)>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!(
                "SELECT {USER_COLUMNS}, password_hash FROM user
                 WHERE phone_number = ?1 AND is_active = 1"
            ),
            params![phone_number],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(10)?)),
        )
        .optional()
        .map_err(|e| Error::Database(format!("failed to look up login: {e}")))
    }

    pub fn record_login(&self, id: i64) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "UPDATE user SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), id],
        )
        .map_err(|e| Error::Database(format!("failed to record login: {e}")))?;
        Ok(())
    }

    pub fn active_teachers(&self) -> Result<Vec<UserRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM user
                 WHERE role = 'teacher' AND is_active = 1
                 ORDER BY first_name, last_name, id"
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], user_from_row)
            .map_err(|e| Error::Database(format!("failed to query teachers: {e}")))?;

        let mut teachers = Vec::new();
        for row in rows {
            teachers
                .push(row.map_err(|e| Error::Database(format!("failed to read user row: {e}")))?);
        }
        Ok(teachers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(phone: &str, role: Role) -> NewUser {
        NewUser {
            first_name: "Test".into(),
            last_name: "User".into(),
            phone_number: phone.into(),
            email: None,
            password_hash: "hash".into(),
            role,
        }
    }

    #[test]
    fn create_and_get_user_round_trip() {
        let db = Database::in_memory().unwrap();
        let created = db.create_user(&new_user("01710000001", Role::Teacher)).unwrap();

        let user = db.get_user(created.id).unwrap().unwrap();
        assert_eq!(user.phone_number, "01710000001");
        assert_eq!(user.role, Role::Teacher);
        assert!(user.is_active);
        assert_eq!(user.sms_count, 0);
        assert!(user.last_login.is_none());
        assert_eq!(user.full_name(), "Test User");
    }

    #[test]
    fn duplicate_phone_numbers_are_rejected() {
        let db = Database::in_memory().unwrap();
        db.create_user(&new_user("01710000002", Role::Student)).unwrap();
        assert!(db.create_user(&new_user("01710000002", Role::Teacher)).is_err());
    }

    #[test]
    fn find_login_skips_inactive_users() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user(&new_user("01710000003", Role::Teacher)).unwrap();
        assert!(db.find_login("01710000003").unwrap().is_some());

        db.connection()
            .unwrap()
            .execute("UPDATE user SET is_active = 0 WHERE id = ?1", [user.id])
            .unwrap();
        assert!(db.find_login("01710000003").unwrap().is_none());
    }

    #[test]
    fn record_login_sets_last_login() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user(&new_user("01710000004", Role::Teacher)).unwrap();
        db.record_login(user.id).unwrap();
        assert!(db.get_user(user.id).unwrap().unwrap().last_login.is_some());
    }

    #[test]
    fn active_teachers_excludes_other_roles_and_inactive() {
        let db = Database::in_memory().unwrap();
        let t1 = db.create_user(&new_user("01710000010", Role::Teacher)).unwrap();
        let t2 = db.create_user(&new_user("01710000011", Role::Teacher)).unwrap();
        db.create_user(&new_user("01710000012", Role::Student)).unwrap();
        db.create_user(&new_user("01710000013", Role::SuperUser)).unwrap();

        db.connection()
            .unwrap()
            .execute(
                "UPDATE user SET is_active = 0, sms_count = 3 WHERE id = ?1",
                [t2.id],
            )
            .unwrap();

        let teachers = db.active_teachers().unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].id, t1.id);
    }
}
