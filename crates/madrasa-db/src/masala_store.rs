use chrono::{DateTime, Utc};
use madrasa_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::database::{Database, datetime_column, now_timestamp};

/// A persisted Masala post, with its author's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasalaRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMasala {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author_id: i64,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_published: bool,
}

/// Field updates for a post. `None` leaves a field alone; for nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct MasalaChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct MasalaFilter {
    pub category: Option<String>,
    pub author_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MasalaPage {
    pub items: Vec<MasalaRecord>,
    pub total: u64,
}

const MASALA_SELECT: &str = "SELECT m.id, m.title, m.content, m.excerpt, m.author_id,
        TRIM(u.first_name || ' ' || u.last_name), m.category, m.image_url,
        m.is_published, m.views_count, m.created_at, m.updated_at
    FROM masala m
    LEFT JOIN user u ON u.id = m.author_id";

fn masala_from_row(row: &Row<'_>) -> rusqlite::Result<MasalaRecord> {
    Ok(MasalaRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        excerpt: row.get(3)?,
        author_id: row.get(4)?,
        author_name: row.get(5)?,
        category: row.get(6)?,
        image_url: row.get(7)?,
        is_published: row.get(8)?,
        views_count: row.get(9)?,
        created_at: datetime_column(row, 10)?,
        updated_at: datetime_column(row, 11)?,
    })
}

fn fetch(conn: &Connection, id: i64) -> Result<Option<MasalaRecord>> {
    conn.query_row(
        &format!("{MASALA_SELECT} WHERE m.id = ?1"),
        params![id],
        masala_from_row,
    )
    .optional()
    .map_err(|e| Error::Database(format!("failed to load masala {id}: {e}")))
}

fn collect_rows(rows: impl Iterator<Item = rusqlite::Result<MasalaRecord>>) -> Result<Vec<MasalaRecord>> {
    rows.map(|row| row.map_err(|e| Error::Database(format!("failed to read masala row: {e}"))))
        .collect()
}

impl Database {
    /// One page of published posts, newest first. `page` is 1-based.
    pub fn list_published(
        &self,
        filter: &MasalaFilter,
        page: u32,
        per_page: u32,
    ) -> Result<MasalaPage> {
        let conn = self.connection()?;
        let where_clause = "WHERE m.is_published = 1
              AND (?1 IS NULL OR m.category = ?1)
              AND (?2 IS NULL OR m.author_id = ?2)";

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM masala m {where_clause}"),
                params![filter.category, filter.author_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to count masala: {e}")))?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let mut stmt = conn
            .prepare(&format!(
                "{MASALA_SELECT} {where_clause}
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?3 OFFSET ?4"
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(
                params![filter.category, filter.author_id, per_page, offset],
                masala_from_row,
            )
            .map_err(|e| Error::Database(format!("failed to query masala: {e}")))?;

        Ok(MasalaPage {
            items: collect_rows(rows)?,
            total: total as u64,
        })
    }

    pub fn get_masala(&self, id: i64) -> Result<Option<MasalaRecord>> {
        let conn = self.connection()?;
        fetch(&conn, id)
    }

    /// Bump the view counter and return the updated post.
    pub fn increment_views(&self, id: i64) -> Result<Option<MasalaRecord>> {
        let conn = self.connection()?;
        conn.execute(
            "UPDATE masala SET views_count = views_count + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(|e| Error::Database(format!("failed to count view: {e}")))?;
        fetch(&conn, id)
    }

    /// Every post by `author_id`, published or not, newest first.
    pub fn masala_by_author(&self, author_id: i64) -> Result<Vec<MasalaRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "{MASALA_SELECT} WHERE m.author_id = ?1 ORDER BY m.created_at DESC, m.id DESC"
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![author_id], masala_from_row)
            .map_err(|e| Error::Database(format!("failed to query masala: {e}")))?;
        collect_rows(rows)
    }

    pub fn insert_masala(&self, new: &NewMasala) -> Result<MasalaRecord> {
        let now = now_timestamp();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO masala (title, content, excerpt, author_id, category, image_url,
                                 is_published, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                new.title,
                new.content,
                new.excerpt,
                new.author_id,
                new.category,
                new.image_url,
                new.is_published,
                now,
            ],
        )
        .map_err(|e| Error::Database(format!("failed to create masala: {e}")))?;

        let id = conn.last_insert_rowid();
        fetch(&conn, id)?
            .ok_or_else(|| Error::Database(format!("masala {id} vanished after insert")))
    }

    /// Apply `changes` and bump `updated_at`. `None` when the post is gone.
    pub fn update_masala(&self, id: i64, changes: &MasalaChanges) -> Result<Option<MasalaRecord>> {
        let conn = self.connection()?;
        let Some(mut masala) = fetch(&conn, id)? else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            masala.title = title.clone();
        }
        if let Some(content) = &changes.content {
            masala.content = content.clone();
        }
        if let Some(excerpt) = &changes.excerpt {
            masala.excerpt = excerpt.clone();
        }
        if let Some(category) = &changes.category {
            masala.category = category.clone();
        }
        if let Some(image_url) = &changes.image_url {
            masala.image_url = image_url.clone();
        }
        if let Some(is_published) = changes.is_published {
            masala.is_published = is_published;
        }

        conn.execute(
            "UPDATE masala SET title = ?1, content = ?2, excerpt = ?3, category = ?4,
                               image_url = ?5, is_published = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                masala.title,
                masala.content,
                masala.excerpt,
                masala.category,
                masala.image_url,
                masala.is_published,
                now_timestamp(),
                id,
            ],
        )
        .map_err(|e| Error::Database(format!("failed to update masala: {e}")))?;

        fetch(&conn, id)
    }

    /// Returns whether a post was deleted.
    pub fn delete_masala(&self, id: i64) -> Result<bool> {
        let conn = self.connection()?;
        let deleted = conn
            .execute("DELETE FROM masala WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(format!("failed to delete masala: {e}")))?;
        Ok(deleted > 0)
    }

    /// Distinct non-empty categories among published posts.
    pub fn published_categories(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT category FROM masala
                 WHERE category IS NOT NULL AND category != '' AND is_published = 1
                 ORDER BY category",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to query categories: {e}")))?;

        rows.collect::<rusqlite::Result<_>>()
            .map_err(|e| Error::Database(format!("failed to read category: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use madrasa_common::Role;

    use super::*;
    use crate::user_store::NewUser;

    fn author(db: &Database, phone: &str) -> i64 {
        db.create_user(&NewUser {
            first_name: "Ustadh".into(),
            last_name: "Karim".into(),
            phone_number: phone.into(),
            email: None,
            password_hash: "hash".into(),
            role: Role::Teacher,
        })
        .unwrap()
        .id
    }

    fn post(author_id: i64, title: &str, category: Option<&str>, published: bool) -> NewMasala {
        NewMasala {
            title: title.into(),
            content: format!("{title} content"),
            excerpt: None,
            author_id,
            category: category.map(Into::into),
            image_url: None,
            is_published: published,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = Database::in_memory().unwrap();
        let author_id = author(&db, "01900000001");

        let created = db
            .insert_masala(&post(author_id, "Patience", Some("akhlaq"), true))
            .unwrap();
        let loaded = db.get_masala(created.id).unwrap().unwrap();

        assert_eq!(loaded.title, "Patience");
        assert_eq!(loaded.author_name.as_deref(), Some("Ustadh Karim"));
        assert_eq!(loaded.category.as_deref(), Some("akhlaq"));
        assert!(loaded.is_published);
        assert_eq!(loaded.views_count, 0);
    }

    #[test]
    fn second_page_of_fifteen_has_five() {
        let db = Database::in_memory().unwrap();
        let author_id = author(&db, "01900000002");
        for i in 0..15 {
            db.insert_masala(&post(author_id, &format!("post {i}"), None, true))
                .unwrap();
        }
        db.insert_masala(&post(author_id, "draft", None, false))
            .unwrap();

        let page = db.list_published(&MasalaFilter::default(), 2, 10).unwrap();
        assert_eq!(page.total, 15);
        assert_eq!(page.items.len(), 5);
        // Newest first: page 2 holds the five oldest.
        assert_eq!(page.items[4].title, "post 0");
    }

    #[test]
    fn list_filters_by_category_and_author() {
        let db = Database::in_memory().unwrap();
        let a = author(&db, "01900000003");
        let b = author(&db, "01900000004");
        db.insert_masala(&post(a, "a1", Some("fiqh"), true)).unwrap();
        db.insert_masala(&post(a, "a2", Some("seerah"), true)).unwrap();
        db.insert_masala(&post(b, "b1", Some("fiqh"), true)).unwrap();

        let fiqh = MasalaFilter {
            category: Some("fiqh".into()),
            author_id: None,
        };
        assert_eq!(db.list_published(&fiqh, 1, 10).unwrap().total, 2);

        let fiqh_by_a = MasalaFilter {
            category: Some("fiqh".into()),
            author_id: Some(a),
        };
        let page = db.list_published(&fiqh_by_a, 1, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "a1");
    }

    #[test]
    fn increment_views_counts_each_read() {
        let db = Database::in_memory().unwrap();
        let author_id = author(&db, "01900000005");
        let created = db.insert_masala(&post(author_id, "views", None, true)).unwrap();

        db.increment_views(created.id).unwrap();
        let after = db.increment_views(created.id).unwrap().unwrap();
        assert_eq!(after.views_count, 2);
        assert!(db.increment_views(9999).unwrap().is_none());
    }

    #[test]
    fn update_applies_only_given_fields() {
        let db = Database::in_memory().unwrap();
        let author_id = author(&db, "01900000006");
        let created = db
            .insert_masala(&post(author_id, "old", Some("fiqh"), true))
            .unwrap();

        let changes = MasalaChanges {
            title: Some("new".into()),
            category: Some(None),
            ..Default::default()
        };
        let updated = db.update_masala(created.id, &changes).unwrap().unwrap();

        assert_eq!(updated.title, "new");
        assert_eq!(updated.content, "old content");
        assert!(updated.category.is_none());
        assert!(updated.updated_at >= created.updated_at);
        assert!(
            db.update_masala(9999, &MasalaChanges::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn masala_by_author_includes_drafts() {
        let db = Database::in_memory().unwrap();
        let a = author(&db, "01900000007");
        let b = author(&db, "01900000008");
        db.insert_masala(&post(a, "published", None, true)).unwrap();
        db.insert_masala(&post(a, "draft", None, false)).unwrap();
        db.insert_masala(&post(b, "other", None, true)).unwrap();

        let mine = db.masala_by_author(a).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].title, "draft");
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let db = Database::in_memory().unwrap();
        let author_id = author(&db, "01900000009");
        let created = db.insert_masala(&post(author_id, "gone", None, true)).unwrap();

        assert!(db.delete_masala(created.id).unwrap());
        assert!(!db.delete_masala(created.id).unwrap());
        assert!(db.get_masala(created.id).unwrap().is_none());
    }

    #[test]
    fn categories_are_distinct_and_published_only() {
        let db = Database::in_memory().unwrap();
        let author_id = author(&db, "01900000010");
        db.insert_masala(&post(author_id, "1", Some("seerah"), true)).unwrap();
        db.insert_masala(&post(author_id, "2", Some("fiqh"), true)).unwrap();
        db.insert_masala(&post(author_id, "3", Some("fiqh"), true)).unwrap();
        db.insert_masala(&post(author_id, "4", Some("hidden"), false)).unwrap();
        db.insert_masala(&post(author_id, "5", None, true)).unwrap();
        db.insert_masala(&post(author_id, "6", Some(""), true)).unwrap();

        assert_eq!(db.published_categories().unwrap(), vec!["fiqh", "seerah"]);
    }
}
