use crate::Database;
use crate::models::{NotificationRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const NOTIFICATION_COLUMNS: &str =
    "n.id, n.receiver_id, n.title, n.data, n.created_at, n.sender_id, u.name, u.image";

impl Database {
    // -- Key-value --

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    /// Replace the value stored under `key` in a single statement.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                (key, value),
            )?;
            Ok(())
        })
    }

    /// Returns whether a row was removed.
    pub fn kv_delete(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
            Ok(n > 0)
        })
    }

    // -- Users --

    pub fn upsert_user(
        &self,
        id: &str,
        name: &str,
        username: Option<&str>,
        image: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, username, image) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name, username = excluded.username, image = excluded.image",
                rusqlite::params![id, name, username, image],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, username, image, created_at FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Case-insensitive substring match on name or username.
    pub fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_users(conn, query, limit))
    }

    // -- Notifications --

    pub fn insert_notification(
        &self,
        id: &str,
        receiver_id: &str,
        sender_id: Option<&str>,
        title: &str,
        data: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, receiver_id, sender_id, title, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, receiver_id, sender_id, title, data],
            )?;
            Ok(())
        })
    }

    /// Point lookup, joined with the sender's profile.
    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS}
                 FROM notifications n
                 LEFT JOIN users u ON n.sender_id = u.id
                 WHERE n.id = ?1"
            );
            conn.query_row(&sql, [id], notification_from_row).optional()
        })
    }

    /// All notifications for a receiver, newest first.
    pub fn get_notifications_for_receiver(&self, receiver_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| query_notifications(conn, receiver_id))
    }

    /// Returns whether a row was removed.
    pub fn delete_notification(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM notifications WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        receiver_id: row.get(1)?,
        title: row.get(2)?,
        data: row.get(3)?,
        created_at: row.get(4)?,
        sender_id: row.get(5)?,
        sender_name: row.get(6)?,
        sender_image: row.get(7)?,
    })
}

fn query_users(conn: &Connection, query: &str, limit: u32) -> Result<Vec<UserRow>> {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{}%", escaped);

    let mut stmt = conn.prepare(
        "SELECT id, name, username, image, created_at FROM users
         WHERE name LIKE ?1 ESCAPE '\\' OR username LIKE ?1 ESCAPE '\\'
         ORDER BY name
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![pattern, limit], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_notifications(conn: &Connection, receiver_id: &str) -> Result<Vec<NotificationRow>> {
    // JOIN users to fetch the sender profile in a single query
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS}
         FROM notifications n
         LEFT JOIN users u ON n.sender_id = u.id
         WHERE n.receiver_id = ?1
         ORDER BY n.created_at DESC, n.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([receiver_id], notification_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
