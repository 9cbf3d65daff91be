/// Database row types — these map directly to SQLite rows.
/// Distinct from critter-types models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub image: Option<String>,
    pub created_at: String,
}

/// A notification joined with its sender's profile columns.
pub struct NotificationRow {
    pub id: String,
    pub receiver_id: String,
    pub title: String,
    pub data: String,
    pub created_at: String,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_image: Option<String>,
}
