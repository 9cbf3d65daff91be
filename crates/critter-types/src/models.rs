use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// -- Users --

/// A user as returned by search, copied into the recent-search cache at
/// selection time. Fields other than `id` are display-only and may be
/// stale once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Any other profile fields the search collaborator returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            username: None,
            image: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

// -- Recent searches --

/// One persisted recent-search record. Serialized as a flat JSON object:
/// the snapshot fields plus `searchedAt` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSearchEntry {
    #[serde(flatten)]
    pub user: UserSnapshot,
    #[serde(rename = "searchedAt")]
    pub searched_at: i64,
}

/// Keys owned by the entry itself; an `extra` field with one of these
/// names would be written twice and make the stored blob unreadable.
const RESERVED_KEYS: [&str; 5] = ["id", "name", "username", "image", "searchedAt"];

impl RecentSearchEntry {
    /// The fresh `searched_at` always wins over a same-named profile field.
    pub fn new(mut user: UserSnapshot, searched_at: i64) -> Self {
        for key in RESERVED_KEYS {
            user.extra.remove(key);
        }
        Self { user, searched_at }
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }
}

// -- Notifications --

/// Denormalized profile of whoever triggered a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub id: String,
    /// JSON-encoded payload; see [`NotificationEntry::target`].
    pub data: String,
    pub title: String,
    pub created_at: String,
    #[serde(default)]
    pub sender: Option<Sender>,
}

/// What a notification points at once its `data` payload is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    User {
        user_id: String,
    },
    Post {
        post_id: String,
        comment_id: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    user_id: Option<String>,
    post_id: Option<String>,
    comment_id: Option<String>,
}

impl NotificationEntry {
    /// Decodes the `data` payload. Post references win over user
    /// references when both are present. Returns `None` for malformed
    /// payloads or payloads that reference nothing.
    pub fn target(&self) -> Option<NotificationTarget> {
        let raw: RawTarget = serde_json::from_str(&self.data).ok()?;
        match (raw.post_id, raw.user_id) {
            (Some(post_id), _) => Some(NotificationTarget::Post {
                post_id,
                comment_id: raw.comment_id,
            }),
            (None, Some(user_id)) => Some(NotificationTarget::User { user_id }),
            (None, None) => None,
        }
    }

    /// Parses `created_at`, accepting RFC 3339 as well as SQLite's
    /// `YYYY-MM-DD HH:MM:SS` (implicitly UTC).
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .parse::<DateTime<Utc>>()
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|ndt| ndt.and_utc())
            })
    }
}
