use serde::{Deserialize, Serialize};

/// Row-change events delivered over a realtime channel.
///
/// Events carry the raw row only. Joined fields (such as a notification's
/// sender profile) have to be fetched separately by the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    /// A notification row was inserted
    NotificationInsert {
        id: String,
        receiver_id: String,
        sender_id: Option<String>,
        created_at: String,
    },
}

impl ChangeEvent {
    /// The user whose rows this event concerns. Channels are filtered on
    /// this value.
    pub fn receiver_id(&self) -> &str {
        match self {
            Self::NotificationInsert { receiver_id, .. } => receiver_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_tagged() {
        let event = ChangeEvent::NotificationInsert {
            id: "n1".into(),
            receiver_id: "u1".into(),
            sender_id: None,
            created_at: "2026-03-01 10:00:00".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "NotificationInsert");
        assert_eq!(json["data"]["receiver_id"], "u1");
        assert_eq!(event.receiver_id(), "u1");
    }
}
