//! # Feed Events
//!
//! Push notifications from the remote channel, applied to warm caches by
//! `Store::handle_feed_event`.

use serde::{Deserialize, Serialize};

use super::RawMessage;

/// A change pushed by the remote channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A message was posted
    MessageCreated {
        /// The new message
        message: RawMessage,
    },

    /// A message's content was replaced
    MessageUpdated {
        /// The message after the edit
        message: RawMessage,
    },

    /// A message was removed
    MessageDeleted {
        /// Channel the message lived in
        channel_id: String,
        /// Id of the removed message
        message_id: String,
    },
}

impl FeedEvent {
    /// Channel the event belongs to
    pub fn channel_id(&self) -> &str {
        match self {
            FeedEvent::MessageCreated { message } | FeedEvent::MessageUpdated { message } => {
                &message.channel_id
            }
            FeedEvent::MessageDeleted { channel_id, .. } => channel_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let event = FeedEvent::MessageDeleted {
            channel_id: "users".into(),
            message_id: "m3".into(),
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "message_deleted", "channel_id": "users", "message_id": "m3"})
        );
        assert_eq!(event.channel_id(), "users");
    }

    #[test]
    fn test_parse_created() {
        let event: FeedEvent = serde_json::from_value(json!({
            "type": "message_created",
            "message": {"id": "m1", "channel_id": "users", "content": "{}"}
        }))
        .unwrap();

        assert_eq!(event.channel_id(), "users");
        assert!(matches!(event, FeedEvent::MessageCreated { ref message } if message.id == "m1"));
    }
}
