/// Interaction event schema shared by the producers and the statistics consumers
///
/// The wire format is a flat JSON object (`postId`, `author`, `username`), one
/// topic per event kind. Two events with the same `(postId, username)` pair are
/// the same fact restated.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid interaction payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("interaction payload is missing {0}")]
    MissingField(&'static str),

    #[error("Unknown sort type: {0}")]
    UnknownKind(String),
}

/// Kind of interaction tracked by the pipeline. Each kind has its own topic and table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Like,
    View,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Like, EventKind::View];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Like => "like",
            EventKind::View => "view",
        }
    }

    /// Default channel name for this kind
    pub fn topic(&self) -> &'static str {
        match self {
            EventKind::Like => "likes",
            EventKind::View => "views",
        }
    }

    /// Aggregate table holding this kind's rows
    pub fn table(&self) -> &'static str {
        match self {
            EventKind::Like => "likes",
            EventKind::View => "views",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" | "likes" => Ok(EventKind::Like),
            "view" | "views" => Ok(EventKind::View),
            other => Err(SchemaError::UnknownKind(other.to_string())),
        }
    }
}

/// A single like or view, as published to the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Opaque id of the post acted upon
    #[serde(rename = "postId")]
    pub post_id: String,
    /// Owner of the post at event time, empty when unknown
    #[serde(default)]
    pub author: String,
    /// User who performed the action
    pub username: String,
}

impl InteractionEvent {
    pub fn new(
        post_id: impl Into<String>,
        author: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            author: author.into(),
            username: username.into(),
        }
    }

    /// Logical identity of the fact: `(post_id, username)`
    pub fn key(&self) -> (&str, &str) {
        (&self.post_id, &self.username)
    }

    /// All events of one post share a partition
    pub fn partition_key(&self) -> &str {
        &self.post_id
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, SchemaError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, SchemaError> {
        let event: InteractionEvent = serde_json::from_slice(payload)?;
        if event.post_id.trim().is_empty() {
            return Err(SchemaError::MissingField("postId"));
        }
        if event.username.trim().is_empty() {
            return Err(SchemaError::MissingField("username"));
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let event = InteractionEvent::new("42", "alice", "bob");
        let json: serde_json::Value =
            serde_json::from_slice(&event.to_payload().unwrap()).unwrap();

        assert_eq!(json["postId"], "42");
        assert_eq!(json["author"], "alice");
        assert_eq!(json["username"], "bob");
    }

    #[test]
    fn test_author_defaults_to_empty() {
        let event = InteractionEvent::from_payload(br#"{"postId":"7","username":"carol"}"#).unwrap();
        assert_eq!(event.author, "");
        assert_eq!(event.key(), ("7", "carol"));
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert!(matches!(
            InteractionEvent::from_payload(b"not json"),
            Err(SchemaError::Decode(_))
        ));
        assert!(matches!(
            InteractionEvent::from_payload(br#"{"postId":"","username":"bob"}"#),
            Err(SchemaError::MissingField("postId"))
        ));
        assert!(matches!(
            InteractionEvent::from_payload(br#"{"postId":"1","username":" "}"#),
            Err(SchemaError::MissingField("username"))
        ));
        assert!(InteractionEvent::from_payload(br#"{"postId":1,"username":"bob"}"#).is_err());
    }

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!("likes".parse::<EventKind>().unwrap(), EventKind::Like);
        assert_eq!("View".parse::<EventKind>().unwrap(), EventKind::View);
        assert!("shares".parse::<EventKind>().is_err());
        assert_eq!(EventKind::Like.topic(), "likes");
        assert_eq!(EventKind::View.table(), "views");
    }
}
