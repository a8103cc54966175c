use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::constants::LOCAL_ID_PREFIX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub connection_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
}

/// Client-generated id of a message the server has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(String);

impl LocalId {
    pub fn generate() -> Self {
        Self(format!(
            "{}-{}-{:08x}",
            LOCAL_ID_PREFIX,
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optimistic stand-in for a message while its insert is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub local_id: LocalId,
    pub connection_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn new(draft: &NewMessage) -> Self {
        Self {
            local_id: LocalId::generate(),
            connection_id: draft.connection_id,
            sender_id: draft.sender_id,
            content: draft.content.clone(),
            created_at: Utc::now(),
        }
    }
}

/// One row of a chat thread: either acknowledged by the server or still pending.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    Confirmed(Message),
    Pending(PendingMessage),
}

/// Identity of a chat entry, used to key the message list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Server(Uuid),
    Local(LocalId),
}

impl ChatEntry {
    pub fn key(&self) -> EntryKey {
        match self {
            ChatEntry::Confirmed(message) => EntryKey::Server(message.id),
            ChatEntry::Pending(pending) => EntryKey::Local(pending.local_id.clone()),
        }
    }

    pub fn sender_id(&self) -> Uuid {
        match self {
            ChatEntry::Confirmed(message) => message.sender_id,
            ChatEntry::Pending(pending) => pending.sender_id,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ChatEntry::Confirmed(message) => &message.content,
            ChatEntry::Pending(pending) => &pending.content,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ChatEntry::Confirmed(message) => message.created_at,
            ChatEntry::Pending(pending) => pending.created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ChatEntry::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ids_are_unique_and_prefixed() {
        let a = LocalId::generate();
        let b = LocalId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("temp-"));
    }

    #[test]
    fn test_entry_accessors() {
        let draft = NewMessage {
            connection_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "hi".to_string(),
        };
        let pending = PendingMessage::new(&draft);
        let entry = ChatEntry::Pending(pending.clone());
        assert!(entry.is_pending());
        assert_eq!(entry.content(), "hi");
        assert_eq!(entry.sender_id(), draft.sender_id);
        assert_eq!(entry.key(), EntryKey::Local(pending.local_id));
    }
}
