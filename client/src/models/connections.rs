use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "connection_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Pending => write!(f, "pending"),
            ConnectionStatus::Accepted => write!(f, "accepted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Connection {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.recipient_id == user_id
    }

    /// The participant that is not `user_id`, if `user_id` takes part at all.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if self.requester_id == user_id {
            Some(self.recipient_id)
        } else if self.recipient_id == user_id {
            Some(self.requester_id)
        } else {
            None
        }
    }

    /// True when this record relates `a` and `b`, in either role.
    pub fn joins(&self, a: Uuid, b: Uuid) -> bool {
        (self.requester_id == a && self.recipient_id == b)
            || (self.requester_id == b && self.recipient_id == a)
    }
}

/// Row filter for listing connections. Unset fields do not constrain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionFilter {
    pub requester: Option<Uuid>,
    pub recipient: Option<Uuid>,
    /// Matches either role
    pub participant: Option<Uuid>,
    pub status: Option<ConnectionStatus>,
}

impl ConnectionFilter {
    pub fn involving(user_id: Uuid) -> Self {
        Self {
            participant: Some(user_id),
            ..Self::default()
        }
    }

    pub fn received_by(user_id: Uuid) -> Self {
        Self {
            recipient: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn accepts(&self, connection: &Connection) -> bool {
        self.requester.is_none_or(|id| connection.requester_id == id)
            && self.recipient.is_none_or(|id| connection.recipient_id == id)
            && self.participant.is_none_or(|id| connection.involves(id))
            && self.status.is_none_or(|status| connection.status == status)
    }
}
