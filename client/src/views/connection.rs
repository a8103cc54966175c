//! Relationship between the signed-in account and one other account.
//!
//! ```text
//! None --request--> PendingSent --cancel--> None
//! None <--reject-- PendingReceived --accept--> Accepted
//! ```
//!
//! Rejection deletes the record, so a rejected pair is indistinguishable from
//! one that never connected. Every mutation is followed by a re-fetch of the
//! record, which is the only reconciliation against concurrent changes made
//! by the other party.

use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

use crate::backend::DataApi;
use crate::error::{BackendError, ClientError, ClientResult};
use crate::models::{Connection, ConnectionStatus};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    None,
    /// The signed-in account is the requester
    PendingSent { connection_id: Uuid },
    /// The signed-in account is the recipient
    PendingReceived { connection_id: Uuid },
    Accepted { connection_id: Uuid },
}

impl ConnectionState {
    /// State of the pair as seen by `me`, given the pair's record if one exists.
    pub fn from_record(me: Uuid, record: Option<&Connection>) -> Self {
        match record {
            None => ConnectionState::None,
            Some(connection) => match connection.status {
                ConnectionStatus::Accepted => ConnectionState::Accepted {
                    connection_id: connection.id,
                },
                ConnectionStatus::Pending if connection.requester_id == me => {
                    ConnectionState::PendingSent {
                        connection_id: connection.id,
                    }
                }
                ConnectionStatus::Pending => ConnectionState::PendingReceived {
                    connection_id: connection.id,
                },
            },
        }
    }

    pub fn connection_id(&self) -> Option<Uuid> {
        match *self {
            ConnectionState::None => None,
            ConnectionState::PendingSent { connection_id }
            | ConnectionState::PendingReceived { connection_id }
            | ConnectionState::Accepted { connection_id } => Some(connection_id),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ConnectionState::Accepted { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::None => write!(f, "not connected"),
            ConnectionState::PendingSent { .. } => write!(f, "pending (sent)"),
            ConnectionState::PendingReceived { .. } => write!(f, "pending (received)"),
            ConnectionState::Accepted { .. } => write!(f, "connected"),
        }
    }
}

/// Drives the connection lifecycle for one (me, peer) pair.
pub struct ConnectionMachine<'a, D> {
    api: &'a D,
    me: Uuid,
    peer: Uuid,
    state: ConnectionState,
}

impl<'a, D: DataApi> ConnectionMachine<'a, D> {
    /// Starts from a state the caller already knows, without a fetch.
    pub fn with_state(api: &'a D, session: &Session, peer: Uuid, state: ConnectionState) -> Self {
        Self {
            api,
            me: session.user_id(),
            peer,
            state,
        }
    }

    pub async fn load(api: &'a D, session: &Session, peer: Uuid) -> Result<Self, BackendError> {
        let mut machine = Self::with_state(api, session, peer, ConnectionState::None);
        machine.refresh().await?;
        Ok(machine)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Uuid {
        self.peer
    }

    /// Replaces the local state with the authoritative record.
    pub async fn refresh(&mut self) -> Result<ConnectionState, BackendError> {
        let record = self.api.find_connection_between(self.me, self.peer).await?;
        self.state = ConnectionState::from_record(self.me, record.as_ref());
        Ok(self.state)
    }

    pub async fn request(&mut self) -> ClientResult<ConnectionState> {
        self.expect_state("request", |state| matches!(state, ConnectionState::None))?;

        match self.api.insert_connection(self.me, self.peer).await {
            Ok(connection) => {
                info!("Sent connection request {} to {}", connection.id, self.peer);
                self.state = ConnectionState::PendingSent {
                    connection_id: connection.id,
                };
                self.settle().await;
                Ok(self.state)
            }
            Err(e @ BackendError::DuplicateConnection { .. }) => {
                info!("Connection request to {} already exists, reconciling", self.peer);
                self.settle().await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn accept(&mut self, connection_id: Uuid) -> ClientResult<ConnectionState> {
        self.expect_state("accept", |state| {
            state == ConnectionState::PendingReceived { connection_id }
        })?;

        match self
            .api
            .update_connection_status(connection_id, ConnectionStatus::Accepted)
            .await?
        {
            Some(_) => {
                info!("Accepted connection {}", connection_id);
                self.state = ConnectionState::Accepted { connection_id };
                self.settle().await;
                Ok(self.state)
            }
            None => self.superseded("accept").await,
        }
    }

    pub async fn reject(&mut self, connection_id: Uuid) -> ClientResult<ConnectionState> {
        self.expect_state("reject", |state| {
            state == ConnectionState::PendingReceived { connection_id }
        })?;

        if self.api.delete_connection(connection_id).await? == 0 {
            return self.superseded("reject").await;
        }
        info!("Rejected connection {}", connection_id);
        self.state = ConnectionState::None;
        self.settle().await;
        Ok(self.state)
    }

    /// Withdraws a sent request. The delete only matches while the record is
    /// still pending, so it cannot remove a connection accepted meanwhile.
    pub async fn cancel(&mut self, connection_id: Uuid) -> ClientResult<ConnectionState> {
        self.expect_state("cancel", |state| {
            state == ConnectionState::PendingSent { connection_id }
        })?;

        if self.api.delete_pending_request(self.me, self.peer).await? == 0 {
            return self.superseded("cancel").await;
        }
        info!("Cancelled connection request {}", connection_id);
        self.state = ConnectionState::None;
        self.settle().await;
        Ok(self.state)
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: impl Fn(ConnectionState) -> bool,
    ) -> ClientResult<()> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(ClientError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    /// Post-mutation re-fetch. A failed read keeps the locally derived state.
    async fn settle(&mut self) {
        if let Err(e) = self.refresh().await {
            error!("Failed to refresh connection with {}: {}", self.peer, e);
        }
    }

    async fn superseded(&mut self, action: &'static str) -> ClientResult<ConnectionState> {
        self.settle().await;
        info!("{} on connection with {} matched nothing, now {}", action, self.peer, self.state);
        Err(ClientError::Superseded {
            action,
            state: self.state,
        })
    }
}
