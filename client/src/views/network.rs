use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use super::ChatTarget;
use super::connection::{ConnectionMachine, ConnectionState};
use crate::backend::DataApi;
use crate::error::{BackendError, ClientError, ClientResult};
use crate::models::{Connection, ConnectionFilter, ConnectionStatus, Profile};
use crate::session::Session;
use crate::utils::format::pluralize;

/// A request waiting for the signed-in account to answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub connection: Connection,
    pub requester: Option<Profile>,
}

/// An accepted connection, with the other participant's profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub connection: Connection,
    pub profile: Option<Profile>,
}

/// Received requests and accepted connections of the signed-in account.
pub struct NetworkView<'a, D> {
    api: &'a D,
    session: &'a Session,
    pending: Vec<PendingRequest>,
    contacts: Vec<Contact>,
    load_failed: bool,
}

impl<'a, D: DataApi> NetworkView<'a, D> {
    pub async fn load(api: &'a D, session: &'a Session) -> Self {
        let mut view = Self {
            api,
            session,
            pending: Vec::new(),
            contacts: Vec::new(),
            load_failed: false,
        };
        view.refresh().await;
        view
    }

    /// Re-fetches both lists; a failed read is logged and marks the view.
    pub async fn refresh(&mut self) {
        match self.fetch().await {
            Ok((pending, contacts)) => {
                self.pending = pending;
                self.contacts = contacts;
                self.load_failed = false;
            }
            Err(e) => {
                error!("Error fetching connections: {}", e);
                self.load_failed = true;
            }
        }
    }

    async fn fetch(&self) -> Result<(Vec<PendingRequest>, Vec<Contact>), BackendError> {
        let me = self.session.user_id();

        let received = self
            .api
            .list_connections(ConnectionFilter::received_by(me).with_status(ConnectionStatus::Pending))
            .await?;
        let requester_ids: Vec<Uuid> = received.iter().map(|c| c.requester_id).collect();
        let mut requesters = by_user(self.api.list_profiles_by_ids(&requester_ids).await?);
        let pending = received
            .into_iter()
            .map(|connection| PendingRequest {
                requester: requesters.remove(&connection.requester_id),
                connection,
            })
            .collect();

        let accepted = self
            .api
            .list_connections(ConnectionFilter::involving(me).with_status(ConnectionStatus::Accepted))
            .await?;
        let other_ids: Vec<Uuid> = accepted.iter().filter_map(|c| c.counterpart(me)).collect();
        let mut others = by_user(self.api.list_profiles_by_ids(&other_ids).await?);
        let contacts = accepted
            .into_iter()
            .map(|connection| Contact {
                profile: connection.counterpart(me).and_then(|id| others.remove(&id)),
                connection,
            })
            .collect();

        Ok((pending, contacts))
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Received requests whose requester name matches `search`.
    pub fn pending(&self, search: &str) -> Vec<&PendingRequest> {
        let term = search.trim();
        self.pending
            .iter()
            .filter(|request| {
                term.is_empty()
                    || request
                        .requester
                        .as_ref()
                        .is_some_and(|profile| profile.name_matches(term))
            })
            .collect()
    }

    /// Accepted connections whose profile name or skills match `search`.
    pub fn contacts(&self, search: &str) -> Vec<&Contact> {
        let term = search.trim();
        self.contacts
            .iter()
            .filter(|contact| {
                term.is_empty()
                    || contact
                        .profile
                        .as_ref()
                        .is_some_and(|profile| profile.matches(term))
            })
            .collect()
    }

    /// e.g. "3 connections"
    pub fn summary(&self) -> String {
        pluralize(self.contacts.len(), "connection")
    }

    pub async fn accept(&mut self, connection_id: Uuid) -> ClientResult<ConnectionState> {
        let mut machine = self.machine_for_request(connection_id)?;
        let result = machine.accept(connection_id).await;
        self.refresh().await;
        result
    }

    pub async fn reject(&mut self, connection_id: Uuid) -> ClientResult<ConnectionState> {
        let mut machine = self.machine_for_request(connection_id)?;
        let result = machine.reject(connection_id).await;
        self.refresh().await;
        result
    }

    /// Where "message" on an accepted connection leads.
    pub fn chat_target(&self, connection_id: Uuid) -> Option<ChatTarget> {
        let me = self.session.user_id();
        self.contacts
            .iter()
            .find(|contact| contact.connection.id == connection_id)
            .and_then(|contact| {
                contact.connection.counterpart(me).map(|peer_id| ChatTarget {
                    connection_id,
                    peer_id,
                })
            })
    }

    fn machine_for_request(&self, connection_id: Uuid) -> ClientResult<ConnectionMachine<'a, D>> {
        let request = self
            .pending
            .iter()
            .find(|request| request.connection.id == connection_id)
            .ok_or_else(|| ClientError::Backend(BackendError::not_found("Connection request", connection_id)))?;

        Ok(ConnectionMachine::with_state(
            self.api,
            self.session,
            request.connection.requester_id,
            ConnectionState::PendingReceived { connection_id },
        ))
    }
}

fn by_user(profiles: Vec<Profile>) -> HashMap<Uuid, Profile> {
    profiles
        .into_iter()
        .map(|profile| (profile.user_id, profile))
        .collect()
}
