use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use super::connection::{ConnectionMachine, ConnectionState};
use crate::backend::DataApi;
use crate::error::{BackendError, ClientError, ClientResult};
use crate::models::{ConnectionFilter, Profile};
use crate::session::Session;

/// A discoverable account with its relationship to the signed-in one.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'v> {
    pub profile: &'v Profile,
    pub state: ConnectionState,
}

/// Accounts the signed-in user may connect with.
pub struct DiscoverView<'a, D> {
    api: &'a D,
    session: &'a Session,
    profiles: Vec<Profile>,
    states: HashMap<Uuid, ConnectionState>,
    load_failed: bool,
}

impl<'a, D: DataApi> DiscoverView<'a, D> {
    /// Loads profiles and connection states. A failed read leaves the view
    /// empty with `load_failed` set.
    pub async fn load(api: &'a D, session: &'a Session) -> Self {
        let mut view = Self {
            api,
            session,
            profiles: Vec::new(),
            states: HashMap::new(),
            load_failed: false,
        };
        if let Err(e) = view.reload().await {
            error!("Error fetching discover profiles: {}", e);
            view.load_failed = true;
        }
        view
    }

    pub async fn reload(&mut self) -> Result<(), BackendError> {
        let me = self.session.user_id();
        let profiles = self.api.list_profiles_except(me).await?;
        let connections = self.api.list_connections(ConnectionFilter::involving(me)).await?;

        self.states = connections
            .iter()
            .filter_map(|connection| {
                connection
                    .counterpart(me)
                    .map(|other| (other, ConnectionState::from_record(me, Some(connection))))
            })
            .collect();
        self.profiles = profiles;
        self.load_failed = false;
        Ok(())
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn state_of(&self, user_id: Uuid) -> ConnectionState {
        self.states
            .get(&user_id)
            .copied()
            .unwrap_or(ConnectionState::None)
    }

    /// Everyone except the signed-in account and its accepted connections,
    /// narrowed by a name or skill search.
    pub fn candidates(&self, search: &str) -> Vec<Candidate<'_>> {
        let me = self.session.user_id();
        self.profiles
            .iter()
            .filter(|profile| profile.user_id != me)
            .map(|profile| Candidate {
                profile,
                state: self.state_of(profile.user_id),
            })
            .filter(|candidate| !candidate.state.is_accepted())
            .filter(|candidate| candidate.profile.matches(search.trim()))
            .collect()
    }

    pub async fn request(&mut self, peer: Uuid) -> ClientResult<ConnectionState> {
        let mut machine = ConnectionMachine::with_state(self.api, self.session, peer, self.state_of(peer));
        let result = machine.request().await;
        self.record(peer, machine.state());
        result
    }

    pub async fn cancel(&mut self, peer: Uuid) -> ClientResult<ConnectionState> {
        let state = self.state_of(peer);
        let ConnectionState::PendingSent { connection_id } = state else {
            return Err(ClientError::InvalidTransition {
                action: "cancel",
                state,
            });
        };
        let mut machine = ConnectionMachine::with_state(self.api, self.session, peer, state);
        let result = machine.cancel(connection_id).await;
        self.record(peer, machine.state());
        result
    }

    fn record(&mut self, peer: Uuid, state: ConnectionState) {
        if state == ConnectionState::None {
            self.states.remove(&peer);
        } else {
            self.states.insert(peer, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::ConnectionStatus;

    struct World {
        backend: MemoryBackend,
        me: Session,
        ada: Session,
        bob: Session,
        eve: Session,
    }

    async fn world() -> World {
        let backend = MemoryBackend::new();
        let me = backend.seed_user("me@example.com", "Me Myself", &["Rust"]).await.unwrap();
        let ada = backend.seed_user("ada@example.com", "Ada Lovelace", &["Math", "Rust"]).await.unwrap();
        let bob = backend.seed_user("bob@example.com", "Bob Builder", &["Go"]).await.unwrap();
        let eve = backend.seed_user("eve@example.com", "Eve Adams", &["Kotlin"]).await.unwrap();
        World { backend, me, ada, bob, eve }
    }

    fn names(candidates: &[Candidate<'_>]) -> Vec<String> {
        candidates.iter().map(|c| c.profile.full_name.clone()).collect()
    }

    #[tokio::test]
    async fn test_excludes_self_and_accepted() {
        let w = world().await;
        let accepted = w.backend.insert_connection(w.ada.user_id(), w.me.user_id()).await.unwrap();
        w.backend
            .update_connection_status(accepted.id, ConnectionStatus::Accepted)
            .await
            .unwrap();
        w.backend.insert_connection(w.me.user_id(), w.bob.user_id()).await.unwrap();

        let view = DiscoverView::load(&w.backend, &w.me).await;
        let candidates = view.candidates("");

        assert_eq!(names(&candidates), vec!["Bob Builder", "Eve Adams"]);
        assert!(candidates.iter().all(|c| c.profile.user_id != w.me.user_id()));
        assert!(matches!(
            view.state_of(w.bob.user_id()),
            ConnectionState::PendingSent { .. }
        ));
        assert_eq!(view.state_of(w.eve.user_id()), ConnectionState::None);
    }

    #[tokio::test]
    async fn test_search_by_name_or_skill() {
        let w = world().await;
        let view = DiscoverView::load(&w.backend, &w.me).await;

        assert_eq!(names(&view.candidates("ada")), vec!["Ada Lovelace", "Eve Adams"]);
        assert_eq!(names(&view.candidates("RUST")), vec!["Ada Lovelace"]);
        assert!(view.candidates("haskell").is_empty());
    }

    #[tokio::test]
    async fn test_request_and_cancel_update_states() {
        let w = world().await;
        let mut view = DiscoverView::load(&w.backend, &w.me).await;

        let sent = view.request(w.eve.user_id()).await.unwrap();
        assert!(matches!(sent, ConnectionState::PendingSent { .. }));
        assert_eq!(view.state_of(w.eve.user_id()), sent);

        view.cancel(w.eve.user_id()).await.unwrap();
        assert_eq!(view.state_of(w.eve.user_id()), ConnectionState::None);
        assert!(
            w.backend
                .find_connection_between(w.me.user_id(), w.eve.user_id())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_request_reconciles_view() {
        let w = world().await;
        let mut view = DiscoverView::load(&w.backend, &w.me).await;
        // Bob asked first, after this view was loaded
        w.backend.insert_connection(w.bob.user_id(), w.me.user_id()).await.unwrap();

        let err = view.request(w.bob.user_id()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Backend(BackendError::DuplicateConnection { .. })
        ));
        assert!(matches!(
            view.state_of(w.bob.user_id()),
            ConnectionState::PendingReceived { .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_without_sent_request() {
        let w = world().await;
        let mut view = DiscoverView::load(&w.backend, &w.me).await;

        assert!(matches!(
            view.cancel(w.ada.user_id()).await,
            Err(ClientError::InvalidTransition { action: "cancel", .. })
        ));
    }

    #[tokio::test]
    async fn test_read_failure_degrades_to_empty() {
        let w = world().await;
        w.backend.set_offline(true);

        let view = DiscoverView::load(&w.backend, &w.me).await;
        assert!(view.load_failed());
        assert!(view.candidates("").is_empty());
    }
}
