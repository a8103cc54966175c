use tracing::error;
use uuid::Uuid;

use super::ChatTarget;
use super::connection::{ConnectionMachine, ConnectionState};
use crate::backend::DataApi;
use crate::error::{ClientError, ClientResult};
use crate::models::Profile;
use crate::session::Session;

/// Another account's profile and the relationship to it.
pub struct PeerProfileView<'a, D> {
    profile: Option<Profile>,
    machine: ConnectionMachine<'a, D>,
    load_failed: bool,
}

impl<'a, D: DataApi> PeerProfileView<'a, D> {
    /// Fails with `OwnProfile` for the signed-in account's id; read failures
    /// degrade to an empty view.
    pub async fn load(api: &'a D, session: &'a Session, peer: Uuid) -> ClientResult<Self> {
        if session.is(peer) {
            return Err(ClientError::OwnProfile);
        }

        let mut machine = ConnectionMachine::with_state(api, session, peer, ConnectionState::None);
        let (profile, state) = tokio::join!(api.get_profile(peer), machine.refresh());

        let mut load_failed = false;
        let profile = match profile {
            Ok(profile) => Some(profile),
            Err(e) => {
                error!("Error fetching profile {}: {}", peer, e);
                load_failed = true;
                None
            }
        };
        if let Err(e) = state {
            error!("Error fetching connection status with {}: {}", peer, e);
            load_failed = true;
        }

        Ok(Self {
            profile,
            machine,
            load_failed,
        })
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub async fn request(&mut self) -> ClientResult<ConnectionState> {
        self.machine.request().await
    }

    pub async fn cancel(&mut self) -> ClientResult<ConnectionState> {
        let state = self.machine.state();
        match state {
            ConnectionState::PendingSent { connection_id } => self.machine.cancel(connection_id).await,
            _ => Err(ClientError::InvalidTransition {
                action: "cancel",
                state,
            }),
        }
    }

    /// Only reachable once the connection is accepted.
    pub fn chat_target(&self) -> Option<ChatTarget> {
        match self.machine.state() {
            ConnectionState::Accepted { connection_id } => Some(ChatTarget {
                connection_id,
                peer_id: self.machine.peer(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::ConnectionStatus;

    #[tokio::test]
    async fn test_own_profile_is_refused() {
        let backend = MemoryBackend::new();
        let me = backend.seed_user("me@example.com", "Me", &[]).await.unwrap();

        assert!(matches!(
            PeerProfileView::load(&backend, &me, me.user_id()).await,
            Err(ClientError::OwnProfile)
        ));
    }

    #[tokio::test]
    async fn test_request_cancel_and_chat_target() {
        let backend = MemoryBackend::new();
        let me = backend.seed_user("me@example.com", "Me", &[]).await.unwrap();
        let ada = backend.seed_user("ada@example.com", "Ada", &["Rust"]).await.unwrap();

        let mut view = PeerProfileView::load(&backend, &me, ada.user_id()).await.unwrap();
        assert_eq!(view.profile().map(|p| p.full_name.as_str()), Some("Ada"));
        assert_eq!(view.state(), ConnectionState::None);
        assert!(view.chat_target().is_none());

        let sent = view.request().await.unwrap();
        assert!(view.chat_target().is_none());
        assert_eq!(view.cancel().await.unwrap(), ConnectionState::None);

        let again = view.request().await.unwrap();
        assert_ne!(again, sent);
        backend
            .update_connection_status(again.connection_id().unwrap(), ConnectionStatus::Accepted)
            .await
            .unwrap();

        let view = PeerProfileView::load(&backend, &me, ada.user_id()).await.unwrap();
        assert_eq!(
            view.chat_target(),
            Some(ChatTarget {
                connection_id: again.connection_id().unwrap(),
                peer_id: ada.user_id()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_profile_degrades() {
        let backend = MemoryBackend::new();
        let me = backend.seed_user("me@example.com", "Me", &[]).await.unwrap();

        let view = PeerProfileView::load(&backend, &me, Uuid::new_v4()).await.unwrap();
        assert!(view.load_failed());
        assert!(view.profile().is_none());
    }
}
