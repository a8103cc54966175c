//! Screen-level logic over the backend seams. Each view owns its loaded
//! state and exposes the actions its screen offers.

pub mod auth;
pub mod chat;
pub mod connection;
pub mod discover;
pub mod network;
pub mod peer;
pub mod profile;

pub use chat::{ChatView, MessageList, RenderedMessage};
pub use connection::{ConnectionMachine, ConnectionState};
pub use discover::{Candidate, DiscoverView};
pub use network::{Contact, NetworkView, PendingRequest};
pub use peer::PeerProfileView;
pub use profile::{ImageUpload, OwnProfileView, ProfileForm, ProfileSetup, SaveOutcome};

use uuid::Uuid;

/// What a chat screen needs to open: the accepted connection and who is on the other end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatTarget {
    pub connection_id: Uuid,
    pub peer_id: Uuid,
}
