//! Seams to the managed backend platform.
//!
//! Views are generic over these traits. [`postgres::PgBackend`] talks to the
//! real platform; [`memory::MemoryBackend`] keeps everything in process.

pub mod feed;
pub mod memory;
pub mod postgres;

use std::future::Future;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Connection, ConnectionFilter, ConnectionStatus, Message, NewMessage, NewProfile, Profile,
    ProfileUpdate,
};
use crate::session::Session;

pub use feed::MessageFeed;
pub use memory::{MemoryBackend, StoredBlob};
pub use postgres::PgBackend;

/// Row-level data access plus the message change feed.
pub trait DataApi: Send + Sync {
    /// Fails with `NotFound` when the account has no profile row.
    fn get_profile(&self, user_id: Uuid) -> impl Future<Output = Result<Profile>> + Send;

    fn list_profiles_except(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Profile>>> + Send;

    fn list_profiles_by_ids(
        &self,
        user_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Profile>>> + Send;

    fn insert_profile(&self, profile: &NewProfile) -> impl Future<Output = Result<Profile>> + Send;

    fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<Profile>> + Send;

    fn list_connections(
        &self,
        filter: ConnectionFilter,
    ) -> impl Future<Output = Result<Vec<Connection>>> + Send;

    /// The single record relating `a` and `b` in either direction.
    fn find_connection_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> impl Future<Output = Result<Option<Connection>>> + Send;

    /// Creates a `pending` record. Fails with `DuplicateConnection` if the pair already has one.
    fn insert_connection(
        &self,
        requester_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = Result<Connection>> + Send;

    /// `None` when no row matched.
    fn update_connection_status(
        &self,
        connection_id: Uuid,
        status: ConnectionStatus,
    ) -> impl Future<Output = Result<Option<Connection>>> + Send;

    /// Returns rows affected.
    fn delete_connection(&self, connection_id: Uuid) -> impl Future<Output = Result<u64>> + Send;

    /// Deletes only while still pending. Returns rows affected.
    fn delete_pending_request(
        &self,
        requester_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Ascending by `created_at`.
    fn list_messages(
        &self,
        connection_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    fn insert_message(&self, message: &NewMessage) -> impl Future<Output = Result<Message>> + Send;

    /// Push feed of rows inserted into `messages` for one connection.
    fn subscribe_messages(
        &self,
        connection_id: Uuid,
    ) -> impl Future<Output = Result<MessageFeed>> + Send;
}

/// Account lifecycle, owned by the auth service.
pub trait AuthApi: Send + Sync {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> impl Future<Output = Result<Session>> + Send;

    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = Result<Session>> + Send;

    fn sign_out(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Requests an email change; the service sends a confirmation to the new address.
    fn update_email(
        &self,
        session: &Session,
        email: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Object storage for profile images.
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` under `object_name` as the signed-in account and
    /// returns its public URL.
    fn upload(
        &self,
        session: &Session,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}
