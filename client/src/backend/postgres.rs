use sqlx::PgPool;
use uuid::Uuid;

use super::{DataApi, MessageFeed};
use crate::db;
use crate::error::Result;
use crate::models::{
    Connection, ConnectionFilter, ConnectionStatus, Message, NewMessage, NewProfile, Profile,
    ProfileUpdate,
};

/// Data access against the platform's Postgres database.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DataApi for PgBackend {
    async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        db::profiles::get_profile(&self.pool, user_id).await
    }

    async fn list_profiles_except(&self, user_id: Uuid) -> Result<Vec<Profile>> {
        db::profiles::list_profiles_except(&self.pool, user_id).await
    }

    async fn list_profiles_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
        db::profiles::list_profiles_by_ids(&self.pool, user_ids).await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        db::profiles::insert_profile(&self.pool, profile).await
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
        db::profiles::update_profile(&self.pool, user_id, update).await
    }

    async fn list_connections(&self, filter: ConnectionFilter) -> Result<Vec<Connection>> {
        db::connections::list_connections(&self.pool, filter).await
    }

    async fn find_connection_between(&self, a: Uuid, b: Uuid) -> Result<Option<Connection>> {
        db::connections::find_connection_between(&self.pool, a, b).await
    }

    async fn insert_connection(&self, requester_id: Uuid, recipient_id: Uuid) -> Result<Connection> {
        db::connections::insert_connection(&self.pool, requester_id, recipient_id).await
    }

    async fn update_connection_status(
        &self,
        connection_id: Uuid,
        status: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        db::connections::update_connection_status(&self.pool, connection_id, status).await
    }

    async fn delete_connection(&self, connection_id: Uuid) -> Result<u64> {
        db::connections::delete_connection(&self.pool, connection_id).await
    }

    async fn delete_pending_request(&self, requester_id: Uuid, recipient_id: Uuid) -> Result<u64> {
        db::connections::delete_pending_request(&self.pool, requester_id, recipient_id).await
    }

    async fn list_messages(&self, connection_id: Uuid) -> Result<Vec<Message>> {
        db::messages::list_messages(&self.pool, connection_id).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        db::messages::insert_message(&self.pool, message).await
    }

    async fn subscribe_messages(&self, connection_id: Uuid) -> Result<MessageFeed> {
        db::feed::listen_messages(&self.pool, connection_id).await
    }
}
