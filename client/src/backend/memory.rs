//! In-process backend keeping every table in memory.
//!
//! Mirrors the platform's observable behavior: the unique pair constraint on
//! connections, ascending message order, and a push feed of inserted
//! messages. An offline switch makes every call fail, for exercising the
//! rollback paths of the views.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;
use uuid::Uuid;

use super::{AuthApi, BlobStore, DataApi, MessageFeed};
use crate::constants::{DEFAULT_PROFILE_IMAGE_BUCKET, MESSAGE_FEED_CAPACITY};
use crate::error::{BackendError, Result};
use crate::models::{
    Connection, ConnectionFilter, ConnectionStatus, Message, NewMessage, NewProfile, Profile,
    ProfileUpdate,
};
use crate::session::{Account, Session};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<String, (Account, String)>,
    profiles: Vec<Profile>,
    connections: Vec<Connection>,
    messages: Vec<Message>,
    /// Access token to account id, for sessions not signed out
    sessions: HashMap<String, Uuid>,
    blobs: HashMap<String, StoredBlob>,
}

/// An uploaded object and the account that uploaded it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub uploaded_by: Uuid,
}

#[derive(Debug)]
struct Inner {
    tables: Mutex<Tables>,
    feed: broadcast::Sender<Message>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(MESSAGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                feed,
                offline: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of backend calls issued so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Delivers `message` on the push feed again without storing it.
    pub fn replay(&self, message: &Message) {
        let _ = self.inner.feed.send(message.clone());
    }

    pub async fn blob(&self, object_name: &str) -> Option<StoredBlob> {
        self.inner.tables.lock().await.blobs.get(object_name).cloned()
    }

    /// Registers an account and creates its profile row.
    pub async fn seed_user(&self, email: &str, full_name: &str, skills: &[&str]) -> Result<Session> {
        let session = self.sign_up(email, "password", full_name).await?;
        self.insert_profile(&NewProfile {
            user_id: session.user_id(),
            full_name: full_name.to_string(),
            bio: None,
            skills: skills.iter().map(|skill| skill.to_string()).collect(),
            profile_image_url: None,
        })
        .await?;
        Ok(session)
    }

    fn check(&self) -> Result<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("backend is offline".to_string()));
        }
        Ok(())
    }

    fn open_session(tables: &mut Tables, account: Account) -> Session {
        let access_token = format!("memory-{}", Uuid::new_v4());
        tables.sessions.insert(access_token.clone(), account.id);
        Session {
            account,
            access_token,
            refresh_token: None,
        }
    }
}

impl DataApi for MemoryBackend {
    async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        self.check()?;
        let tables = self.inner.tables.lock().await;
        tables
            .profiles
            .iter()
            .find(|profile| profile.user_id == user_id)
            .cloned()
            .ok_or_else(|| BackendError::not_found("Profile", user_id))
    }

    async fn list_profiles_except(&self, user_id: Uuid) -> Result<Vec<Profile>> {
        self.check()?;
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|profile| profile.user_id != user_id)
            .cloned()
            .collect())
    }

    async fn list_profiles_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
        self.check()?;
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|profile| user_ids.contains(&profile.user_id))
            .cloned()
            .collect())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        if tables.profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Err(BackendError::Conflict { entity: "Profile" });
        }
        let row = Profile {
            id: Uuid::new_v4(),
            user_id: profile.user_id,
            full_name: profile.full_name.clone(),
            bio: profile.bio.clone(),
            skills: profile.skills.clone(),
            profile_image_url: profile.profile_image_url.clone(),
            created_at: Utc::now(),
        };
        tables.profiles.push(row.clone());
        Ok(row)
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        let row = tables
            .profiles
            .iter_mut()
            .find(|profile| profile.user_id == user_id)
            .ok_or_else(|| BackendError::not_found("Profile", user_id))?;
        row.full_name = update.full_name.clone();
        row.bio = update.bio.clone();
        row.skills = update.skills.clone();
        row.profile_image_url = update.profile_image_url.clone();
        Ok(row.clone())
    }

    async fn list_connections(&self, filter: ConnectionFilter) -> Result<Vec<Connection>> {
        self.check()?;
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .connections
            .iter()
            .filter(|connection| filter.accepts(connection))
            .cloned()
            .collect())
    }

    async fn find_connection_between(&self, a: Uuid, b: Uuid) -> Result<Option<Connection>> {
        self.check()?;
        let tables = self.inner.tables.lock().await;
        Ok(tables.connections.iter().find(|c| c.joins(a, b)).cloned())
    }

    async fn insert_connection(&self, requester_id: Uuid, recipient_id: Uuid) -> Result<Connection> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        if tables
            .connections
            .iter()
            .any(|c| c.joins(requester_id, recipient_id))
        {
            return Err(BackendError::DuplicateConnection {
                requester: requester_id,
                recipient: recipient_id,
            });
        }
        let connection = Connection {
            id: Uuid::new_v4(),
            requester_id,
            recipient_id,
            status: ConnectionStatus::Pending,
            created_at: Utc::now(),
        };
        tables.connections.push(connection.clone());
        Ok(connection)
    }

    async fn update_connection_status(
        &self,
        connection_id: Uuid,
        status: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        Ok(tables
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .map(|connection| {
                connection.status = status;
                connection.clone()
            }))
    }

    async fn delete_connection(&self, connection_id: Uuid) -> Result<u64> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        let before = tables.connections.len();
        tables.connections.retain(|c| c.id != connection_id);
        tables.messages.retain(|m| m.connection_id != connection_id);
        Ok((before - tables.connections.len()) as u64)
    }

    async fn delete_pending_request(&self, requester_id: Uuid, recipient_id: Uuid) -> Result<u64> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        let before = tables.connections.len();
        tables.connections.retain(|c| {
            !(c.requester_id == requester_id
                && c.recipient_id == recipient_id
                && c.status == ConnectionStatus::Pending)
        });
        Ok((before - tables.connections.len()) as u64)
    }

    async fn list_messages(&self, connection_id: Uuid) -> Result<Vec<Message>> {
        self.check()?;
        let tables = self.inner.tables.lock().await;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.connection_id == connection_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        if !tables.connections.iter().any(|c| c.id == message.connection_id) {
            return Err(BackendError::not_found("Connection", message.connection_id));
        }
        let row = Message {
            id: Uuid::new_v4(),
            connection_id: message.connection_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            created_at: Utc::now(),
        };
        tables.messages.push(row.clone());
        // Nobody listening is fine
        let _ = self.inner.feed.send(row.clone());
        Ok(row)
    }

    async fn subscribe_messages(&self, connection_id: Uuid) -> Result<MessageFeed> {
        self.check()?;
        debug!("Subscribed to in-memory feed for connection {}", connection_id);
        Ok(MessageFeed::new(connection_id, self.inner.feed.subscribe()))
    }
}

impl AuthApi for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Session> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        if tables.accounts.contains_key(email) {
            return Err(BackendError::Conflict { entity: "Account" });
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: Some(full_name.to_string()),
        };
        tables
            .accounts
            .insert(email.to_string(), (account.clone(), password.to_string()));
        Ok(Self::open_session(&mut tables, account))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        match tables.accounts.get(email) {
            Some((account, stored)) if stored == password => {
                let account = account.clone();
                Ok(Self::open_session(&mut tables, account))
            }
            _ => Err(BackendError::Unauthorized("invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.check()?;
        self.inner.tables.lock().await.sessions.remove(&session.access_token);
        Ok(())
    }

    async fn update_email(&self, session: &Session, email: &str) -> Result<()> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        if tables.accounts.contains_key(email) {
            return Err(BackendError::Conflict { entity: "Account" });
        }
        let (mut account, password) = tables
            .accounts
            .remove(&session.account.email)
            .ok_or_else(|| BackendError::not_found("Account", session.user_id()))?;
        account.email = email.to_string();
        tables.accounts.insert(email.to_string(), (account, password));
        Ok(())
    }
}

impl BlobStore for MemoryBackend {
    async fn upload(
        &self,
        session: &Session,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        self.check()?;
        let mut tables = self.inner.tables.lock().await;
        let uploaded_by = match tables.sessions.get(&session.access_token) {
            Some(&user_id) if user_id == session.user_id() => user_id,
            _ => return Err(BackendError::Unauthorized("upload requires a signed-in session".to_string())),
        };
        if tables.blobs.contains_key(object_name) {
            return Err(BackendError::Conflict { entity: "Object" });
        }
        tables.blobs.insert(
            object_name.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
                uploaded_by,
            },
        );
        Ok(format!("memory://{DEFAULT_PROFILE_IMAGE_BUCKET}/{object_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_pair_rejected_in_either_direction() {
        let backend = MemoryBackend::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        backend.insert_connection(a, b).await.unwrap();

        assert!(matches!(
            backend.insert_connection(a, b).await,
            Err(BackendError::DuplicateConnection { .. })
        ));
        assert!(matches!(
            backend.insert_connection(b, a).await,
            Err(BackendError::DuplicateConnection { .. })
        ));
        let all = backend.list_connections(ConnectionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_delete_spares_accepted() {
        let backend = MemoryBackend::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let connection = backend.insert_connection(a, b).await.unwrap();
        backend
            .update_connection_status(connection.id, ConnectionStatus::Accepted)
            .await
            .unwrap();

        assert_eq!(backend.delete_pending_request(a, b).await.unwrap(), 0);
        assert!(backend.find_connection_between(a, b).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_inserted_messages_reach_subscribers() {
        let backend = MemoryBackend::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let connection = backend.insert_connection(a, b).await.unwrap();
        let mut feed = backend.subscribe_messages(connection.id).await.unwrap();

        let sent = backend
            .insert_message(&NewMessage {
                connection_id: connection.id,
                sender_id: a,
                content: "ping".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(feed.try_recv(), Some(sent));
    }

    #[tokio::test]
    async fn test_offline_fails_and_counts_calls() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);

        assert!(matches!(
            backend.get_profile(Uuid::new_v4()).await,
            Err(BackendError::Unavailable(_))
        ));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let backend = MemoryBackend::new();
        backend.sign_up("ada@example.com", "s3cret", "Ada").await.unwrap();

        let session = backend.sign_in("ada@example.com", "s3cret").await.unwrap();
        assert_eq!(session.account.full_name.as_deref(), Some("Ada"));
        assert!(matches!(
            backend.sign_in("ada@example.com", "wrong").await,
            Err(BackendError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_requires_live_session() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("ada@example.com", "pw", "Ada").await.unwrap();

        backend
            .upload(&session, "a.png", vec![1], "image/png")
            .await
            .unwrap();
        assert_eq!(
            backend.blob("a.png").await.map(|blob| blob.uploaded_by),
            Some(session.user_id())
        );

        let mut forged = session.clone();
        forged.access_token = "not-issued".to_string();
        assert!(matches!(
            backend.upload(&forged, "b.png", vec![1], "image/png").await,
            Err(BackendError::Unauthorized(_))
        ));

        backend.sign_out(&session).await.unwrap();
        assert!(matches!(
            backend.upload(&session, "c.png", vec![1], "image/png").await,
            Err(BackendError::Unauthorized(_))
        ));
    }
}
