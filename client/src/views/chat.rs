//! Live view of one conversation.
//!
//! The thread merges three sources: the bulk fetch on open, rows pushed by
//! the change feed, and optimistic entries for messages being sent. Entries
//! are keyed by id, so a row that arrives twice (bulk fetch racing the feed,
//! or the feed echoing our own send) is kept once.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::backend::{DataApi, MessageFeed};
use crate::error::{BackendError, ClientResult};
use crate::models::{ChatEntry, EntryKey, LocalId, Message, NewMessage, PendingMessage, Profile};
use crate::session::Session;
use crate::utils::format::format_time;

/// Display order: timestamp, then arrival.
type SortKey = (DateTime<Utc>, u64);

/// Ordered set of chat entries keyed by server or local id.
#[derive(Debug, Default)]
pub struct MessageList {
    entries: BTreeMap<SortKey, ChatEntry>,
    positions: HashMap<EntryKey, SortKey>,
    arrivals: u64,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatEntry> {
        self.entries.values()
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Adds a server row unless one with the same id is already present.
    /// Returns whether the list changed.
    pub fn merge(&mut self, message: Message) -> bool {
        let key = EntryKey::Server(message.id);
        if self.positions.contains_key(&key) {
            return false;
        }
        let position = self.next_position(message.created_at);
        self.positions.insert(key, position);
        self.entries.insert(position, ChatEntry::Confirmed(message));
        true
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.merge(message);
        }
    }

    pub fn push_pending(&mut self, pending: PendingMessage) -> LocalId {
        let local_id = pending.local_id.clone();
        let position = self.next_position(pending.created_at);
        self.positions.insert(EntryKey::Local(local_id.clone()), position);
        self.entries.insert(position, ChatEntry::Pending(pending));
        local_id
    }

    /// Swaps the pending entry for the server's row, keeping its position. If
    /// the feed already delivered that row, the pending entry is dropped.
    pub fn confirm(&mut self, local_id: &LocalId, message: Message) {
        let Some(position) = self.positions.remove(&EntryKey::Local(local_id.clone())) else {
            self.merge(message);
            return;
        };

        let key = EntryKey::Server(message.id);
        if self.positions.contains_key(&key) {
            self.entries.remove(&position);
            return;
        }
        self.positions.insert(key, position);
        self.entries.insert(position, ChatEntry::Confirmed(message));
    }

    /// Removes a pending entry, handing it back.
    pub fn discard(&mut self, local_id: &LocalId) -> Option<PendingMessage> {
        let position = self.positions.remove(&EntryKey::Local(local_id.clone()))?;
        match self.entries.remove(&position) {
            Some(ChatEntry::Pending(pending)) => Some(pending),
            _ => None,
        }
    }

    fn next_position(&mut self, created_at: DateTime<Utc>) -> SortKey {
        self.arrivals += 1;
        (created_at, self.arrivals)
    }
}

/// A message line ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    /// Sent by the signed-in account: right-aligned and highlighted
    pub own: bool,
    pub pending: bool,
    pub time: String,
    pub content: String,
}

/// A send that has been placed optimistically and awaits the server.
#[derive(Debug)]
pub struct OutgoingMessage {
    local_id: LocalId,
    draft: NewMessage,
}

impl OutgoingMessage {
    pub fn draft(&self) -> &NewMessage {
        &self.draft
    }
}

pub struct ChatView<'a, D> {
    api: &'a D,
    me: Uuid,
    connection_id: Uuid,
    peer_id: Uuid,
    peer: Option<Profile>,
    messages: MessageList,
    compose: String,
    sending: bool,
    alive: bool,
    load_failed: bool,
    feed: Option<MessageFeed>,
    scrolled_len: usize,
    shown: HashSet<EntryKey>,
}

impl<'a, D: DataApi> ChatView<'a, D> {
    /// Fetches the counterpart's profile and the history and subscribes to
    /// new rows, all concurrently. Failures are logged and leave the
    /// affected part empty.
    pub async fn open(api: &'a D, session: &Session, connection_id: Uuid, peer_id: Uuid) -> Self {
        let (peer, history, feed) = tokio::join!(
            api.get_profile(peer_id),
            api.list_messages(connection_id),
            api.subscribe_messages(connection_id),
        );

        let mut messages = MessageList::new();
        let mut load_failed = false;
        match history {
            Ok(history) => messages.extend(history),
            Err(e) => {
                error!("Error fetching messages for {}: {}", connection_id, e);
                load_failed = true;
            }
        }

        let peer = peer
            .map_err(|e| error!("Error fetching user {}: {}", peer_id, e))
            .ok();
        let feed = feed
            .map_err(|e| error!("Error subscribing to connection {}: {}", connection_id, e))
            .ok();

        debug!("Opened chat {} with {} messages", connection_id, messages.len());

        Self {
            api,
            me: session.user_id(),
            connection_id,
            peer_id,
            peer,
            messages,
            compose: String::new(),
            sending: false,
            alive: true,
            load_failed,
            feed,
            scrolled_len: 0,
            shown: HashSet::new(),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn peer_id(&self) -> Uuid {
        self.peer_id
    }

    pub fn peer(&self) -> Option<&Profile> {
        self.peer.as_ref()
    }

    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// The send control is enabled only with text and no send in flight.
    pub fn can_send(&self) -> bool {
        self.alive && !self.sending && !self.compose.trim().is_empty()
    }

    pub fn is_live(&self) -> bool {
        self.alive && self.feed.is_some()
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Merges every row the feed has already delivered. Returns how many were new.
    pub fn pump(&mut self) -> usize {
        if !self.alive {
            return 0;
        }
        let Some(feed) = self.feed.as_mut() else {
            return 0;
        };
        let mut added = 0;
        while let Some(message) = feed.try_recv() {
            if self.messages.merge(message) {
                added += 1;
            }
        }
        added
    }

    /// Waits for the next pushed row and merges it. Returns whether it was
    /// new, or `None` once the feed is gone.
    pub async fn next_pushed(&mut self) -> Option<bool> {
        let feed = self.feed.as_mut()?;
        let message = feed.recv().await?;
        if !self.alive {
            return None;
        }
        Some(self.messages.merge(message))
    }

    /// Places the compose text as a pending entry and clears the field.
    /// `None` when there is nothing to send or a send is in flight.
    pub fn begin_send(&mut self) -> Option<OutgoingMessage> {
        if !self.can_send() {
            return None;
        }

        let draft = NewMessage {
            connection_id: self.connection_id,
            sender_id: self.me,
            content: self.compose.trim().to_string(),
        };
        let local_id = self.messages.push_pending(PendingMessage::new(&draft));
        self.compose.clear();
        self.sending = true;

        Some(OutgoingMessage { local_id, draft })
    }

    /// Applies the server's answer to a send. On failure the pending entry
    /// is removed and the text goes back into the compose field.
    pub fn finish_send(
        &mut self,
        outgoing: OutgoingMessage,
        result: Result<Message, BackendError>,
    ) -> ClientResult<()> {
        if !self.alive {
            return result.map(|_| ()).map_err(Into::into);
        }
        self.sending = false;

        match result {
            Ok(message) => {
                self.messages.confirm(&outgoing.local_id, message);
                Ok(())
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                self.messages.discard(&outgoing.local_id);
                self.compose = outgoing.draft.content;
                Err(e.into())
            }
        }
    }

    /// Sends the compose text. `Ok(false)` when there was nothing to send.
    pub async fn send(&mut self) -> ClientResult<bool> {
        let Some(outgoing) = self.begin_send() else {
            return Ok(false);
        };
        let result = self.api.insert_message(outgoing.draft()).await;
        self.finish_send(outgoing, result)?;
        Ok(true)
    }

    /// Lines in display order, with times in `tz`.
    pub fn render(&self, tz: Tz) -> Vec<RenderedMessage> {
        self.messages
            .iter()
            .map(|entry| self.render_entry(entry, tz))
            .collect()
    }

    /// Confirmed lines not handed out by an earlier call, in display order.
    /// For append-only output, where a row sorting before an already printed
    /// one must still be printed exactly once.
    pub fn take_unseen(&mut self, tz: Tz) -> Vec<RenderedMessage> {
        let mut unseen = Vec::new();
        for entry in self.messages.iter().filter(|entry| !entry.is_pending()) {
            if self.shown.insert(entry.key()) {
                unseen.push(self.render_entry(entry, tz));
            }
        }
        unseen
    }

    fn render_entry(&self, entry: &ChatEntry, tz: Tz) -> RenderedMessage {
        RenderedMessage {
            own: entry.sender_id() == self.me,
            pending: entry.is_pending(),
            time: format_time(entry.created_at(), tz),
            content: entry.content().to_string(),
        }
    }

    /// True once after each change in list length; the view scrolls to the latest entry.
    pub fn take_scroll_request(&mut self) -> bool {
        let len = self.messages.len();
        if len == self.scrolled_len {
            return false;
        }
        self.scrolled_len = len;
        true
    }

    /// Releases the subscription. Later completions no longer touch the view.
    pub fn close(&mut self) {
        if self.alive {
            info!("Closing chat {}", self.connection_id);
        }
        self.alive = false;
        self.feed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::ClientError;
    use crate::models::ConnectionStatus;
    use chrono::Duration;

    fn message(connection_id: Uuid, content: &str, created_at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            connection_id,
            sender_id: Uuid::new_v4(),
            content: content.to_string(),
            created_at,
        }
    }

    fn contents(list: &MessageList) -> Vec<&str> {
        list.iter().map(ChatEntry::content).collect()
    }

    struct Thread {
        backend: MemoryBackend,
        me: Session,
        peer: Session,
        connection_id: Uuid,
    }

    async fn thread() -> Thread {
        let backend = MemoryBackend::new();
        let me = backend.seed_user("me@example.com", "Me", &[]).await.unwrap();
        let peer = backend.seed_user("ada@example.com", "Ada", &["Rust"]).await.unwrap();
        let connection = backend.insert_connection(me.user_id(), peer.user_id()).await.unwrap();
        backend
            .update_connection_status(connection.id, ConnectionStatus::Accepted)
            .await
            .unwrap();
        Thread {
            backend,
            me,
            peer,
            connection_id: connection.id,
        }
    }

    async fn say(t: &Thread, from: &Session, content: &str) -> Message {
        t.backend
            .insert_message(&NewMessage {
                connection_id: t.connection_id,
                sender_id: from.user_id(),
                content: content.to_string(),
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut list = MessageList::new();
        let m = message(Uuid::new_v4(), "once", Utc::now());

        assert!(list.merge(m.clone()));
        assert!(!list.merge(m));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_orders_by_timestamp_then_arrival() {
        let mut list = MessageList::new();
        let conn = Uuid::new_v4();
        let t0 = Utc::now();

        list.merge(message(conn, "late", t0 + Duration::seconds(5)));
        list.merge(message(conn, "first", t0));
        list.merge(message(conn, "tie", t0));

        assert_eq!(contents(&list), vec!["first", "tie", "late"]);
    }

    #[test]
    fn test_confirm_replaces_in_place() {
        let mut list = MessageList::new();
        let conn = Uuid::new_v4();
        let draft = NewMessage {
            connection_id: conn,
            sender_id: Uuid::new_v4(),
            content: "mine".to_string(),
        };
        let pending = PendingMessage::new(&draft);
        let local_created = pending.created_at;
        let local_id = list.push_pending(pending);
        list.merge(message(conn, "after", local_created + Duration::seconds(1)));

        // Server clock is later than both local entries
        let mut confirmed = message(conn, "mine", local_created + Duration::seconds(10));
        confirmed.sender_id = draft.sender_id;
        list.confirm(&local_id, confirmed.clone());

        assert_eq!(contents(&list), vec!["mine", "after"]);
        assert!(list.iter().all(|entry| !entry.is_pending()));
        assert!(list.contains(&EntryKey::Server(confirmed.id)));
        assert!(!list.contains(&EntryKey::Local(local_id)));
    }

    #[test]
    fn test_confirm_after_echo_keeps_one() {
        let mut list = MessageList::new();
        let conn = Uuid::new_v4();
        let draft = NewMessage {
            connection_id: conn,
            sender_id: Uuid::new_v4(),
            content: "echo".to_string(),
        };
        let local_id = list.push_pending(PendingMessage::new(&draft));
        let row = message(conn, "echo", Utc::now());

        assert!(list.merge(row.clone()));
        list.confirm(&local_id, row);

        assert_eq!(list.len(), 1);
        assert!(!list.iter().any(ChatEntry::is_pending));
    }

    #[tokio::test]
    async fn test_open_loads_history_and_peer() {
        let t = thread().await;
        say(&t, &t.me, "hi").await;
        say(&t, &t.peer, "hello back").await;

        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;

        assert!(!chat.load_failed());
        assert!(chat.is_live());
        assert_eq!(chat.peer().map(|p| p.full_name.as_str()), Some("Ada"));
        let lines = chat.render(chrono_tz::UTC);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].own);
        assert!(!lines[1].own);
        assert_eq!(lines[1].content, "hello back");
        assert!(chat.take_scroll_request());
        assert!(!chat.take_scroll_request());
    }

    #[tokio::test]
    async fn test_bulk_and_push_duplicate_kept_once() {
        let t = thread().await;
        let early = say(&t, &t.peer, "early").await;

        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;
        t.backend.replay(&early);

        assert_eq!(chat.pump(), 0);
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_pushed_rows_appear() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;
        chat.take_scroll_request();

        say(&t, &t.peer, "ping").await;
        assert_eq!(chat.next_pushed().await, Some(true));
        assert_eq!(contents(chat.messages()), vec!["ping"]);
        assert!(chat.take_scroll_request());
    }

    #[tokio::test]
    async fn test_unseen_includes_rows_sorting_before_printed_ones() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;

        chat.set_compose("mine");
        chat.send().await.unwrap();
        let first: Vec<String> = chat
            .take_unseen(chrono_tz::UTC)
            .into_iter()
            .map(|line| line.content)
            .collect();
        assert_eq!(first, vec!["mine"]);

        // Peer row stamped by a server clock behind ours
        let mut late = message(t.connection_id, "earlier on the server", Utc::now() - Duration::minutes(5));
        late.sender_id = t.peer.user_id();
        t.backend.replay(&late);
        chat.pump();
        assert_eq!(contents(chat.messages()), vec!["earlier on the server", "mine"]);

        let next = chat.take_unseen(chrono_tz::UTC);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].content, "earlier on the server");
        assert!(!next[0].own);
        assert!(chat.take_unseen(chrono_tz::UTC).is_empty());
    }

    #[tokio::test]
    async fn test_unseen_skips_pending_until_confirmed() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;

        chat.set_compose("in flight");
        let outgoing = chat.begin_send().unwrap();
        assert!(chat.take_unseen(chrono_tz::UTC).is_empty());

        let result = t.backend.insert_message(outgoing.draft()).await;
        chat.finish_send(outgoing, result).unwrap();
        let lines = chat.take_unseen(chrono_tz::UTC);
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].pending);
    }

    #[tokio::test]
    async fn test_blank_send_is_noop() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;
        let calls = t.backend.call_count();

        chat.set_compose("   \n\t");
        assert!(!chat.can_send());
        assert!(!chat.send().await.unwrap());
        assert!(chat.messages().is_empty());
        assert_eq!(t.backend.call_count(), calls);
    }

    #[tokio::test]
    async fn test_send_confirms_and_ignores_echo() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;

        chat.set_compose("  hello  ");
        assert!(chat.send().await.unwrap());
        assert_eq!(chat.compose(), "");
        assert!(!chat.is_sending());

        // The feed echoes our own insert
        assert_eq!(chat.pump(), 0);
        let lines = chat.render(chrono_tz::UTC);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].content, "hello");
        assert!(lines[0].own);
        assert!(!lines[0].pending);
    }

    #[tokio::test]
    async fn test_one_send_in_flight() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;

        chat.set_compose("first");
        let outgoing = chat.begin_send().unwrap();
        assert!(chat.is_sending());

        chat.set_compose("second");
        assert!(chat.begin_send().is_none());

        let result = t.backend.insert_message(outgoing.draft()).await;
        chat.finish_send(outgoing, result).unwrap();
        assert!(!chat.is_sending());
        assert_eq!(chat.compose(), "second");
    }

    #[tokio::test]
    async fn test_failed_send_rolls_back() {
        let t = thread().await;
        say(&t, &t.peer, "are you there?").await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;
        let before: Vec<ChatEntry> = chat.messages().iter().cloned().collect();

        chat.set_compose("hello");
        let outgoing = chat.begin_send().unwrap();
        assert_eq!(chat.messages().len(), 2);
        assert!(chat.messages().iter().last().unwrap().is_pending());
        assert_eq!(chat.compose(), "");

        t.backend.set_offline(true);
        let result = t.backend.insert_message(outgoing.draft()).await;
        let err = chat.finish_send(outgoing, result).unwrap_err();

        assert!(matches!(err, ClientError::Backend(BackendError::Unavailable(_))));
        let after: Vec<ChatEntry> = chat.messages().iter().cloned().collect();
        assert_eq!(after, before);
        assert_eq!(chat.compose(), "hello");
        assert!(!chat.is_sending());
    }

    #[tokio::test]
    async fn test_close_stops_updates() {
        let t = thread().await;
        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;
        chat.set_compose("late");
        let outgoing = chat.begin_send().unwrap();

        chat.close();
        say(&t, &t.peer, "after close").await;
        assert_eq!(chat.pump(), 0);
        assert!(!chat.is_live());

        let result = t.backend.insert_message(outgoing.draft()).await;
        chat.finish_send(outgoing, result).unwrap();
        let entries: Vec<&ChatEntry> = chat.messages().iter().collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_pending());
        assert!(chat.next_pushed().await.is_none());
    }

    #[tokio::test]
    async fn test_offline_open_degrades() {
        let t = thread().await;
        t.backend.set_offline(true);

        let mut chat = ChatView::open(&t.backend, &t.me, t.connection_id, t.peer.user_id()).await;
        assert!(chat.load_failed());
        assert!(chat.peer().is_none());
        assert!(!chat.is_live());
        assert!(chat.next_pushed().await.is_none());
    }
}
