//! Messaging service implementation.
//!
//! This module provides the `ChatCore` trait and `ChatService` implementation
//! that coordinates dispatch, delivery status, presence and live fanout.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use murmur_core::{ConversationId, MessageId, NotificationId, UserId};
use murmur_store::{
    DeliveryStatus, Message, Notification, Participant, Store, StoreError, User, UserStatus,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::Receiver;

use crate::connection::ConnectionHandle;
use crate::dispatch::{self, ensure_participant};
use crate::error::{ChatError, Result};
use crate::events::{ClientCommand, ServerEvent};
use crate::notify;
use crate::presence;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomManager;
use crate::signals;
use crate::status;
use crate::types::{
    ChatConfig, HistoryPage, HistoryQuery, MessageView, NotificationPage, NotificationQuery,
    OnlineUser, SendOutcome, SenderSummary, StatusChange,
};

/// An authenticated live connection, as seen by the service.
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Outbound side of the connection.
    pub handle: ConnectionHandle,
    /// The user's handle, cached for typing events.
    pub username: String,
}

impl ClientSession {
    /// The connected user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.handle.user_id()
    }
}

/// Trait defining the messaging operations.
///
/// Both the WebSocket and REST surfaces go through this trait, so they share
/// one pipeline and one view of who is connected.
#[async_trait]
pub trait ChatCore: Send + Sync {
    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    /// Register a new live connection for an authenticated user.
    ///
    /// Subscribes it to every conversation the user belongs to, marks the
    /// user online and queues their unseen notification count. The returned
    /// receiver yields every event destined for the connection.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::UserNotFound` if the user doesn't exist.
    async fn connect(&self, user_id: UserId) -> Result<(ClientSession, Receiver<ServerEvent>)>;

    /// Tear down a connection's subscriptions and, unless it was superseded,
    /// mark the user offline.
    async fn disconnect(&self, session: &ClientSession);

    /// Run one client command. Failures are reported to the connection as
    /// an `error` event, never returned.
    async fn handle_command(&self, session: &ClientSession, command: ClientCommand);

    // =========================================================================
    // Messages
    // =========================================================================

    /// Send a message through the full dispatch pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument`, `AccessDenied`, `ConversationNotFound` or
    /// `Forbidden` before anything is written.
    async fn send_message(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<SendOutcome>;

    /// Page through a conversation's history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::AccessDenied` if the requester is not a participant.
    async fn history(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
        query: HistoryQuery,
    ) -> Result<HistoryPage>;

    // =========================================================================
    // Delivery Status
    // =========================================================================

    /// Mark a message as read by `receiver_id`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::StatusNotFound` if the receiver has no row for it.
    async fn mark_read(&self, message_id: MessageId, receiver_id: UserId)
        -> Result<StatusChange>;

    /// Move a receiver's status forward to `target`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::StatusNotFound` if the receiver has no row for it.
    async fn advance_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
        target: DeliveryStatus,
    ) -> Result<StatusChange>;

    /// Mark everything in a conversation as read by `receiver_id`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::AccessDenied` if the receiver is not a participant.
    async fn mark_all_read(&self, conversation_id: ConversationId, receiver_id: UserId)
        -> Result<u32>;

    // =========================================================================
    // Presence & Notifications
    // =========================================================================

    /// Connected participants of a conversation.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::AccessDenied` if the requester is not a participant.
    async fn online_users(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<OnlineUser>>;

    /// Number of users with a live connection.
    fn online_count(&self) -> usize;

    /// Number of unseen notifications of a user.
    async fn unread_notification_count(&self, user_id: UserId) -> Result<u32>;

    /// Page through a user's notifications, newest first.
    async fn list_notifications(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> Result<NotificationPage>;

    /// Mark one notification as seen and push the refreshed unseen count.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotificationNotFound` if the notification doesn't
    /// exist or belongs to someone else.
    async fn mark_notification_seen(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification>;

    /// Mark all of a user's notifications as seen and push the refreshed
    /// unseen count. Returns the number of notifications changed.
    async fn mark_all_notifications_seen(&self, user_id: UserId) -> Result<u32>;

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a user to a conversation and subscribe their live connection.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ConversationNotFound` or `ChatError::UserNotFound`.
    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Participant>;

    /// Remove a user from a conversation and unsubscribe their connections.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotParticipant` if the user is not a member.
    async fn remove_participant(&self, conversation_id: ConversationId, user_id: UserId)
        -> Result<()>;

    /// Look up a user.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::UserNotFound` if the user doesn't exist.
    async fn get_user(&self, user_id: UserId) -> Result<User>;
}

/// The main messaging service implementation.
pub struct ChatService<S: Store> {
    store: Arc<S>,
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
    config: ChatConfig,
    /// Per-user locks held across register/unregister and the presence write
    /// and broadcast that follow, so a stale disconnect cannot land after a
    /// reconnect.
    presence_locks: Mutex<HashMap<UserId, Weak<Mutex<()>>>>,
}

impl<S: Store> ChatService<S> {
    /// Create a new messaging service.
    #[must_use]
    pub fn new(store: Arc<S>, config: ChatConfig) -> Self {
        Self {
            store,
            registry: Arc::new(ConnectionRegistry::new()),
            rooms: Arc::new(RoomManager::new()),
            config,
            presence_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ChatConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the connection registry.
    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Get the room manager.
    #[must_use]
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn presence_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.presence_locks.lock();

        // Drop entries of users nobody is connecting or disconnecting
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(&user_id).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(user_id, Arc::downgrade(&lock));
        lock
    }

    fn with_presence_lock<T>(&self, user_id: UserId, f: impl FnOnce() -> T) -> T {
        let lock = self.presence_lock(user_id);
        let _guard = lock.lock();
        f()
    }

    fn require_user(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(user_id)?
            .ok_or(ChatError::UserNotFound(user_id))
    }

    /// Persist a presence change and tell co-participants. Failures are
    /// logged only; presence is advisory.
    fn announce_presence(&self, user_id: UserId, status: UserStatus) {
        if let Err(e) = self.store.update_user_status(user_id, status) {
            tracing::warn!(
                user_id = %user_id,
                status = %status,
                error = %e,
                "Failed to persist presence"
            );
            return;
        }
        if let Err(e) = presence::broadcast_status(&*self.store, &self.registry, user_id, status) {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to broadcast presence");
        }
    }

    fn join(&self, session: &ClientSession, conversation_id: ConversationId) -> Result<()> {
        ensure_participant(&*self.store, conversation_id, session.user_id())?;
        self.rooms.subscribe(&session.handle, conversation_id);
        session
            .handle
            .send(ServerEvent::JoinedConversation { conversation_id });
        Ok(())
    }

    fn run_command(&self, session: &ClientSession, command: &ClientCommand) -> Result<()> {
        let user_id = session.user_id();
        match command {
            ClientCommand::SendMessage {
                conversation_id,
                content,
            } => {
                dispatch::send_message(
                    &*self.store,
                    &self.registry,
                    &self.rooms,
                    &self.config,
                    user_id,
                    *conversation_id,
                    content,
                )?;
            }
            ClientCommand::TypingStart { conversation_id } => {
                signals::relay_typing(
                    &*self.store,
                    &self.rooms,
                    &session.handle,
                    &session.username,
                    *conversation_id,
                    true,
                );
            }
            ClientCommand::TypingStop { conversation_id } => {
                signals::relay_typing(
                    &*self.store,
                    &self.rooms,
                    &session.handle,
                    &session.username,
                    *conversation_id,
                    false,
                );
            }
            ClientCommand::MessageRead { message_id } => {
                status::mark_read(&*self.store, &self.registry, *message_id, user_id)?;
            }
            ClientCommand::JoinConversation { conversation_id } => {
                self.join(session, *conversation_id)?;
            }
            ClientCommand::LeaveConversation { conversation_id } => {
                self.rooms.leave(session.handle.id(), *conversation_id);
                session.handle.send(ServerEvent::LeftConversation {
                    conversation_id: *conversation_id,
                });
            }
            ClientCommand::UpdateStatus { status } => {
                let status = presence::update_status(&*self.store, &self.registry, user_id, status)?;
                session.handle.send(ServerEvent::StatusUpdated { status });
            }
            ClientCommand::GetOnlineUsers { conversation_id } => {
                let online_users =
                    presence::online_users(&*self.store, &self.registry, user_id, *conversation_id)?;
                session.handle.send(ServerEvent::OnlineUsers {
                    conversation_id: *conversation_id,
                    online_users,
                });
            }
        }
        Ok(())
    }

    /// Build views for a page of messages, resolving each author once.
    fn views(&self, messages: Vec<Message>) -> Result<Vec<MessageView>> {
        let mut senders: HashMap<UserId, SenderSummary> = HashMap::new();
        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = match senders.get(&message.sender_id) {
                Some(sender) => sender.clone(),
                None => {
                    let sender = SenderSummary::from(&self.require_user(message.sender_id)?);
                    senders.insert(message.sender_id, sender.clone());
                    sender
                }
            };
            let statuses = self.store.list_message_statuses(message.message_id)?;
            views.push(MessageView::new(message, sender, &statuses));
        }
        Ok(views)
    }
}

#[async_trait]
impl<S: Store + 'static> ChatCore for ChatService<S> {
    async fn connect(&self, user_id: UserId) -> Result<(ClientSession, Receiver<ServerEvent>)> {
        let user = self.require_user(user_id)?;
        let conversations = self.store.list_user_conversations(user_id)?;

        let (handle, rx) = ConnectionHandle::channel(user_id, self.config.outbound_queue_capacity);
        self.with_presence_lock(user_id, || {
            if let Some(previous) = self.registry.register(handle.clone()) {
                tracing::info!(
                    user_id = %user_id,
                    previous = %previous.id(),
                    current = %handle.id(),
                    "Superseded existing connection"
                );
            }
            self.rooms.subscribe_all(&handle, &conversations);

            tracing::info!(
                user_id = %user_id,
                connection_id = %handle.id(),
                conversations = conversations.len(),
                "Connected"
            );

            self.announce_presence(user_id, UserStatus::Online);
        });

        match self.store.count_unseen_notifications(user_id) {
            Ok(count) => {
                handle.send(ServerEvent::UnreadNotificationsCount { count });
            }
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to count notifications"),
        }

        let session = ClientSession {
            handle,
            username: user.username,
        };
        Ok((session, rx))
    }

    async fn disconnect(&self, session: &ClientSession) {
        let user_id = session.user_id();
        let connection_id = session.handle.id();
        self.rooms.drop_connection(connection_id);

        self.with_presence_lock(user_id, || {
            if self.registry.unregister(user_id, connection_id) {
                tracing::info!(user_id = %user_id, connection_id = %connection_id, "Disconnected");
                self.announce_presence(user_id, UserStatus::Offline);
            } else {
                tracing::debug!(
                    user_id = %user_id,
                    connection_id = %connection_id,
                    "Superseded connection closed"
                );
            }
        });
    }

    async fn handle_command(&self, session: &ClientSession, command: ClientCommand) {
        tracing::debug!(
            user_id = %session.user_id(),
            command = command.name(),
            "Handling command"
        );

        if let Err(e) = self.run_command(session, &command) {
            let message = if e.is_transient() {
                tracing::error!(
                    user_id = %session.user_id(),
                    command = command.name(),
                    error = %e,
                    "Command failed"
                );
                Cow::Borrowed(command.failure_message())
            } else {
                tracing::debug!(
                    user_id = %session.user_id(),
                    command = command.name(),
                    error = %e,
                    "Command rejected"
                );
                e.client_message()
            };
            session.handle.send(ServerEvent::error(message));
        }
    }

    async fn send_message(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<SendOutcome> {
        dispatch::send_message(
            &*self.store,
            &self.registry,
            &self.rooms,
            &self.config,
            sender_id,
            conversation_id,
            content,
        )
    }

    async fn history(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
        query: HistoryQuery,
    ) -> Result<HistoryPage> {
        ensure_participant(&*self.store, conversation_id, requester)?;
        if self.store.get_conversation(conversation_id)?.is_none() {
            return Err(ChatError::ConversationNotFound(conversation_id));
        }

        let limit = query
            .limit
            .unwrap_or(self.config.default_history_limit)
            .clamp(1, self.config.max_history_limit.max(1));

        let mut messages =
            self.store
                .list_messages(conversation_id, query.before_message_id, limit + 1)?;
        let has_more = messages.len() > limit;
        messages.truncate(limit);
        messages.reverse();

        Ok(HistoryPage {
            messages: self.views(messages)?,
            has_more,
        })
    }

    async fn mark_read(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
    ) -> Result<StatusChange> {
        status::mark_read(&*self.store, &self.registry, message_id, receiver_id)
    }

    async fn advance_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
        target: DeliveryStatus,
    ) -> Result<StatusChange> {
        status::advance_status(&*self.store, &self.registry, message_id, receiver_id, target)
    }

    async fn mark_all_read(
        &self,
        conversation_id: ConversationId,
        receiver_id: UserId,
    ) -> Result<u32> {
        status::mark_all_read(&*self.store, conversation_id, receiver_id)
    }

    async fn online_users(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<OnlineUser>> {
        presence::online_users(&*self.store, &self.registry, requester, conversation_id)
    }

    fn online_count(&self) -> usize {
        self.registry.online_count()
    }

    async fn unread_notification_count(&self, user_id: UserId) -> Result<u32> {
        Ok(self.store.count_unseen_notifications(user_id)?)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> Result<NotificationPage> {
        notify::list_page(&*self.store, &self.config, user_id, query)
    }

    async fn mark_notification_seen(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification> {
        notify::mark_seen(&*self.store, &self.registry, user_id, notification_id)
    }

    async fn mark_all_notifications_seen(&self, user_id: UserId) -> Result<u32> {
        notify::mark_all_seen(&*self.store, &self.registry, user_id)
    }

    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Participant> {
        self.require_user(user_id)?;
        let participant = self
            .store
            .add_participant(conversation_id, user_id)
            .map_err(|e| match e {
                StoreError::NotFound => ChatError::ConversationNotFound(conversation_id),
                other => ChatError::Store(other),
            })?;

        if let Some(handle) = self.registry.lookup(user_id) {
            self.rooms.subscribe(&handle, conversation_id);
        }

        tracing::info!(conversation_id = %conversation_id, user_id = %user_id, "Added participant");
        Ok(participant)
    }

    async fn remove_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<()> {
        self.store
            .remove_participant(conversation_id, user_id)
            .map_err(|e| match e {
                StoreError::NotFound => ChatError::NotParticipant {
                    conversation_id,
                    user_id,
                },
                other => ChatError::Store(other),
            })?;

        let evicted = self.rooms.evict_user(conversation_id, user_id);
        tracing::info!(
            conversation_id = %conversation_id,
            user_id = %user_id,
            evicted,
            "Removed participant"
        );
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<User> {
        self.require_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_store::RocksStore;
    use tempfile::TempDir;

    use crate::error::BLOCKED_MESSAGE;

    struct Harness {
        service: ChatService<RocksStore>,
        alice: UserId,
        bob: UserId,
        chat: ConversationId,
        _dir: TempDir,
    }

    fn setup() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let alice = store.create_user("alice", None, None).unwrap().user_id;
        let bob = store.create_user("bob", None, None).unwrap().user_id;
        let chat = store
            .create_conversation(false, None, &[alice, bob])
            .unwrap()
            .conversation_id;
        Harness {
            service: ChatService::with_defaults(store),
            alice,
            bob,
            chat,
            _dir: dir,
        }
    }

    fn drain(rx: &mut Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(events: &[ServerEvent]) -> Vec<&'static str> {
        events.iter().map(ServerEvent::name).collect()
    }

    #[tokio::test]
    async fn connect_sends_unread_count_and_marks_online() {
        let h = setup();
        let (_session, mut rx) = h.service.connect(h.alice).await.unwrap();

        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ServerEvent::UnreadNotificationsCount { count: 0 })
        ));
        assert!(h.service.registry().is_online(h.alice));
        assert_eq!(
            h.service.store().get_user(h.alice).unwrap().unwrap().status,
            UserStatus::Online
        );
        assert_eq!(h.service.rooms().subscriber_count(h.chat), 1);
    }

    #[tokio::test]
    async fn connect_unknown_user_fails() {
        let h = setup();
        let result = h.service.connect(UserId::new(999)).await;
        assert!(matches!(result, Err(ChatError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn both_online_message_is_delivered_live() {
        let h = setup();
        let (_a, mut rx_a) = h.service.connect(h.alice).await.unwrap();
        let (_b, mut rx_b) = h.service.connect(h.bob).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let outcome = h.service.send_message(h.alice, h.chat, " hi bob ").await.unwrap();
        assert_eq!(outcome.recipients, vec![h.bob]);
        assert!(outcome.notified_offline.is_empty());
        assert_eq!(outcome.live_deliveries, 2);
        assert_eq!(outcome.message.message.content, " hi bob ");

        let message_id = outcome.message.message.message_id;
        let statuses = h.service.store().list_message_statuses(message_id).unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, DeliveryStatus::Sent);

        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerEvent::NewMessage { conversation_id, .. }] if *conversation_id == h.chat
        ));
        // Sender's own connection sees the message too
        assert_eq!(names(&drain(&mut rx_a)), vec!["new_message"]);
        assert_eq!(h.service.store().count_unseen_notifications(h.bob).unwrap(), 0);
    }

    #[tokio::test]
    async fn offline_recipient_gets_notification() {
        let h = setup();
        let outcome = h.service.send_message(h.alice, h.chat, "hello").await.unwrap();
        assert_eq!(outcome.notified_offline, vec![h.bob]);

        let notifications = h.service.store().list_notifications(h.bob).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].content, "New message from alice");
        assert_eq!(notifications[0].actor_id, Some(h.alice));
        assert_eq!(
            notifications[0].reference_id,
            Some(outcome.message.message.message_id.get())
        );

        // Connecting later reports the stored notification
        let (_b, mut rx_b) = h.service.connect(h.bob).await.unwrap();
        assert!(drain(&mut rx_b)
            .iter()
            .any(|e| matches!(e, ServerEvent::UnreadNotificationsCount { count: 1 })));
    }

    #[tokio::test]
    async fn group_send_creates_one_row_per_recipient() {
        let h = setup();
        let store = h.service.store();
        let carol = store.create_user("carol", None, None).unwrap().user_id;
        let team = store
            .create_conversation(true, Some("Team".into()), &[h.alice, h.bob, carol])
            .unwrap()
            .conversation_id;

        let outcome = h.service.send_message(h.alice, team, "standup").await.unwrap();
        let statuses = store
            .list_message_statuses(outcome.message.message.message_id)
            .unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| s.status == DeliveryStatus::Sent));
        assert_eq!(
            store.list_notifications(carol).unwrap()[0].content,
            "New message in Team from alice"
        );
    }

    #[tokio::test]
    async fn non_participant_send_is_denied() {
        let h = setup();
        let eve = h.service.store().create_user("eve", None, None).unwrap().user_id;

        let result = h.service.send_message(eve, h.chat, "let me in").await;
        assert!(matches!(result, Err(ChatError::AccessDenied(_))));
        assert!(h
            .service
            .store()
            .list_messages(h.chat, None, 10)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn block_in_either_direction_vetoes_send() {
        let h = setup();
        let (_a, mut rx_a) = h.service.connect(h.alice).await.unwrap();
        let (_b, mut rx_b) = h.service.connect(h.bob).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        h.service.store().block_user(h.alice, h.bob).unwrap();

        let from_blocked = h.service.send_message(h.bob, h.chat, "hey").await;
        assert!(matches!(&from_blocked, Err(ChatError::Forbidden(m)) if m == BLOCKED_MESSAGE));

        let from_blocker = h.service.send_message(h.alice, h.chat, "hey").await;
        assert!(matches!(from_blocker, Err(ChatError::Forbidden(_))));

        assert!(h
            .service
            .store()
            .list_messages(h.chat, None, 10)
            .unwrap()
            .is_empty());
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn reading_notifies_sender() {
        let h = setup();
        let (_a, mut rx_a) = h.service.connect(h.alice).await.unwrap();
        let (b, mut rx_b) = h.service.connect(h.bob).await.unwrap();
        let outcome = h.service.send_message(h.alice, h.chat, "ping").await.unwrap();
        let message_id = outcome.message.message.message_id;
        drain(&mut rx_a);
        drain(&mut rx_b);

        h.service
            .handle_command(&b, ClientCommand::MessageRead { message_id })
            .await;
        h.service
            .handle_command(&b, ClientCommand::MessageRead { message_id })
            .await;

        let row = h
            .service
            .store()
            .get_message_status(message_id, h.bob)
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeliveryStatus::Read);

        let events = drain(&mut rx_a);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ServerEvent::MessageStatusUpdated { reader_id, status: DeliveryStatus::Read, .. }
                if *reader_id == h.bob
        ));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn presence_reaches_only_co_participants() {
        let h = setup();
        let stranger = h.service.store().create_user("sam", None, None).unwrap().user_id;
        let (_b, mut rx_b) = h.service.connect(h.bob).await.unwrap();
        let (_s, mut rx_s) = h.service.connect(stranger).await.unwrap();
        drain(&mut rx_b);
        drain(&mut rx_s);

        let (a, _rx_a) = h.service.connect(h.alice).await.unwrap();
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerEvent::UserStatusChanged { user_id, status: UserStatus::Online }] if *user_id == h.alice
        ));
        assert!(drain(&mut rx_s).is_empty());

        h.service.disconnect(&a).await;
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerEvent::UserStatusChanged { status: UserStatus::Offline, .. }]
        ));
        assert!(drain(&mut rx_s).is_empty());
        assert!(!h.service.registry().is_online(h.alice));
    }

    #[tokio::test]
    async fn superseded_disconnect_changes_nothing() {
        let h = setup();
        let (old, _rx_old) = h.service.connect(h.alice).await.unwrap();
        let (_new, mut rx_new) = h.service.connect(h.alice).await.unwrap();
        drain(&mut rx_new);

        h.service.disconnect(&old).await;

        assert!(h.service.registry().is_online(h.alice));
        assert_eq!(
            h.service.store().get_user(h.alice).unwrap().unwrap().status,
            UserStatus::Online
        );
        assert_eq!(h.service.rooms().subscriber_count(h.chat), 1);
    }

    #[test]
    fn disconnect_racing_reconnect_leaves_user_online() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        use futures::executor::block_on;

        use crate::testing::FaultyStore;

        let store = Arc::new(FaultyStore::open());
        let alice = store.create_user("alice", None, None).unwrap().user_id;
        let bob = store.create_user("bob", None, None).unwrap().user_id;
        store.create_conversation(false, None, &[alice, bob]).unwrap();
        let service = Arc::new(ChatService::with_defaults(Arc::clone(&store)));

        let (_b, mut rx_b) = block_on(service.connect(bob)).unwrap();
        let (old, _rx_old) = block_on(service.connect(alice)).unwrap();
        drain(&mut rx_b);

        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        store.pause_next_offline_write(reached_tx, resume_rx, Duration::from_millis(300));

        let disconnecting = {
            let service = Arc::clone(&service);
            thread::spawn(move || block_on(service.disconnect(&old)))
        };
        // The old socket is now inside its offline write
        reached_rx.recv().unwrap();

        let reconnecting = {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let connected = block_on(service.connect(alice));
                let _ = resume_tx.send(());
                connected
            })
        };
        disconnecting.join().unwrap();
        let (_new, _rx_new) = reconnecting.join().unwrap().unwrap();

        assert!(service.registry().is_online(alice));
        assert_eq!(
            store.get_user(alice).unwrap().unwrap().status,
            UserStatus::Online
        );
        let last_presence = drain(&mut rx_b)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::UserStatusChanged { status, .. } => Some(status),
                _ => None,
            })
            .last();
        assert_eq!(last_presence, Some(UserStatus::Online));
    }

    #[tokio::test]
    async fn typing_never_echoes_to_sender() {
        let h = setup();
        let (a, mut rx_a) = h.service.connect(h.alice).await.unwrap();
        let (_b, mut rx_b) = h.service.connect(h.bob).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        h.service
            .handle_command(&a, ClientCommand::TypingStart { conversation_id: h.chat })
            .await;

        assert!(drain(&mut rx_a).is_empty());
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerEvent::UserTyping { username, .. }] if username == "alice"
        ));
    }

    #[tokio::test]
    async fn command_errors_are_reported_on_the_connection() {
        let h = setup();
        let eve = h.service.store().create_user("eve", None, None).unwrap().user_id;
        let (e, mut rx_e) = h.service.connect(eve).await.unwrap();
        drain(&mut rx_e);

        h.service
            .handle_command(
                &e,
                ClientCommand::SendMessage {
                    conversation_id: h.chat,
                    content: "hi".into(),
                },
            )
            .await;
        h.service
            .handle_command(&e, ClientCommand::UpdateStatus { status: "away".into() })
            .await;
        h.service
            .handle_command(&e, ClientCommand::JoinConversation { conversation_id: h.chat })
            .await;

        let messages: Vec<String> = drain(&mut rx_e)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(
            messages,
            vec![
                "Access denied to this conversation",
                "Invalid status",
                "Access denied to this conversation",
            ]
        );
        assert!(!h.service.rooms().is_subscribed(e.handle.id(), h.chat));
    }

    #[tokio::test]
    async fn join_leave_and_status_acknowledgements() {
        let h = setup();
        let (a, mut rx_a) = h.service.connect(h.alice).await.unwrap();
        drain(&mut rx_a);

        h.service
            .handle_command(&a, ClientCommand::LeaveConversation { conversation_id: h.chat })
            .await;
        assert!(!h.service.rooms().is_subscribed(a.handle.id(), h.chat));

        h.service
            .handle_command(&a, ClientCommand::JoinConversation { conversation_id: h.chat })
            .await;
        assert!(h.service.rooms().is_subscribed(a.handle.id(), h.chat));

        h.service
            .handle_command(&a, ClientCommand::UpdateStatus { status: "busy".into() })
            .await;
        h.service
            .handle_command(&a, ClientCommand::GetOnlineUsers { conversation_id: h.chat })
            .await;

        let events = drain(&mut rx_a);
        assert_eq!(
            names(&events),
            vec!["left_conversation", "joined_conversation", "status_updated", "online_users"]
        );
        match &events[3] {
            ServerEvent::OnlineUsers { online_users, .. } => {
                assert_eq!(online_users.len(), 1);
                assert_eq!(online_users[0].status, UserStatus::Busy);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn history_pages_oldest_first() {
        let h = setup();
        let mut ids = Vec::new();
        for i in 0..5 {
            let outcome = h
                .service
                .send_message(h.alice, h.chat, &format!("m{i}"))
                .await
                .unwrap();
            ids.push(outcome.message.message.message_id);
        }

        let page = h
            .service
            .history(
                h.bob,
                h.chat,
                HistoryQuery {
                    limit: Some(2),
                    before_message_id: None,
                },
            )
            .await
            .unwrap();
        assert!(page.has_more);
        let contents: Vec<_> = page.messages.iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert_eq!(page.messages[0].sender.username, "alice");
        assert_eq!(page.messages[0].statuses.len(), 1);

        let older = h
            .service
            .history(
                h.bob,
                h.chat,
                HistoryQuery {
                    limit: Some(10),
                    before_message_id: Some(ids[3]),
                },
            )
            .await
            .unwrap();
        assert!(!older.has_more);
        assert_eq!(older.messages.len(), 3);
        assert_eq!(older.messages[0].message.content, "m0");

        let eve = h.service.store().create_user("eve", None, None).unwrap().user_id;
        assert!(matches!(
            h.service.history(eve, h.chat, HistoryQuery::default()).await,
            Err(ChatError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn removed_participant_stops_receiving() {
        let h = setup();
        let store = h.service.store();
        let carol = store.create_user("carol", None, None).unwrap().user_id;
        let team = store
            .create_conversation(true, None, &[h.alice, h.bob, carol])
            .unwrap()
            .conversation_id;
        let (c, mut rx_c) = h.service.connect(carol).await.unwrap();
        drain(&mut rx_c);
        assert!(h.service.rooms().is_subscribed(c.handle.id(), team));

        h.service.remove_participant(team, carol).await.unwrap();
        assert!(!h.service.rooms().is_subscribed(c.handle.id(), team));

        h.service.send_message(h.alice, team, "after").await.unwrap();
        assert!(drain(&mut rx_c).is_empty());

        assert!(matches!(
            h.service.remove_participant(team, carol).await,
            Err(ChatError::NotParticipant { .. })
        ));

        h.service.add_participant(team, carol).await.unwrap();
        assert!(h.service.rooms().is_subscribed(c.handle.id(), team));
    }

    #[tokio::test]
    async fn mark_all_read_counts_rows() {
        let h = setup();
        h.service.send_message(h.alice, h.chat, "one").await.unwrap();
        h.service.send_message(h.alice, h.chat, "two").await.unwrap();

        assert_eq!(h.service.mark_all_read(h.chat, h.bob).await.unwrap(), 2);
        assert_eq!(h.service.mark_all_read(h.chat, h.bob).await.unwrap(), 0);
        assert_eq!(h.service.unread_notification_count(h.bob).await.unwrap(), 2);
    }
}
