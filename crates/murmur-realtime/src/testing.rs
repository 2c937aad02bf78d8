//! A `RocksStore` wrapper that can fail or stall selected writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use murmur_core::{ConversationId, MessageId, NotificationId, UserId};
use murmur_store::{
    BlockedPair, Conversation, DeliveryStatus, Message, MessageStatus, NewNotification,
    Notification, Participant, Result, RocksStore, Store, StoreError, User, UserStatus,
};
use parking_lot::Mutex;
use tempfile::TempDir;

struct OfflineGate {
    reached: Sender<()>,
    resume: Receiver<()>,
    wait: Duration,
}

pub(crate) struct FaultyStore {
    inner: RocksStore,
    fail_status_rows: AtomicBool,
    offline_gate: Mutex<Option<OfflineGate>>,
    _dir: TempDir,
}

impl FaultyStore {
    pub(crate) fn open() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            inner: RocksStore::open(dir.path()).unwrap(),
            fail_status_rows: AtomicBool::new(false),
            offline_gate: Mutex::new(None),
            _dir: dir,
        }
    }

    /// Make every `create_message_statuses` call fail.
    pub(crate) fn fail_status_rows(&self) {
        self.fail_status_rows.store(true, Ordering::SeqCst);
    }

    /// Stall the next `offline` presence write: signal `reached`, then wait
    /// for `resume` (at most `wait`) before writing.
    pub(crate) fn pause_next_offline_write(
        &self,
        reached: Sender<()>,
        resume: Receiver<()>,
        wait: Duration,
    ) {
        *self.offline_gate.lock() = Some(OfflineGate {
            reached,
            resume,
            wait,
        });
    }
}

impl Store for FaultyStore {
    fn create_user(
        &self,
        username: &str,
        full_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User> {
        self.inner.create_user(username, full_name, avatar_url)
    }

    fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.inner.get_user(user_id)
    }

    fn update_user_status(&self, user_id: UserId, status: UserStatus) -> Result<()> {
        if status == UserStatus::Offline {
            let gate = self.offline_gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.reached.send(());
                let _ = gate.resume.recv_timeout(gate.wait);
            }
        }
        self.inner.update_user_status(user_id, status)
    }

    fn create_conversation(
        &self,
        is_group: bool,
        conversation_name: Option<String>,
        members: &[UserId],
    ) -> Result<Conversation> {
        self.inner
            .create_conversation(is_group, conversation_name, members)
    }

    fn get_conversation(&self, conversation_id: ConversationId) -> Result<Option<Conversation>> {
        self.inner.get_conversation(conversation_id)
    }

    fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Participant> {
        self.inner.add_participant(conversation_id, user_id)
    }

    fn remove_participant(&self, conversation_id: ConversationId, user_id: UserId) -> Result<()> {
        self.inner.remove_participant(conversation_id, user_id)
    }

    fn is_participant(&self, conversation_id: ConversationId, user_id: UserId) -> Result<bool> {
        self.inner.is_participant(conversation_id, user_id)
    }

    fn list_participants(&self, conversation_id: ConversationId) -> Result<Vec<Participant>> {
        self.inner.list_participants(conversation_id)
    }

    fn list_user_conversations(&self, user_id: UserId) -> Result<Vec<ConversationId>> {
        self.inner.list_user_conversations(user_id)
    }

    fn create_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message> {
        self.inner.create_message(conversation_id, sender_id, content)
    }

    fn get_message(&self, message_id: MessageId) -> Result<Option<Message>> {
        self.inner.get_message(message_id)
    }

    fn list_messages(
        &self,
        conversation_id: ConversationId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.inner.list_messages(conversation_id, before, limit)
    }

    fn create_message_statuses(
        &self,
        message_id: MessageId,
        receiver_ids: &[UserId],
    ) -> Result<Vec<MessageStatus>> {
        if self.fail_status_rows.load(Ordering::SeqCst) {
            return Err(StoreError::Database("write stalled".to_string()));
        }
        self.inner.create_message_statuses(message_id, receiver_ids)
    }

    fn get_message_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
    ) -> Result<Option<MessageStatus>> {
        self.inner.get_message_status(message_id, receiver_id)
    }

    fn list_message_statuses(&self, message_id: MessageId) -> Result<Vec<MessageStatus>> {
        self.inner.list_message_statuses(message_id)
    }

    fn advance_message_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
        target: DeliveryStatus,
    ) -> Result<Option<MessageStatus>> {
        self.inner
            .advance_message_status(message_id, receiver_id, target)
    }

    fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        receiver_id: UserId,
    ) -> Result<u32> {
        self.inner.mark_conversation_read(conversation_id, receiver_id)
    }

    fn block_user(&self, blocker_id: UserId, blocked_id: UserId) -> Result<BlockedPair> {
        self.inner.block_user(blocker_id, blocked_id)
    }

    fn unblock_user(&self, blocker_id: UserId, blocked_id: UserId) -> Result<()> {
        self.inner.unblock_user(blocker_id, blocked_id)
    }

    fn is_blocked(&self, blocker_id: UserId, blocked_id: UserId) -> Result<bool> {
        self.inner.is_blocked(blocker_id, blocked_id)
    }

    fn create_notification(&self, notification: &NewNotification) -> Result<Notification> {
        self.inner.create_notification(notification)
    }

    fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.inner.list_notifications(user_id)
    }

    fn count_unseen_notifications(&self, user_id: UserId) -> Result<u32> {
        self.inner.count_unseen_notifications(user_id)
    }

    fn mark_notification_seen(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification> {
        self.inner.mark_notification_seen(user_id, notification_id)
    }

    fn mark_all_notifications_seen(&self, user_id: UserId) -> Result<u32> {
        self.inner.mark_all_notifications_seen(user_id)
    }
}
