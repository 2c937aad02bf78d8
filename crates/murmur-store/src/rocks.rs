//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use murmur_core::{ConversationId, MessageId, NotificationId, UserId};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, seq};
use crate::types::{
    BlockedPair, Conversation, DeliveryStatus, Message, MessageStatus, NewNotification,
    Notification, Participant, User, UserStatus,
};
use crate::{Store, MAX_NOTIFICATION_CHARS};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write operations (ID allocation, status
    /// transitions, idempotent inserts).
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read and decode a single record.
    fn get_record<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect every key in `name` that starts with `prefix`, in key order.
    fn scan_keys(&self, name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item?;

            // Stop if we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key);
        }
        Ok(found)
    }

    /// Allocate the next value of a sequence into `batch`.
    ///
    /// Must be called with `write_lock` held, and the batch must be written
    /// before the lock is released.
    fn next_id(&self, batch: &mut WriteBatch, name: &[u8]) -> Result<u64> {
        let cf = self.cf(cf::SEQUENCES)?;
        let current = match self.db.get_cf(&cf, name)? {
            Some(bytes) => keys::segment::<u64>(&bytes, 0)?,
            None => 0,
        };
        let next = current + 1;
        batch.put_cf(&cf, name, next.to_be_bytes());
        Ok(next)
    }

    fn put_participant(&self, batch: &mut WriteBatch, participant: &Participant) -> Result<()> {
        let cf_participants = self.cf(cf::PARTICIPANTS)?;
        let cf_by_user = self.cf(cf::CONVERSATIONS_BY_USER)?;

        batch.put_cf(
            &cf_participants,
            keys::participant_key(participant.conversation_id, participant.user_id),
            Self::serialize(participant)?,
        );
        batch.put_cf(
            &cf_by_user,
            keys::user_conversation_key(participant.user_id, participant.conversation_id),
            [],
        );
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn create_user(
        &self,
        username: &str,
        full_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User> {
        let cf = self.cf(cf::USERS)?;
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let user = User {
            user_id: UserId::new(self.next_id(&mut batch, seq::USER)?),
            username: username.to_string(),
            full_name,
            avatar_url,
            status: UserStatus::Offline,
            created_at: Utc::now(),
        };
        batch.put_cf(&cf, keys::user_key(user.user_id), Self::serialize(&user)?);
        self.db.write(batch)?;

        Ok(user)
    }

    fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.get_record(cf::USERS, &keys::user_key(user_id))
    }

    fn update_user_status(&self, user_id: UserId, status: UserStatus) -> Result<()> {
        let cf = self.cf(cf::USERS)?;
        let _guard = self.write_lock.lock();

        let mut user = self.get_user(user_id)?.ok_or(StoreError::NotFound)?;
        user.status = status;
        self.db
            .put_cf(&cf, keys::user_key(user_id), Self::serialize(&user)?)?;
        Ok(())
    }

    // =========================================================================
    // Conversation Operations
    // =========================================================================

    fn create_conversation(
        &self,
        is_group: bool,
        conversation_name: Option<String>,
        members: &[UserId],
    ) -> Result<Conversation> {
        let cf = self.cf(cf::CONVERSATIONS)?;
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let now = Utc::now();
        let conversation = Conversation {
            conversation_id: ConversationId::new(self.next_id(&mut batch, seq::CONVERSATION)?),
            is_group,
            conversation_name,
            created_at: now,
        };
        batch.put_cf(
            &cf,
            keys::conversation_key(conversation.conversation_id),
            Self::serialize(&conversation)?,
        );

        for &user_id in members {
            let participant = Participant {
                conversation_id: conversation.conversation_id,
                user_id,
                joined_at: now,
            };
            self.put_participant(&mut batch, &participant)?;
        }

        self.db.write(batch)?;
        Ok(conversation)
    }

    fn get_conversation(&self, conversation_id: ConversationId) -> Result<Option<Conversation>> {
        self.get_record(cf::CONVERSATIONS, &keys::conversation_key(conversation_id))
    }

    fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Participant> {
        let _guard = self.write_lock.lock();

        if self.get_conversation(conversation_id)?.is_none() {
            return Err(StoreError::NotFound);
        }
        let existing = self.get_record::<Participant>(
            cf::PARTICIPANTS,
            &keys::participant_key(conversation_id, user_id),
        )?;
        if let Some(participant) = existing {
            return Ok(participant);
        }

        let participant = Participant {
            conversation_id,
            user_id,
            joined_at: Utc::now(),
        };
        let mut batch = WriteBatch::default();
        self.put_participant(&mut batch, &participant)?;
        self.db.write(batch)?;

        Ok(participant)
    }

    fn remove_participant(&self, conversation_id: ConversationId, user_id: UserId) -> Result<()> {
        let cf_participants = self.cf(cf::PARTICIPANTS)?;
        let cf_by_user = self.cf(cf::CONVERSATIONS_BY_USER)?;
        let _guard = self.write_lock.lock();

        if !self.is_participant(conversation_id, user_id)? {
            return Err(StoreError::NotFound);
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(
            &cf_participants,
            keys::participant_key(conversation_id, user_id),
        );
        batch.delete_cf(
            &cf_by_user,
            keys::user_conversation_key(user_id, conversation_id),
        );
        self.db.write(batch)?;

        Ok(())
    }

    fn is_participant(&self, conversation_id: ConversationId, user_id: UserId) -> Result<bool> {
        let cf = self.cf(cf::PARTICIPANTS)?;
        let key = keys::participant_key(conversation_id, user_id);
        Ok(self.db.get_pinned_cf(&cf, key)?.is_some())
    }

    fn list_participants(&self, conversation_id: ConversationId) -> Result<Vec<Participant>> {
        let cf = self.cf(cf::PARTICIPANTS)?;
        let prefix = keys::conversation_prefix(conversation_id);

        let mut participants = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;

            if !key.starts_with(&prefix) {
                break;
            }
            participants.push(Self::deserialize(&value)?);
        }

        Ok(participants)
    }

    fn list_user_conversations(&self, user_id: UserId) -> Result<Vec<ConversationId>> {
        self.scan_keys(cf::CONVERSATIONS_BY_USER, &keys::user_prefix(user_id))?
            .iter()
            .map(|key| keys::segment(key, 1).map_err(StoreError::from))
            .collect()
    }

    // =========================================================================
    // Message Operations
    // =========================================================================

    fn create_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message> {
        let cf_messages = self.cf(cf::MESSAGES)?;
        let cf_by_conversation = self.cf(cf::MESSAGES_BY_CONVERSATION)?;
        let _guard = self.write_lock.lock();

        if self.get_conversation(conversation_id)?.is_none() {
            return Err(StoreError::NotFound);
        }

        let mut batch = WriteBatch::default();
        let message = Message {
            message_id: MessageId::new(self.next_id(&mut batch, seq::MESSAGE)?),
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        batch.put_cf(
            &cf_messages,
            keys::message_key(message.message_id),
            Self::serialize(&message)?,
        );
        batch.put_cf(
            &cf_by_conversation,
            keys::conversation_message_key(conversation_id, message.message_id),
            [],
        );
        self.db.write(batch)?;

        Ok(message)
    }

    fn get_message(&self, message_id: MessageId) -> Result<Option<Message>> {
        self.get_record(cf::MESSAGES, &keys::message_key(message_id))
    }

    fn list_messages(
        &self,
        conversation_id: ConversationId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let cf = self.cf(cf::MESSAGES_BY_CONVERSATION)?;
        let prefix = keys::conversation_prefix(conversation_id);

        // Reverse iteration starts at the last key <= start, so step one
        // below the cursor to make it exclusive.
        let upper = before.map_or(u64::MAX, |id| id.get().saturating_sub(1));
        let start = keys::conversation_message_key(conversation_id, MessageId::new(upper));

        let mut messages = Vec::with_capacity(limit.min(128));
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start, Direction::Reverse));

        for item in iter {
            if messages.len() >= limit {
                break;
            }
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }

            let message_id: MessageId = keys::segment(&key, 1)?;
            if let Some(message) = self.get_message(message_id)? {
                messages.push(message);
            }
        }

        Ok(messages)
    }

    // =========================================================================
    // Delivery Status Operations
    // =========================================================================

    fn create_message_statuses(
        &self,
        message_id: MessageId,
        receiver_ids: &[UserId],
    ) -> Result<Vec<MessageStatus>> {
        let cf_status = self.cf(cf::MESSAGE_STATUS)?;
        let cf_by_receiver = self.cf(cf::STATUS_BY_RECEIVER)?;
        let _guard = self.write_lock.lock();

        let message = self.get_message(message_id)?.ok_or(StoreError::NotFound)?;

        let now = Utc::now();
        let mut batch = WriteBatch::default();
        let mut statuses: Vec<MessageStatus> = Vec::with_capacity(receiver_ids.len());
        for &receiver_id in receiver_ids {
            if statuses.iter().any(|s| s.receiver_id == receiver_id)
                || self.get_message_status(message_id, receiver_id)?.is_some()
            {
                return Err(StoreError::AlreadyExists(format!(
                    "status for message {message_id} and receiver {receiver_id}"
                )));
            }

            let status = MessageStatus {
                message_id,
                conversation_id: message.conversation_id,
                receiver_id,
                status: DeliveryStatus::Sent,
                updated_at: now,
            };
            batch.put_cf(
                &cf_status,
                keys::status_key(message_id, receiver_id),
                Self::serialize(&status)?,
            );
            batch.put_cf(
                &cf_by_receiver,
                keys::receiver_status_key(receiver_id, message.conversation_id, message_id),
                [],
            );
            statuses.push(status);
        }
        self.db.write(batch)?;

        Ok(statuses)
    }

    fn get_message_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
    ) -> Result<Option<MessageStatus>> {
        self.get_record(cf::MESSAGE_STATUS, &keys::status_key(message_id, receiver_id))
    }

    fn list_message_statuses(&self, message_id: MessageId) -> Result<Vec<MessageStatus>> {
        let cf = self.cf(cf::MESSAGE_STATUS)?;
        let prefix = keys::message_prefix(message_id);

        let mut statuses = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;

            if !key.starts_with(&prefix) {
                break;
            }
            statuses.push(Self::deserialize(&value)?);
        }

        Ok(statuses)
    }

    fn advance_message_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
        target: DeliveryStatus,
    ) -> Result<Option<MessageStatus>> {
        let cf = self.cf(cf::MESSAGE_STATUS)?;
        let _guard = self.write_lock.lock();

        let mut row = self
            .get_message_status(message_id, receiver_id)?
            .ok_or(StoreError::NotFound)?;

        if row.status >= target {
            return Ok(None);
        }

        row.status = target;
        row.updated_at = Utc::now();
        self.db.put_cf(
            &cf,
            keys::status_key(message_id, receiver_id),
            Self::serialize(&row)?,
        )?;

        Ok(Some(row))
    }

    fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        receiver_id: UserId,
    ) -> Result<u32> {
        let cf = self.cf(cf::MESSAGE_STATUS)?;
        let _guard = self.write_lock.lock();

        let index = self.scan_keys(
            cf::STATUS_BY_RECEIVER,
            &keys::receiver_conversation_prefix(receiver_id, conversation_id),
        )?;

        let now = Utc::now();
        let mut batch = WriteBatch::default();
        let mut updated = 0u32;
        for key in &index {
            let message_id: MessageId = keys::segment(key, 2)?;
            let Some(mut row) = self.get_message_status(message_id, receiver_id)? else {
                continue;
            };
            if row.status == DeliveryStatus::Read {
                continue;
            }

            row.status = DeliveryStatus::Read;
            row.updated_at = now;
            batch.put_cf(
                &cf,
                keys::status_key(message_id, receiver_id),
                Self::serialize(&row)?,
            );
            updated += 1;
        }

        if updated > 0 {
            self.db.write(batch)?;
        }
        Ok(updated)
    }

    // =========================================================================
    // Block Operations
    // =========================================================================

    fn block_user(&self, blocker_id: UserId, blocked_id: UserId) -> Result<BlockedPair> {
        if blocker_id == blocked_id {
            return Err(StoreError::InvalidInput(
                "a user cannot block themselves".to_string(),
            ));
        }

        let cf = self.cf(cf::BLOCKED_USERS)?;
        let key = keys::block_key(blocker_id, blocked_id);
        let _guard = self.write_lock.lock();

        if let Some(existing) = self.get_record::<BlockedPair>(cf::BLOCKED_USERS, &key)? {
            return Ok(existing);
        }

        let pair = BlockedPair {
            blocker_id,
            blocked_id,
            created_at: Utc::now(),
        };
        self.db.put_cf(&cf, key, Self::serialize(&pair)?)?;
        Ok(pair)
    }

    fn unblock_user(&self, blocker_id: UserId, blocked_id: UserId) -> Result<()> {
        let cf = self.cf(cf::BLOCKED_USERS)?;
        let key = keys::block_key(blocker_id, blocked_id);
        let _guard = self.write_lock.lock();

        if !self.is_blocked(blocker_id, blocked_id)? {
            return Err(StoreError::NotFound);
        }
        self.db.delete_cf(&cf, key)?;
        Ok(())
    }

    fn is_blocked(&self, blocker_id: UserId, blocked_id: UserId) -> Result<bool> {
        let cf = self.cf(cf::BLOCKED_USERS)?;
        let key = keys::block_key(blocker_id, blocked_id);
        Ok(self.db.get_pinned_cf(&cf, key)?.is_some())
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    fn create_notification(&self, new: &NewNotification) -> Result<Notification> {
        let length = new.content.chars().count();
        if length == 0 || length > MAX_NOTIFICATION_CHARS {
            return Err(StoreError::InvalidInput(format!(
                "notification content must be 1 to {MAX_NOTIFICATION_CHARS} characters"
            )));
        }

        let cf_notifications = self.cf(cf::NOTIFICATIONS)?;
        let cf_by_user = self.cf(cf::NOTIFICATIONS_BY_USER)?;
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let notification = Notification {
            notification_id: NotificationId::new(self.next_id(&mut batch, seq::NOTIFICATION)?),
            user_id: new.user_id,
            actor_id: new.actor_id,
            kind: new.kind,
            content: new.content.clone(),
            reference_type: new.reference_type,
            reference_id: new.reference_id,
            is_seen: false,
            created_at: Utc::now(),
        };
        batch.put_cf(
            &cf_notifications,
            keys::notification_key(notification.notification_id),
            Self::serialize(&notification)?,
        );
        batch.put_cf(
            &cf_by_user,
            keys::user_notification_key(new.user_id, notification.notification_id),
            [],
        );
        self.db.write(batch)?;

        Ok(notification)
    }

    fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut notifications = Vec::new();
        for key in self.scan_keys(cf::NOTIFICATIONS_BY_USER, &keys::user_prefix(user_id))? {
            let notification_id: NotificationId = keys::segment(&key, 1)?;
            if let Some(notification) = self.get_record::<Notification>(
                cf::NOTIFICATIONS,
                &keys::notification_key(notification_id),
            )? {
                notifications.push(notification);
            }
        }
        Ok(notifications)
    }

    fn count_unseen_notifications(&self, user_id: UserId) -> Result<u32> {
        let mut count = 0u32;
        for notification in self.list_notifications(user_id)? {
            if !notification.is_seen {
                count += 1;
            }
        }
        Ok(count)
    }

    fn mark_notification_seen(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification> {
        let cf = self.cf(cf::NOTIFICATIONS)?;
        let key = keys::notification_key(notification_id);
        let _guard = self.write_lock.lock();

        let mut notification = self
            .get_record::<Notification>(cf::NOTIFICATIONS, &key)?
            .filter(|n| n.user_id == user_id)
            .ok_or(StoreError::NotFound)?;

        if !notification.is_seen {
            notification.is_seen = true;
            self.db.put_cf(&cf, key, Self::serialize(&notification)?)?;
        }
        Ok(notification)
    }

    fn mark_all_notifications_seen(&self, user_id: UserId) -> Result<u32> {
        let cf = self.cf(cf::NOTIFICATIONS)?;
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let mut updated = 0u32;
        for mut notification in self.list_notifications(user_id)? {
            if notification.is_seen {
                continue;
            }
            notification.is_seen = true;
            batch.put_cf(
                &cf,
                keys::notification_key(notification.notification_id),
                Self::serialize(&notification)?,
            );
            updated += 1;
        }
        self.db.write(batch)?;

        Ok(updated)
    }
}
