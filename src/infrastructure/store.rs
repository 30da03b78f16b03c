//! Shared message store seam and in-memory reference implementation
//!
//! The store is the one resource shared across channel sessions (message
//! records by id, user records, and the per-channel ordered id cache).
//! It is injected into each engine explicitly — no ambient singleton — and
//! every implementation must document its synchronization model.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::message::{ChannelId, MessageId, UserId};
use crate::domain::record::{MemberRecord, MessageRecord, UserRecord};

/// Key→record map plus the per-channel ordered id cache.
///
/// Methods take `&self`: implementations are expected to be internally
/// synchronized (or confined to a single thread by the host). The engine
/// treats the store as a cache, never as the source of truth on ordering —
/// windows are always re-derived as the sorted union of known ids.
pub trait MessageStore: Send + Sync {
    fn get(&self, id: &MessageId) -> Option<MessageRecord>;
    fn put(&self, record: MessageRecord);

    fn get_user(&self, id: &UserId) -> Option<UserRecord>;
    fn put_user(&self, record: UserRecord);

    fn get_member(&self, id: &UserId) -> Option<MemberRecord>;
    fn put_member(&self, record: MemberRecord);

    /// The cached ordered id list for a channel, if one is loaded.
    fn channel_ids(&self, channel: &ChannelId) -> Option<Vec<MessageId>>;
    fn set_channel_ids(&self, channel: &ChannelId, ids: Vec<MessageId>);

    /// Drop a channel's id cache. Callers must first check that no other
    /// live session depends on it.
    fn evict_channel(&self, channel: &ChannelId);
}

#[derive(Debug, Default)]
struct StoreInner {
    messages: HashMap<MessageId, MessageRecord>,
    users: HashMap<UserId, UserRecord>,
    members: HashMap<UserId, MemberRecord>,
    channel_ids: HashMap<ChannelId, Vec<MessageId>>,
}

/// In-memory [`MessageStore`], internally synchronized with a mutex so it
/// can be shared across sessions (e.g. preloading adjacent channels).
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("BUG: message store mutex poisoned")
    }
}

impl MessageStore for InMemoryMessageStore {
    fn get(&self, id: &MessageId) -> Option<MessageRecord> {
        self.lock().messages.get(id).cloned()
    }

    fn put(&self, record: MessageRecord) {
        self.lock().messages.insert(record.id.clone(), record);
    }

    fn get_user(&self, id: &UserId) -> Option<UserRecord> {
        self.lock().users.get(id).cloned()
    }

    fn put_user(&self, record: UserRecord) {
        self.lock().users.insert(record.id.clone(), record);
    }

    fn get_member(&self, id: &UserId) -> Option<MemberRecord> {
        self.lock().members.get(id).cloned()
    }

    fn put_member(&self, record: MemberRecord) {
        self.lock().members.insert(record.user.clone(), record);
    }

    fn channel_ids(&self, channel: &ChannelId) -> Option<Vec<MessageId>> {
        self.lock().channel_ids.get(channel).cloned()
    }

    fn set_channel_ids(&self, channel: &ChannelId, ids: Vec<MessageId>) {
        self.lock().channel_ids.insert(channel.clone(), ids);
    }

    fn evict_channel(&self, channel: &ChannelId) {
        self.lock().channel_ids.remove(channel);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_helpers::{record, ulid};

    #[test]
    fn test_put_and_get_message() {
        let store = InMemoryMessageStore::new();
        let rec = record(ulid(1000, 1), "ch1");

        store.put(rec.clone());
        assert_eq!(store.get(&rec.id), Some(rec));
        assert_eq!(store.get(&ulid(2000, 1)), None);
    }

    #[test]
    fn test_channel_id_cache_roundtrip() {
        let store = InMemoryMessageStore::new();
        let channel = ChannelId::new("ch1");
        let ids = vec![ulid(1000, 1), ulid(2000, 1)];

        assert_eq!(store.channel_ids(&channel), None);
        store.set_channel_ids(&channel, ids.clone());
        assert_eq!(store.channel_ids(&channel), Some(ids));
    }

    #[test]
    fn test_evict_channel_leaves_messages_intact() {
        let store = InMemoryMessageStore::new();
        let channel = ChannelId::new("ch1");
        let rec = record(ulid(1000, 1), "ch1");

        store.put(rec.clone());
        store.set_channel_ids(&channel, vec![rec.id.clone()]);
        store.evict_channel(&channel);

        assert_eq!(store.channel_ids(&channel), None);
        // Record garbage collection is the store owner's concern, not the
        // eviction path's
        assert_eq!(store.get(&rec.id), Some(rec));
    }
}
