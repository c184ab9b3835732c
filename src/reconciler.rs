//! Folds store change events into the local view of a room.
//!
//! Both reconcilers upsert whole documents by key and remove on delete, so
//! replaying an event is harmless. Documents are decoded into typed records
//! here, at the subscription boundary; anything that does not decode is
//! logged and dropped.

use std::collections::HashMap;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::crypto::RoomCipher;
use crate::messages::{ChangeEvent, ChangeKind, Document, Message, MessageDoc, PresenceRecord};

struct Entry<T> {
    // Arrival order of the first event for this key, used to break ties.
    seq: u64,
    record: T,
}

struct Keyed<T> {
    entries: HashMap<String, Entry<T>>,
    next_seq: u64,
}

impl<T> Keyed<T> {
    fn new() -> Self {
        Keyed {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    fn upsert(&mut self, key: String, record: T) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.record = record;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Entry { seq, record });
    }

    fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn decode<T: DeserializeOwned>(document: &Document) -> Option<T> {
    match serde_json::from_value(Value::Object(document.data.clone())) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Dropping malformed document {}: {}", document.id, e);
            None
        }
    }
}

/// Ordered, decrypted message list for one room.
pub struct MessageReconciler {
    cipher: RoomCipher,
    docs: Keyed<MessageDoc>,
}

impl MessageReconciler {
    pub fn new(cipher: RoomCipher) -> Self {
        MessageReconciler {
            cipher,
            docs: Keyed::new(),
        }
    }

    pub fn on_event(&mut self, event: ChangeEvent) {
        let ChangeEvent { kind, document } = event;
        match kind {
            ChangeKind::Created | ChangeKind::Updated => {
                if let Some(doc) = decode::<MessageDoc>(&document) {
                    debug!("Message {:?}: {}", kind, document.id);
                    self.docs.upsert(document.id, doc);
                }
            }
            ChangeKind::Deleted => {
                if self.docs.remove(&document.id) {
                    debug!("Message deleted: {}", document.id);
                }
            }
        }
    }

    /// Messages oldest first. Content is decrypted here, not on arrival.
    /// Documents still waiting for a server timestamp sort as time zero.
    pub fn snapshot(&self) -> Vec<Message> {
        let mut entries: Vec<(&String, &Entry<MessageDoc>)> = self.docs.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| {
            let millis = entry.record.timestamp.map_or(0, |t| t.timestamp_millis());
            (millis, entry.seq)
        });
        entries
            .into_iter()
            .map(|(id, entry)| {
                let text = self.cipher.decrypt(&entry.record.encrypted_content);
                Message::from_doc(id, &entry.record, text)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.len() == 0
    }
}

/// Roster of users who have ever announced themselves in the room.
///
/// Nothing is ever expired: a user who vanished without going offline keeps
/// their last status.
pub struct PresenceReconciler {
    users: Keyed<PresenceRecord>,
}

impl PresenceReconciler {
    pub fn new() -> Self {
        PresenceReconciler {
            users: Keyed::new(),
        }
    }

    pub fn on_event(&mut self, event: ChangeEvent) {
        let ChangeEvent { kind, document } = event;
        match kind {
            ChangeKind::Created | ChangeKind::Updated => {
                if let Some(mut record) = decode::<PresenceRecord>(&document) {
                    // Presence documents live under the user id; the payload's
                    // own userId field is ignored.
                    record.user_id.clone_from(&document.id);
                    debug!("Presence {}: {}", record.user_id, record.status);
                    self.users.upsert(document.id, record);
                }
            }
            ChangeKind::Deleted => {
                self.users.remove(&document.id);
            }
        }
    }

    pub fn snapshot(&self) -> HashMap<String, PresenceRecord> {
        self.users
            .entries
            .iter()
            .map(|(user_id, entry)| (user_id.clone(), entry.record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.len() == 0
    }
}

impl Default for PresenceReconciler {
    fn default() -> Self {
        Self::new()
    }
}
