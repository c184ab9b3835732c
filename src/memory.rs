use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::error::StoreError;
use crate::messages::{ChangeEvent, Document, Fields};
use crate::store::{DocumentStore, DocumentWrite, Subscription};

type Subscribers = Vec<mpsc::UnboundedSender<ChangeEvent>>;

#[derive(Default)]
struct Collection {
    // id -> (creation order, fields)
    docs: HashMap<String, (u64, Fields)>,
    next_seq: u64,
    subscribers: Subscribers,
}

impl Collection {
    fn broadcast(&mut self, event: &ChangeEvent) {
        // Closed receivers belong to sessions that have left.
        self.subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    fn document(&self, id: &str) -> Option<Document> {
        self.docs.get(id).map(|(_, data)| Document {
            id: id.to_string(),
            data: data.clone(),
        })
    }

    fn replay(&self) -> Vec<ChangeEvent> {
        let mut docs: Vec<(&String, &(u64, Fields))> = self.docs.iter().collect();
        docs.sort_by_key(|(_, (seq, _))| *seq);
        docs.into_iter()
            .map(|(id, (_, data))| {
                ChangeEvent::created(Document {
                    id: id.clone(),
                    data: data.clone(),
                })
            })
            .collect()
    }
}

#[derive(Default)]
struct Clock {
    last_millis: i64,
}

impl Clock {
    // Never hands out the same millisecond twice.
    fn now_millis(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis().max(self.last_millis + 1);
        self.last_millis = now;
        now
    }
}

/// In-process document store. Every write is echoed to the collection's
/// subscribers, including the writer's own.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    clock: Arc<Mutex<Clock>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().await;
        collections.get(collection)?.document(id)
    }

    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, |c| c.docs.len())
    }

    pub async fn subscriber_count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map_or(0, |c| c.subscribers.iter().filter(|s| !s.is_closed()).count())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    async fn resolve(&self, write: DocumentWrite) -> Fields {
        let DocumentWrite {
            mut fields,
            server_timestamps,
        } = write;
        if !server_timestamps.is_empty() {
            let now = self.clock.lock().await.now_millis();
            for field in server_timestamps {
                fields.insert(field, Value::from(now));
            }
        }
        fields
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError> {
        self.check_online()?;
        let fields = self.resolve(write).await;
        let id = Uuid::new_v4().to_string();

        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.docs.insert(id.clone(), (seq, fields.clone()));
        entry.broadcast(&ChangeEvent::created(Document {
            id: id.clone(),
            data: fields,
        }));
        debug!("Created {}/{}", collection, id);
        Ok(id)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let fields = self.resolve(write).await;

        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        let event = if let Some((_, data)) = entry.docs.get_mut(id) {
            data.extend(fields);
            ChangeEvent::updated(Document {
                id: id.to_string(),
                data: data.clone(),
            })
        } else {
            let seq = entry.next_seq;
            entry.next_seq += 1;
            entry.docs.insert(id.to_string(), (seq, fields.clone()));
            ChangeEvent::created(Document {
                id: id.to_string(),
                data: fields,
            })
        };
        entry.broadcast(&event);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let fields = self.resolve(write).await;

        let mut collections = self.collections.write().await;
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let entry = collections.get_mut(collection).ok_or_else(not_found)?;
        let (_, data) = entry.docs.get_mut(id).ok_or_else(not_found)?;
        data.extend(fields);
        let event = ChangeEvent::updated(Document {
            id: id.to_string(),
            data: data.clone(),
        });
        entry.broadcast(&event);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let mut collections = self.collections.write().await;
        if let Some(entry) = collections.get_mut(collection) {
            if entry.docs.remove(id).is_some() {
                entry.broadcast(&ChangeEvent::deleted(id));
                return Ok(());
            }
        }
        // Deleting a missing document is not an error, same as most stores.
        warn!("Delete of missing document {}/{}", collection, id);
        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        self.check_online()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        for event in entry.replay() {
            tx.send(event).map_err(|_| StoreError::SubscriptionClosed)?;
        }
        entry.subscribers.push(tx);
        debug!("Subscribed to {}", collection);
        Ok(Subscription::new(collection, rx))
    }
}
