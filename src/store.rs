//! Contracts for the external collaborators: the document store that holds
//! room collections and the identity provider that names this client.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::messages::{ChangeEvent, Fields};

/// Field values for a write. Fields named in `server_timestamps` are filled
/// in by the store with its own clock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentWrite {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Serialize) -> Result<Self, StoreError> {
        self.fields.insert(field.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Live feed of one collection: a replay of its current documents followed
/// by every change after that. Dropping it unsubscribes.
pub struct Subscription {
    collection: String,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(collection: impl Into<String>, rx: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Subscription {
            collection: collection.into(),
            rx,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Stops delivery. Events already queued are discarded with the receiver.
    pub fn cancel(mut self) {
        self.rx.close();
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Adds a document under a store-assigned id and returns the id.
    async fn create(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError>;

    /// Creates the document or merges the fields into it.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), StoreError>;

    /// Merges the fields into an existing document.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_or_create_anonymous_user(&self) -> Result<String, StoreError>;
}

/// Hands out one random user id for the life of the process.
#[derive(Default)]
pub struct AnonymousIdentity {
    user_id: OnceCell<String>,
}

impl AnonymousIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn get_or_create_anonymous_user(&self) -> Result<String, StoreError> {
        Ok(self
            .user_id
            .get_or_init(|| Uuid::new_v4().to_string())
            .clone())
    }
}
