use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::crypto::RoomCipher;
use crate::error::SessionError;
use crate::messages::{ChangeEvent, LocalRoomView, Message, PresenceRecord, Status};
use crate::reconciler::{MessageReconciler, PresenceReconciler};
use crate::room::{validate_nickname, RoomCode, UserIdentity};
use crate::store::{DocumentStore, DocumentWrite, Subscription};
use crate::validator::validate_signal;

trait Apply: Send + Sync + 'static {
    fn apply(&mut self, event: ChangeEvent);
}

impl Apply for MessageReconciler {
    fn apply(&mut self, event: ChangeEvent) {
        self.on_event(event);
    }
}

impl Apply for PresenceReconciler {
    fn apply(&mut self, event: ChangeEvent) {
        self.on_event(event);
    }
}

// One task per subscription, so events from one stream are applied in the
// order they were delivered.
fn spawn_consumer<R: Apply>(
    mut subscription: Subscription,
    state: Arc<RwLock<R>>,
    revision: Arc<watch::Sender<u64>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            state.write().await.apply(event);
            revision.send_modify(|n| *n += 1);
        }
        debug!("Subscription to {} ended", subscription.collection());
    })
}

/// A joined room. Owns the reconcilers fed by the room's two subscriptions;
/// they are created on join and dropped on leave, never shared between rooms.
///
/// Outbound calls only write to the store. The local view changes when the
/// write comes back through the subscription.
pub struct RoomSession {
    store: Arc<dyn DocumentStore>,
    room: RoomCode,
    identity: UserIdentity,
    status: Status,
    cipher: RoomCipher,
    messages: Arc<RwLock<MessageReconciler>>,
    presence: Arc<RwLock<PresenceReconciler>>,
    revision: watch::Receiver<u64>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSession {
    pub async fn join(
        store: Arc<dyn DocumentStore>,
        room_code: &str,
        identity: UserIdentity,
    ) -> Result<Self, SessionError> {
        Self::join_with_status(store, room_code, identity, Status::Online).await
    }

    pub async fn join_with_status(
        store: Arc<dyn DocumentStore>,
        room_code: &str,
        identity: UserIdentity,
        status: Status,
    ) -> Result<Self, SessionError> {
        let room = RoomCode::parse(room_code)?;
        if !identity.has_nickname() {
            return Err(SessionError::IdentityRequired);
        }

        let message_feed = store.subscribe(&room.messages_path()).await?;
        let presence_feed = store.subscribe(&room.users_path()).await?;

        let cipher = RoomCipher::from(&room);
        let messages = Arc::new(RwLock::new(MessageReconciler::new(cipher.clone())));
        let presence = Arc::new(RwLock::new(PresenceReconciler::new()));
        let (revision_tx, revision) = watch::channel(0);
        let revision_tx = Arc::new(revision_tx);

        let tasks = vec![
            spawn_consumer(message_feed, Arc::clone(&messages), Arc::clone(&revision_tx)),
            spawn_consumer(presence_feed, Arc::clone(&presence), revision_tx),
        ];

        let session = RoomSession {
            store,
            room,
            identity,
            status,
            cipher,
            messages,
            presence,
            revision,
            tasks,
        };

        if let Err(e) = session.announce(&session.identity.nickname, status).await {
            warn!("Failed to announce presence in {}: {}", session.room, e);
            session.leave().await;
            return Err(e);
        }

        info!(
            "{} joined {} as {}",
            session.identity.user_id, session.room, session.identity.nickname
        );
        Ok(session)
    }

    /// Validates, encrypts and stores a new signal. Returns the store id.
    pub async fn send(&self, text: &str) -> Result<String, SessionError> {
        let text = validate_signal(text)?;
        let write = DocumentWrite::new()
            .set("userId", &self.identity.user_id)?
            .set("userNickname", &self.identity.nickname)?
            .set("encryptedContent", self.cipher.encrypt(text))?
            .set("isPinned", false)?
            .server_timestamp("timestamp");

        let id = self
            .store
            .create(&self.room.messages_path(), write)
            .await
            .inspect_err(|e| warn!("Failed to send signal in {}: {}", self.room, e))?;
        debug!("Sent {} in {}", id, self.room);
        Ok(id)
    }

    /// Replaces a message's content. Authorship is not checked here; callers
    /// should only offer this for messages where `is_authored_by` holds.
    pub async fn edit(&self, message_id: &str, text: &str) -> Result<(), SessionError> {
        let text = validate_signal(text)?;
        let write = DocumentWrite::new()
            .set("encryptedContent", self.cipher.encrypt(text))?
            .set("edited", true)?
            .server_timestamp("editedAt");

        self.store
            .update(&self.room.messages_path(), message_id, write)
            .await
            .inspect_err(|e| warn!("Failed to edit {}: {}", message_id, e))?;
        Ok(())
    }

    /// Removes a message. Authorship is not checked here either.
    pub async fn delete(&self, message_id: &str) -> Result<(), SessionError> {
        self.store
            .delete(&self.room.messages_path(), message_id)
            .await
            .inspect_err(|e| warn!("Failed to delete {}: {}", message_id, e))?;
        Ok(())
    }

    /// Writes the presence record with the new status. Repeated calls just
    /// refresh `lastSeen`.
    pub async fn set_status(&mut self, status: Status) -> Result<(), SessionError> {
        self.announce(&self.identity.nickname, status).await?;
        self.status = status;
        Ok(())
    }

    pub async fn set_nickname(&mut self, nickname: &str) -> Result<(), SessionError> {
        let nickname = validate_nickname(nickname)?;
        self.announce(&nickname, self.status).await?;
        self.identity.nickname = nickname;
        Ok(())
    }

    async fn announce(&self, nickname: &str, status: Status) -> Result<(), SessionError> {
        let write = DocumentWrite::new()
            .set("userId", &self.identity.user_id)?
            .set("nickname", nickname)?
            .set("status", status)?
            .server_timestamp("lastSeen");
        self.store
            .upsert(&self.room.users_path(), &self.identity.user_id, write)
            .await?;
        Ok(())
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.snapshot()
    }

    pub async fn users(&self) -> HashMap<String, PresenceRecord> {
        self.presence.read().await.snapshot()
    }

    pub async fn view(&self) -> LocalRoomView {
        LocalRoomView {
            messages: self.messages().await,
            users: self.users().await,
        }
    }

    /// Changes whenever an event from either subscription has been applied.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Cancels both subscriptions and discards the local view. The presence
    /// record stays in the store with whatever status it last had.
    pub async fn leave(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            task.abort();
            // Cancelled is the expected outcome.
            let _ = task.await;
        }
        info!("{} left {}", self.identity.user_id, self.room);
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
