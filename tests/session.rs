//! Room sessions driven end to end against the in-process store.

use std::sync::Arc;
use std::time::Duration;

use signal_room::{
    DocumentStore, DocumentWrite, MemoryStore, RoomCipher, RoomSession, SessionError, Status,
    StoreError, UserIdentity, ValidationError,
};

const WAIT: Duration = Duration::from_secs(2);

fn alice() -> UserIdentity {
    UserIdentity::new("alice-id", "ALICE").unwrap()
}

fn bob() -> UserIdentity {
    UserIdentity::new("bob-id", "BOB").unwrap()
}

async fn join(store: &Arc<MemoryStore>, room: &str, identity: UserIdentity) -> RoomSession {
    let store: Arc<dyn DocumentStore> = store.clone();
    RoomSession::join(store, room, identity).await.unwrap()
}

/// Waits until the session's view satisfies `ready`.
async fn wait_for<F>(session: &RoomSession, ready: F)
where
    F: Fn(&signal_room::LocalRoomView) -> bool,
{
    let mut updates = session.updates();
    tokio::time::timeout(WAIT, async {
        loop {
            if ready(&session.view().await) {
                return;
            }
            updates.changed().await.unwrap();
        }
    })
    .await
    .expect("view never reached the expected state");
}

// ── Join ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn join_requires_nickname() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let result = RoomSession::join(store, "BTC", UserIdentity::anonymous("u1")).await;
    assert!(matches!(result, Err(SessionError::IdentityRequired)));
}

#[tokio::test]
async fn join_rejects_empty_room_code() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let result = RoomSession::join(store, "  ", alice()).await;
    assert!(matches!(
        result,
        Err(SessionError::Validation(ValidationError::EmptyRoomCode))
    ));
}

#[tokio::test]
async fn join_normalizes_room_and_announces_presence() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "btc", alice()).await;
    assert_eq!(session.room().as_str(), "BTC");

    wait_for(&session, |view| view.users.contains_key("alice-id")).await;
    let users = session.users().await;
    assert_eq!(users["alice-id"].nickname, "ALICE");
    assert_eq!(users["alice-id"].status, Status::Online);
    assert!(users["alice-id"].last_seen.is_some());
    assert!(store.get("rooms/BTC/users", "alice-id").await.is_some());
}

// ── Messages ─────────────────────────────────────────────────────────

#[tokio::test]
async fn sent_signal_round_trips_through_store() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;

    let id = session.send("🟢🚀").await.unwrap();
    wait_for(&session, |view| view.messages.len() == 1).await;

    let stored = store.get("rooms/BTC/messages", &id).await.unwrap();
    let expected = RoomCipher::new("BTC").unwrap().encrypt("🟢🚀");
    assert_eq!(stored.data["encryptedContent"], expected.as_str());

    let messages = session.messages().await;
    assert_eq!(messages[0].text, "🟢🚀");
    assert_eq!(messages[0].user_nickname, "ALICE");
    assert!(messages[0].is_authored_by("alice-id"));
    assert!(messages[0].timestamp.is_some());
}

#[tokio::test]
async fn send_stores_trimmed_text() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;
    session.send("  📈  ").await.unwrap();
    wait_for(&session, |view| view.messages.len() == 1).await;
    assert_eq!(session.messages().await[0].text, "📈");
}

#[tokio::test]
async fn text_is_rejected_without_writing() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;

    for text in ["buy now", "🚀 to the moon", "   ", ""] {
        let result = session.send(text).await;
        assert!(matches!(
            result,
            Err(SessionError::Validation(ValidationError::NotSignal))
        ));
    }
    assert_eq!(store.len("rooms/BTC/messages").await, 0);
}

#[tokio::test]
async fn messages_are_shown_in_send_order() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;
    for signal in ["🟢", "📈", "🚀"] {
        session.send(signal).await.unwrap();
    }
    wait_for(&session, |view| view.messages.len() == 3).await;
    let texts: Vec<String> = session.messages().await.into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["🟢", "📈", "🚀"]);
}

#[tokio::test]
async fn edit_marks_message_edited() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;
    let id = session.send("📈").await.unwrap();
    wait_for(&session, |view| view.messages.len() == 1).await;

    session.edit(&id, "📉").await.unwrap();
    wait_for(&session, |view| view.messages.first().is_some_and(|m| m.edited)).await;

    let message = &session.messages().await[0];
    assert_eq!(message.text, "📉");
    assert!(message.edited_at.is_some());
    assert_eq!(message.user_nickname, "ALICE");
}

#[tokio::test]
async fn invalid_edit_leaves_message_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;
    let id = session.send("📈").await.unwrap();

    let result = session.edit(&id, "sell").await;
    assert!(matches!(result, Err(SessionError::Validation(_))));

    let stored = store.get("rooms/BTC/messages", &id).await.unwrap();
    assert!(stored.data.get("edited").is_none());
}

#[tokio::test]
async fn edit_of_missing_message_is_store_error() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;
    let result = session.edit("missing", "📉").await;
    assert!(matches!(
        result,
        Err(SessionError::Store(StoreError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn delete_removes_message_for_everyone() {
    let store = Arc::new(MemoryStore::new());
    let a = join(&store, "BTC", alice()).await;
    let b = join(&store, "BTC", bob()).await;

    let keep = a.send("🟢").await.unwrap();
    let gone = a.send("🔴").await.unwrap();
    wait_for(&b, |view| view.messages.len() == 2).await;

    a.delete(&gone).await.unwrap();
    wait_for(&b, |view| view.messages.len() == 1).await;
    assert_eq!(b.messages().await[0].id, keep);
}

#[tokio::test]
async fn store_failure_is_reported_and_retryable() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;

    store.set_offline(true);
    let result = session.send("🚀").await;
    assert!(matches!(
        result,
        Err(SessionError::Store(StoreError::Unavailable(_)))
    ));

    store.set_offline(false);
    session.send("🚀").await.unwrap();
    wait_for(&session, |view| view.messages.len() == 1).await;
}

#[tokio::test]
async fn late_joiner_sees_history() {
    let store = Arc::new(MemoryStore::new());
    let a = join(&store, "BTC", alice()).await;
    a.send("💎").await.unwrap();
    a.send("🚀").await.unwrap();

    let b = join(&store, "btc", bob()).await;
    wait_for(&b, |view| view.messages.len() == 2 && view.users.len() == 2).await;
    assert_eq!(b.messages().await[1].text, "🚀");
}

#[tokio::test]
async fn foreign_garbage_renders_raw() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;

    let write = DocumentWrite::new()
        .set("userId", "mallory")
        .unwrap()
        .set("encryptedContent", "not-valid-base64!!")
        .unwrap()
        .server_timestamp("timestamp");
    store.create("rooms/BTC/messages", write).await.unwrap();

    wait_for(&session, |view| view.messages.len() == 1).await;
    assert_eq!(session.messages().await[0].text, "not-valid-base64!!");
}

// ── Presence ─────────────────────────────────────────────────────────

#[tokio::test]
async fn status_change_updates_roster() {
    let store = Arc::new(MemoryStore::new());
    let a = join(&store, "BTC", alice()).await;
    let mut b = join(&store, "BTC", bob()).await;

    b.set_status(Status::Away).await.unwrap();
    assert_eq!(b.status(), Status::Away);
    wait_for(&a, |view| {
        view.users.get("bob-id").is_some_and(|u| u.status == Status::Away)
    })
    .await;
    assert_eq!(a.users().await.len(), 2);
}

#[tokio::test]
async fn nickname_change_updates_roster() {
    let store = Arc::new(MemoryStore::new());
    let mut session = join(&store, "BTC", alice()).await;

    assert!(matches!(
        session.set_nickname("A").await,
        Err(SessionError::Validation(ValidationError::NicknameLength { .. }))
    ));
    assert_eq!(session.identity().nickname, "ALICE");

    session.set_nickname("WHALE").await.unwrap();
    wait_for(&session, |view| {
        view.users.get("alice-id").is_some_and(|u| u.nickname == "WHALE")
    })
    .await;
}

#[tokio::test]
async fn failed_status_write_keeps_old_status() {
    let store = Arc::new(MemoryStore::new());
    let mut session = join(&store, "BTC", alice()).await;
    store.set_offline(true);
    assert!(session.set_status(Status::Offline).await.is_err());
    assert_eq!(session.status(), Status::Online);
}

// ── Leave ────────────────────────────────────────────────────────────

#[tokio::test]
async fn leave_unsubscribes_and_keeps_presence() {
    let store = Arc::new(MemoryStore::new());
    let session = join(&store, "BTC", alice()).await;
    assert_eq!(store.subscriber_count("rooms/BTC/messages").await, 1);

    session.leave().await;
    assert_eq!(store.subscriber_count("rooms/BTC/messages").await, 0);
    assert_eq!(store.subscriber_count("rooms/BTC/users").await, 0);
    assert!(store.get("rooms/BTC/users", "alice-id").await.is_some());
}

#[tokio::test]
async fn switching_rooms_does_not_bleed() {
    let store = Arc::new(MemoryStore::new());
    let writer = join(&store, "BTC", bob()).await;

    let first = join(&store, "BTC", alice()).await;
    writer.send("🟢").await.unwrap();
    wait_for(&first, |view| view.messages.len() == 1).await;
    first.leave().await;

    let second = join(&store, "ETH", alice()).await;
    writer.send("🔴").await.unwrap();
    wait_for(&writer, |view| view.messages.len() == 2).await;

    second.send("💎").await.unwrap();
    wait_for(&second, |view| view.messages.len() == 1).await;
    let texts: Vec<String> = second.messages().await.into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["💎"]);
    assert!(!second.users().await.contains_key("bob-id"));
}
