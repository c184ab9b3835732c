//! Client-side protocol layer for emoji-only room chat: per-room content
//! obfuscation, signal validation, and reconciliation of store change
//! streams into a local room view.

pub mod config;
pub mod crypto;
pub mod error;
pub mod memory;
pub mod messages;
pub mod reconciler;
pub mod room;
pub mod session;
pub mod store;
pub mod validator;

pub use config::ClientConfig;
pub use crypto::{CryptoError, RoomCipher};
pub use error::{SessionError, StoreError, ValidationError};
pub use memory::MemoryStore;
pub use messages::{
    ChangeEvent, ChangeKind, Document, LocalRoomView, Message, MessageDoc, PresenceRecord, Status,
};
pub use reconciler::{MessageReconciler, PresenceReconciler};
pub use room::{RoomCode, UserIdentity};
pub use session::RoomSession;
pub use store::{AnonymousIdentity, DocumentStore, DocumentWrite, IdentityProvider, Subscription};
pub use validator::{is_sendable, SIGNAL_PALETTE};
