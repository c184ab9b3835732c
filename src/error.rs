use thiserror::Error;

/// Input that was rejected before anything was written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Signals only: messages must contain nothing but emoji")]
    NotSignal,
    #[error("Enter a room code")]
    EmptyRoomCode,
    #[error("Room code must be at most {max} characters")]
    RoomCodeTooLong { max: usize },
    #[error("Nickname must be {min} to {max} characters")]
    NicknameLength { min: usize, max: usize },
}

/// Failures reported by a document store. All of them are retryable.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Subscription closed")]
    SubscriptionClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Set your identity first")]
    IdentityRequired,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
