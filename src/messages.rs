use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Fields = Map<String, Value>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A document as delivered by the store: its key plus loosely-typed fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub data: Fields,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub document: Document,
}

impl ChangeEvent {
    pub fn created(document: Document) -> Self {
        ChangeEvent {
            kind: ChangeKind::Created,
            document,
        }
    }

    pub fn updated(document: Document) -> Self {
        ChangeEvent {
            kind: ChangeKind::Updated,
            document,
        }
    }

    pub fn deleted(id: impl Into<String>) -> Self {
        ChangeEvent {
            kind: ChangeKind::Deleted,
            document: Document {
                id: id.into(),
                data: Fields::new(),
            },
        }
    }
}

/// Stored shape of `rooms/{code}/messages/{id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDoc {
    pub user_id: String,
    #[serde(default)]
    pub user_nickname: String,
    pub encrypted_content: String,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub edited: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub edited_at: Option<DateTime<Utc>>,
    // None until the server timestamp lands.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A decrypted message ready to render.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub user_nickname: String,
    pub text: String,
    pub is_pinned: bool,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn from_doc(id: &str, doc: &MessageDoc, text: String) -> Self {
        Message {
            id: id.to_string(),
            user_id: doc.user_id.clone(),
            user_nickname: doc.user_nickname.clone(),
            text,
            is_pinned: doc.is_pinned,
            edited: doc.edited,
            edited_at: doc.edited_at,
            timestamp: doc.timestamp,
        }
    }

    /// Whether edit/delete controls should be offered to `user_id`.
    /// Nothing below the caller enforces this.
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    Away,
    Offline,
}

// Anything unrecognised is shown as offline.
impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Status::Offline))
    }
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Away => "away",
            Status::Offline => "offline",
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Status::Online => "🟢",
            Status::Away => "🟡",
            Status::Offline => "⚫",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Status::Online),
            "away" => Ok(Status::Away),
            "offline" => Ok(Status::Offline),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Stored shape of `rooms/{code}/users/{userId}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default = "offline")]
    pub status: Status,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

fn offline() -> Status {
    Status::Offline
}

/// Everything the UI needs to draw a room.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalRoomView {
    pub messages: Vec<Message>,
    pub users: HashMap<String, PresenceRecord>,
}
