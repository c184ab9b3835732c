use std::fmt;

use crate::error::ValidationError;

pub const ROOM_CODE_MAX_LEN: usize = 20;
pub const NICKNAME_MIN_LEN: usize = 2;
pub const NICKNAME_MAX_LEN: usize = 15;

/// Upper-cased room code. Names the store partition and keys the cipher.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let code = input.trim().to_uppercase();
        if code.is_empty() {
            return Err(ValidationError::EmptyRoomCode);
        }
        if code.chars().count() > ROOM_CODE_MAX_LEN {
            return Err(ValidationError::RoomCodeTooLong {
                max: ROOM_CODE_MAX_LEN,
            });
        }
        Ok(RoomCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn messages_path(&self) -> String {
        format!("rooms/{}/messages", self.0)
    }

    pub fn users_path(&self) -> String {
        format!("rooms/{}/users", self.0)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomCode::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Who is typing. `user_id` comes from the identity provider and never
/// changes; the nickname can.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub nickname: String,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, nickname: &str) -> Result<Self, ValidationError> {
        Ok(UserIdentity {
            user_id: user_id.into(),
            nickname: validate_nickname(nickname)?,
        })
    }

    /// An identity that has not picked a nickname yet. Joining with it fails.
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        UserIdentity {
            user_id: user_id.into(),
            nickname: String::new(),
        }
    }

    pub fn has_nickname(&self) -> bool {
        !self.nickname.trim().is_empty()
    }
}

pub fn validate_nickname(nickname: &str) -> Result<String, ValidationError> {
    let nickname = nickname.trim();
    let len = nickname.chars().count();
    if !(NICKNAME_MIN_LEN..=NICKNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::NicknameLength {
            min: NICKNAME_MIN_LEN,
            max: NICKNAME_MAX_LEN,
        });
    }
    Ok(nickname.to_string())
}
