//! Client configuration loaded from environment variables.
//!
//! Everything is optional; the demo client prompts for what is missing.

use std::env;

use log::warn;

use crate::messages::Status;
use crate::room::{validate_nickname, RoomCode};

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Room to join on start.
    /// Env: `SIGNAL_ROOM_CODE`
    pub room_code: Option<RoomCode>,

    /// Env: `SIGNAL_NICKNAME`
    pub nickname: Option<String>,

    /// Status announced on join.
    /// Env: `SIGNAL_INITIAL_STATUS` (online/away/offline)
    /// Default: `online`
    pub initial_status: Status,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Bad values are logged and
    /// replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("SIGNAL_ROOM_CODE") {
            match RoomCode::parse(&raw) {
                Ok(code) => config.room_code = Some(code),
                Err(e) => warn!("Ignoring SIGNAL_ROOM_CODE: {}", e),
            }
        }

        if let Some(raw) = lookup("SIGNAL_NICKNAME") {
            match validate_nickname(&raw) {
                Ok(nickname) => config.nickname = Some(nickname),
                Err(e) => warn!("Ignoring SIGNAL_NICKNAME: {}", e),
            }
        }

        if let Some(raw) = lookup("SIGNAL_INITIAL_STATUS") {
            match raw.parse() {
                Ok(status) => config.initial_status = status,
                Err(e) => warn!("Ignoring SIGNAL_INITIAL_STATUS: {}", e),
            }
        }

        config
    }
}
