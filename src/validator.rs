use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

// Presentation emoji, text-default emoji forced by U+FE0F, and the ZWJ that
// glues composed sequences together.
static EMOJI_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\p{Emoji_Presentation}|\p{Emoji}\x{FE0F}|\x{200D})+")
        .unwrap_or_else(|e| panic!("emoji pattern failed to compile: {e}"))
});

/// Quick-pick signals offered next to the input box.
pub const SIGNAL_PALETTE: [&str; 31] = [
    "🟢", "🔴", "⏸️", "📈", "📉", "💰", "💎", "🚀",
    "⚠️", "✅", "❌", "🔥", "❄️", "💧", "⛓️", "🏦",
    "💳", "💵", "📱", "⬆️", "⬇️", "↔️", "🪙", "⛏️",
    "🕯️", "📊", "💼", "🎯", "⚡", "🌟", "🔔",
];

/// True when `text`, ignoring whitespace, is made only of emoji.
pub fn is_sendable(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && EMOJI_RUN.replace_all(trimmed, "").trim().is_empty()
}

/// Validates a signal and returns the trimmed text that should be stored.
pub fn validate_signal(text: &str) -> Result<&str, ValidationError> {
    if is_sendable(text) {
        Ok(text.trim())
    } else {
        Err(ValidationError::NotSignal)
    }
}
