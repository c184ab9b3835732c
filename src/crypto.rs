use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::debug;
use thiserror::Error;

use crate::room::RoomCode;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Cipher key must not be empty")]
    EmptyKey,
    #[error("Token is not valid base64")]
    InvalidEncoding,
}

/// Per-room XOR obfuscation wrapped in base64.
///
/// The key is the room code itself, so anyone who knows the code can read and
/// forge messages. This only keeps text out of plain sight in the store.
#[derive(Clone, Debug)]
pub struct RoomCipher {
    key: Vec<u16>,
}

impl RoomCipher {
    pub fn new(key: &str) -> Result<Self, CryptoError> {
        let key: Vec<u16> = key.encode_utf16().collect();
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let units = self.xor(plaintext.encode_utf16());
        BASE64.encode(units_to_bytes(&units))
    }

    /// Strict decode. Malformed UTF-8 after base64 is replaced, not rejected,
    /// so only a broken transport wrapper is an error.
    pub fn try_decrypt(&self, token: &str) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(token)
            .map_err(|_| CryptoError::InvalidEncoding)?;
        let units = self.xor(bytes_to_units(&bytes).into_iter());
        Ok(String::from_utf16_lossy(&units))
    }

    /// Decodes a token, returning it unchanged when it can't be decoded.
    pub fn decrypt(&self, token: &str) -> String {
        match self.try_decrypt(token) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                debug!("Showing raw token: {}", e);
                token.to_string()
            }
        }
    }

    fn xor(&self, units: impl Iterator<Item = u16>) -> Vec<u16> {
        units
            .zip(self.key.iter().cycle())
            .map(|(unit, key)| unit ^ key)
            .collect()
    }
}

// UTF-8 for everything that pairs up. A key unit of 0x0400 or above can
// leave a surrogate unpaired; those get the three-byte generalized UTF-8
// form so decoding restores them. With an ASCII key the output is plain
// UTF-8, byte for byte what a browser's TextEncoder produces.
fn units_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(units.len() * 3);
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Err(e) => {
                let unit = e.unpaired_surrogate();
                bytes.extend_from_slice(&[
                    0xE0 | (unit >> 12) as u8,
                    0x80 | ((unit >> 6) & 0x3F) as u8,
                    0x80 | (unit & 0x3F) as u8,
                ]);
            }
        }
    }
    bytes
}

// Inverse of `units_to_bytes`. Bytes that are not a sequence it could have
// produced become U+FFFD, one per byte.
fn bytes_to_units(bytes: &[u8]) -> Vec<u16> {
    const REPLACEMENT: u16 = 0xFFFD;

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        let (len, init) = match lead {
            0x00..=0x7F => (1, u32::from(lead)),
            0xC2..=0xDF => (2, u32::from(lead & 0x1F)),
            0xE0..=0xEF => (3, u32::from(lead & 0x0F)),
            0xF0..=0xF4 => (4, u32::from(lead & 0x07)),
            _ => {
                units.push(REPLACEMENT);
                i += 1;
                continue;
            }
        };
        let code_point = bytes
            .get(i + 1..i + len)
            .filter(|tail| tail.iter().all(|b| b & 0xC0 == 0x80))
            .map(|tail| tail.iter().fold(init, |acc, b| (acc << 6) | u32::from(b & 0x3F)))
            .filter(|cp| match len {
                2 => *cp >= 0x80,
                3 => *cp >= 0x800,
                4 => (0x1_0000..=0x10_FFFF).contains(cp),
                _ => true,
            });
        match code_point {
            Some(cp) if cp >= 0x1_0000 => {
                let cp = cp - 0x1_0000;
                units.push(0xD800 | (cp >> 10) as u16);
                units.push(0xDC00 | (cp & 0x3FF) as u16);
                i += len;
            }
            Some(cp) => {
                units.push(cp as u16);
                i += len;
            }
            None => {
                units.push(REPLACEMENT);
                i += 1;
            }
        }
    }
    units
}

impl From<&RoomCode> for RoomCipher {
    fn from(room: &RoomCode) -> Self {
        // RoomCode is never empty.
        Self {
            key: room.as_str().encode_utf16().collect(),
        }
    }
}
