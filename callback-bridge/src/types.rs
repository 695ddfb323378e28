//! Core types for the callback bridge
//!
//! This module defines the error type, the opaque payload carried across the
//! native boundary, and the delivery outcome reported by the dispatcher.
//! The bridge never interprets payload contents - it only moves bytes from
//! the native side to whichever handler the host registered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Which of the two callback slots an operation concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// The generic result callback
    Result,
    /// The file-result callback
    FileResult,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Result => write!(f, "result"),
            SlotKind::FileResult => write!(f, "file-result"),
        }
    }
}

/// Errors that can occur while delivering a payload to a host callback
///
/// Registry operations themselves are total; only delivery can fail.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("No {0} callback registered")]
    NoCallback(SlotKind),

    #[error("The {0} callback panicked: {1}")]
    CallbackPanicked(SlotKind, String),

    #[error("Null payload pointer with length {0}")]
    NullPayload(usize),

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Opaque payload delivered to a callback
///
/// The bytes are owned so a payload can outlive the native buffer it was
/// copied from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    /// Create a payload from owned bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Copy a payload out of a raw native buffer
    ///
    /// # Safety
    /// Same requirements as [`raw_bytes`].
    pub unsafe fn from_raw(data: *const u8, len: usize) -> Result<Self> {
        Ok(Self::new(raw_bytes(data, len)?))
    }

    /// Raw payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload interpreted as UTF-8 text
    pub fn as_str(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.bytes)?)
    }

    /// Consume the payload and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Borrow a native pointer/length pair as a byte slice
///
/// A null pointer is accepted only together with a zero length.
///
/// # Safety
/// If `data` is non-null it must be valid for reads of `len` bytes for `'a`.
pub unsafe fn raw_bytes<'a>(data: *const u8, len: usize) -> Result<&'a [u8]> {
    if data.is_null() {
        if len == 0 {
            return Ok(&[]);
        }
        return Err(BridgeError::NullPayload(len));
    }
    Ok(std::slice::from_raw_parts(data, len))
}

/// Size in bytes of a payload, used to enforce `max_payload_bytes`
pub trait PayloadLen {
    fn payload_len(&self) -> usize;
}

impl PayloadLen for Payload {
    fn payload_len(&self) -> usize {
        self.bytes.len()
    }
}

impl PayloadLen for [u8] {
    fn payload_len(&self) -> usize {
        self.len()
    }
}

/// Outcome of a successful delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// The registered callback was invoked
    Delivered,
    /// No callback was registered and the payload was discarded
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_text() {
        let payload = Payload::from("achievement unlocked");
        assert_eq!(payload.as_str().unwrap(), "achievement unlocked");
        assert_eq!(payload.payload_len(), 20);
    }

    #[test]
    fn test_payload_invalid_utf8() {
        let payload = Payload::new(vec![0xff, 0xfe]);
        assert!(matches!(payload.as_str(), Err(BridgeError::InvalidUtf8(_))));
    }

    #[test]
    fn test_payload_from_raw() {
        let data = b"save.dat";
        let payload = unsafe { Payload::from_raw(data.as_ptr(), data.len()).unwrap() };
        assert_eq!(payload.as_bytes(), data);

        let empty = unsafe { Payload::from_raw(std::ptr::null(), 0).unwrap() };
        assert!(empty.as_bytes().is_empty());

        let err = unsafe { Payload::from_raw(std::ptr::null(), 4).unwrap_err() };
        assert!(matches!(err, BridgeError::NullPayload(4)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            BridgeError::NoCallback(SlotKind::FileResult).to_string(),
            "No file-result callback registered"
        );
        assert_eq!(
            BridgeError::PayloadTooLarge { size: 10, limit: 4 }.to_string(),
            "Payload of 10 bytes exceeds the 4 byte limit"
        );
    }
}
