//! Dispatch configuration types
//!
//! This module defines how the dispatcher behaves when the native side
//! delivers a payload: what happens if no callback is registered, whether a
//! panicking callback is contained, and how large a payload may be.

use serde::{Deserialize, Serialize};

/// Configuration for payload delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Treat a missing callback as an error (false = drop the payload with a warning)
    #[serde(default)]
    pub require_callback: bool,

    /// Contain panics raised by callbacks and report them as errors
    #[serde(default = "default_true")]
    pub catch_panics: bool,

    /// Optional: reject payloads larger than this many bytes
    #[serde(default)]
    pub max_payload_bytes: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            require_callback: false,
            catch_panics: true,
            max_payload_bytes: None,
        }
    }
}

impl DispatchConfig {
    /// Create a dispatch configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: fail deliveries that find no registered callback
    pub fn with_required_callback(mut self, required: bool) -> Self {
        self.require_callback = required;
        self
    }

    /// Builder method: enable or disable panic containment
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Builder method: set the payload size limit
    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = Some(limit);
        self
    }

    /// Check if a payload of `size` bytes is within the configured limit
    pub fn accepts_payload_size(&self, size: usize) -> bool {
        match self.max_payload_bytes {
            Some(limit) => size <= limit,
            None => true,
        }
    }
}
