//! Encoder configuration.
//!
//! Options can be built in code or loaded from any serde format:
//!
//! ```
//! use dbus_marshal::{ByteOrder, EncoderOptions};
//!
//! let options = EncoderOptions::default()
//!     .with_byte_order(ByteOrder::Big)
//!     .with_max_depth(8);
//! assert_eq!(options.max_array_len, 64 * 1024 * 1024);
//! ```

use serde_derive::{Deserialize, Serialize};

/// Largest message body the bus accepts.
pub const MAX_BODY_SIZE: usize = 128 * 1024 * 1024;

/// Largest encoded array the bus accepts.
pub const MAX_ARRAY_LEN: usize = 64 * 1024 * 1024;

/// Nesting limit for arrays and for structs, counted separately.
pub const MAX_DEPTH: usize = 32;

/// Nesting limit for all containers together, variants included.
pub const MAX_TOTAL_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// The endianness flag carried in the first header byte.
    pub const fn marker(self) -> u8 {
        match self {
            ByteOrder::Little => b'l',
            ByteOrder::Big => b'B',
        }
    }

    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'l' => Some(ByteOrder::Little),
            b'B' => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    pub byte_order: ByteOrder,
    pub max_body_size: usize,
    pub max_array_len: usize,
    pub max_depth: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            byte_order: ByteOrder::default(),
            max_body_size: MAX_BODY_SIZE,
            max_array_len: MAX_ARRAY_LEN,
            max_depth: MAX_DEPTH,
        }
    }
}

impl EncoderOptions {
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size.min(MAX_BODY_SIZE);
        self
    }

    pub fn with_max_array_len(mut self, max_array_len: usize) -> Self {
        self.max_array_len = max_array_len.min(MAX_ARRAY_LEN);
        self
    }

    /// Depths above the protocol limit are clamped to it.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_DEPTH);
        self
    }
}
