//! # Error Types
//!
//! Custom error types for Elero Bridge using `thiserror`.

use thiserror::Error;

/// Errors raised while decoding a received Elero frame
///
/// Every variant except [`DecodeError::ChecksumMismatch`] describes a
/// malformed buffer. Decode errors never leave the receive path: the frame
/// is logged and dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the fixed header
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// Length byte exceeds the protocol maximum
    #[error("frame length {0} exceeds maximum")]
    TooLong(u8),

    /// Buffer holds fewer bytes than the length byte announces
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Destination count exceeds the protocol maximum
    #[error("too many destinations: {0}")]
    TooManyDestinations(u8),

    /// Destination list leaves no room for the payload block
    #[error("destination list of {dests_len} bytes does not fit frame length {length}")]
    DestinationsTooLong { dests_len: usize, length: u8 },

    /// Radio reported a CRC failure for this frame
    #[error("radio CRC check failed")]
    ChecksumMismatch,
}

impl DecodeError {
    /// Whether the buffer was structurally malformed (as opposed to corrupt)
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DecodeError::ChecksumMismatch)
    }
}

/// Errors raised by the RF transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// None of the candidate serial devices could be opened
    #[error("no radio bridge found (tried: {0})")]
    PortNotFound(String),

    /// Serial port configuration or write failure
    #[error("serial error: {0}")]
    Serial(String),

    /// The port reached end of stream
    #[error("radio link closed")]
    Closed,

    /// Too many consecutive failures; the link needs reopening
    #[error("radio link unavailable after {0} consecutive failures")]
    Unavailable(u32),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for Elero Bridge
#[derive(Debug, Error)]
pub enum EleroError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values contradict each other
    #[error("Inconsistent configuration: {0}")]
    ConfigInconsistency(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RF transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// No blind or light is registered under this address
    #[error("unknown device 0x{0:06x}")]
    UnknownBlind(u32),

    /// A device is already registered under this address
    #[error("device 0x{0:06x} is already registered")]
    DuplicateAddress(u32),

    /// Only devices adopted at runtime can be removed
    #[error("device 0x{0:06x} is configured, not adopted")]
    NotAdopted(u32),

    /// No confirming status arrived within the retry budget
    #[error("no reply from 0x{address:06x} to {action} after {attempts} attempts")]
    CommandTimeout {
        address: u32,
        action: String,
        attempts: u32,
    },

    /// The shared send queue is full
    #[error("command queue full, rejected command for 0x{0:06x}")]
    QueueFull(u32),

    /// The device lacks the capability the intent needs
    #[error("device 0x{address:06x} does not support {intent}")]
    Unsupported { address: u32, intent: String },

    /// A scan result was requested while no scan is running
    #[error("no scan is active")]
    ScanNotActive,
}

/// Result type alias for Elero Bridge
pub type Result<T> = std::result::Result<T, EleroError>;
