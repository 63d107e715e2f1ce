//! # Error Types
//!
//! Custom error types for Trainer Bridge using `thiserror`.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for Trainer Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telemetry serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GATT read/write/subscribe failures reported by the transport
    #[error("BLE transport error: {0}")]
    Transport(String),

    /// A service or characteristic could not be resolved on the peripheral
    #[error("Characteristic {characteristic} not found in service {service}")]
    ServiceNotFound {
        /// Service that was searched
        service: Uuid,
        /// Characteristic that was requested
        characteristic: Uuid,
    },

    /// Malformed or unexpected frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Steering plate answered the challenge response with a rejection
    #[error("Sterzo handshake rejected")]
    HandshakeRejected,

    /// Steering plate never sent a final handshake status
    #[error("Sterzo handshake timed out")]
    HandshakeTimeout,

    /// The link dropped while an operation was in flight
    #[error("Device disconnected")]
    Disconnected,
}

/// Result type alias for Trainer Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
