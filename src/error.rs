//! Error types for the gateway client
//!
//! Defines configuration errors and gateway-level errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Errors raised while assembling the gateway configuration
///
/// All of these are fatal at startup: the process has no connection
/// to fall back to.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No authentication token was provided
    #[error("missing authentication token (set PARLOR_TOKEN)")]
    MissingToken,

    /// Port value could not be parsed
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// Gateway-level errors
///
/// Covers both fatal errors (the connection is gone) and recoverable
/// errors surfaced to the caller of a single operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// WebSocket protocol error (fatal - the session is dead)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection never became ready, or was torn down
    #[error("connection failed")]
    ConnectionFailed,

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("channel closed")]
    ChannelClosed,

    /// No roster entry matches the given room slug or id
    #[error("room does not exist: {0}")]
    RoomDoesNotExist(String),

    /// No known user matches the given username
    #[error("user does not exist: {0}")]
    UserDoesNotExist(String),

    /// Text could not be parsed as a person or occupant reference
    #[error("unrecognized identifier: {0}")]
    UnrecognizedIdentifier(String),

    /// Transport failure during a room operation
    #[error("room operation failed: {0}")]
    Room(String),

    /// The server replied with an unexpected event shape
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Configuration error (fatal at startup)
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// Whether this error terminates the session
    ///
    /// Fatal errors end the serve loop; recoverable ones are surfaced
    /// to the caller of the failing operation only.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::WebSocket(_)
                | GatewayError::ConnectionFailed
                | GatewayError::ChannelClosed
                | GatewayError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(GatewayError::ConnectionFailed.is_fatal());
        assert!(GatewayError::ChannelClosed.is_fatal());
        assert!(GatewayError::Config(ConfigError::MissingToken).is_fatal());
        assert!(!GatewayError::RoomDoesNotExist("general".into()).is_fatal());
        assert!(!GatewayError::UnrecognizedIdentifier("huh".into()).is_fatal());
        assert!(!GatewayError::Room("emit failed".into()).is_fatal());
    }

    #[test]
    fn test_config_error_message_names_the_variable() {
        let msg = ConfigError::MissingToken.to_string();
        assert!(msg.contains("PARLOR_TOKEN"));
    }
}
