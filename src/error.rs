//! Error types for the relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification used to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input
    Validation,
    /// Unknown device, node or message
    NotFound,
    /// Duplicate identity or a request the current state forbids
    Conflict,
    /// Anything unexpected
    Internal,
}

/// Errors that can occur in the relay
#[derive(Debug, Error)]
pub enum Error {
    /// A required request field was absent or blank
    #[error("{0} is required")]
    MissingField(String),

    /// Input failed validation
    #[error("{0}")]
    Validation(String),

    /// Status string did not normalize to ONLINE or OFFLINE
    #[error("status must be ONLINE or OFFLINE (got {0:?})")]
    InvalidStatus(String),

    /// No node matches the given device id or node id
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// No message with the given id
    #[error("message not found: {0}")]
    MessageNotFound(i64),

    /// Device id is already registered to another node
    #[error("device id already registered: {0}")]
    DuplicateDeviceId(String),

    /// Username is already taken
    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    /// Sender and receiver resolve to the same node
    #[error("cannot send a message to yourself")]
    SelfMessage,

    /// Acknowledging device is not the message's receiver
    #[error("device {device_id} is not the receiver of message {message_id}")]
    NotReceiver { message_id: i64, device_id: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Password hashing failed
    #[error("password hash error: {0}")]
    PasswordHash(String),
}

impl Error {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::Validation(_) | Self::InvalidStatus(_) => {
                ErrorKind::Validation
            }
            Self::NodeNotFound(_) | Self::MessageNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateDeviceId(_)
            | Self::DuplicateUsername(_)
            | Self::SelfMessage
            | Self::NotReceiver { .. } => ErrorKind::Conflict,
            Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Toml(_)
            | Self::Database(_)
            | Self::Sqlite(_)
            | Self::PasswordHash(_) => ErrorKind::Internal,
        }
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Self::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::MissingField("payload".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::InvalidStatus("BOGUS".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::NodeNotFound("ESP32-9".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::MessageNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(Error::DuplicateDeviceId("ESP32-1".into()).kind(), ErrorKind::Conflict);
        assert_eq!(Error::SelfMessage.kind(), ErrorKind::Conflict);
        assert_eq!(Error::Database("pool timed out".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_messages_name_the_input() {
        assert_eq!(
            Error::MissingField("esp32_device_id".into()).to_string(),
            "esp32_device_id is required"
        );
        assert_eq!(
            Error::NodeNotFound("sender ESP32-9".into()).to_string(),
            "node not found: sender ESP32-9"
        );
    }
}
