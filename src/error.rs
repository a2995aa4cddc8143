use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration errors (raised while deriving schemas or building clients)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Filter, sort or lookup referenced a field outside the entity descriptor
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    /// Index backend errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// Operation against an index the backend does not know
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// Capability the backend does not provide
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Stored payload could not be turned back into an entity
    #[error("Decode error for document '{key}': {message}")]
    Decode { key: String, message: String },

    /// Entity could not be encoded into a payload
    #[error("Codec error: {0}")]
    Codec(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            ClientError::Configuration(_) => "CONFIGURATION_ERROR",
            ClientError::InvalidField(_) => "INVALID_FIELD",
            ClientError::Backend(_) => "BACKEND_ERROR",
            ClientError::UnknownIndex(_) => "UNKNOWN_INDEX",
            ClientError::Unsupported(_) => "UNSUPPORTED",
            ClientError::Decode { .. } => "DECODE_ERROR",
            ClientError::Codec(_) => "CODEC_ERROR",
            ClientError::Serialization(_) => "SERIALIZATION_ERROR",
            ClientError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the error can only happen while the client is being built
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Configuration(_))
    }

    pub(crate) fn decode(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ClientError::Decode {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for ClientError {
    fn from(err: bincode::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

/// Conversion from redis::RedisError
impl From<redis::RedisError> for ClientError {
    fn from(err: redis::RedisError) -> Self {
        ClientError::Backend(err.to_string())
    }
}

/// Conversion from sled::Error
impl From<sled::Error> for ClientError {
    fn from(err: sled::Error) -> Self {
        ClientError::Backend(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;
