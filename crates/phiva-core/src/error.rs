//! Error types shared across the phiva-chat workspace.

use thiserror::Error;

/// A shared error type for the whole application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug)]
pub enum PhivaError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image decode or conversion error
    #[error("Image error: {0}")]
    Image(String),

    /// Inference engine error
    #[error("Engine error: {0}")]
    Engine(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PhivaError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Image error
    pub fn image(message: impl Into<String>) -> Self {
        Self::Image(message.into())
    }

    /// Creates an Engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an engine error
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

impl From<std::io::Error> for PhivaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for PhivaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for PhivaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, PhivaError>`.
pub type Result<T> = std::result::Result<T, PhivaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PhivaError::not_found("dataset", "bench.json");
        assert_eq!(err.to_string(), "Entity not found: dataset 'bench.json'");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PhivaError = io_err.into();
        assert!(matches!(err, PhivaError::Io { .. }));
    }

    #[test]
    fn test_engine_helper() {
        let err = PhivaError::engine("prefill failed");
        assert!(err.is_engine());
        assert_eq!(err.to_string(), "Engine error: prefill failed");
    }
}
