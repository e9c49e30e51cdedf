//! Error types for Chatdeck
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.
//!
//! Three families matter to the conversation engine:
//!
//! - [`ExtractionError`]: an attachment could not be read or parsed
//! - [`ServiceError`]: the completion or image endpoint failed
//! - [`ChatdeckError::PersistenceDecode`]: stored sessions could not be decoded
//!
//! None of them is fatal. The controller converts each into either an inline
//! notice or a synthesized assistant message and returns to idle.

use thiserror::Error;

/// Failure to turn an uploaded file into plain text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The file could not be read from disk
    #[error("Failed to read {path}: {message}")]
    Read {
        /// Path of the file that failed to load
        path: String,
        /// Underlying IO error description
        message: String,
    },

    /// The file exceeds the configured attachment size limit
    #[error("File is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge {
        /// Size of the file in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// PDF parsing failed
    #[error("Could not read PDF: {0}")]
    Pdf(String),

    /// Word-processor document parsing failed
    #[error("Could not read document: {0}")]
    Document(String),

    /// The background extraction task did not complete
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Failure of a request to the remote completion service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service answered with a non-success status code
    #[error("Service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape
    #[error("Invalid response from service: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Text shown to the user as the terminal assistant message for a failed request
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::error::ServiceError;
    ///
    /// let err = ServiceError::Status { status: 500, body: String::new() };
    /// assert_eq!(err.user_message(), "Error fetching response (HTTP 500)");
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { status, .. } => format!("Error fetching response (HTTP {})", status),
            Self::Transport(_) => "Network error: the service could not be reached".to_string(),
            Self::InvalidResponse(_) => {
                "Error fetching response: the service sent an unexpected reply".to_string()
            }
        }
    }
}

/// Main error type for Chatdeck operations
#[derive(Error, Debug)]
pub enum ChatdeckError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attachment extraction errors
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Completion or image service errors
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Stored session data could not be decoded
    #[error("Persisted data could not be decoded: {0}")]
    PersistenceDecode(String),

    /// Key-value storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A session id (or prefix) did not match any session
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// A session prefix matched more than one session
    #[error("Ambiguous session prefix: {0}")]
    AmbiguousSession(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for Chatdeck operations
///
/// Command handlers use `anyhow::Error` for rich context; the conversation
/// engine itself returns the typed errors above.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ChatdeckError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_extraction_error_is_transparent() {
        let error: ChatdeckError = ExtractionError::Pdf("bad xref".to_string()).into();
        assert_eq!(error.to_string(), "Could not read PDF: bad xref");
        assert!(matches!(error, ChatdeckError::Extraction(_)));
    }

    #[test]
    fn test_too_large_display() {
        let error = ExtractionError::TooLarge {
            size: 20,
            limit: 10,
        };
        assert_eq!(
            error.to_string(),
            "File is too large: 20 bytes (limit 10 bytes)"
        );
    }

    #[test]
    fn test_service_error_user_messages() {
        let status = ServiceError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(status.user_message(), "Error fetching response (HTTP 502)");

        let transport = ServiceError::Transport("connection refused".to_string());
        assert!(transport.user_message().starts_with("Network error"));
        assert!(!transport.user_message().contains("connection refused"));
    }

    #[test]
    fn test_service_error_conversion() {
        let error: ChatdeckError = ServiceError::InvalidResponse("no field".to_string()).into();
        assert!(matches!(error, ChatdeckError::Service(_)));
    }

    #[test]
    fn test_persistence_decode_display() {
        let error = ChatdeckError::PersistenceDecode("expected value".to_string());
        assert_eq!(
            error.to_string(),
            "Persisted data could not be decoded: expected value"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ChatdeckError = io_error.into();
        assert!(matches!(error, ChatdeckError::Io(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: ChatdeckError = yaml_error.into();
        assert!(matches!(error, ChatdeckError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatdeckError>();
        assert_send_sync::<ServiceError>();
        assert_send_sync::<ExtractionError>();
    }
}
