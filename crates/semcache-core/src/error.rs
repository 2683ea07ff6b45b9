use thiserror::Error;

/// Canonical error type for the caching proxy.
#[derive(Debug, Error)]
pub enum Error {
    /// Query text was malformed or missing a required stage.
    #[error("parse error: {0}")]
    Parse(String),

    /// Input was structurally valid but semantically unacceptable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity was not found in a record store.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"cache item"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: u64,
    },

    /// Entity already exists and cannot be inserted again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name.
        entity: &'static str,
        /// Identifier that conflicts.
        id: u64,
    },

    /// Record store backend error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Remote document source failure.
    #[error("data source error: {0}")]
    Source(String),

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error occurred.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a `Parse` variant.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: u64) -> Self {
        Self::AlreadyExists { entity, id }
    }

    /// Creates a `Storage` variant.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a `Source` variant.
    #[must_use]
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() || err.is_syntax() || err.is_data() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

/// Convenient result alias for proxy operations.
pub type Result<T> = std::result::Result<T, Error>;
