//! Error types for the schemon client.
//!
//! All fallible operations in this crate return [`SchemonError`] through the
//! [`Result`] alias. Failures coming from the dataframe engine, the sinks or
//! the runtime capabilities are wrapped but never retried here.

use thiserror::Error;

/// The main error type for the schemon client.
#[derive(Error, Debug)]
pub enum SchemonError {
    /// A notebook widget was requested but is not set.
    #[error("Widget '{name}' not found in the notebook")]
    WidgetNotFound {
        /// Name of the missing widget
        name: String,
    },

    /// A secret was requested but the store has no value for it.
    #[error("Secret '{key}' not found in scope '{scope}'")]
    SecretNotFound {
        /// Secret scope that was searched
        scope: String,
        /// Key that was not found
        key: String,
    },

    /// An expectation names a rule that is not registered.
    #[error("Unknown expectation rule '{rule}' for column '{column}'")]
    UnknownRule {
        /// The unresolved rule name
        rule: String,
        /// Column the rule was attached to
        column: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from an object store listing.
    #[cfg(feature = "cloud-storage")]
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// A sink failed to append rows.
    #[error("Sink error writing to '{target}': {message}")]
    Sink {
        /// Table name or path that was being written
        target: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, SchemonError>`.
pub type Result<T> = std::result::Result<T, SchemonError>;

impl SchemonError {
    /// Creates a sink error without an underlying cause.
    pub fn sink(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            target: target.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a sink error wrapping the error that caused it.
    pub fn sink_with_source(
        target: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Sink {
            target: target.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true for lookups of widgets or secrets that do not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WidgetNotFound { .. } | Self::SecretNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for SchemonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<SchemonError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            SchemonError::Internal(inner) => SchemonError::Internal(format!("{msg}: {inner}")),
            other => SchemonError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                SchemonError::Internal(inner) => SchemonError::Internal(format!("{msg}: {inner}")),
                other => SchemonError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
