use std::sync::Arc;

use thiserror::Error;

/// Represents a result type for fallible operations of the event pipeline.
///
/// Only construction of the pipeline can fail. Once running, failures are logged and never
/// reported back to the code submitting events.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur while setting up or delivering events.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Invalid events URI configuration.
    #[error("invalid events_uri configuration")]
    InvalidEventsUri(#[source] url::ParseError),

    /// Indicates that the event worker thread panicked. This should normally never happen.
    #[error("event worker thread panicked")]
    WorkerPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// Failed to serialize events payload.
    #[error("failed to serialize events")]
    Serialization(#[source] Arc<serde_json::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Serialization(Arc::new(value))
    }
}
