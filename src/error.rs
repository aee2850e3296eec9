//! Huginn error types

use std::fmt;
use std::sync::Arc;

/// Broad classification of a fetcher failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Connection refused, DNS failure, reset, ...
    Network,
    /// The fetcher gave up waiting for the provider.
    Timeout,
    /// The provider answered, but with an error.
    Provider,
    /// The provider answered with something we could not decode.
    Format,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Provider => "provider",
            Self::Format => "format",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Fetcher`](crate::fetcher::Fetcher).
///
/// Cheap to clone: a single failure is delivered to every caller waiting on
/// the same request, so the underlying cause is shared behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Provider, message)
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Format, message)
    }

    /// Attach the underlying error.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Format errors mean the provider consistently returns garbage for this
    /// item, so they are not worth retrying.
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, FetchErrorKind::Format)
    }
}

/// Huginn error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum HuginnError {
    /// The item reference is malformed. Raised before any queue interaction.
    #[error("invalid item identifier: {0}")]
    InvalidIdentifier(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The request was dropped before it ran (scheduler shut down).
    #[error("request cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl HuginnError {
    /// Whether this error is worth handing to a retry collaborator.
    ///
    /// Only fetch failures qualify; identifier and configuration errors will
    /// fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
