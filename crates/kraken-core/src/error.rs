use std::convert::Infallible;
use std::{fmt, io};

/// Type alias for a type-erased [`Error`] type.
///
/// [`Error`]: std::error::Error
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kind representing the category of error that occurred.
///
/// Combines the domain taxonomy of the engine (crawl-level failure modes) with
/// the ambient kinds a program wired against real collaborators inevitably hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The target does not exist at the source; not retried.
    NotFound,
    /// Transient transport failure; retried by the dispatcher up to `max_retries`.
    Transient,
    /// Retries exhausted; the owning `ExecutionToken` transitions to `Failed`.
    Terminal,
    /// A bulk insert collided with the Target/Document uniqueness constraint.
    UniquenessRace,
    /// CLI-boundary input failed validation (JSON, schema, filter).
    Validation,

    /// The `TaskDispatcher` collaborator failed to submit or join a task.
    Dispatch,
    /// The `MetadataStore` or `DataStore` collaborator failed.
    Store,
    /// I/O errors (file system, network).
    Io,
    /// (De)serialization errors.
    Serde,
    /// Other unclassified errors.
    Other,
}

impl ErrorKind {
    /// Returns a string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::Terminal => "terminal",
            Self::UniquenessRace => "uniqueness_race",
            Self::Validation => "validation",
            Self::Dispatch => "dispatch",
            Self::Store => "store",
            Self::Io => "io",
            Self::Serde => "serde",
            Self::Other => "other",
        }
    }

    /// Whether an error of this kind is expected to be retried by the dispatcher.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Dispatch)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies what the error happened to, for diagnostics.
#[derive(Debug, Clone)]
pub enum ErrorScope {
    /// A crawl identified by name.
    Crawl(String),
    /// A target identified by its `kwargs` primary key.
    Target(String),
    /// A document identified by its store primary key.
    Document(String),
}

/// Unrecoverable failure surfaced by any engine component.
///
/// # Examples
///
/// ```
/// use kraken_core::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::NotFound, "target not found at source");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[must_use]
#[derive(thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
    scope: Option<ErrorScope>,
}

impl Error {
    /// Creates a new [`Error`] with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            scope: None,
        }
    }

    /// Creates a new [`Error`] with the given kind, message, and source error.
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: BoxError) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
            scope: None,
        }
    }

    /// Creates a new [`Error`] from a boxable error, tagged with `kind`.
    pub fn from_boxed(kind: ErrorKind, error: impl Into<BoxError>) -> Self {
        let boxed = error.into();
        let message = boxed.to_string();
        Self {
            kind,
            message,
            source: Some(boxed),
            scope: None,
        }
    }

    /// Returns the error kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attaches an [`ErrorScope`] describing what was affected.
    #[inline]
    pub fn with_scope(mut self, scope: ErrorScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Returns the attached scope, if any.
    #[inline]
    #[must_use]
    pub const fn scope(&self) -> Option<&ErrorScope> {
        self.scope.as_ref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("kind", &self.kind)
            .field("message", &self.message);

        if let Some(ref source) = self.source {
            debug.field("source", source);
        }
        if let Some(ref scope) = self.scope {
            debug.field("scope", scope);
        }

        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::with_source(ErrorKind::Io, "I/O error", Box::new(error))
    }
}

impl From<serde_json::Error> for Error {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::Serde, "JSON error", Box::new(error))
    }
}

impl From<Infallible> for Error {
    #[inline]
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}
