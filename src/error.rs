use thiserror::Error;

/// Category assigned to an engine-reported failure.
///
/// The embedded engine only hands back a numeric code and a message; the
/// session implementation buckets those into one of these categories so
/// callers can branch without knowing engine specifics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// The statement could not be parsed or refers to missing objects.
    BadGrammar,
    /// A constraint (unique, foreign key, not-null, check) was violated.
    DataIntegrity,
    /// The session lacks the privilege for the operation.
    PermissionDenied,
    /// A resource failure that will not clear on retry (disk full, corrupt file).
    NonTransientResource,
    /// The engine gave up waiting, typically on a lock.
    Timeout,
    /// The statement was rolled back by the engine, e.g. after deadlock detection.
    Rollback,
    /// A resource failure that may clear on retry (busy database, contended lock).
    TransientResource,
    /// Anything the session could not classify more precisely.
    General,
}

impl EngineErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadGrammar => "bad grammar",
            Self::DataIntegrity => "data integrity",
            Self::PermissionDenied => "permission denied",
            Self::NonTransientResource => "non-transient resource",
            Self::Timeout => "timeout",
            Self::Rollback => "rollback",
            Self::TransientResource => "transient resource",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the embedded engine, with its native error code and
/// SQLSTATE preserved for programmatic handling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error [{code}, {sql_state}]: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub code: i32,
    pub sql_state: String,
    pub message: String,
}

impl EngineError {
    #[must_use]
    pub fn new(
        kind: EngineErrorKind,
        code: i32,
        sql_state: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }

    /// Shortcut for failures with no meaningful code or SQLSTATE.
    #[must_use]
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::General, 0, "HY000", message)
    }
}

#[derive(Debug, Error)]
pub enum SqlBridgeError {
    #[error("no codec found: {0}")]
    NoCodecFound(String),

    #[error("binding error: {0}")]
    BindingError(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("large object resource error: {0}")]
    ResourceError(String),

    #[error("conversion error: {0}")]
    ConversionError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

impl SqlBridgeError {
    /// The engine category, when this error originated in the engine.
    #[must_use]
    pub fn engine_kind(&self) -> Option<EngineErrorKind> {
        match self {
            Self::Engine(err) => Some(err.kind),
            _ => None,
        }
    }
}
