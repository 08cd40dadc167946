//! # Error Handling
//!
//! Error types for the dispatch core, defined with `thiserror`.
//!
//! Only failures of a whole operation are represented here. Failures of a single
//! compiled listener, route or load assignment are data carried on the compiled
//! item itself and surface through [`crate::xds::dispatch::Dispatcher::get_errors`].

/// Custom result type for dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the dispatch core
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A transform is already registered for the kind
    #[error("Duplicate transform for kind '{kind}'")]
    DuplicateTransform { kind: String },

    /// No transform is registered for the kind
    #[error("No transform for kind '{kind}'")]
    UnknownKind { kind: String },

    /// A transform panicked while compiling a resource
    #[error("Internal error processing {key}: {message}")]
    InternalCompilation { key: String, message: String },

    /// Manifest parsing errors
    #[error("Manifest error: {message}")]
    Manifest {
        message: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },

    /// The assembled snapshot failed its consistency check
    #[error("Snapshot inconsistency at {version}: {message}")]
    Inconsistent { version: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a duplicate transform error
    pub fn duplicate_transform<S: Into<String>>(kind: S) -> Self {
        Self::DuplicateTransform { kind: kind.into() }
    }

    /// Create an unknown kind error
    pub fn unknown_kind<S: Into<String>>(kind: S) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Create an internal compilation error for the resource rendered as `key`
    pub fn internal_compilation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::InternalCompilation { key: key.into(), message: message.into() }
    }

    /// Create a manifest error without an underlying parser error
    pub fn manifest<S: Into<String>>(message: S) -> Self {
        Self::Manifest { message: message.into(), source: None }
    }

    /// Create a snapshot inconsistency error
    pub fn inconsistent<V: Into<String>, M: Into<String>>(version: V, message: M) -> Self {
        Self::Inconsistent { version: version.into(), message: message.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error signals a bug or setup mistake rather than a bad resource.
    ///
    /// Fatal errors are never produced by a single malformed resource, so retrying
    /// the same operation cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DuplicateTransform { .. } | Error::Inconsistent { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Manifest { message: error.to_string(), source: Some(error) }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        fields.sort();

        Self::config(format!("Validation failed: {}", fields.join("; ")))
    }
}
