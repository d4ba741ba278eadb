//! Error taxonomy for the component tree, codec and signal boundary.
//!
//! Codec and structural errors always surface to the immediate caller.
//! Signal handler failures are caught at the dispatch boundary and reported
//! as [`Error::DispatchFailure`]; nothing a handler raises crosses a frame.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by tree, codec, option and signal operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A lookup (path segment, map key, option, builder argument) missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// No builder is registered for the requested concrete type.
    #[error("no builder registered for type [{0}]")]
    TypeNotFound(String),

    /// A keyed entry (option, builder, notifier) already exists.
    #[error("key [{0}] already exists")]
    DuplicateKey(String),

    /// A sibling with the same name already exists.
    #[error("component [{name}] already exists under [{parent}]")]
    NameCollision {
        /// Path of the parent holding the existing sibling.
        parent: String,
        /// Colliding name.
        name: String,
    },

    /// Component names must be non-empty and must not contain separators.
    #[error("invalid component name [{0}]")]
    InvalidName(String),

    /// The wire type of a value disagrees with the declared type.
    #[error("type mismatch for [{key}]: expected [{expected}], found [{found}]")]
    TypeMismatch {
        /// Entry or option name.
        key: String,
        /// Declared or requested type tag.
        expected: String,
        /// Type tag found on the wire.
        found: String,
    },

    /// An existing entry has a different type than the one being stored.
    #[error("value [{key}] is of type [{existing}], cannot store [{requested}]")]
    TypeConflict {
        /// Entry key.
        key: String,
        /// Type tag already recorded for the entry.
        existing: String,
        /// Type tag of the value being written.
        requested: String,
    },

    /// A value lies outside the restricted set of an option.
    #[error("value [{value}] is not allowed for option [{option}]")]
    ValidationError {
        /// Option name.
        option: String,
        /// Offending value, in wire form.
        value: String,
    },

    /// Structural corruption of an XML payload, frame or snapshot.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Array node without delimiter metadata.
    #[error("array [{0}] has no delimiter")]
    MissingDelimiter(String),

    /// Re-splitting an array payload disagrees with its recorded size.
    #[error("array [{key}] size mismatch: expected {expected} item(s), found {found}")]
    SizeMismatch {
        /// Array key.
        key: String,
        /// Recorded element count.
        expected: usize,
        /// Token count after splitting the payload.
        found: usize,
    },

    /// A map entry was written with an empty key.
    #[error("the key is empty")]
    EmptyKey,

    /// An array was written with an empty delimiter.
    #[error("the delimiter is empty")]
    EmptyDelimiter,

    /// The receiver has no signal with this name.
    #[error("unknown signal [{signal}] on [{target}]")]
    UnknownSignal {
        /// Receiver path.
        target: String,
        /// Requested signal name.
        signal: String,
    },

    /// A signal handler failed; the diagnostic is the handler's error text.
    #[error("signal [{signal}] failed: {message}")]
    DispatchFailure {
        /// Signal name.
        signal: String,
        /// Textual diagnostic.
        message: String,
    },
}

/// Flat error families, stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Lookup miss (including unknown builder type and unknown signal).
    NotFound,
    /// Registration conflict on a keyed entry.
    DuplicateKey,
    /// Sibling name conflict or invalid name.
    NameCollision,
    /// Wire type vs declared type.
    TypeMismatch,
    /// Value outside a restricted set.
    ValidationError,
    /// Structural, size or delimiter corruption.
    MalformedPayload,
    /// Handler error caught at the signal boundary.
    DispatchFailure,
}

impl ErrorKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::NameCollision => "name_collision",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::DispatchFailure => "dispatch_failure",
        }
    }

    /// Parse a wire name back into a kind.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "not_found" => Some(ErrorKind::NotFound),
            "duplicate_key" => Some(ErrorKind::DuplicateKey),
            "name_collision" => Some(ErrorKind::NameCollision),
            "type_mismatch" => Some(ErrorKind::TypeMismatch),
            "validation_error" => Some(ErrorKind::ValidationError),
            "malformed_payload" => Some(ErrorKind::MalformedPayload),
            "dispatch_failure" => Some(ErrorKind::DispatchFailure),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::TypeNotFound(_) | Error::UnknownSignal { .. } => {
                ErrorKind::NotFound
            }
            Error::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Error::NameCollision { .. } | Error::InvalidName(_) => ErrorKind::NameCollision,
            Error::TypeMismatch { .. } | Error::TypeConflict { .. } => ErrorKind::TypeMismatch,
            Error::ValidationError { .. } => ErrorKind::ValidationError,
            Error::MalformedPayload(_)
            | Error::MissingDelimiter(_)
            | Error::SizeMismatch { .. }
            | Error::EmptyKey
            | Error::EmptyDelimiter => ErrorKind::MalformedPayload,
            Error::DispatchFailure { .. } => ErrorKind::DispatchFailure,
        }
    }

    /// Shorthand for a [`Error::MalformedPayload`].
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedPayload(msg.into())
    }

    /// Shorthand for a [`Error::NotFound`].
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }
}
