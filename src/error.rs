//! Unified error type.
//!
//! Every failure a caller can observe is one variant of [`Error`], and each
//! variant wraps a kind-specific error so callers can pick a per-kind policy:
//! an [`ArgumentError`] is a bug at the call site, a [`TransportError`] means
//! the server was never heard from, a [`CodecError`] means it answered with
//! something that is not the expected type.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use thiserror::Error as ThisError;

use crate::codec::MediaType;

/// Boxed error returned by handlers and body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Binding the listener or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered, but not with a success status.
    #[error("`{operation}` returned {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Short message suitable for showing to an end user.
    ///
    /// Each error kind maps to a different message so "server unreachable"
    /// can be told apart from "server returned garbage".
    pub fn user_message(&self) -> String {
        match self {
            Self::Argument(e) => format!("invalid request: {e}"),
            Self::Codec(e) => format!("unexpected response: {e}"),
            Self::Config(e) => format!("bad configuration: {e}"),
            Self::Contract(e) => format!("broken contract: {e}"),
            Self::Io(e) => format!("io failure: {e}"),
            Self::Status { status, .. } => format!("server refused the call ({status})"),
            Self::Transport(TransportError::Timeout(_)) => {
                "server did not answer in time".to_owned()
            }
            Self::Transport(TransportError::Cancelled) => "call cancelled".to_owned(),
            Self::Transport(e) => format!("network failure: {e}"),
        }
    }
}

///
/// ArgumentError
///
/// Programmer error detected before any network I/O.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ArgumentError {
    #[error("`{operation}` takes {expected} path argument(s), got {actual}")]
    Arity {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("identity for `{operation}` is not a valid header value")]
    InvalidIdentity { operation: &'static str },
}

///
/// TransportError
///

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("call cancelled")]
    Cancelled,

    #[error("connection failed: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),

    #[error("http: {0}")]
    Http(#[source] hyper_util::client::legacy::Error),

    #[error("request could not be built: {0}")]
    Request(#[from] http::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl From<hyper_util::client::legacy::Error> for TransportError {
    fn from(e: hyper_util::client::legacy::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e)
        } else {
            Self::Http(e)
        }
    }
}

///
/// CodecError
///

#[derive(Debug, ThisError)]
pub enum CodecError {
    /// The body is not UTF-8. The original bytes are kept for diagnostics.
    #[error("body is not valid UTF-8 ({} bytes): {source}", .bytes.len())]
    InvalidUtf8 {
        bytes: Bytes,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("no codec found for {type_name} as {media_type}")]
    NoCodec {
        type_name: &'static str,
        media_type: MediaType,
    },

    /// The body stream failed before it was fully read.
    #[error("body could not be read: {0}")]
    Read(#[source] BoxError),

    #[error("{codec} cannot handle values of type {type_name}")]
    UnsupportedValue {
        codec: &'static str,
        type_name: &'static str,
    },
}

impl CodecError {
    /// The raw bytes that failed to decode, when they were fully received.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::InvalidUtf8 { bytes, .. } => Some(bytes),
            _ => None,
        }
    }
}

///
/// MissingHeaderError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
#[error("missing required header `{header}`")]
pub struct MissingHeaderError {
    pub header: &'static str,
}

///
/// ContractError
///
/// A descriptor that cannot be served or called. Raised at startup.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ContractError {
    #[error("`{operation}`: placeholder `{name}` appears more than once")]
    DuplicatePlaceholder { operation: &'static str, name: String },

    #[error("operation `{operation}` is declared more than once")]
    DuplicateOperation { operation: &'static str },

    #[error("`{operation}` and `{other}` share the route {method} {path}")]
    DuplicateRoute {
        operation: &'static str,
        other: &'static str,
        method: crate::Method,
        path: &'static str,
    },

    #[error("`{operation}`: `{name}` is not a valid placeholder name")]
    InvalidPlaceholder { operation: &'static str, name: String },

    #[error("`{operation}`: template declares {declared:?} but contains {found:?}")]
    PlaceholderMismatch {
        operation: &'static str,
        declared: Vec<&'static str>,
        found: Vec<String>,
    },

    #[error("`{operation}`: unbalanced brace at byte {position}")]
    UnbalancedBrace { operation: &'static str, position: usize },
}

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid base url `{url}`: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: http::uri::InvalidUri,
    },

    #[error("base url `{0}` must be absolute http://host[:port]")]
    BaseUrlShape(String),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
}
