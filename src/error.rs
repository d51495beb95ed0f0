//! Error types for the GameStream client protocol

use thiserror::Error;

use crate::crypto::CryptoError;

/// Stable status codes surfaced to callers
///
/// Every [`GsError`] maps onto one of these codes via [`GsError::status`].
/// UIs that only need coarse routing (retry, re-pair, report) can match on
/// the code and use the error's `Display` output for the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsStatus {
    /// Success
    Ok,
    /// Malformed or incomplete XML response
    Invalid,
    /// Transport failure (DNS/TLS/TCP/timeout/non-2xx)
    IoError,
    /// Server returned a non-200 `status_code`
    Error,
    /// Protocol-level refusal (MITM detected, `gamesession=0`, ...)
    Failed,
    /// Precondition violated (already paired, in-game)
    WrongState,
    /// Server version outside the supported band
    UnsupportedVersion,
    /// 4K requested against a non-4K server
    NotSupported4K,
}

/// Errors that can occur during GameStream protocol operations
///
/// The human-readable message travels inside the error value instead of a
/// process-global last-error string; callers that need the legacy numeric
/// code can recover it with [`GsError::status`].
#[derive(Debug, Error)]
pub enum GsError {
    /// Transport failure: DNS, TCP, TLS handshake, timeout or non-2xx status
    #[error("I/O error: {message}")]
    Io {
        /// Description of the transport failure
        message: String,
    },

    /// A required element was missing from an XML response
    #[error("malformed response: missing <{element}>")]
    MissingElement {
        /// Name of the missing element
        element: String,
    },

    /// The response body could not be parsed
    #[error("malformed response: {message}")]
    InvalidResponse {
        /// Description of the parse failure
        message: String,
    },

    /// The server answered with a non-200 `status_code`
    #[error("server error: {message}")]
    Server {
        /// The server's `status_message`, or the raw code if absent
        message: String,
    },

    /// The server refused the operation at the protocol level
    #[error("{message}")]
    Failed {
        /// Description of the refusal
        message: String,
    },

    /// The operation is not valid in the current pairing/session state
    #[error("{message}")]
    WrongState {
        /// Description of the violated precondition
        message: String,
    },

    /// The server's major version is outside the supported band
    #[error("{message}")]
    UnsupportedVersion {
        /// Guidance for the user (upgrade or downgrade hint)
        message: String,
    },

    /// 4K was requested but the server does not support it
    #[error("4K streaming is not supported by this server")]
    NotSupported4K,

    /// A cryptographic primitive failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl GsError {
    /// Map this error onto the stable status code taxonomy
    #[must_use]
    pub fn status(&self) -> GsStatus {
        match self {
            Self::Io { .. } => GsStatus::IoError,
            Self::MissingElement { .. } | Self::InvalidResponse { .. } => GsStatus::Invalid,
            Self::Server { .. } => GsStatus::Error,
            Self::Failed { .. } | Self::Crypto(_) => GsStatus::Failed,
            Self::WrongState { .. } => GsStatus::WrongState,
            Self::UnsupportedVersion { .. } => GsStatus::UnsupportedVersion,
            Self::NotSupported4K => GsStatus::NotSupported4K,
        }
    }

    /// Construct a transport error from a message
    pub(crate) fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Construct a missing-element error
    pub(crate) fn missing(element: impl Into<String>) -> Self {
        Self::MissingElement {
            element: element.into(),
        }
    }

    /// Construct a protocol refusal from a message
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for GsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<hex::FromHexError> for GsError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidResponse {
            message: format!("invalid hex payload: {err}"),
        }
    }
}

impl From<roxmltree::Error> for GsError {
    fn from(err: roxmltree::Error) -> Self {
        Self::InvalidResponse {
            message: format!("invalid XML: {err}"),
        }
    }
}

/// Result type alias for GameStream operations
pub type Result<T> = std::result::Result<T, GsError>;
