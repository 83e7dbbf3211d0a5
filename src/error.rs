//! Error types for invoice image retrieval.

use std::fmt;

/// Result type for receipt image operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the retrieval chain.
///
/// Every variant is `Clone` so one in-flight fetch can hand the same outcome
/// to every waiter. None of these are ever cached: a failed lookup is retried
/// on the next access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No usable order identifier.
    ///
    /// Neither `pos_reference` nor `name` is present (or both are empty).
    /// Raised before any remote call is made.
    MissingReference,

    /// The order exists but has no invoice yet.
    ///
    /// A normal outcome shortly after checkout. Carries the message the
    /// server returned, or a default one.
    NotInvoiced(String),

    /// Network, HTTP or server-side failure on either remote call.
    ///
    /// Common causes:
    /// - Connection refused or timed out
    /// - Non-2xx status
    /// - JSON-RPC error envelope
    /// - Response body that does not decode
    RemoteFault(String),

    /// PDF rasterization failed.
    ///
    /// Raised for malformed base64, a document the renderer cannot load,
    /// a document without pages, or a PNG encoding failure.
    ConversionError(String),

    /// Invalid client configuration (bad base URL, bad env value).
    ConfigError(String),

    /// The render context that requested the work went away.
    Cancelled,
}

impl Error {
    /// Message shown in the receipt's status line.
    pub fn status_message(&self) -> String {
        match self {
            Error::MissingReference => "No valid reference found in order data".to_string(),
            Error::NotInvoiced(msg) => msg.clone(),
            Error::RemoteFault(msg) | Error::ConversionError(msg) | Error::ConfigError(msg) => {
                msg.clone()
            }
            Error::Cancelled => "Request cancelled".to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingReference => write!(f, "Missing order reference"),
            Error::NotInvoiced(msg) => write!(f, "Not invoiced: {}", msg),
            Error::RemoteFault(msg) => write!(f, "Remote fault: {}", msg),
            Error::ConversionError(msg) => write!(f, "Conversion error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::RemoteFault(format!("Malformed response: {}", e))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::ConversionError(format!("Invalid base64 payload: {}", e))
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::ConversionError(format!("PNG encoding failed: {}", e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Error::Cancelled
        } else {
            Error::ConversionError(format!("Renderer task failed: {}", e))
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::RemoteFault(format!("Request timed out: {}", e))
        } else {
            Error::RemoteFault(e.to_string())
        }
    }
}
