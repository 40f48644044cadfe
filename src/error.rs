//! Error types for the Maskinporten operator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed operator configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed declared MaskinportenClient spec or request
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Transport level failure talking to the authorization server
    #[error("HTTP request failed: {0}")]
    HttpError(reqwest::Error),

    /// A response arrived but its body could not be decoded
    #[error("Invalid response body from {url}: {message}")]
    DecodeError { url: String, message: String },

    /// The remote answered with a 5xx status
    #[error("Server error: HTTP {status} from {url}")]
    ServerError { status: u16, url: String },

    /// The remote answered with a 4xx status
    #[error("Client error: HTTP {status} from {url}")]
    ClientError { status: u16, url: String },

    /// Any other status where 200 was required
    #[error("Unexpected status code: HTTP {status} from {url}")]
    UnexpectedStatusError { status: u16, url: String },

    /// Key material or assertion construction failure
    #[error("Failed to sign grant: {0}")]
    SigningError(String),

    /// More than one secret matched the application label
    #[error("State conflict: {0}")]
    StateConflictError(String),

    #[error("Unexpected secret type: {0} (expected Opaque)")]
    UnexpectedTypeError(String),

    /// The secret shell was absent when a payload update was expected
    #[error("Missing secret: {0}")]
    MissingSecretError(String),

    #[error("No client registered for app: {0}")]
    NotFoundError(String),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Failures the retrying executor absorbs: transport errors and 5xx responses.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::HttpError(_) | Error::ServerError { .. })
    }

    /// Failures worth a short requeue of the whole reconciliation.
    pub fn is_retriable(&self) -> bool {
        self.is_transient() || matches!(self, Error::KubeError(_))
    }

    /// Short, stable label used for metrics and status reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigError(_) => "config",
            Error::ValidationError(_) => "validation",
            Error::HttpError(_) => "network",
            Error::DecodeError { .. } => "decode",
            Error::ServerError { .. } => "server",
            Error::ClientError { .. } => "client",
            Error::UnexpectedStatusError { .. } => "unexpected_status",
            Error::SigningError(_) => "signing",
            Error::StateConflictError(_) => "state_conflict",
            Error::UnexpectedTypeError(_) => "unexpected_type",
            Error::MissingSecretError(_) => "missing_secret",
            Error::NotFoundError(_) => "not_found",
            Error::KubeError(_) => "kube",
            Error::SerializationError(_) => "serialization",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
