//! Error types for highlighting.

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while highlighting blocks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client or pipeline is misconfigured (missing token, unknown
    /// post-processor, ...).
    #[error("{0}")]
    Configuration(String),

    /// The highlight service could not be reached or did not answer usefully.
    #[error("A Torchlight request exception has occurred.")]
    Request(#[from] RequestError),
}

impl Error {
    /// Build a configuration error from any message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Whether this is a transport-level failure (DNS, TCP, TLS, timeout).
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Request(RequestError::Connection { .. }))
    }
}

/// Failures talking to the remote highlight service.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The service could not be reached, or the request timed out.
    #[error("could not connect to {host}")]
    Connection {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Any other client-side failure while sending the request.
    #[error("request could not be sent")]
    Transport(#[source] reqwest::Error),

    /// The response body was not the expected JSON document.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RequestError {
    /// Classify a reqwest error into connection or generic transport failure.
    pub(crate) fn from_reqwest(host: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            RequestError::Connection {
                host: host.to_string(),
                source: err,
            }
        } else if err.is_decode() {
            RequestError::MalformedResponse(err.to_string())
        } else {
            RequestError::Transport(err)
        }
    }
}
