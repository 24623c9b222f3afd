//! Error taxonomy for calls and client construction.

use std::time::Duration;

/// Outcome of a failed call, as seen by the middleware stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Network hiccup or transport failure. Retried by the retry stage.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Server asked us to wait before calling again.
    #[error("flood wait: retry after {}s", .0.as_secs())]
    FloodWait(Duration),

    #[error("authorization failed: {0}")]
    Auth(String),

    /// The response did not have the shape the caller expected.
    #[error("unexpected response type {0}")]
    UnexpectedResponseType(&'static str),

    #[error("call cancelled")]
    Cancelled,

    /// Internal fault on either side. Absorbed by the recovery stage.
    #[error("internal fault: {0}")]
    Internal(String),

    /// Any other RPC error. Fatal.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },
}

impl CallError {
    /// Classify a raw RPC error reported by the protocol layer.
    ///
    /// `FLOOD_WAIT_17` / `FLOOD_PREMIUM_WAIT_17` (code 420) become
    /// `FloodWait(17s)`, 401 is `Auth`, 5xx is `Internal`.
    pub fn from_rpc(code: i32, message: &str) -> Self {
        if let Some(secs) = flood_wait_seconds(message) {
            return CallError::FloodWait(Duration::from_secs(secs));
        }
        match code {
            401 => CallError::Auth(message.to_string()),
            c if c >= 500 => CallError::Internal(message.to_string()),
            -503 => CallError::Transient(message.to_string()),
            _ if message.eq_ignore_ascii_case("timeout") => {
                CallError::Transient(message.to_string())
            }
            _ => CallError::Rpc {
                code,
                message: message.to_string(),
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }

    /// Server-signalled wait, if any.
    pub fn flood_wait(&self) -> Option<Duration> {
        match self {
            CallError::FloodWait(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CallError {
    fn from(e: std::io::Error) -> Self {
        CallError::Transient(e.to_string())
    }
}

fn flood_wait_seconds(message: &str) -> Option<u64> {
    let rest = message
        .strip_prefix("FLOOD_WAIT_")
        .or_else(|| message.strip_prefix("FLOOD_PREMIUM_WAIT_"))?;
    rest.parse().ok()
}

/// Failure to assemble a client. Raised before any call is attempted.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("malformed session: {0}")]
    MalformedSession(String),

    #[error("invalid proxy {url:?}: {reason}")]
    ProxyConfig { url: String, reason: String },

    #[error("session storage: {0}")]
    Storage(#[source] anyhow::Error),
}
