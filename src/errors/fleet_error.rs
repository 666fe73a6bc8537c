use thiserror::Error;

/// Failures raised while talking to the upstream fleet service.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("No session token is available")]
    MissingCredentials,

    #[error("The upstream service rejected the session token")]
    SessionRejected,

    #[error("Upstream responded with {status}: {detail}")]
    Upstream { status: u16, detail: String },

    #[error("Failed to reach the upstream service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected payload from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// What a failure means for the caller, regardless of which request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    MissingCredentials,
    Unavailable,
}

impl FleetError {
    /// Everything but a missing token or a token the upstream reports as
    /// `valid: false` is retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingCredentials | Self::SessionRejected)
    }
    pub fn class(&self) -> FailureClass {
        match self {
            Self::MissingCredentials => FailureClass::MissingCredentials,
            _ => FailureClass::Unavailable,
        }
    }
}
