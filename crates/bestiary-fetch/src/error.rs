use thiserror::Error;

/// Failure of a single page or image request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("body of {0} bytes exceeds the size limit")]
    TooLarge(u64),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("undecodable body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt may succeed.
    ///
    /// Server errors, timeouts and throttling are transient, any other client error
    /// or an oversized body is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(code) => matches!(code, 408 | 429 | 500..=599),
            Self::Transport(_) => true,
            Self::TooLarge(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status(status.as_u16()),
            None if e.is_decode() => Self::Decode(e.to_string()),
            None => Self::Transport(e.to_string()),
        }
    }
}
