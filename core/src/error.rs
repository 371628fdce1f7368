use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authorization failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },
    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for MetricsError {
    fn from(err: serde_json::Error) -> Self {
        MetricsError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for MetricsError {
    fn from(err: base64::DecodeError) -> Self {
        MetricsError::Decode(format!("invalid base64 blob content: {err}"))
    }
}
