use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// No usable local credential; interactive login is required.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Refresh possibilities are exhausted; re-login is required.
    #[error("Session expired - please login again")]
    SessionExpired,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx or malformed response from the analysis service.
    /// `status` is None when the request never produced an HTTP status.
    #[error("API error{}: {detail}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Api { status: Option<u16>, detail: String },

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        AppError::Api {
            status: Some(status),
            detail: detail.into(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type AppResult<T> = Result<T, AppError>;
