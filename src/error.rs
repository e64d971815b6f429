use thiserror::Error;

use crate::enhance::EnhanceMode;

pub const UPLOAD_FALLBACK: &str = "Failed to upload image.";
pub const NETWORK_FAILURE: &str = "A network or server error occurred.";
pub const NO_ACTIVE_FILE: &str = "Please upload an image first.";
pub const EMPTY_FILE: &str = "Please choose a non-empty image to upload.";

/// Failure of a single request against the enhancement service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Network unreachable, timed out, or the response was not the JSON we expect.
    #[error("transport error: {0}")]
    Transport(String),
    /// Well-formed error response; carries the server's `error` text if it sent one.
    #[error("server error: {}", .0.as_deref().unwrap_or("no message"))]
    Server(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("selected file is empty")]
    EmptyFile,
    #[error("an upload is already in progress")]
    Busy,
    #[error("upload transport error: {0}")]
    Transport(String),
    #[error("upload rejected: {}", .0.as_deref().unwrap_or("no message"))]
    Server(Option<String>),
}

impl UploadError {
    /// Text shown to the user, preferring what the server said.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::EmptyFile => EMPTY_FILE.to_string(),
            UploadError::Busy => "An upload is already in progress.".to_string(),
            UploadError::Transport(_) => NETWORK_FAILURE.to_string(),
            UploadError::Server(Some(message)) => message.clone(),
            UploadError::Server(None) => UPLOAD_FALLBACK.to_string(),
        }
    }
}

impl From<RequestError> for UploadError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(detail) => UploadError::Transport(detail),
            RequestError::Server(message) => UploadError::Server(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnhanceError {
    #[error("no image has been uploaded")]
    NoActiveFile,
    #[error("an enhancement is already running")]
    Busy,
    #[error("enhancement transport error: {0}")]
    Transport(String),
    #[error("enhancement rejected: {}", .0.as_deref().unwrap_or("no message"))]
    Server(Option<String>),
    /// The response targets a file that is no longer the active upload.
    #[error("response for a file that is no longer active")]
    StaleResponse,
}

impl EnhanceError {
    /// Text shown to the user; `None` for failures that stay silent.
    pub fn user_message(&self, mode: EnhanceMode) -> Option<String> {
        match self {
            EnhanceError::NoActiveFile => Some(NO_ACTIVE_FILE.to_string()),
            EnhanceError::Busy | EnhanceError::StaleResponse => None,
            EnhanceError::Transport(_) => Some(mode.network_failure_message().to_string()),
            EnhanceError::Server(Some(message)) => Some(message.clone()),
            EnhanceError::Server(None) => Some(mode.fallback_message().to_string()),
        }
    }
}

impl From<RequestError> for EnhanceError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(detail) => EnhanceError::Transport(detail),
            RequestError::Server(message) => EnhanceError::Server(message),
        }
    }
}
