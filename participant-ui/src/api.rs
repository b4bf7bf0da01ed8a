use gloo_net::http::Request;
use shared_types::SessionTerminationRequest;
use thiserror::Error;

use crate::config::api_base;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to serialize request: {0}")]
    Encode(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Status(u16),
}

pub fn end_session_url(base: &str) -> String {
    format!("{base}/end_session")
}

/// `POST /end_session`. The response body is never read.
///
/// Callers may discard the result; the session UI does not wait on it.
pub async fn end_session(request: &SessionTerminationRequest) -> Result<(), ApiError> {
    let url = end_session_url(api_base());

    let response = Request::post(&url)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
        .json(request)
        .map_err(|e| ApiError::Encode(e.to_string()))?
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    if !response.ok() {
        return Err(ApiError::Status(response.status()));
    }

    Ok(())
}
