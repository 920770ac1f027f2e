use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use thiserror::Error;

/// Errors that reach the caller. Anything that goes wrong once analysis has
/// started is absorbed by the provider chain and never shows up here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed workbook: {0}")]
    MalformedWorkbook(String),
    #[error("No sheets: {0}")]
    NoSheets(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },
    #[error("Download error: {0}")]
    Download(String),
    #[error("Request cancelled")]
    Cancelled,
}

/// Failure of a single provider call. Drives the fallback chain, never
/// surfaced to callers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("empty response")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    /// Drops the request URL so endpoint details stay out of logs and attempt trails.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

impl From<async_openai::error::OpenAIError> for ProviderError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        ProviderError::Api(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedWorkbook(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoSheets(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Download(_) => StatusCode::BAD_GATEWAY,
            // Nobody is listening; the status only matters for access logs.
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workbook_errors_map_to_client_statuses() {
        let resp = AppError::MalformedWorkbook("zip header".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = AppError::FileTooLarge { size: 11, limit: 10 }.into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = AppError::InvalidInput("no file".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn provider_error_messages_name_the_cause() {
        let err = ProviderError::Timeout(std::time::Duration::from_secs(3));
        assert_eq!(err.to_string(), "timed out after 3s");
        assert_eq!(ProviderError::EmptyResponse.to_string(), "empty response");
    }
}
