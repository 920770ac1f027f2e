use axum::{
    extract::State,
    routing::post,
    Router,
    Json,
    http::Method,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::{
    AppState,
    error::AppError,
    models::{AnalysisResult, ProviderAttempt},
};
use tower_http::cors::{CorsLayer, Any};

const SPREADSHEET_MARKERS: [&str; 7] = ["xlsx", "xlsm", "xlsb", "xls", "ods", "spreadsheet", "excel"];

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/sheets/analyze", post(analyze_sheet))
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    file_name: Option<String>,
    #[serde(rename = "type")]
    file_type: String,
    signed_url: String,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    result: AnalysisResult,
    attempts: Vec<ProviderAttempt>,
    elapsed_ms: u64,
}

fn is_supported_file_type(file_type: &str) -> bool {
    let file_type = file_type.to_lowercase();
    SPREADSHEET_MARKERS.iter().any(|m| file_type.contains(m))
}

/// Last path segment of the URL, query string stripped.
fn document_name_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("workbook")
        .to_string()
}

async fn load_file_from_url(client: &reqwest::Client, url: &str, limit: usize) -> Result<Bytes, AppError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Download(format!("Failed to fetch file: {}", e.without_url())))?;

    if !response.status().is_success() {
        return Err(AppError::Download(
            format!("Failed to fetch file. Status: {}", response.status())
        ));
    }

    if let Some(size) = response.content_length() {
        if size as usize > limit {
            return Err(AppError::FileTooLarge { size: size as usize, limit });
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Download(format!("Failed to read response bytes: {}", e.without_url())))?;

    if bytes.len() > limit {
        return Err(AppError::FileTooLarge { size: bytes.len(), limit });
    }
    Ok(bytes)
}

#[axum::debug_handler]
async fn analyze_sheet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let start = std::time::Instant::now();

    // Dropping the handler future (client went away) cancels provider calls.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    if !is_supported_file_type(&request.file_type) {
        tracing::error!("Unsupported file type: {}", request.file_type);
        return Err(AppError::InvalidInput("Only spreadsheet files (xlsx, xls, xlsb, ods) are supported".to_string()));
    }

    let document_name = request
        .file_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| document_name_from_url(&request.signed_url));

    tracing::info!("Downloading {} ({})", document_name, request.file_type);
    let download_start = std::time::Instant::now();
    let file_data = load_file_from_url(&state.http, &request.signed_url, state.config.max_file_size).await?;
    tracing::info!("File downloaded, size: {}KB, took: {:?}", file_data.len() / 1024, download_start.elapsed());

    let report = state
        .analyzer
        .analyze(&document_name, file_data, request.instruction.as_deref(), &cancel)
        .await?;

    tracing::info!("Total processing completed in {:?}", start.elapsed());

    Ok(Json(AnalyzeResponse {
        result: report.result,
        attempts: report.attempts,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_spreadsheet_types_only() {
        assert!(is_supported_file_type("XLSX"));
        assert!(is_supported_file_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"));
        assert!(is_supported_file_type("application/vnd.ms-excel"));
        assert!(is_supported_file_type("ods"));
        assert!(!is_supported_file_type("application/pdf"));
        assert!(!is_supported_file_type("text/csv"));
    }

    #[test]
    fn document_name_comes_from_url_path() {
        assert_eq!(
            document_name_from_url("https://files.example.com/u/42/budget.xlsx?X-Amz-Signature=abc"),
            "budget.xlsx"
        );
        assert_eq!(document_name_from_url("https://files.example.com/"), "workbook");
    }

    #[test]
    fn request_body_accepts_optional_fields() {
        let body: AnalyzeRequest = serde_json::from_str(
            r#"{"type":"xlsx","signed_url":"https://x/y.xlsx"}"#
        ).unwrap();
        assert!(body.instruction.is_none());
        assert!(body.file_name.is_none());
    }
}
