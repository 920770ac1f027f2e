use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use crate::error::AppError;
use crate::models::AnalysisReport;
use super::excel::{build_request, read_workbook};
use super::orchestrator::ProviderChain;

/// Entry point the transport layer calls: workbook bytes plus an optional
/// instruction in, one result out.
#[derive(Clone)]
pub struct SheetAnalyzer {
    chain: ProviderChain,
}

impl SheetAnalyzer {
    pub fn new(chain: ProviderChain) -> Self {
        Self { chain }
    }

    /// Fails only for unreadable or empty workbooks, or when `cancel` fires.
    /// Provider trouble is absorbed and shows up as a degraded result.
    pub async fn analyze(
        &self,
        document_name: &str,
        file_data: Bytes,
        instruction: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport, AppError> {
        let start = std::time::Instant::now();

        // calamine is synchronous; keep it off the async workers.
        let workbook = tokio::task::spawn_blocking(move || read_workbook(file_data))
            .await
            .map_err(|e| AppError::MalformedWorkbook(format!("Workbook reader stopped: {}", e)))??;

        let request = build_request(document_name, workbook, instruction)?;
        tracing::info!(
            "Analyzing {}: {} sheets, {} rows, {} columns, {} request",
            request.document_name,
            request.sheets.len(),
            request.total_rows,
            request.total_columns,
            if request.is_custom() { "custom" } else { "standard" }
        );

        let report = self.chain.resolve(&request, cancel).await?;
        tracing::info!(
            "Analysis of {} resolved by {:?} after {} failed provider attempt(s) in {:?}",
            request.document_name,
            report.result.produced_by(),
            report.attempts.iter().filter(|a| !a.succeeded()).count(),
            start.elapsed()
        );
        Ok(report)
    }
}
