use super::types::{RawSheet, RawWorkbook, SAMPLE_SIZE};
use crate::error::AppError;
use crate::models::{AnalysisRequest, SheetSummary};

/// Summarizes one sheet. Returns `None` for sheets without any non-blank cell;
/// those are left out of the request entirely.
pub fn summarize_sheet(sheet: &RawSheet) -> Option<SheetSummary> {
    if sheet.is_blank() {
        return None;
    }

    let rows = &sheet.cells;
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let headers = rows.first().cloned().unwrap_or_default();
    let sample_rows = rows.iter().take(SAMPLE_SIZE).cloned().collect();

    Some(SheetSummary {
        name: sheet.name.clone(),
        row_count: rows.len(),
        column_count,
        headers,
        sample_rows,
    })
}

/// Builds the per-request view of a workbook. Whitespace-only instructions are
/// treated as absent.
pub fn build_request(
    document_name: &str,
    workbook: RawWorkbook,
    instruction: Option<&str>,
) -> Result<AnalysisRequest, AppError> {
    if workbook.sheets.is_empty() {
        return Err(AppError::NoSheets("Workbook has no sheets".to_string()));
    }

    let mut sheets = Vec::new();
    let mut all_rows = Vec::new();
    for raw in workbook.sheets {
        match summarize_sheet(&raw) {
            Some(summary) => {
                tracing::debug!(
                    "Sheet {}: {} rows x {} columns",
                    summary.name, summary.row_count, summary.column_count
                );
                sheets.push(summary);
                all_rows.extend(raw.cells);
            }
            None => tracing::warn!("Sheet {} is empty, skipping", raw.name),
        }
    }

    if sheets.is_empty() {
        return Err(AppError::NoSheets("Every sheet in the workbook is empty".to_string()));
    }

    let total_rows = sheets.iter().map(|s| s.row_count).sum();
    let total_columns = sheets.iter().map(|s| s.column_count).sum();
    let instruction = instruction
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(str::to_string);

    Ok(AnalysisRequest {
        document_name: document_name.to_string(),
        sheets,
        all_rows,
        instruction,
        total_rows,
        total_columns,
    })
}
