use std::collections::HashSet;
use crate::models::{AnalysisRequest, ProducedBy, SheetSummary, StructuredResult};

pub const BASIC_ANALYSIS_NOTE: &str = "Basic analysis only: the AI analysis service is currently unavailable.";
const MAX_KEY_COLUMNS: usize = 3;

/// Terminal fallback for standard requests. Every field comes back populated.
pub fn basic_summary(request: &AnalysisRequest) -> StructuredResult {
    let sheet_names = request.sheet_names();
    let key_columns = request.first_sheet().map(key_columns).unwrap_or_default();

    let mut summary = format!(
        "The document \"{}\" contains {} rows and {} columns across {} sheet(s): {}.",
        request.document_name,
        request.total_rows,
        request.total_columns,
        request.sheets.len(),
        sheet_names.join(", ")
    );
    if !key_columns.is_empty() {
        summary.push_str(&format!(" Key columns include: {}.", key_columns.join(", ")));
    }

    let mut insights: Vec<String> = request
        .sheets
        .iter()
        .map(|s| format!("Sheet \"{}\" has {} rows and {} columns.", s.name, s.row_count, s.column_count))
        .collect();
    if let Some(largest) = request.sheets.iter().max_by_key(|s| s.row_count) {
        if request.sheets.len() > 1 {
            insights.push(format!("The largest sheet is \"{}\" with {} rows.", largest.name, largest.row_count));
        }
    }

    let recommendations = vec![
        "Retry the analysis once the AI service is available for detailed insights and patterns.".to_string(),
        format!(
            "Review the {} sheet(s) manually to confirm the headers describe each column.",
            request.sheets.len()
        ),
    ];

    let mut data_quality_issues = request.first_sheet().map(quality_notes).unwrap_or_default();
    if data_quality_issues.is_empty() {
        data_quality_issues.push("No obvious data quality issues were found in the sampled rows.".to_string());
    }

    StructuredResult {
        summary,
        insights,
        recommendations,
        data_quality_issues,
        produced_by: ProducedBy::HeuristicExtractor,
        note: Some(BASIC_ANALYSIS_NOTE.to_string()),
    }
}

fn key_columns(sheet: &SheetSummary) -> Vec<String> {
    sheet
        .headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .take(MAX_KEY_COLUMNS)
        .map(str::to_string)
        .collect()
}

fn quality_notes(sheet: &SheetSummary) -> Vec<String> {
    let mut notes = Vec::new();

    let blank_headers = sheet.headers.iter().filter(|h| h.trim().is_empty()).count();
    if blank_headers > 0 {
        notes.push(format!(
            "Sheet \"{}\" has {} column(s) without a header.",
            sheet.name, blank_headers
        ));
    }

    let mut seen = HashSet::new();
    let duplicates: Vec<&str> = sheet
        .headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && !seen.insert(h.to_lowercase()))
        .collect();
    if !duplicates.is_empty() {
        notes.push(format!(
            "Sheet \"{}\" repeats header name(s): {}.",
            sheet.name,
            duplicates.join(", ")
        ));
    }

    let width = sheet.headers.len();
    let short_rows = sheet.sample_data_rows().iter().filter(|r| r.len() < width).count();
    if short_rows > 0 {
        notes.push(format!(
            "{} sampled row(s) in \"{}\" are shorter than the header row.",
            short_rows, sheet.name
        ));
    }

    let (blank, total) = sheet
        .sample_data_rows()
        .iter()
        .flatten()
        .fold((0usize, 0usize), |(blank, total), cell| {
            (blank + usize::from(cell.trim().is_empty()), total + 1)
        });
    if total > 0 && blank * 5 >= total {
        notes.push(format!(
            "{}% of sampled cells in \"{}\" are empty.",
            blank * 100 / total,
            sheet.name
        ));
    }

    notes
}
