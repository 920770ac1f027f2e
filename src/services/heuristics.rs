//! Provider-free extractors used once every provider in the chain has failed.
//!
//! All functions here are pure: same rows and instruction in, same answer out.

use once_cell::sync::Lazy;
use regex::Regex;
use crate::models::{Row, SheetSummary};

/// Rows scanned by the question extractor.
pub const QUESTION_SCAN_ROWS: usize = 200;
/// Below this many first-pass hits, the extractor widens to every column.
const MIN_FIRST_PASS_HITS: usize = 5;
const QUESTION_MIN_LEN: usize = 20;
const LONG_CELL_MIN_LEN: usize = 30;
/// Cap on values pulled from a single column.
pub const MAX_COLUMN_VALUES: usize = 19;

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const DEFAULT_EXTRACTION_COUNT: usize = 10;

static NUMBERED_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:q\s*\d+|\d+\s*[.)](?:\s|$))").expect("valid numbering regex")
});

static EXTRACTION_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:extract|find|get|show)\w*\b").expect("valid intent regex")
});

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid integer regex"));

pub fn asks_for_questions(instruction: &str) -> bool {
    instruction.to_lowercase().contains("question")
}

pub fn asks_for_extraction(instruction: &str) -> bool {
    EXTRACTION_INTENT.is_match(instruction)
}

/// First integer literal in the instruction, if any. Zero is not a usable count.
pub fn requested_count(instruction: &str) -> Option<usize> {
    FIRST_INTEGER
        .find(instruction)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn looks_like_question(text: &str) -> bool {
    NUMBERED_PREFIX.is_match(text)
        || (text.chars().count() > QUESTION_MIN_LEN && text.contains('?'))
}

/// Pulls question-like cells out of the first rows of the workbook.
///
/// The first pass only looks at each row's first cell. When it finds fewer
/// than five candidates, a second pass collects every long cell in the same
/// window that was not already found.
pub fn extract_questions(rows: &[Row]) -> Vec<String> {
    let window = &rows[..rows.len().min(QUESTION_SCAN_ROWS)];

    let mut found: Vec<String> = window
        .iter()
        .filter_map(|row| row.first())
        .map(|cell| cell.trim())
        .filter(|text| !text.is_empty() && looks_like_question(text))
        .map(str::to_string)
        .collect();

    if found.len() < MIN_FIRST_PASS_HITS {
        for cell in window.iter().flatten() {
            let text = cell.trim();
            if text.chars().count() > LONG_CELL_MIN_LEN && !found.iter().any(|f| f == text) {
                found.push(text.to_string());
            }
        }
    }

    found
}

/// Values pulled from the column an instruction names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnExtraction {
    pub sheet: String,
    pub column: String,
    pub values: Vec<String>,
}

impl ColumnExtraction {
    /// Formats the first `limit` values as a numbered block naming the column.
    pub fn render(&self, limit: usize) -> String {
        let shown = limit.min(self.values.len());
        let mut out = format!(
            "Values from column \"{}\" in sheet \"{}\":\n\n",
            self.column, self.sheet
        );
        out.push_str(&numbered(&self.values[..shown]));
        out.push_str(&format!("\n\nShowing {} of {} values found.", shown, self.values.len()));
        out
    }
}

/// Finds the first header mentioned in the instruction and collects its
/// non-empty sample values. `None` means the caller should try something else.
pub fn extract_column_values(instruction: &str, sheet: &SheetSummary) -> Option<ColumnExtraction> {
    let wanted = instruction.to_lowercase();

    let (idx, header) = sheet.headers.iter().enumerate().find(|(_, header)| {
        let header = header.trim().to_lowercase();
        !header.is_empty() && wanted.contains(&header)
    })?;

    let values: Vec<String> = sheet
        .sample_data_rows()
        .iter()
        .filter_map(|row| row.get(idx))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .take(MAX_COLUMN_VALUES)
        .map(str::to_string)
        .collect();

    if values.is_empty() {
        tracing::debug!("Column {} matched but has no values in the sample", header);
        return None;
    }

    Some(ColumnExtraction {
        sheet: sheet.name.clone(),
        column: header.trim().to_string(),
        values,
    })
}

/// Numbered listing of the first `count` questions with a trailing tally.
pub fn render_questions(document_name: &str, questions: &[String], count: usize) -> String {
    let shown = count.min(questions.len());
    format!(
        "Questions found in \"{}\":\n\n{}\n\nShowing {} of {} questions found.",
        document_name,
        numbered(&questions[..shown]),
        shown,
        questions.len()
    )
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
