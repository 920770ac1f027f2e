use crate::models::{AnalysisRequest, SheetSummary};

/// Sample rows shown per sheet in a prompt.
pub const PROMPT_SAMPLE_ROWS: usize = 10;

/// Renders the prompt for a request: the custom template when an instruction
/// is present, the four-part standard template otherwise. Deterministic.
pub fn build_prompt(request: &AnalysisRequest) -> String {
    match request.instruction.as_deref() {
        Some(instruction) => custom_prompt(request, instruction),
        None => standard_prompt(request),
    }
}

fn json_list(values: &[String]) -> String {
    // Serializing a slice of strings cannot fail.
    serde_json::to_string(values).unwrap_or_default()
}

fn custom_sheet_block(sheet: &SheetSummary) -> String {
    let mut block = format!(
        "Sheet \"{}\" ({} rows, {} columns)\nHeaders: {}\nSample rows:\n",
        sheet.name,
        sheet.row_count,
        sheet.column_count,
        json_list(&sheet.headers)
    );
    for row in sheet.sample_rows.iter().take(PROMPT_SAMPLE_ROWS) {
        block.push_str(&json_list(row));
        block.push('\n');
    }
    block
}

fn standard_sheet_block(sheet: &SheetSummary) -> String {
    let mut block = format!(
        "Sheet \"{}\" ({} rows, {} columns)\nHeaders: {}\nSample rows:\n",
        sheet.name,
        sheet.row_count,
        sheet.column_count,
        sheet.headers.join(", ")
    );
    for row in sheet.sample_rows.iter().take(PROMPT_SAMPLE_ROWS) {
        block.push_str(&row.join(" | "));
        block.push('\n');
    }
    block
}

fn custom_prompt(request: &AnalysisRequest, instruction: &str) -> String {
    let sheets: Vec<String> = request.sheets.iter().map(custom_sheet_block).collect();

    format!(
        r#"You are analyzing the spreadsheet "{name}", which contains {rows} rows of data.

USER INSTRUCTION: {instruction}

DATA:
{sheets}
Answer the user instruction above directly and completely, using only the data provided.
Do not add general commentary, summaries or suggestions that the instruction did not ask for."#,
        name = request.document_name,
        rows = request.total_rows,
        instruction = instruction,
        sheets = sheets.join("\n"),
    )
}

fn standard_prompt(request: &AnalysisRequest) -> String {
    let sheets: Vec<String> = request.sheets.iter().map(standard_sheet_block).collect();

    format!(
        r#"You are a data analyst reviewing the spreadsheet "{name}" ({rows} rows across {count} sheets).

DATA:
{sheets}
Please provide:
1. A comprehensive summary of what this data contains
2. Key insights, patterns, trends or anomalies in the data
3. Recommendations based on the data
4. Data quality issues or concerns you notice

If the data is insufficient for a complete analysis, answer each part as well as possible from the available information."#,
        name = request.document_name,
        rows = request.total_rows,
        count = request.sheets.len(),
        sheets = sheets.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::excel::build_request;
    use crate::services::excel::types::{RawSheet, RawWorkbook};

    fn request(instruction: Option<&str>) -> AnalysisRequest {
        let mut cells = vec![vec!["Region".to_string(), "Sales".to_string()]];
        cells.extend((0..20).map(|i| vec![format!("R{i}"), (i * 10).to_string()]));
        let workbook = RawWorkbook {
            sheets: vec![RawSheet::new("Q1", cells), RawSheet::new("Empty", vec![])],
        };
        build_request("sales.xlsx", workbook, instruction).unwrap()
    }

    #[test]
    fn custom_prompt_restates_instruction_and_lists_structure() {
        let prompt = build_prompt(&request(Some("Which region sold the most?")));
        assert!(prompt.contains("\"sales.xlsx\""));
        assert!(prompt.contains("21 rows"));
        assert!(prompt.contains("USER INSTRUCTION: Which region sold the most?"));
        assert!(prompt.contains(r#"Headers: ["Region","Sales"]"#));
        assert!(prompt.contains(r#"["R8","80"]"#));
        assert!(!prompt.contains(r#"["R9","90"]"#), "only ten sample rows, header included");
        assert!(prompt.contains("Answer the user instruction above directly"));
        assert!(!prompt.contains("Empty"));
    }

    #[test]
    fn standard_prompt_uses_plain_headers_and_four_asks() {
        let prompt = build_prompt(&request(None));
        assert!(prompt.contains("Headers: Region, Sales"));
        assert!(prompt.contains("R3 | 30"));
        for ask in ["1. A comprehensive summary", "2. Key insights", "3. Recommendations", "4. Data quality"] {
            assert!(prompt.contains(ask), "missing {ask}");
        }
        assert!(prompt.contains("If the data is insufficient"));
    }

    #[test]
    fn prompts_are_deterministic() {
        assert_eq!(build_prompt(&request(None)), build_prompt(&request(None)));
        let custom = request(Some("list regions"));
        assert_eq!(build_prompt(&custom), build_prompt(&custom));
    }
}
