use serde::Serialize;

/// A single spreadsheet row rendered to strings. Ragged rows keep their own length.
pub type Row = Vec<String>;

/// Bounded view of one non-empty sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub headers: Vec<String>,
    /// First rows of the sheet, header row included.
    pub sample_rows: Vec<Row>,
}

impl SheetSummary {
    /// Data rows of the sample, i.e. everything after the header row.
    pub fn sample_data_rows(&self) -> &[Row] {
        self.sample_rows.get(1..).unwrap_or(&[])
    }
}

/// Everything one analysis invocation needs. Built once per request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document_name: String,
    /// Non-empty sheets in workbook order.
    pub sheets: Vec<SheetSummary>,
    /// Every row of every non-empty sheet, in order. Only the heuristics read this.
    pub all_rows: Vec<Row>,
    /// `None` means the standard four-section analysis.
    pub instruction: Option<String>,
    pub total_rows: usize,
    pub total_columns: usize,
}

impl AnalysisRequest {
    pub fn first_sheet(&self) -> Option<&SheetSummary> {
        self.sheets.first()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_custom(&self) -> bool {
        self.instruction.is_some()
    }
}

/// Position of a provider in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSlot {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducedBy {
    ProviderA,
    ProviderB,
    HeuristicExtractor,
    Unavailable,
}

impl From<ProviderSlot> for ProducedBy {
    fn from(slot: ProviderSlot) -> Self {
        match slot {
            ProviderSlot::Primary => ProducedBy::ProviderA,
            ProviderSlot::Secondary => ProducedBy::ProviderB,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Probe,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success(String),
    Failure(String),
}

/// One try against one provider. Diagnostics only.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub slot: ProviderSlot,
    /// Whether the probe passed. `false` for providers that are not probed.
    pub verified: bool,
    /// Which call produced the outcome.
    pub stage: AttemptStage,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl ProviderAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomResult {
    pub text: String,
    pub source_instruction: String,
    pub produced_by: ProducedBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredResult {
    pub summary: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub data_quality_issues: Vec<String>,
    pub produced_by: ProducedBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    Custom(CustomResult),
    Structured(StructuredResult),
}

impl AnalysisResult {
    pub fn produced_by(&self) -> ProducedBy {
        match self {
            AnalysisResult::Custom(r) => r.produced_by,
            AnalysisResult::Structured(r) => r.produced_by,
        }
    }
}

/// What the facade hands back: the answer plus the provider audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub result: AnalysisResult,
    pub attempts: Vec<ProviderAttempt>,
}
