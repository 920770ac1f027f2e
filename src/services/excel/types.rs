/// Maximum rows (header included) kept in a `SheetSummary` sample.
pub const SAMPLE_SIZE: usize = 100;

/// One worksheet exactly as the reader produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSheet {
    pub name: String,
    pub cells: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, cells: Vec<Vec<String>>) -> Self {
        Self { name: name.into(), cells }
    }

    /// True when there is no row, or no row holds a non-blank cell.
    pub fn is_blank(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|cell| cell.trim().is_empty()))
    }
}

/// Sheets in workbook order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawWorkbook {
    pub sheets: Vec<RawSheet>,
}
