use super::types::{RawSheet, RawWorkbook};
use super::utils::row_to_strings;
use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;
use crate::error::AppError;

/// Opens an in-memory workbook (xlsx, xlsm, xlsb, xls or ods) and renders every
/// sheet into a string grid.
pub fn read_workbook(file_data: Bytes) -> Result<RawWorkbook, AppError> {
    let start = std::time::Instant::now();
    let size = file_data.len();
    let cursor = Cursor::new(file_data);

    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| {
            tracing::error!("Failed to open workbook ({} bytes): {}", size, e);
            AppError::MalformedWorkbook(format!("Failed to open workbook: {}", e))
        })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(AppError::NoSheets("Workbook has no sheets".to_string()));
    }
    tracing::info!("Workbook opened in {:?}, {} sheets: {:?}", start.elapsed(), sheet_names.len(), sheet_names);

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let cells = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range.rows().map(row_to_strings).collect(),
            Err(e) => {
                tracing::warn!("Failed to read worksheet {}, treating it as empty: {}", sheet_name, e);
                Vec::new()
            }
        };
        sheets.push(RawSheet::new(sheet_name, cells));
    }

    Ok(RawWorkbook { sheets })
}
