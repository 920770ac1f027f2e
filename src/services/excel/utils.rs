use calamine::Data;

/// Renders a cell the way it should read in a prompt. Whole floats lose
/// their trailing `.0`, empty cells become `""`.
pub fn cell_to_string(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        _ => value.to_string(),
    }
}

pub fn row_to_strings(row: &[Data]) -> Vec<String> {
    row.iter().map(cell_to_string).collect()
}
