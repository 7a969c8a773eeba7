//! CSV normalizer: turn raw CSV records into a single-sheet [`Workbook`].
//!
//! CSV has no types, so each field is inferred the way a dataframe loader
//! would: integers, floats and booleans become numbers and booleans in the
//! output workbook, empty fields become empty cells, everything else stays
//! text.

use crate::workbook::{CellValue, Sheet, Workbook};

/// Name of the only sheet created from CSV input.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Build a workbook with one sheet holding `records` row by row.
pub fn csv_to_workbook(records: Vec<Vec<String>>) -> Workbook {
    let mut sheet = Sheet::new(CSV_SHEET_NAME);
    let mut header = true;
    for record in records {
        let cells = record
            .into_iter()
            .map(|field| if header { header_cell(field) } else { infer_cell(field) })
            .collect();
        sheet.push_row(cells);
        header = false;
    }

    let mut workbook = Workbook::new();
    workbook.push_sheet(sheet);
    workbook
}

/// Header fields stay text so a column named `2024` keeps its name.
fn header_cell(field: String) -> CellValue {
    if field.is_empty() {
        CellValue::Empty
    } else {
        CellValue::String(field)
    }
}

/// Infer a typed cell from a CSV field.
pub fn infer_cell(field: String) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    // Leading zeros mark identifiers (zip codes, SKUs), not numbers.
    let leading_zero = trimmed.len() > 1
        && trimmed.starts_with('0')
        && !trimmed.starts_with("0.");
    if !leading_zero {
        if let Ok(n) = trimmed.parse::<i64>() {
            return CellValue::Int(n);
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Float(n);
            }
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    CellValue::String(field)
}
