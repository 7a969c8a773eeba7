//! Output serializer: in-memory [`Workbook`] → xlsx bytes.
//!
//! rust_xlsxwriter writes the file; [`verify`] optionally reads the buffer
//! back with calamine to confirm the sheets, the image-column header and the
//! failure markers landed where the embedder put them.

use super::embed::EmbedReport;
use crate::config::EmbedConfig;
use crate::error::EmbedError;
use crate::output::RowOutcome;
use crate::workbook::{CellValue, Sheet, Workbook};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Format, Image, Workbook as XlsxWorkbook, Worksheet, XlsxError};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::{debug, warn};

/// Excel's limit on picture alt text.
const MAX_ALT_TEXT_CHARS: usize = 255;

/// Excel's limit on the length of a cell's text.
pub const MAX_CELL_TEXT_CHARS: usize = 32_767;

struct Formats {
    datetime: Format,
    duration: Format,
}

/// Write every sheet of `workbook` into an xlsx buffer.
pub fn serialize(workbook: &Workbook) -> Result<Vec<u8>, EmbedError> {
    let formats = Formats {
        datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
        duration: Format::new().set_num_format("[h]:mm:ss"),
    };

    let mut book = XlsxWorkbook::new();
    for sheet in workbook.sheets() {
        let ws = book.add_worksheet();
        ws.set_name(sheet.name())?;
        write_sheet(ws, sheet, &formats)?;
    }
    // An xlsx file needs at least one worksheet.
    if workbook.sheets().is_empty() {
        book.add_worksheet();
    }

    let bytes = book.save_to_buffer()?;
    debug!("Serialised workbook: {} bytes", bytes.len());
    Ok(bytes)
}

fn write_sheet(ws: &mut Worksheet, sheet: &Sheet, formats: &Formats) -> Result<(), XlsxError> {
    for (r, cells) in sheet.rows().enumerate() {
        let row = r as u32;
        for (c, value) in cells.iter().enumerate() {
            let col = c as u16;
            match value {
                CellValue::Empty => {}
                CellValue::String(s) | CellValue::Error(s) => {
                    ws.write_string(row, col, &*cell_text(sheet.name(), row, col, s))?;
                }
                CellValue::Int(n) => {
                    ws.write_number(row, col, *n as f64)?;
                }
                CellValue::Float(n) => {
                    ws.write_number(row, col, *n)?;
                }
                CellValue::Bool(b) => {
                    ws.write_boolean(row, col, *b)?;
                }
                CellValue::DateTime(n) => {
                    ws.write_number_with_format(row, col, *n, &formats.datetime)?;
                }
                CellValue::Duration(n) => {
                    ws.write_number_with_format(row, col, *n, &formats.duration)?;
                }
            }
        }
    }

    for (row, height) in sheet.row_heights() {
        ws.set_row_height(row, height)?;
    }
    for (col, width) in sheet.column_widths() {
        ws.set_column_width(col, width)?;
    }

    for img in sheet.images() {
        let mut image = Image::new_from_buffer(&img.data)?.set_scale_to_size(
            img.display_width,
            img.display_height,
            false,
        );
        if let Some(alt) = &img.alt_text {
            let alt: String = alt.chars().take(MAX_ALT_TEXT_CHARS).collect();
            image = image.set_alt_text(&alt);
        }
        ws.insert_image(img.row, img.col, &image)?;
    }

    Ok(())
}

/// Cut text longer than Excel allows in one cell.
fn cell_text<'a>(sheet: &str, row: u32, col: u16, s: &'a str) -> Cow<'a, str> {
    match s.char_indices().nth(MAX_CELL_TEXT_CHARS) {
        None => Cow::Borrowed(s),
        Some((cut, _)) => {
            warn!(
                "Sheet '{}' cell {}{}: text of {} chars truncated to {}",
                sheet,
                crate::workbook::column_letter(col),
                row + 1,
                s.chars().count(),
                MAX_CELL_TEXT_CHARS
            );
            Cow::Owned(s[..cut].to_string())
        }
    }
}

/// Re-read `bytes` and check it matches what the embedder produced.
///
/// Checks the sheet names and order, the header label at the image column,
/// and the failure marker in every failed row.
pub fn verify(
    bytes: &[u8],
    expected: &Workbook,
    sheet_name: &str,
    report: &EmbedReport,
    config: &EmbedConfig,
) -> Result<(), EmbedError> {
    let mut reread = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| EmbedError::OutputVerification(format!("output is not readable: {e}")))?;

    let names = reread.sheet_names();
    if names != expected.sheet_names() {
        return Err(EmbedError::OutputVerification(format!(
            "sheet names changed: expected {:?}, found {:?}",
            expected.sheet_names(),
            names
        )));
    }

    let range = reread
        .worksheet_range(sheet_name)
        .map_err(|e| EmbedError::OutputVerification(format!("sheet '{sheet_name}': {e}")))?;

    let text_at = |row: u32, col: u16| -> Option<String> {
        match range.get_value((row, col as u32)) {
            Some(Data::String(s)) => Some(s.clone()),
            _ => None,
        }
    };

    if text_at(report.header_row, report.image_column).as_deref() != Some(config.header_label.as_str()) {
        return Err(EmbedError::OutputVerification(format!(
            "header '{}' missing at row {}",
            config.header_label,
            report.header_row + 1
        )));
    }

    for result in &report.rows {
        if let RowOutcome::Failed { .. } = result.outcome {
            if text_at(result.row - 1, report.image_column).as_deref()
                != Some(config.failure_marker.as_str())
            {
                return Err(EmbedError::OutputVerification(format!(
                    "failure marker missing at row {}",
                    result.row
                )));
            }
        }
    }

    debug!("Verified output workbook ({} sheets)", names.len());
    Ok(())
}
