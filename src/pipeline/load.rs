//! Tabular loader: parse input bytes as CSV or as a workbook.
//!
//! Workbooks go through calamine, which reads xlsx, xlsm, xlsb, xls and ods
//! from a cursor. Cells land at their absolute sheet positions so column
//! indices line up with what the user sees in Excel. CSV records are handed
//! to [`super::normalize`] to become a one-sheet [`Workbook`].

use super::input::ResolvedInput;
use super::normalize;
use crate::config::{EmbedConfig, SourceKind};
use crate::error::EmbedError;
use crate::workbook::{CellValue, Sheet, Workbook, MAX_COLUMNS};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, info, warn};

/// A parsed input together with the sheet chosen for processing.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub kind: SourceKind,
    pub workbook: Workbook,
    pub sheet_name: String,
}

/// Column list and row preview of the selected sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub kind: SourceKind,
    pub sheet_names: Vec<String>,
    pub sheet_name: String,
    pub columns: Vec<String>,
    /// Data rows below the header row.
    pub row_count: usize,
    /// First data rows rendered as text, one entry per column.
    pub preview: Vec<Vec<String>>,
}

impl LoadedTable {
    /// The sheet selected at load time.
    pub fn sheet(&self) -> Result<&Sheet, EmbedError> {
        self.workbook
            .sheet(&self.sheet_name)
            .ok_or_else(|| EmbedError::Internal(format!("sheet '{}' vanished", self.sheet_name)))
    }

    /// Describe the selected sheet: columns, data row count and a preview.
    pub fn info(&self, preview_rows: usize) -> Result<TableInfo, EmbedError> {
        let sheet = self.sheet()?;
        let columns = sheet.column_names();
        let (row_count, preview) = match sheet.header_row() {
            Some(header) => {
                let first = header as usize + 1;
                let rows: Vec<Vec<String>> = sheet
                    .rows()
                    .skip(first)
                    .take(sheet.row_count().saturating_sub(first))
                    .take(preview_rows)
                    .map(|cells| {
                        (0..columns.len())
                            .map(|c| cells.get(c).map(ToString::to_string).unwrap_or_default())
                            .collect()
                    })
                    .collect();
                (sheet.row_count().saturating_sub(first), rows)
            }
            None => (0, Vec::new()),
        };

        Ok(TableInfo {
            kind: self.kind,
            sheet_names: self.workbook.sheet_names(),
            sheet_name: self.sheet_name.clone(),
            columns,
            row_count,
            preview,
        })
    }
}

/// Parse the input according to its declared kind and select the sheet.
///
/// `config.sheet_name = None` selects the first sheet. A CSV input has a
/// single sheet named `Sheet1`.
pub fn load(input: &ResolvedInput, config: &EmbedConfig) -> Result<LoadedTable, EmbedError> {
    let kind = input.kind(config.source_kind);
    debug!("Loading '{}' as {}", input.name, kind);

    let workbook = match kind {
        SourceKind::Csv => {
            let records = read_csv_records(&input.bytes, config.csv_delimiter)?;
            normalize::csv_to_workbook(records)
        }
        SourceKind::Spreadsheet => read_spreadsheet(&input.bytes)?,
    };

    let sheet_names = workbook.sheet_names();
    let sheet_name = match config.sheet_name.as_deref() {
        Some(name) if sheet_names.iter().any(|s| s == name) => name.to_string(),
        Some(name) => {
            return Err(EmbedError::SheetNotFound {
                name: name.to_string(),
                available: sheet_names,
            })
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| EmbedError::SpreadsheetDecode {
                detail: "workbook contains no sheets".into(),
            })?,
    };

    info!(
        "Loaded {} with {} sheet(s); using '{}'",
        kind,
        sheet_names.len(),
        sheet_name
    );

    Ok(LoadedTable {
        kind,
        workbook,
        sheet_name,
    })
}

/// Read every CSV record, header included, as raw strings.
///
/// Records may differ in length. A leading UTF-8 BOM is dropped.
pub fn read_csv_records(bytes: &[u8], delimiter: u8) -> Result<Vec<Vec<String>>, EmbedError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut records = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| EmbedError::CsvDecode {
            detail: e.to_string(),
        })?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

/// Read all sheets of a workbook into the in-memory model.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Workbook, EmbedError> {
    let mut source = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        EmbedError::SpreadsheetDecode {
            detail: e.to_string(),
        }
    })?;

    let mut workbook = Workbook::new();
    for name in source.sheet_names() {
        let range = source
            .worksheet_range(&name)
            .map_err(|e| EmbedError::SpreadsheetDecode {
                detail: format!("sheet '{name}': {e}"),
            })?;

        let mut sheet = Sheet::new(name.as_str());
        if let Some((row0, col0)) = range.start() {
            let mut dropped = 0usize;
            for (r, c, data) in range.cells() {
                let value = cell_from_data(data);
                if value == CellValue::Empty {
                    continue;
                }
                let col = col0 as usize + c;
                if col >= MAX_COLUMNS {
                    dropped += 1;
                    continue;
                }
                sheet.set_cell(row0 + r as u32, col as u16, value);
            }
            if dropped > 0 {
                warn!("Sheet '{}': dropped {} cells beyond column XFD", name, dropped);
            }
        }
        debug!(
            "Sheet '{}': {} rows x {} columns",
            name,
            sheet.row_count(),
            sheet.column_count()
        );
        workbook.push_sheet(sheet);
    }

    Ok(workbook)
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(n) => CellValue::Int(*n),
        Data::Float(n) => CellValue::Float(*n),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Duration(dt.as_f64()),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_input(text: &str) -> ResolvedInput {
        ResolvedInput::from_bytes("data.csv", text.as_bytes().to_vec())
    }

    #[test]
    fn csv_records_keep_uneven_rows_and_strip_bom() {
        let records = read_csv_records(b"\xEF\xBB\xBFa,b\n1\n2,3,4\n", b',').unwrap();
        assert_eq!(records[0], vec!["a", "b"]);
        assert_eq!(records[1], vec!["1"]);
        assert_eq!(records[2], vec!["2", "3", "4"]);
    }

    #[test]
    fn csv_rejects_invalid_utf8() {
        let err = read_csv_records(b"a,b\n\xff\xfe,1\n", b',').unwrap_err();
        assert!(matches!(err, EmbedError::CsvDecode { .. }));
    }

    #[test]
    fn semicolon_delimiter() {
        let records = read_csv_records(b"a;b\n1;2\n", b';').unwrap();
        assert_eq!(records[1], vec!["1", "2"]);
    }

    #[test]
    fn load_csv_selects_sheet1() {
        let table = load(&csv_input("id,url\n1,http://x/a.png\n"), &EmbedConfig::default()).unwrap();
        assert_eq!(table.kind, SourceKind::Csv);
        assert_eq!(table.sheet_name, "Sheet1");
        let info = table.info(10).unwrap();
        assert_eq!(info.columns, vec!["id", "url"]);
        assert_eq!(info.row_count, 1);
        assert_eq!(info.preview, vec![vec!["1", "http://x/a.png"]]);
    }

    #[test]
    fn load_rejects_unknown_sheet() {
        let config = EmbedConfig::builder().sheet_name("Data").build().unwrap();
        let err = load(&csv_input("a\n1\n"), &config).unwrap_err();
        match err {
            EmbedError::SheetNotFound { name, available } => {
                assert_eq!(name, "Data");
                assert_eq!(available, vec!["Sheet1"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn preview_is_capped() {
        let mut text = String::from("n\n");
        for i in 0..25 {
            text.push_str(&format!("{i}\n"));
        }
        let info = load(&csv_input(&text), &EmbedConfig::default())
            .unwrap()
            .info(10)
            .unwrap();
        assert_eq!(info.row_count, 25);
        assert_eq!(info.preview.len(), 10);
        assert_eq!(info.preview[9], vec!["9"]);
    }

    #[test]
    fn garbage_spreadsheet_is_a_decode_error() {
        let input = ResolvedInput::from_bytes("book.xlsx", b"PK\x03\x04not really a zip".to_vec());
        let err = load(&input, &EmbedConfig::default()).unwrap_err();
        assert!(matches!(err, EmbedError::SpreadsheetDecode { .. }));
    }

    #[test]
    fn reads_workbook_written_by_xlsxwriter() {
        let mut book = rust_xlsxwriter::Workbook::new();
        let ws = book.add_worksheet();
        ws.set_name("Products").unwrap();
        ws.write_string(1, 2, "sku").unwrap();
        ws.write_string(1, 3, "image").unwrap();
        ws.write_number(2, 2, 42.0).unwrap();
        ws.write_string(2, 3, "http://x/p.jpg").unwrap();
        book.add_worksheet().set_name("Notes").unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let wb = read_spreadsheet(&bytes).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Products", "Notes"]);
        let sheet = wb.sheet("Products").unwrap();
        assert_eq!(sheet.header_row(), Some(1));
        assert_eq!(sheet.find_column("image"), Some(3));
        assert_eq!(sheet.cell(2, 2), &CellValue::Float(42.0));
        assert_eq!(sheet.cell(2, 3), &CellValue::String("http://x/p.jpg".into()));
    }
}
