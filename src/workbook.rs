//! In-memory spreadsheet document shared by every pipeline stage.
//!
//! CSV and workbook inputs are both loaded into a [`Workbook`] so the
//! embedder and serializer only deal with one representation. Coordinates
//! are 0-based (`row: u32`, `col: u16`), matching rust_xlsxwriter and
//! calamine; user-facing messages convert to 1-based Excel row numbers.

use std::collections::BTreeMap;
use std::fmt;

/// Excel's hard column limit (XFD).
pub const MAX_COLUMNS: usize = 16_384;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Excel serial date-time (days since the 1900 epoch).
    DateTime(f64),
    /// Excel serial duration (days).
    Duration(f64),
    /// Formula error text such as `#DIV/0!`.
    Error(String),
}

impl CellValue {
    /// `true` for [`CellValue::Empty`] and for strings that are only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed display text, or `None` when the cell is blank.
    pub fn non_blank_text(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.to_string().trim().to_string())
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::String(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Int(n) => write!(f, "{n}"),
            CellValue::Float(n) | CellValue::DateTime(n) | CellValue::Duration(n) => {
                // Integral floats print without a trailing ".0"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
        }
    }
}

/// A picture anchored at a cell's top-left corner.
#[derive(Clone, PartialEq)]
pub struct AnchoredImage {
    pub row: u32,
    pub col: u16,
    /// Encoded JPEG bytes.
    pub data: Vec<u8>,
    /// Stored pixel size of `data`.
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Size the picture is scaled to on the sheet, in pixels.
    pub display_width: u32,
    pub display_height: u32,
    pub alt_text: Option<String>,
}

impl fmt::Debug for AnchoredImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchoredImage")
            .field("row", &self.row)
            .field("col", &self.col)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("pixel_size", &(self.pixel_width, self.pixel_height))
            .field("display_size", &(self.display_width, self.display_height))
            .field("alt_text", &self.alt_text)
            .finish()
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// One tab of a workbook: a ragged grid of cells plus layout and pictures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
    row_heights: BTreeMap<u32, f64>,
    column_widths: BTreeMap<u16, f64>,
    images: Vec<AnchoredImage>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell at `(row, col)`; out-of-range coordinates read as empty.
    pub fn cell(&self, row: u32, col: u16) -> &CellValue {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Set a cell, growing the grid as needed.
    pub fn set_cell(&mut self, row: u32, col: u16, value: CellValue) {
        let (r, c) = (row as usize, col as usize);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize_with(c + 1, CellValue::default);
        }
        cells[c] = value;
    }

    /// Append a row below the last one.
    pub fn push_row(&mut self, cells: Vec<CellValue>) {
        self.rows.push(cells);
    }

    /// Rows in sheet order, including blank ones.
    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Number of rows up to and including the last row with a non-blank cell.
    pub fn row_count(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_blank()))
            .map_or(0, |i| i + 1)
    }

    /// Number of columns up to and including the right-most non-blank cell.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.iter().rposition(|c| !c.is_blank()))
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
    }

    /// Index of the first row holding any non-blank cell.
    pub fn header_row(&self) -> Option<u32> {
        self.rows
            .iter()
            .position(|r| r.iter().any(|c| !c.is_blank()))
            .map(|i| i as u32)
    }

    /// Display names of the header row, `Unnamed: N` for blank header cells
    /// inside the used width.
    pub fn column_names(&self) -> Vec<String> {
        let Some(header) = self.header_row() else {
            return Vec::new();
        };
        (0..self.column_count())
            .map(|c| {
                self.cell(header, c as u16)
                    .non_blank_text()
                    .unwrap_or_else(|| format!("Unnamed: {c}"))
            })
            .collect()
    }

    /// First column whose header text equals `name` (both sides trimmed).
    pub fn find_column(&self, name: &str) -> Option<u16> {
        let header = self.header_row()?;
        let wanted = name.trim();
        self.rows[header as usize]
            .iter()
            .position(|c| c.non_blank_text().as_deref() == Some(wanted))
            .map(|i| i as u16)
    }

    /// Insert an empty column at `col`, shifting cells, column widths and
    /// image anchors at or right of it one column to the right.
    pub fn insert_column(&mut self, col: u16) {
        let c = col as usize;
        for row in &mut self.rows {
            if row.len() >= c {
                row.insert(c, CellValue::Empty);
            }
        }

        self.column_widths = std::mem::take(&mut self.column_widths)
            .into_iter()
            .map(|(k, w)| if k >= col { (k + 1, w) } else { (k, w) })
            .collect();

        for img in &mut self.images {
            if img.col >= col {
                img.col += 1;
            }
        }
    }

    pub fn set_row_height(&mut self, row: u32, points: f64) {
        self.row_heights.insert(row, points);
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn row_heights(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.row_heights.iter().map(|(&r, &h)| (r, h))
    }

    pub fn set_column_width(&mut self, col: u16, chars: f64) {
        self.column_widths.insert(col, chars);
    }

    pub fn column_width(&self, col: u16) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (u16, f64)> + '_ {
        self.column_widths.iter().map(|(&c, &w)| (c, w))
    }

    pub fn insert_image(&mut self, image: AnchoredImage) {
        self.images.push(image);
    }

    pub fn images(&self) -> &[AnchoredImage] {
        &self.images
    }
}

/// An ordered collection of named sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }
}

/// Excel column letters for a 0-based index (`0 → "A"`, `26 → "AA"`).
pub fn column_letter(col: u16) -> String {
    let mut n = col as u32 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn sample() -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        sheet.push_row(vec![s("name"), s("url"), s("price")]);
        sheet.push_row(vec![s("a"), s("http://x/a.jpg"), CellValue::Int(3)]);
        sheet.push_row(vec![s("b"), CellValue::Empty]);
        sheet
    }

    #[test]
    fn display_formats_scalars() {
        assert_eq!(CellValue::Float(3.0).to_string(), "3");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert!(s("   ").is_blank());
        assert_eq!(s("  x ").non_blank_text().as_deref(), Some("x"));
    }

    #[test]
    fn counts_ignore_trailing_blanks() {
        let mut sheet = sample();
        sheet.push_row(vec![CellValue::Empty, s(" ")]);
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.column_count(), 3);
    }

    #[test]
    fn find_column_uses_header_text() {
        let sheet = sample();
        assert_eq!(sheet.find_column("url"), Some(1));
        assert_eq!(sheet.find_column(" price "), Some(2));
        assert_eq!(sheet.find_column("missing"), None);
    }

    #[test]
    fn header_row_skips_leading_blank_rows() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell(2, 1, s("url"));
        assert_eq!(sheet.header_row(), Some(2));
        assert_eq!(sheet.column_names(), vec!["Unnamed: 0", "url"]);
        assert_eq!(sheet.find_column("url"), Some(1));
    }

    #[test]
    fn insert_column_shifts_cells_widths_and_images() {
        let mut sheet = sample();
        sheet.set_column_width(0, 5.0);
        sheet.set_column_width(2, 9.0);
        sheet.insert_image(AnchoredImage {
            row: 1,
            col: 2,
            data: vec![1, 2, 3],
            pixel_width: 1,
            pixel_height: 1,
            display_width: 1,
            display_height: 1,
            alt_text: None,
        });

        sheet.insert_column(2);

        assert_eq!(sheet.column_count(), 4);
        assert_eq!(sheet.cell(0, 1), &s("url"));
        assert_eq!(sheet.cell(0, 2), &CellValue::Empty);
        assert_eq!(sheet.cell(0, 3), &s("price"));
        assert_eq!(sheet.cell(1, 3), &CellValue::Int(3));
        // Row 2 had only two cells, one of them inserted at its end.
        assert_eq!(sheet.cell(2, 0), &s("b"));
        assert_eq!(sheet.column_width(0), Some(5.0));
        assert_eq!(sheet.column_width(2), None);
        assert_eq!(sheet.column_width(3), Some(9.0));
        assert_eq!(sheet.images()[0].col, 3);
    }

    #[test]
    fn set_cell_grows_grid() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell(3, 4, CellValue::Bool(false));
        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.column_count(), 5);
        assert_eq!(sheet.cell(3, 4), &CellValue::Bool(false));
        assert_eq!(sheet.cell(99, 99), &CellValue::Empty);
    }

    #[test]
    fn workbook_lookup_by_name() {
        let mut wb = Workbook::new();
        wb.push_sheet(Sheet::new("One"));
        wb.push_sheet(Sheet::new("Two"));
        assert_eq!(wb.sheet_names(), vec!["One", "Two"]);
        assert!(wb.sheet("Two").is_some());
        assert!(wb.sheet_mut("Three").is_none());
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(16_383), "XFD");
    }
}
