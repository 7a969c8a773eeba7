//! Pipeline stages for embedding images into a spreadsheet.
//!
//! Each submodule implements exactly one step and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ load ──▶ normalize ──▶ embed ──▶ serialize
//! (path/URL)  (csv/calamine)  (CSV → Sheet1)  (fetch+encode per row)  (rust_xlsxwriter)
//! ```
//!
//! 1. [`input`]     — read a local path or download a URL into memory
//! 2. [`load`]      — parse CSV records or workbook sheets; pick the sheet
//! 3. [`normalize`] — infer cell types for CSV and wrap them in a one-sheet workbook
//! 4. [`embed`]     — insert the image column and walk rows top to bottom,
//!    calling [`fetch`] (HTTP) and [`encode`] (decode, resize, JPEG) per URL
//! 5. [`serialize`] — write the workbook to xlsx bytes, optionally re-read
//!    them to verify the result

pub mod embed;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod load;
pub mod normalize;
pub mod serialize;
