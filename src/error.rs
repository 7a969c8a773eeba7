//! Error types for the sheetpic library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EmbedError`] — **Fatal**: the run cannot proceed at all (unreadable
//!   input, unknown sheet or column, output could not be written). Returned
//!   as `Err(EmbedError)` from the top-level `convert*` functions before any
//!   output is produced.
//!
//! * [`FetchError`] — **Non-fatal**: a single row's image could not be
//!   downloaded or decoded. The row gets a failure marker in the sheet and
//!   the error is stored in [`crate::output::RowResult`]; every other row is
//!   processed as usual.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sheetpic library.
///
/// Row-level failures use [`FetchError`] and are stored in
/// [`crate::output::RowResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum EmbedError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Decoding errors ───────────────────────────────────────────────────
    /// The bytes could not be parsed as CSV.
    #[error("Input is not valid CSV: {detail}")]
    CsvDecode { detail: String },

    /// The bytes could not be parsed as a spreadsheet workbook.
    #[error("Input is not a readable spreadsheet: {detail}\nSupported formats: xlsx, xlsm, xlsb, xls, ods.")]
    SpreadsheetDecode { detail: String },

    // ── Structure errors ──────────────────────────────────────────────────
    /// The requested sheet does not exist in the workbook.
    #[error("Sheet '{name}' not found. Available sheets: {}", .available.join(", "))]
    SheetNotFound {
        name: String,
        available: Vec<String>,
    },

    /// No header cell matches the requested image-URL column.
    #[error("Column '{name}' not found in sheet '{sheet}'. Available columns: {}", .available.join(", "))]
    ColumnNotFound {
        name: String,
        sheet: String,
        available: Vec<String>,
    },

    /// Inserting the image column would push the sheet past Excel's column limit.
    #[error("Sheet '{sheet}' already uses the last Excel column; no room for the image column")]
    TooManyColumns { sheet: String },

    /// The sheet has no header row to look columns up in.
    #[error("Sheet '{sheet}' is empty; a header row is required")]
    EmptySheet { sheet: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter rejected the workbook while serialising.
    #[error("Failed to write workbook: {0}")]
    Serialize(#[from] rust_xlsxwriter::XlsxError),

    /// The produced workbook did not read back the way it was written.
    #[error("Output verification failed: {0}")]
    OutputVerification(String),

    /// Could not create or write the output xlsx file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single row's image.
///
/// Stored alongside [`crate::output::RowResult`]; the sheet gets the
/// configured failure marker in place of the picture.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FetchError {
    /// The cell text is not an absolute http(s) URL.
    #[error("not a valid http(s) URL: '{url}'")]
    InvalidUrl { url: String },

    /// Connection, TLS or body-read failure.
    #[error("request failed: {detail}")]
    Request { detail: String },

    /// The request did not complete within the fetch timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    /// Body exceeded `max_download_bytes`.
    #[error("response larger than {limit} bytes")]
    TooLarge { limit: u64 },

    /// The body is not an image format we can decode.
    #[error("could not decode image: {detail}")]
    Decode { detail: String },

    /// Re-encoding the resized image failed.
    #[error("could not encode image: {detail}")]
    Encode { detail: String },
}
