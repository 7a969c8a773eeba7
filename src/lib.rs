//! # sheetpic
//!
//! Embed the pictures behind a column of image URLs into an Excel workbook.
//!
//! Give it a CSV or spreadsheet and the name of the column holding image
//! URLs. It downloads each image, shrinks it, and anchors it in a new
//! column right next to the URL column. Rows whose image cannot be fetched
//! get a short failure marker instead, and the run carries on.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CSV / XLSX / XLS / ODS
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Load       csv crate or calamine (CPU-bound, spawn_blocking)
//!  ├─ 3. Normalize  CSV fields → typed cells in a one-sheet workbook
//!  ├─ 4. Embed      per row: HTTP GET → decode → resize → JPEG → anchor
//!  └─ 5. Serialize  rust_xlsxwriter → xlsx bytes (+ optional re-read check)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheetpic::{convert_to_file, EmbedConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmbedConfig::builder()
//!         .image_size(120, 120)
//!         .row_height(95.0)
//!         .build()?;
//!     let output = convert_to_file("products.xlsx", "Photo", "out.xlsx", &config).await?;
//!     eprintln!(
//!         "{} embedded, {} failed",
//!         output.stats.embedded_rows, output.stats.failed_rows
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sheetpic` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! sheetpic = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod workbook;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EmbedConfig, EmbedConfigBuilder, SourceKind};
pub use convert::{
    convert, convert_from_bytes, convert_sync, convert_to_file, convert_with_source, inspect,
};
pub use error::{EmbedError, FetchError};
pub use output::{EmbedOutput, EmbedStats, RowOutcome, RowResult, DEFAULT_OUTPUT_FILE_NAME, XLSX_MIME_TYPE};
pub use pipeline::encode::EncodedImage;
pub use pipeline::fetch::{HttpImageSource, ImageSource};
pub use pipeline::input::ResolvedInput;
pub use pipeline::load::TableInfo;
pub use progress::{EmbedProgressCallback, NoopProgressCallback, ProgressCallback};
pub use workbook::{CellValue, Sheet, Workbook};
