//! Configuration types for image embedding.
//!
//! All run behaviour is controlled through [`EmbedConfig`], built via its
//! [`EmbedConfigBuilder`]. Setters clamp values to the ranges Excel and the
//! image pipeline accept; [`EmbedConfigBuilder::build`] rejects anything the
//! clamps cannot fix.

use crate::error::EmbedError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Header written into the inserted column.
pub const DEFAULT_HEADER_LABEL: &str = "Embedded Image";

/// Cell text written when a row's image cannot be fetched.
pub const DEFAULT_FAILURE_MARKER: &str = "Failed to download";

/// Largest row height Excel accepts, in points.
pub const MAX_ROW_HEIGHT: f64 = 409.0;

/// Largest column width Excel accepts, in characters.
pub const MAX_COLUMN_WIDTH: f64 = 255.0;

/// Configuration for an embedding run.
///
/// Built via [`EmbedConfig::builder()`] or using [`EmbedConfig::default()`].
///
/// # Example
/// ```rust
/// use sheetpic::EmbedConfig;
///
/// let config = EmbedConfig::builder()
///     .image_size(120, 90)
///     .row_height(70.0)
///     .sheet_name("Products")
///     .build()
///     .unwrap();
/// assert_eq!(config.image_width, 120);
/// ```
#[derive(Clone)]
pub struct EmbedConfig {
    /// Displayed picture width in pixels. Default: 100.
    pub image_width: u32,

    /// Displayed picture height in pixels. Default: 100.
    ///
    /// The picture is stretched to exactly `image_width × image_height`; the
    /// aspect ratio of the source is not kept at display time.
    pub image_height: u32,

    /// Height in points given to every row that receives a picture. Default: 80.
    pub row_height: f64,

    /// Width in characters of the inserted column. Default: 20.
    pub column_width: f64,

    /// Longest side, in pixels, of the stored JPEG. Default: 800.
    ///
    /// Independent of the display size. Keeps the workbook small when the
    /// source URLs point at camera-sized originals.
    pub max_image_dimension: u32,

    /// JPEG quality (1–100) of re-encoded pictures. Default: 85.
    pub jpeg_quality: u8,

    /// Per-image HTTP timeout in seconds. Default: 10.
    pub fetch_timeout_secs: u64,

    /// Largest image body accepted, in bytes. Default: 20 MiB.
    pub max_download_bytes: u64,

    /// `User-Agent` sent with image requests. Default: `sheetpic/<version>`.
    pub user_agent: String,

    /// Header placed in the inserted column. Default: "Embedded Image".
    pub header_label: String,

    /// Text written instead of a picture on failure. Default: "Failed to download".
    pub failure_marker: String,

    /// Sheet to process. `None` selects the first sheet.
    pub sheet_name: Option<String>,

    /// Override for the input format. `None` detects it from the name or bytes.
    pub source_kind: Option<SourceKind>,

    /// Field delimiter for CSV input. Default: `b','`.
    pub csv_delimiter: u8,

    /// Number of data rows returned by [`crate::inspect`]. Default: 10.
    pub preview_rows: usize,

    /// Re-read the produced workbook and check its structure. Default: false.
    pub verify_output: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-row progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            image_width: 100,
            image_height: 100,
            row_height: 80.0,
            column_width: 20.0,
            max_image_dimension: 800,
            jpeg_quality: 85,
            fetch_timeout_secs: 10,
            max_download_bytes: 20 * 1024 * 1024,
            user_agent: concat!("sheetpic/", env!("CARGO_PKG_VERSION")).to_string(),
            header_label: DEFAULT_HEADER_LABEL.to_string(),
            failure_marker: DEFAULT_FAILURE_MARKER.to_string(),
            sheet_name: None,
            source_kind: None,
            csv_delimiter: b',',
            preview_rows: 10,
            verify_output: false,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("image_width", &self.image_width)
            .field("image_height", &self.image_height)
            .field("row_height", &self.row_height)
            .field("column_width", &self.column_width)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("header_label", &self.header_label)
            .field("failure_marker", &self.failure_marker)
            .field("sheet_name", &self.sheet_name)
            .field("source_kind", &self.source_kind)
            .field("verify_output", &self.verify_output)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn EmbedProgressCallback>"),
            )
            .finish()
    }
}

impl EmbedConfig {
    /// Create a new builder for `EmbedConfig`.
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EmbedConfig`].
#[derive(Debug)]
pub struct EmbedConfigBuilder {
    config: EmbedConfig,
}

impl EmbedConfigBuilder {
    pub fn image_width(mut self, px: u32) -> Self {
        self.config.image_width = px.clamp(1, 2000);
        self
    }

    pub fn image_height(mut self, px: u32) -> Self {
        self.config.image_height = px.clamp(1, 2000);
        self
    }

    /// Set both display dimensions at once.
    pub fn image_size(self, width: u32, height: u32) -> Self {
        self.image_width(width).image_height(height)
    }

    pub fn row_height(mut self, points: f64) -> Self {
        self.config.row_height = points.clamp(0.0, MAX_ROW_HEIGHT);
        self
    }

    pub fn column_width(mut self, chars: f64) -> Self {
        self.config.column_width = chars.clamp(0.0, MAX_COLUMN_WIDTH);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(16);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = bytes;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn header_label(mut self, label: impl Into<String>) -> Self {
        self.config.header_label = label.into();
        self
    }

    pub fn failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.failure_marker = marker.into();
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = Some(name.into());
        self
    }

    pub fn source_kind(mut self, kind: SourceKind) -> Self {
        self.config.source_kind = Some(kind);
        self
    }

    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.config.csv_delimiter = delimiter;
        self
    }

    pub fn preview_rows(mut self, n: usize) -> Self {
        self.config.preview_rows = n;
        self
    }

    pub fn verify_output(mut self, v: bool) -> Self {
        self.config.verify_output = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EmbedConfig, EmbedError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 {
            return Err(EmbedError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_download_bytes == 0 {
            return Err(EmbedError::InvalidConfig(
                "Max download size must be > 0 bytes".into(),
            ));
        }
        if c.header_label.trim().is_empty() {
            return Err(EmbedError::InvalidConfig(
                "Header label must not be empty".into(),
            ));
        }
        // A blank marker would make failed rows look like skipped ones.
        if c.failure_marker.trim().is_empty() {
            return Err(EmbedError::InvalidConfig(
                "Failure marker must not be empty".into(),
            ));
        }
        if !c.row_height.is_finite() || !c.column_width.is_finite() {
            return Err(EmbedError::InvalidConfig(format!(
                "Row height and column width must be finite, got {} / {}",
                c.row_height, c.column_width
            )));
        }
        if c.csv_delimiter == b'"' || c.csv_delimiter == b'\n' {
            return Err(EmbedError::InvalidConfig(format!(
                "CSV delimiter {:?} is not allowed",
                c.csv_delimiter as char
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Declared format of the input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Delimited text; becomes a single sheet named `Sheet1`.
    Csv,
    /// Any workbook calamine can open (xlsx, xlsm, xlsb, xls, ods).
    Spreadsheet,
}

impl SourceKind {
    /// Guess the kind from a file name's extension.
    ///
    /// Returns `None` for unknown or missing extensions; use
    /// [`SourceKind::sniff`] on the bytes in that case.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(SourceKind::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "xlam" | "ods" => {
                Some(SourceKind::Spreadsheet)
            }
            _ => None,
        }
    }

    /// Detect the kind from magic bytes: ZIP (xlsx/ods) and OLE2 (xls)
    /// containers are spreadsheets, everything else is treated as CSV.
    pub fn sniff(bytes: &[u8]) -> Self {
        const ZIP: &[u8] = b"PK\x03\x04";
        const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        if bytes.starts_with(ZIP) || bytes.starts_with(OLE) {
            SourceKind::Spreadsheet
        } else {
            SourceKind::Csv
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Csv => f.write_str("csv"),
            SourceKind::Spreadsheet => f.write_str("spreadsheet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = EmbedConfig::default();
        assert_eq!((c.image_width, c.image_height), (100, 100));
        assert_eq!(c.row_height, 80.0);
        assert_eq!(c.column_width, 20.0);
        assert_eq!(c.fetch_timeout_secs, 10);
        assert_eq!(c.header_label, "Embedded Image");
        assert_eq!(c.failure_marker, "Failed to download");
        assert!(c.user_agent.starts_with("sheetpic/"));
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = EmbedConfig::builder()
            .row_height(1000.0)
            .column_width(-3.0)
            .jpeg_quality(0)
            .max_image_dimension(2)
            .build()
            .unwrap();
        assert_eq!(c.row_height, MAX_ROW_HEIGHT);
        assert_eq!(c.column_width, 0.0);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.max_image_dimension, 16);
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let err = EmbedConfig::builder().fetch_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_empty_header() {
        assert!(EmbedConfig::builder().header_label("").build().is_err());
        assert!(EmbedConfig::builder().header_label("  ").build().is_err());
    }

    #[test]
    fn build_rejects_empty_failure_marker() {
        for marker in ["", " \t"] {
            let err = EmbedConfig::builder()
                .failure_marker(marker)
                .verify_output(true)
                .build()
                .unwrap_err();
            assert!(matches!(err, EmbedError::InvalidConfig(_)));
        }
        assert!(EmbedConfig::builder().failure_marker("n/a").build().is_ok());
    }

    #[test]
    fn source_kind_from_extension() {
        assert_eq!(SourceKind::from_path("data.CSV"), Some(SourceKind::Csv));
        assert_eq!(SourceKind::from_path("book.xlsx"), Some(SourceKind::Spreadsheet));
        assert_eq!(SourceKind::from_path("book.ods"), Some(SourceKind::Spreadsheet));
        assert_eq!(SourceKind::from_path("noext"), None);
        assert_eq!(SourceKind::from_path("image.png"), None);
    }

    #[test]
    fn source_kind_sniffs_containers() {
        assert_eq!(SourceKind::sniff(b"PK\x03\x04rest"), SourceKind::Spreadsheet);
        assert_eq!(
            SourceKind::sniff(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0]),
            SourceKind::Spreadsheet
        );
        assert_eq!(SourceKind::sniff(b"a,b\n1,2\n"), SourceKind::Csv);
        assert_eq!(SourceKind::sniff(b""), SourceKind::Csv);
    }
}
