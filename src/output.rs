//! Result types returned by the `convert*` entry points.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};

/// MIME type of the produced workbook.
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File name suggested for the download.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "data_with_images.xlsx";

/// What happened to one data row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    /// URL cell was blank; the image cell stays empty.
    Skipped,
    /// A picture was anchored in the image column.
    Embedded {
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
        bytes: usize,
    },
    /// The failure marker was written instead of a picture.
    Failed { error: FetchError },
}

/// Per-row record of an embedding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResult {
    /// 1-based sheet row number, as shown in Excel.
    pub row: u32,
    /// URL text as read from the cell, if any.
    pub url: Option<String>,
    pub outcome: RowOutcome,
}

impl RowResult {
    pub fn is_embedded(&self) -> bool {
        matches!(self.outcome, RowOutcome::Embedded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RowOutcome::Failed { .. })
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedStats {
    /// Data rows below the header row.
    pub total_rows: usize,
    pub embedded_rows: usize,
    pub failed_rows: usize,
    pub skipped_rows: usize,
    /// Sum of stored JPEG sizes.
    pub image_bytes: u64,
    pub fetch_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl EmbedStats {
    /// Tally counters from per-row results.
    pub fn from_rows(rows: &[RowResult]) -> Self {
        let mut stats = EmbedStats {
            total_rows: rows.len(),
            ..Default::default()
        };
        for row in rows {
            match &row.outcome {
                RowOutcome::Skipped => stats.skipped_rows += 1,
                RowOutcome::Failed { .. } => stats.failed_rows += 1,
                RowOutcome::Embedded { bytes, .. } => {
                    stats.embedded_rows += 1;
                    stats.image_bytes += *bytes as u64;
                }
            }
        }
        stats
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedOutput {
    /// The xlsx file contents.
    #[serde(skip)]
    pub workbook: Vec<u8>,
    pub sheet_name: String,
    /// 0-based index of the URL column in the input.
    pub url_column: u16,
    /// 0-based index of the inserted image column.
    pub image_column: u16,
    pub rows: Vec<RowResult>,
    pub stats: EmbedStats,
}

impl EmbedOutput {
    /// MIME type to serve [`EmbedOutput::workbook`] with.
    pub fn mime_type(&self) -> &'static str {
        XLSX_MIME_TYPE
    }
}
