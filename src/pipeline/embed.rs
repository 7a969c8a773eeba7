//! Spreadsheet embedder: insert the image column and fill it row by row.
//!
//! Rows are visited strictly top to bottom and each fetch is awaited before
//! the next row starts, so the run time is the sum of per-row latencies.
//! A failed fetch only affects its own row: the failure marker is written
//! into the image cell and the loop moves on.

use super::fetch::ImageSource;
use crate::config::EmbedConfig;
use crate::error::EmbedError;
use crate::output::{RowOutcome, RowResult};
use crate::workbook::{column_letter, AnchoredImage, CellValue, Sheet, MAX_COLUMNS};
use tracing::{debug, info, warn};

/// Where the embedder put things, plus one result per data row.
#[derive(Debug, Clone)]
pub struct EmbedReport {
    pub header_row: u32,
    pub url_column: u16,
    pub image_column: u16,
    pub rows: Vec<RowResult>,
}

/// Insert an image column right of `column` and embed every row's picture.
///
/// Fails before touching the sheet if it has no header row, the column
/// name is unknown, or the sheet is already at Excel's column limit.
pub async fn embed_images<S: ImageSource>(
    sheet: &mut Sheet,
    column: &str,
    source: &S,
    config: &EmbedConfig,
) -> Result<EmbedReport, EmbedError> {
    let header_row = sheet.header_row().ok_or_else(|| EmbedError::EmptySheet {
        sheet: sheet.name().to_string(),
    })?;

    let url_column = sheet
        .find_column(column)
        .ok_or_else(|| EmbedError::ColumnNotFound {
            name: column.to_string(),
            sheet: sheet.name().to_string(),
            available: sheet.column_names(),
        })?;

    if sheet.column_count() >= MAX_COLUMNS {
        return Err(EmbedError::TooManyColumns {
            sheet: sheet.name().to_string(),
        });
    }

    let image_column = url_column + 1;
    sheet.insert_column(image_column);
    sheet.set_cell(
        header_row,
        image_column,
        CellValue::String(config.header_label.clone()),
    );
    info!(
        "Sheet '{}': URLs in column {}, images go to column {}",
        sheet.name(),
        column_letter(url_column),
        column_letter(image_column)
    );

    let first_data_row = header_row + 1;
    let end_row = sheet.row_count() as u32;
    let total_rows = end_row.saturating_sub(first_data_row) as usize;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_rows);
    }

    let mut rows = Vec::with_capacity(total_rows);
    for row in first_data_row..end_row {
        // 1-based for humans
        let row_num = row + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_row_start(row_num, total_rows);
        }

        let url = sheet.cell(row, url_column).non_blank_text();
        let outcome = match url.as_deref() {
            None => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_row_skipped(row_num, total_rows);
                }
                RowOutcome::Skipped
            }
            Some(url) => match source.fetch(url).await {
                Ok(img) => {
                    debug!(
                        "Row {}: embedded {}x{} ({} bytes)",
                        row_num,
                        img.width,
                        img.height,
                        img.data.len()
                    );
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_row_embedded(row_num, total_rows, img.data.len());
                    }
                    let outcome = RowOutcome::Embedded {
                        width: img.width,
                        height: img.height,
                        source_width: img.source_width,
                        source_height: img.source_height,
                        bytes: img.data.len(),
                    };
                    sheet.insert_image(AnchoredImage {
                        row,
                        col: image_column,
                        pixel_width: img.width,
                        pixel_height: img.height,
                        display_width: config.image_width,
                        display_height: config.image_height,
                        alt_text: Some(url.to_string()),
                        data: img.data,
                    });
                    sheet.set_row_height(row, config.row_height);
                    outcome
                }
                Err(error) => {
                    warn!("Row {}: {} ({})", row_num, error, url);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_row_failed(row_num, total_rows, &error.to_string());
                    }
                    sheet.set_cell(
                        row,
                        image_column,
                        CellValue::String(config.failure_marker.clone()),
                    );
                    RowOutcome::Failed { error }
                }
            },
        };

        rows.push(RowResult {
            row: row_num,
            url,
            outcome,
        });
    }

    sheet.set_column_width(image_column, config.column_width);

    if let Some(ref cb) = config.progress_callback {
        let embedded = rows.iter().filter(|r| r.is_embedded()).count();
        cb.on_run_complete(total_rows, embedded);
    }

    Ok(EmbedReport {
        header_row,
        url_column,
        image_column,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::pipeline::encode::EncodedImage;
    use crate::progress::EmbedProgressCallback;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Serves canned results and records the order URLs were requested in.
    #[derive(Default)]
    struct FakeSource {
        responses: HashMap<String, Result<EncodedImage, FetchError>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with(mut self, url: &str, result: Result<EncodedImage, FetchError>) -> Self {
            self.responses.insert(url.to_string(), result);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<EncodedImage, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::HttpStatus { status: 404 }))
        }
    }

    fn jpeg(w: u32, h: u32) -> EncodedImage {
        EncodedImage {
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: w,
            height: h,
            source_width: w * 2,
            source_height: h * 2,
        }
    }

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn product_sheet() -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        sheet.push_row(vec![s("sku"), s("image_url"), s("price")]);
        sheet.push_row(vec![s("A1"), s("http://img/ok.jpg"), CellValue::Float(9.5)]);
        sheet.push_row(vec![s("A2"), CellValue::Empty, CellValue::Float(3.0)]);
        sheet.push_row(vec![s("A3"), s("http://img/missing.jpg"), CellValue::Float(1.0)]);
        sheet
    }

    #[tokio::test]
    async fn fills_image_column_row_by_row() {
        let mut sheet = product_sheet();
        let source = FakeSource::default().with("http://img/ok.jpg", Ok(jpeg(40, 30)));
        let config = EmbedConfig::default();

        let report = embed_images(&mut sheet, "image_url", &source, &config)
            .await
            .unwrap();

        assert_eq!((report.url_column, report.image_column), (1, 2));
        assert_eq!(sheet.column_count(), 4);
        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.cell(0, 2), &s("Embedded Image"));
        assert_eq!(sheet.cell(0, 3), &s("price"));

        // Row 2: embedded picture, row height set, cell itself empty.
        assert_eq!(sheet.images().len(), 1);
        let img = &sheet.images()[0];
        assert_eq!((img.row, img.col), (1, 2));
        assert_eq!((img.display_width, img.display_height), (100, 100));
        assert_eq!(img.alt_text.as_deref(), Some("http://img/ok.jpg"));
        assert_eq!(sheet.row_height(1), Some(80.0));
        assert_eq!(sheet.cell(1, 2), &CellValue::Empty);

        // Row 3: no URL, nothing written.
        assert_eq!(sheet.cell(2, 2), &CellValue::Empty);
        assert_eq!(sheet.row_height(2), None);

        // Row 4: 404 → failure marker, run continued.
        assert_eq!(sheet.cell(3, 2), &s("Failed to download"));
        assert_eq!(sheet.row_height(3), None);

        assert_eq!(sheet.column_width(2), Some(20.0));
        assert_eq!(
            source.calls(),
            vec!["http://img/ok.jpg", "http://img/missing.jpg"]
        );

        let outcomes: Vec<_> = report.rows.iter().map(|r| (r.row, r.outcome.clone())).collect();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], (2, RowOutcome::Embedded { width: 40, .. })));
        assert_eq!(outcomes[1], (3, RowOutcome::Skipped));
        assert_eq!(
            outcomes[2],
            (
                4,
                RowOutcome::Failed {
                    error: FetchError::HttpStatus { status: 404 }
                }
            )
        );
    }

    #[tokio::test]
    async fn custom_labels_and_sizes() {
        let mut sheet = product_sheet();
        let source = FakeSource::default().with("http://img/ok.jpg", Ok(jpeg(10, 10)));
        let config = EmbedConfig::builder()
            .header_label("Photo")
            .failure_marker("n/a")
            .image_size(60, 45)
            .row_height(50.0)
            .column_width(12.0)
            .build()
            .unwrap();

        embed_images(&mut sheet, "image_url", &source, &config)
            .await
            .unwrap();

        assert_eq!(sheet.cell(0, 2), &s("Photo"));
        assert_eq!(sheet.cell(3, 2), &s("n/a"));
        assert_eq!(sheet.row_height(1), Some(50.0));
        assert_eq!(sheet.column_width(2), Some(12.0));
        let img = &sheet.images()[0];
        assert_eq!((img.display_width, img.display_height), (60, 45));
    }

    #[tokio::test]
    async fn last_column_url_gets_image_column_appended() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.push_row(vec![s("A"), s("B")]);
        sheet.push_row(vec![CellValue::Int(1), s("http://img/x.png")]);
        let source = FakeSource::default();

        let report = embed_images(&mut sheet, "B", &source, &EmbedConfig::default())
            .await
            .unwrap();

        assert_eq!(report.image_column, 2);
        assert_eq!(
            sheet.column_names(),
            vec!["A", "B", "Embedded Image"]
        );
    }

    #[tokio::test]
    async fn existing_widths_and_images_shift_right() {
        let mut sheet = product_sheet();
        sheet.set_column_width(2, 14.0);
        let source = FakeSource::default();

        embed_images(&mut sheet, "image_url", &source, &EmbedConfig::default())
            .await
            .unwrap();

        // price moved from C to D and kept its width
        assert_eq!(sheet.column_width(3), Some(14.0));
        assert_eq!(sheet.column_width(2), Some(20.0));
    }

    #[tokio::test]
    async fn unknown_column_is_fatal_and_leaves_sheet_alone() {
        let mut sheet = product_sheet();
        let before = sheet.clone();
        let err = embed_images(&mut sheet, "photo", &FakeSource::default(), &EmbedConfig::default())
            .await
            .unwrap_err();

        match err {
            EmbedError::ColumnNotFound { available, .. } => {
                assert_eq!(available, vec!["sku", "image_url", "price"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sheet, before);
    }

    #[tokio::test]
    async fn empty_sheet_is_fatal() {
        let mut sheet = Sheet::new("Blank");
        let err = embed_images(&mut sheet, "url", &FakeSource::default(), &EmbedConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::EmptySheet { .. }));
    }

    #[tokio::test]
    async fn progress_events_follow_rows() {
        #[derive(Default)]
        struct Counts {
            total: AtomicUsize,
            embedded: AtomicUsize,
            failed: AtomicUsize,
            skipped: AtomicUsize,
            complete_embedded: AtomicUsize,
        }
        impl EmbedProgressCallback for Counts {
            fn on_run_start(&self, total_rows: usize) {
                self.total.store(total_rows, Ordering::SeqCst);
            }
            fn on_row_embedded(&self, _: u32, _: usize, _: usize) {
                self.embedded.fetch_add(1, Ordering::SeqCst);
            }
            fn on_row_failed(&self, _: u32, _: usize, _: &str) {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            fn on_row_skipped(&self, _: u32, _: usize) {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
            fn on_run_complete(&self, _: usize, embedded: usize) {
                self.complete_embedded.store(embedded, Ordering::SeqCst);
            }
        }

        let counts = Arc::new(Counts::default());
        let config = EmbedConfig::builder()
            .progress_callback(counts.clone())
            .build()
            .unwrap();
        let source = FakeSource::default().with("http://img/ok.jpg", Ok(jpeg(5, 5)));
        let mut sheet = product_sheet();

        embed_images(&mut sheet, "image_url", &source, &config)
            .await
            .unwrap();

        assert_eq!(counts.total.load(Ordering::SeqCst), 3);
        assert_eq!(counts.embedded.load(Ordering::SeqCst), 1);
        assert_eq!(counts.failed.load(Ordering::SeqCst), 1);
        assert_eq!(counts.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(counts.complete_embedded.load(Ordering::SeqCst), 1);
    }
}
