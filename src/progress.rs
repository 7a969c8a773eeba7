//! Progress-callback trait for per-row embedding events.
//!
//! Inject an [`Arc<dyn EmbedProgressCallback>`] via
//! [`crate::config::EmbedConfigBuilder::progress_callback`] to receive
//! events as the embedder walks the sheet.
//!
//! # Example
//!
//! ```rust
//! use sheetpic::{EmbedProgressCallback, EmbedConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     embedded: AtomicUsize,
//! }
//!
//! impl EmbedProgressCallback for CountingCallback {
//!     fn on_row_embedded(&self, row: u32, total_rows: usize, jpeg_len: usize) {
//!         self.embedded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("row {row} of {total_rows}: {jpeg_len} bytes");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { embedded: AtomicUsize::new(0) });
//!
//! let config = EmbedConfig::builder()
//!     .progress_callback(counter as Arc<dyn EmbedProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the embedder as it processes each data row.
///
/// Rows are processed strictly in sheet order, so events for one run never
/// interleave. Implementations are still `Send + Sync` so a callback can be
/// shared with a UI thread. All methods have default no-op implementations.
///
/// `row` arguments are 1-based sheet row numbers, as shown in Excel.
pub trait EmbedProgressCallback: Send + Sync {
    /// Called once before the first data row.
    fn on_run_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called before the URL cell of a row is read.
    fn on_row_start(&self, row: u32, total_rows: usize) {
        let _ = (row, total_rows);
    }

    /// Called when a picture was anchored in the row.
    ///
    /// * `jpeg_len` — size in bytes of the stored JPEG
    fn on_row_embedded(&self, row: u32, total_rows: usize, jpeg_len: usize) {
        let _ = (row, total_rows, jpeg_len);
    }

    /// Called when the fetch failed and the failure marker was written.
    fn on_row_failed(&self, row: u32, total_rows: usize, error: &str) {
        let _ = (row, total_rows, error);
    }

    /// Called when the URL cell was empty.
    fn on_row_skipped(&self, row: u32, total_rows: usize) {
        let _ = (row, total_rows);
    }

    /// Called once after every data row has been visited.
    fn on_run_complete(&self, total_rows: usize, embedded: usize) {
        let _ = (total_rows, embedded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EmbedProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EmbedConfig`].
pub type ProgressCallback = Arc<dyn EmbedProgressCallback>;
