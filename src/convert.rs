//! Top-level entry points: load → embed → serialize.
//!
//! [`convert`] is the primary API. The other functions are variations on
//! where the input comes from ([`convert_from_bytes`]), where the output
//! goes ([`convert_to_file`]), which image source is used
//! ([`convert_with_source`]) and whether the caller is async
//! ([`convert_sync`]). [`inspect`] stops after loading.

use crate::config::EmbedConfig;
use crate::error::EmbedError;
use crate::output::{EmbedOutput, EmbedStats};
use crate::pipeline::fetch::{HttpImageSource, ImageSource};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::load::{self, TableInfo};
use crate::pipeline::{embed, serialize};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Embed the images referenced by `column` of a CSV or spreadsheet.
///
/// # Arguments
/// * `input`  — Local file path or HTTP/HTTPS URL of the CSV/workbook
/// * `column` — Header text of the column holding image URLs
/// * `config` — Run configuration
///
/// # Returns
/// `Ok(EmbedOutput)` once every row has been visited, even when some images
/// failed (check `output.stats.failed_rows`).
///
/// # Errors
/// Returns `Err(EmbedError)` only for fatal errors:
/// - Input not found, unreadable or not parseable as CSV/spreadsheet
/// - Unknown sheet or column
/// - Workbook could not be written
///
/// # Example
/// ```rust,no_run
/// use sheetpic::{convert, EmbedConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = EmbedConfig::default();
///     let output = convert("products.csv", "image_url", &config).await?;
///     std::fs::write("data_with_images.xlsx", &output.workbook)?;
///     eprintln!("{} images embedded", output.stats.embedded_rows);
///     Ok(())
/// }
/// ```
pub async fn convert(
    input_str: impl AsRef<str>,
    column: &str,
    config: &EmbedConfig,
) -> Result<EmbedOutput, EmbedError> {
    let input_str = input_str.as_ref();
    info!("Starting run: {} (column '{}')", input_str, column);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let source = HttpImageSource::new(config)?;
    convert_with_source(resolved, column, &source, config).await
}

/// Embed images for an input already held in memory, e.g. an upload.
///
/// `file_name` is only used to detect CSV vs. spreadsheet by extension;
/// pass an empty string to detect from the bytes instead.
pub async fn convert_from_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    column: &str,
    config: &EmbedConfig,
) -> Result<EmbedOutput, EmbedError> {
    let source = HttpImageSource::new(config)?;
    convert_with_source(
        ResolvedInput::from_bytes(file_name, bytes),
        column,
        &source,
        config,
    )
    .await
}

/// Run the pipeline with a caller-supplied [`ImageSource`].
pub async fn convert_with_source<S: ImageSource>(
    input: ResolvedInput,
    column: &str,
    source: &S,
    config: &EmbedConfig,
) -> Result<EmbedOutput, EmbedError> {
    let total_start = Instant::now();

    // ── Step 1: Parse input ──────────────────────────────────────────────
    let load_config = config.clone();
    let table = tokio::task::spawn_blocking(move || load::load(&input, &load_config))
        .await
        .map_err(|e| EmbedError::Internal(format!("Load task panicked: {e}")))??;
    let sheet_name = table.sheet_name.clone();
    let mut workbook = table.workbook;

    // ── Step 2: Embed images row by row ──────────────────────────────────
    let sheet = workbook
        .sheet_mut(&sheet_name)
        .ok_or_else(|| EmbedError::Internal(format!("sheet '{sheet_name}' vanished")))?;
    let fetch_start = Instant::now();
    let report = embed::embed_images(sheet, column, source, config).await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

    // ── Step 3: Serialise ────────────────────────────────────────────────
    let (workbook, bytes) = tokio::task::spawn_blocking(move || {
        serialize::serialize(&workbook).map(|bytes| (workbook, bytes))
    })
    .await
    .map_err(|e| EmbedError::Internal(format!("Serialise task panicked: {e}")))??;

    if config.verify_output {
        serialize::verify(&bytes, &workbook, &sheet_name, &report, config)?;
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let mut stats = EmbedStats::from_rows(&report.rows);
    stats.fetch_duration_ms = fetch_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Run complete: {}/{} rows embedded, {} failed, {} skipped, {}ms",
        stats.embedded_rows,
        stats.total_rows,
        stats.failed_rows,
        stats.skipped_rows,
        stats.total_duration_ms
    );

    Ok(EmbedOutput {
        workbook: bytes,
        sheet_name,
        url_column: report.url_column,
        image_column: report.image_column,
        rows: report.rows,
        stats,
    })
}

/// Run [`convert`] and write the workbook to `output_path`.
///
/// Writes to a temp file in the destination directory, then renames it into
/// place, so a failed run never leaves a partial file behind.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    column: &str,
    output_path: impl AsRef<Path>,
    config: &EmbedConfig,
) -> Result<EmbedOutput, EmbedError> {
    let output = convert(input_str, column, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let bytes = output.workbook.clone();

    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| EmbedError::Internal(format!("Write task panicked: {e}")))??;

    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    column: &str,
    config: &EmbedConfig,
) -> Result<EmbedOutput, EmbedError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EmbedError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(input_str, column, config))
}

/// Load the input and describe the selected sheet without fetching anything.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &EmbedConfig,
) -> Result<TableInfo, EmbedError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let load_config = config.clone();
    tokio::task::spawn_blocking(move || {
        load::load(&resolved, &load_config)?.info(load_config.preview_rows)
    })
    .await
    .map_err(|e| EmbedError::Internal(format!("Inspect task panicked: {e}")))?
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EmbedError> {
    let write_err = |source: std::io::Error| EmbedError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::pipeline::encode::EncodedImage;

    struct AlwaysFails;

    impl ImageSource for AlwaysFails {
        async fn fetch(&self, _url: &str) -> Result<EncodedImage, FetchError> {
            Err(FetchError::Timeout { secs: 10 })
        }
    }

    #[tokio::test]
    async fn csv_run_with_failing_source() {
        let input = ResolvedInput::from_bytes("d.csv", b"A,B\n1,http://h/a.jpg\n2,\n".to_vec());
        let config = EmbedConfig::builder().verify_output(true).build().unwrap();

        let out = convert_with_source(input, "B", &AlwaysFails, &config)
            .await
            .unwrap();

        assert_eq!(out.sheet_name, "Sheet1");
        assert_eq!((out.url_column, out.image_column), (1, 2));
        assert_eq!(out.stats.total_rows, 2);
        assert_eq!(out.stats.failed_rows, 1);
        assert_eq!(out.stats.skipped_rows, 1);
        assert_eq!(out.mime_type(), crate::output::XLSX_MIME_TYPE);
        assert!(out.workbook.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn over_long_csv_field_does_not_abort_run() {
        let csv = format!("A,B\n{},http://h/a.jpg\n", "x".repeat(40_000));
        let input = ResolvedInput::from_bytes("d.csv", csv.into_bytes());
        let config = EmbedConfig::builder().verify_output(true).build().unwrap();

        let out = convert_with_source(input, "B", &AlwaysFails, &config)
            .await
            .unwrap();
        assert_eq!(out.stats.failed_rows, 1);
    }

    #[tokio::test]
    async fn unknown_column_aborts_before_output() {
        let input = ResolvedInput::from_bytes("d.csv", b"A,B\n1,2\n".to_vec());
        let err = convert_with_source(input, "C", &AlwaysFails, &EmbedConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::ColumnNotFound { .. }));
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.xlsx");
        write_atomic(&path, b"PK data").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK data");
        // No temp files left next to the output.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn inspect_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(&path, "name,photo\nmug,http://h/m.jpg\n").unwrap();

        let info = inspect(path.to_str().unwrap(), &EmbedConfig::default())
            .await
            .unwrap();
        assert_eq!(info.sheet_names, vec!["Sheet1"]);
        assert_eq!(info.columns, vec!["name", "photo"]);
        assert_eq!(info.row_count, 1);
    }
}
