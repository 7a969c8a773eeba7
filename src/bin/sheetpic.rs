//! CLI binary for sheetpic.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `EmbedConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sheetpic::{
    convert_to_file, inspect, EmbedConfig, EmbedProgressCallback, ProgressCallback, SourceKind,
    TableInfo, DEFAULT_OUTPUT_FILE_NAME,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a progress bar plus one log line per failed row.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the row currently being fetched.
    row_started: Mutex<Option<Instant>>,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Loading");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            row_started: Mutex::new(None),
            failures: AtomicUsize::new(0),
        })
    }

    /// Remove the bar from the terminal when the run aborts early.
    fn clear(&self) {
        self.bar.finish_and_clear();
    }

    fn row_elapsed(&self) -> String {
        let secs = self
            .row_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl EmbedProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_rows: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>4}/{len} rows  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_rows as u64);
        self.bar.set_prefix("Embedding");
        self.bar.reset_eta();
    }

    fn on_row_start(&self, row: u32, _total_rows: usize) {
        if let Ok(mut t) = self.row_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("row {row}"));
    }

    fn on_row_embedded(&self, _row: u32, _total_rows: usize, _jpeg_len: usize) {
        self.bar.inc(1);
    }

    fn on_row_failed(&self, row: u32, _total_rows: usize, error: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Row {:>5}  {}  {}",
            red("✗"),
            row,
            red(&msg),
            self.row_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_row_skipped(&self, _row: u32, _total_rows: usize) {
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_rows: usize, embedded: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::Relaxed);
        let mark = if failed == 0 { green("✔") } else { yellow("⚠") };
        eprintln!(
            "{} {} of {} rows embedded{}",
            mark,
            bold(&embedded.to_string()),
            total_rows,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Embed images from the "image_url" column of a CSV
  sheetpic products.csv --column image_url

  # Pick a sheet and write somewhere else
  sheetpic catalogue.xlsx --sheet Items --column Photo -o catalogue_pics.xlsx

  # Bigger thumbnails, taller rows
  sheetpic data.csv -c url --image-width 150 --image-height 150 --row-height 115

  # Input from a URL
  sheetpic https://example.com/export.csv -c picture

  # Show sheets and columns without downloading any image
  sheetpic --inspect-only catalogue.xlsx

  # Machine-readable per-row report
  sheetpic data.csv -c url --json > report.json

ENVIRONMENT VARIABLES:
  Every flag can also be set through a SHEETPIC_* variable, e.g.
  SHEETPIC_COLUMN, SHEETPIC_SHEET, SHEETPIC_TIMEOUT.
  RUST_LOG overrides the log filter (e.g. RUST_LOG=sheetpic=debug).
"#;

/// Embed images referenced by URL into an Excel workbook.
#[derive(Parser, Debug)]
#[command(
    name = "sheetpic",
    version,
    about = "Embed images referenced by URL into an Excel workbook",
    long_about = "Read a CSV or spreadsheet (local file or URL), download the image behind each \
URL in the chosen column, and write an .xlsx file with the pictures anchored in a new column \
next to it. Rows whose image cannot be fetched get a failure marker instead.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local CSV/XLSX/XLS/ODS path or HTTP/HTTPS URL.
    input: String,

    /// Header of the column holding image URLs.
    #[arg(short, long, env = "SHEETPIC_COLUMN", required_unless_present = "inspect_only")]
    column: Option<String>,

    /// Output workbook path.
    #[arg(short, long, env = "SHEETPIC_OUTPUT", default_value = DEFAULT_OUTPUT_FILE_NAME)]
    output: PathBuf,

    /// Sheet to process (default: first sheet).
    #[arg(short, long, env = "SHEETPIC_SHEET")]
    sheet: Option<String>,

    /// Displayed picture width in pixels.
    #[arg(long, env = "SHEETPIC_IMAGE_WIDTH", default_value_t = 100)]
    image_width: u32,

    /// Displayed picture height in pixels.
    #[arg(long, env = "SHEETPIC_IMAGE_HEIGHT", default_value_t = 100)]
    image_height: u32,

    /// Height of rows holding a picture, in points (max 409).
    #[arg(long, env = "SHEETPIC_ROW_HEIGHT", default_value_t = 80.0)]
    row_height: f64,

    /// Width of the image column, in characters (max 255).
    #[arg(long, env = "SHEETPIC_COLUMN_WIDTH", default_value_t = 20.0)]
    column_width: f64,

    /// Longest side of the stored JPEG, in pixels.
    #[arg(long, env = "SHEETPIC_MAX_DIMENSION", default_value_t = 800)]
    max_dimension: u32,

    /// JPEG quality (1–100).
    #[arg(long, env = "SHEETPIC_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Per-image HTTP timeout in seconds.
    #[arg(long, env = "SHEETPIC_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    /// Input download timeout in seconds (URL inputs only).
    #[arg(long, env = "SHEETPIC_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest accepted image body in bytes.
    #[arg(long, env = "SHEETPIC_MAX_BYTES", default_value_t = 20 * 1024 * 1024)]
    max_bytes: u64,

    /// Header text of the inserted column.
    #[arg(long, env = "SHEETPIC_HEADER_LABEL", default_value = sheetpic::config::DEFAULT_HEADER_LABEL)]
    header_label: String,

    /// Text written where an image could not be embedded.
    #[arg(long, env = "SHEETPIC_FAILURE_MARKER", default_value = sheetpic::config::DEFAULT_FAILURE_MARKER)]
    failure_marker: String,

    /// CSV field delimiter: a single character, or "tab".
    #[arg(long, env = "SHEETPIC_DELIMITER", default_value = ",")]
    delimiter: String,

    /// Force the input format instead of detecting it.
    #[arg(long, env = "SHEETPIC_KIND", value_enum)]
    kind: Option<KindArg>,

    /// Re-read the written workbook and check it.
    #[arg(long, env = "SHEETPIC_VERIFY")]
    verify: bool,

    /// Print the per-row report as JSON on stdout.
    #[arg(long, env = "SHEETPIC_JSON")]
    json: bool,

    /// Print sheets, columns and a row preview only; fetch nothing.
    #[arg(long, env = "SHEETPIC_INSPECT_ONLY")]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "SHEETPIC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SHEETPIC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SHEETPIC_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Csv,
    Spreadsheet,
}

impl From<KindArg> for SourceKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Csv => SourceKind::Csv,
            KindArg::Spreadsheet => SourceKind::Spreadsheet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; failed rows are printed by it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let clear_progress = || {
        if let Some(ref cb) = cli_progress {
            cb.clear();
        }
    };
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn EmbedProgressCallback>);
    let config = build_config(&cli, progress_cb).inspect_err(|_| clear_progress())?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect input")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise table info")?
            );
        } else {
            print_info(&cli.input, &info);
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let Some(column) = cli.column.as_deref() else {
        clear_progress();
        anyhow::bail!("--column is required unless --inspect-only is given");
    };

    let output = convert_to_file(&cli.input, column, &cli.output, &config)
        .await
        .inspect_err(|_| clear_progress())
        .context("Embedding failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise report")?
        );
    }

    if !cli.quiet {
        let stats = &output.stats;
        if !show_progress {
            eprintln!(
                "Embedded {}/{} rows ({} failed, {} empty)",
                stats.embedded_rows, stats.total_rows, stats.failed_rows, stats.skipped_rows
            );
        }
        eprintln!(
            "   {}  {}ms  →  {}",
            dim(&format!("{} KiB of images", stats.image_bytes / 1024)),
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

fn print_info(input: &str, info: &TableInfo) {
    println!("File:     {}", input);
    println!("Format:   {}", info.kind);
    println!("Sheets:   {}", info.sheet_names.join(", "));
    println!("Selected: {}", info.sheet_name);
    println!("Rows:     {}", info.row_count);
    println!("Columns:");
    for (i, name) in info.columns.iter().enumerate() {
        println!(
            "  {:>3}  {:<4} {}",
            i + 1,
            sheetpic::workbook::column_letter(i as u16),
            name
        );
    }
    if !info.preview.is_empty() {
        println!("Preview:");
        for row in &info.preview {
            println!("  {}", dim(&row.join(" | ")));
        }
    }
}

/// Map CLI args to `EmbedConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<EmbedConfig> {
    let mut builder = EmbedConfig::builder()
        .image_size(cli.image_width, cli.image_height)
        .row_height(cli.row_height)
        .column_width(cli.column_width)
        .max_image_dimension(cli.max_dimension)
        .jpeg_quality(cli.quality)
        .fetch_timeout_secs(cli.timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_download_bytes(cli.max_bytes)
        .header_label(cli.header_label.clone())
        .failure_marker(cli.failure_marker.clone())
        .csv_delimiter(parse_delimiter(&cli.delimiter)?)
        .verify_output(cli.verify);

    if let Some(ref sheet) = cli.sheet {
        builder = builder.sheet_name(sheet.clone());
    }
    if let Some(kind) = cli.kind {
        builder = builder.source_kind(kind.into());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--delimiter` into a single byte.
fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ => {
            let bytes = s.as_bytes();
            if bytes.len() != 1 {
                anyhow::bail!("Delimiter must be a single ASCII character (got '{}')", s);
            }
            Ok(bytes[0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn cli_defaults_build_default_config() {
        let cli = Cli::parse_from(["sheetpic", "in.csv", "--column", "url"]);
        assert_eq!(cli.output, PathBuf::from(DEFAULT_OUTPUT_FILE_NAME));
        let config = build_config(&cli, None).unwrap();
        let default = EmbedConfig::default();
        assert_eq!(config.image_width, default.image_width);
        assert_eq!(config.row_height, default.row_height);
        assert_eq!(config.fetch_timeout_secs, default.fetch_timeout_secs);
        assert_eq!(config.max_download_bytes, default.max_download_bytes);
        assert_eq!(config.header_label, default.header_label);
    }

    #[test]
    fn every_flag_reads_an_env_var() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        for arg in cmd.get_arguments() {
            let id = arg.get_id().as_str();
            if arg.is_positional() || id == "help" || id == "version" {
                continue;
            }
            let env = arg.get_env().and_then(|e| e.to_str()).unwrap_or_default();
            assert!(env.starts_with("SHEETPIC_"), "--{id} has no SHEETPIC_* variable");
        }
    }

    #[test]
    fn clear_finishes_the_bar() {
        let cb = CliProgressCallback::new();
        assert!(!cb.bar.is_finished());
        cb.clear();
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn inspect_only_does_not_need_column() {
        let cli = Cli::try_parse_from(["sheetpic", "--inspect-only", "in.xlsx"]).unwrap();
        assert!(cli.column.is_none());
        assert!(Cli::try_parse_from(["sheetpic", "in.xlsx"]).is_err());
    }
}
