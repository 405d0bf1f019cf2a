//! CLI binary for preview-processor.
//!
//! Runs one preview batch against a repository: maps CLI flags to
//! `PreviewConfig`, `StoreConfig` and the rasteriser, then prints a summary.
//! Meant to be invoked periodically (cron, systemd timer).

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use preview_processor::logging::{self, LogSettings};
use preview_processor::pipeline::classify::{load_ignore_list, MimeTable};
use preview_processor::{
    BatchProgressCallback, BatchReport, PdfiumRasterizer, PreviewConfig, PreviewProcessor,
    ProcessingOutcome, ProgressCallback, SizeBounds, SlingStore, StoreConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the batch, one log line per finished item.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Connecting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} items  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_prefix("Processing");
    }

    fn on_item_start(&self, id: &str, _index: usize, _total: usize) {
        self.bar.set_message(id.to_string());
    }

    fn on_item_complete(&self, id: &str, index: usize, total: usize, outcome: &ProcessingOutcome) {
        let mark = match outcome {
            ProcessingOutcome::Succeeded { .. } => green("✓"),
            ProcessingOutcome::Skipped { .. } => dim("-"),
            ProcessingOutcome::Failed { .. } => red("✗"),
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            mark,
            index + 1,
            total,
            id,
            dim(&outcome.to_string())
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process everything pending on a local server
  preview-processor http://localhost:8080

  # Explicit credentials and work directory
  preview-processor https://oae.example.edu --user admin --password s3cret \
      --work-dir /var/tmp/previews --logs-dir /var/log/previews

  # Custom mime table, larger thumbnails, JSON report
  preview-processor http://localhost:8080 --mime-types /etc/mime.types \
      --small 240x300 --json > report.json

SIZE CLASSES:
  large    document pages only, rasterised at --raster-width
  normal   --image-normal for images, --document-normal for pages
  small    --small box for both (aspect ratio kept, box never exceeded)

  Sizes are WIDTH (height follows the aspect ratio) or WIDTHxHEIGHT (fit
  inside the box).

EXTERNAL TOOLS:
  pdfium    bound from --pdfium-lib, else the system library
  soffice   converts office documents to PDF before rendering;
            --office-command '' disables conversion (PDF only)
"#;

/// Generate page previews for content flagged in a Sling repository.
#[derive(Parser, Debug)]
#[command(
    name = "preview-processor",
    version,
    about = "Generate page previews for content flagged in a Sling repository",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Repository base URL, e.g. http://localhost:8080.
    server: String,

    /// Repository user.
    #[arg(short, long, env = "PREVIEW_USER", default_value = "admin")]
    user: String,

    /// Repository password.
    #[arg(short, long, env = "PREVIEW_PASSWORD", default_value = "admin", hide_env_values = true)]
    password: String,

    /// Root for the per-batch staging directories.
    #[arg(long, env = "PREVIEW_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Directory for dated log files.
    #[arg(long, env = "PREVIEW_LOGS_DIR", default_value = "logs")]
    logs_dir: PathBuf,

    /// Apache-format mime.types file (defaults to the built-in table).
    #[arg(long, env = "PREVIEW_MIME_TYPES")]
    mime_types: Option<PathBuf>,

    /// Mime types to skip, one per line (defaults to the built-in list).
    #[arg(long, env = "PREVIEW_IGNORE_TYPES")]
    ignore_types: Option<PathBuf>,

    /// Width document pages are rasterised at (the `large` variant).
    #[arg(long, env = "PREVIEW_RASTER_WIDTH", default_value_t = 1000,
          value_parser = clap::value_parser!(u32).range(1..))]
    raster_width: u32,

    /// `normal` size for images.
    #[arg(long, env = "PREVIEW_IMAGE_NORMAL", default_value = "900", value_parser = parse_bounds)]
    image_normal: SizeBounds,

    /// `normal` size for document pages.
    #[arg(long, env = "PREVIEW_DOCUMENT_NORMAL", default_value = "700", value_parser = parse_bounds)]
    document_normal: SizeBounds,

    /// `small` thumbnail size.
    #[arg(long, env = "PREVIEW_SMALL", default_value = "180x225", value_parser = parse_bounds)]
    small: SizeBounds,

    /// JPEG quality (1–100).
    #[arg(long, env = "PREVIEW_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Office converter used for non-PDF documents; empty disables it.
    #[arg(long, env = "PREVIEW_OFFICE_COMMAND", default_value = "soffice")]
    office_command: String,

    /// HTTP timeout in seconds.
    #[arg(long, env = "PREVIEW_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "PREVIEW_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PREVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level logs.
    #[arg(short, long, env = "PREVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress console output except errors.
    #[arg(short, long, env = "PREVIEW_QUIET")]
    quiet: bool,
}

/// `900` → width only, `180x225` → box.
fn parse_bounds(s: &str) -> std::result::Result<SizeBounds, String> {
    let parse = |v: &str| -> std::result::Result<u32, String> {
        match v.trim().parse::<u32>() {
            Ok(0) => Err("size must be greater than 0".into()),
            Ok(n) => Ok(n),
            Err(_) => Err(format!("invalid size '{}'", v.trim())),
        }
    };
    match s.to_lowercase().split_once('x') {
        Some((w, h)) => Ok(SizeBounds::boxed(parse(w)?, parse(h)?)),
        None => Ok(SizeBounds::width(parse(s)?)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO console lines; the log file always
    // gets them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let console_level = if cli.verbose {
        LevelFilter::DEBUG
    } else if cli.quiet || show_progress {
        LevelFilter::ERROR
    } else {
        LevelFilter::INFO
    };
    let settings = LogSettings {
        logs_dir: cli.logs_dir.clone(),
        console_level,
        file_level: if cli.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        },
    };
    let (dispatch, _guard) =
        logging::build_dispatch(&settings).context("Failed to set up logging")?;
    tracing::dispatcher::set_global_default(dispatch.clone())
        .context("Failed to install logger")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let store = SlingStore::new(
        &StoreConfig::new(&cli.server)
            .credentials(&cli.user, &cli.password)
            .timeout_secs(cli.timeout),
    )
    .context("Invalid repository settings")?;

    let office = (!cli.office_command.trim().is_empty()).then(|| PathBuf::from(&cli.office_command));
    let mut rasterizer = PdfiumRasterizer::new()
        .office_command(office)
        .jpeg_quality(config.jpeg_quality);
    if let Some(ref dir) = cli.pdfium_lib {
        rasterizer = rasterizer.library_dir(dir);
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let processor = PreviewProcessor::new(Arc::new(store), Arc::new(rasterizer), config)
        .with_dispatch(dispatch);
    let report = processor.run().await.context("Preview batch failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

/// Map CLI args to `PreviewConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PreviewConfig> {
    let mut builder = PreviewConfig::builder()
        .document_raster_width(cli.raster_width)
        .image_normal(cli.image_normal)
        .document_normal(cli.document_normal)
        .small(cli.small)
        .jpeg_quality(cli.jpeg_quality);

    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(ref path) = cli.mime_types {
        builder = builder.mime_table(MimeTable::load(path)?);
    }
    if let Some(ref path) = cli.ignore_types {
        builder = builder.ignored_mime_types(load_ignore_list(path)?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &BatchReport) {
    if report.total() == 0 {
        eprintln!("{} nothing to process", dim("·"));
        return;
    }
    let mark = if report.failed() == 0 {
        green("✔")
    } else if report.failed() == report.total() {
        red("✘")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{} {} items  {} succeeded  {} skipped  {} failed  {}",
        mark,
        bold(&report.total().to_string()),
        report.succeeded(),
        report.skipped(),
        report.failed(),
        dim(&format!("{}ms", report.duration_ms)),
    );
    for item in report.items.iter().filter(|r| r.outcome.is_failure()) {
        eprintln!("  {} {}  {}", red("✗"), item.item.id, item.outcome);
    }
}
