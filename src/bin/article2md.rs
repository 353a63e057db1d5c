//! CLI binary for article2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ArchiveConfig` and prints a run summary.

use anyhow::{Context, Result};
use article2md::{archive_to_file, ArchiveConfig, ArchiveOutput, ArchiveProgressCallback, ProgressCallback};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a progress bar over the article's images plus
/// one log line per image. Images complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Fetching");
        bar.set_message("Downloading article…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_ms(&self, index: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ArchiveProgressCallback for CliProgressCallback {
    fn on_archive_start(&self, image_count: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(image_count as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Images");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {image_count} images…"))
        ));
    }

    fn on_media_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(format!("image {index}"));
    }

    fn on_media_complete(&self, index: usize, total: usize, bytes: usize) {
        let elapsed_ms = self.elapsed_ms(index);
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{:>6.1} KB", bytes as f64 / 1024.0)),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_media_error(&self, index: usize, total: usize, error: String) {
        let elapsed_ms = self.elapsed_ms(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_archive_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} images saved", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images saved  ({} dropped)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Archive an article into ./output/article_<unix-time>.md (+ ./output/images/)
  article2md https://mp.weixin.qq.com/s/-nlA13tKEHNL7yH3VjVMrA

  # Choose the output file; images go next to it
  article2md https://mp.weixin.qq.com/s/abc -o notes/article.md

  # Smaller images, keep ASCII punctuation
  article2md --image-budget-kb 150 --keep-punctuation https://mp.weixin.qq.com/s/abc

  # Show a marker where an image could not be downloaded
  article2md --missing-image-marker "[image unavailable]" https://mp.weixin.qq.com/s/abc

  # JSON run report
  article2md --json https://mp.weixin.qq.com/s/abc > report.json

ENVIRONMENT VARIABLES:
  RUST_LOG                 tracing filter (overrides --verbose/--quiet)
  ARTICLE2MD_*             every flag has an env var, e.g. ARTICLE2MD_OUTPUT_DIR
"#;

/// Archive a published article as Markdown with local images.
#[derive(Parser, Debug)]
#[command(
    name = "article2md",
    version,
    about = "Archive a published article page as Markdown with local, recompressed images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Article URL (HTTP/HTTPS).
    url: String,

    /// Write Markdown to this file instead of <output-dir>/<prefix>_<unix-time>.md.
    #[arg(short, long, env = "ARTICLE2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for the Markdown file when --output is not given.
    #[arg(long, env = "ARTICLE2MD_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Image directory, relative to the Markdown file.
    #[arg(long, env = "ARTICLE2MD_IMAGE_DIR", default_value = "images")]
    image_dir: String,

    /// Output file name prefix.
    #[arg(long, env = "ARTICLE2MD_PREFIX", default_value = "article")]
    prefix: String,

    /// Target size per image in KiB.
    #[arg(long, env = "ARTICLE2MD_IMAGE_BUDGET_KB", default_value_t = 300)]
    image_budget_kb: usize,

    /// Maximum image width/height in pixels.
    #[arg(long, env = "ARTICLE2MD_MAX_DIMENSION", default_value_t = 1920)]
    max_dimension: u32,

    /// First JPEG quality tried.
    #[arg(long, env = "ARTICLE2MD_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Lowest JPEG quality tried.
    #[arg(long, env = "ARTICLE2MD_MIN_QUALITY", default_value_t = 10,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    min_quality: u8,

    /// JPEG quality decrement per attempt.
    #[arg(long, env = "ARTICLE2MD_QUALITY_STEP", default_value_t = 5)]
    quality_step: u8,

    /// Images processed concurrently.
    #[arg(short, long, env = "ARTICLE2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Page fetch timeout in seconds.
    #[arg(long, env = "ARTICLE2MD_PAGE_TIMEOUT", default_value_t = 30)]
    page_timeout: u64,

    /// Per-image fetch timeout in seconds.
    #[arg(long, env = "ARTICLE2MD_IMAGE_TIMEOUT", default_value_t = 30)]
    image_timeout: u64,

    /// Retries on transient fetch failures.
    #[arg(long, env = "ARTICLE2MD_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Override the User-Agent header.
    #[arg(long, env = "ARTICLE2MD_USER_AGENT")]
    user_agent: Option<String>,

    /// Keep ASCII punctuation instead of localising it.
    #[arg(long, env = "ARTICLE2MD_KEEP_PUNCTUATION")]
    keep_punctuation: bool,

    /// Text shown where an image could not be downloaded.
    #[arg(long, env = "ARTICLE2MD_MISSING_IMAGE_MARKER")]
    missing_image_marker: Option<String>,

    /// Prepend YAML front-matter with document metadata.
    #[arg(long, env = "ARTICLE2MD_METADATA")]
    metadata: bool,

    /// Print the run report as JSON instead of a text summary.
    #[arg(long, env = "ARTICLE2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ARTICLE2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARTICLE2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ARTICLE2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO is suppressed while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ArchiveProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = match archive_to_file(&cli.url, cli.output.as_deref(), &config).await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{} {}", red("✘"), bold("Failed to archive article"));
            return Err(e).context("Archive failed");
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

fn print_summary(output: &ArchiveOutput) {
    let doc = &output.document;
    println!("Title:    {}", doc.title);
    println!("Author:   {}", doc.author);
    if !doc.summary.is_empty() {
        println!("Summary:  {}", doc.summary);
    }
    println!(
        "Images:   {}/{} saved  ({:.1} KB)",
        output.stats.images_saved,
        output.stats.images_found,
        output.stats.bytes_saved as f64 / 1024.0
    );
    for failure in &output.failures {
        println!("  {} {}", red("✗"), dim(&failure.error.to_string()));
    }
    if let Some(ref path) = output.output_path {
        println!(
            "{}  {}ms  →  {}",
            green("✔"),
            output.stats.total_duration_ms,
            bold(&path.display().to_string())
        );
    }
}

/// Map CLI args to `ArchiveConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ArchiveConfig> {
    let mut builder = ArchiveConfig::builder()
        .output_dir(cli.output_dir.clone())
        .image_subdir(cli.image_dir.clone())
        .file_prefix(cli.prefix.clone())
        .image_budget_bytes(cli.image_budget_kb.saturating_mul(1024))
        .max_dimension(cli.max_dimension)
        .start_quality(cli.quality)
        .min_quality(cli.min_quality)
        .quality_step(cli.quality_step)
        .concurrency(cli.concurrency)
        .page_timeout_secs(cli.page_timeout)
        .image_timeout_secs(cli.image_timeout)
        .max_retries(cli.max_retries)
        .localize_punctuation(!cli.keep_punctuation)
        .include_metadata(cli.metadata);

    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(ref marker) = cli.missing_image_marker {
        builder = builder.missing_image_marker(marker.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
