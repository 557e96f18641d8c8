//! CLI binary for guide2pdf.
//!
//! A thin shim over the library crate: loads the run inputs, maps CLI flags
//! onto `BinderConfig`, launches Chromium and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use guide2pdf::chromium::ChromiumBrowser;
use guide2pdf::{
    bind_catalog, input, BindInputs, BindProgressCallback, BinderConfig, Browser, CatalogReport,
    ExhaustionPolicy, GapPolicy, GuideOutcome, ProgressCallback,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_CATALOG: &str = "https://primagames.com/accounts/account/my_guides";
const DEFAULT_CONFIG: &str = "config.json";

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

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress: one overall bar for the catalog plus one bar per guide
/// in flight. Guides run concurrently, so bars are keyed by title.
struct CliProgressCallback {
    multi: MultiProgress,
    overall: ProgressBar,
    guides: Mutex<HashMap<String, ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        overall.set_prefix("Catalog");
        overall.set_message("Reading guide list…");
        overall.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            multi,
            overall,
            guides: Mutex::new(HashMap::new()),
        })
    }

    fn with_guide(&self, guide: &str, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.guides.lock().unwrap().get(guide) {
            f(bar);
        }
    }
}

impl BindProgressCallback for CliProgressCallback {
    fn on_catalog_start(&self, total_guides: usize) {
        self.overall.set_length(total_guides as u64);
        self.overall.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} guides  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.overall.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_guides} guides"))
        ));
    }

    fn on_guide_start(&self, guide: &str, total_sections: usize) {
        let bar = self.multi.add(ProgressBar::new(total_sections as u64));
        bar.set_style(
            ProgressStyle::with_template("  {prefix:30!} [{bar:30.cyan/238}] {pos:>3}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix(guide.to_string());
        self.guides.lock().unwrap().insert(guide.to_string(), bar);
    }

    fn on_section_complete(&self, guide: &str, _index: usize, _total: usize, _bytes: u64) {
        self.with_guide(guide, |bar| bar.inc(1));
    }

    fn on_section_error(&self, guide: &str, index: usize, total: usize, error: &str) {
        self.overall.println(format!(
            "  {} {guide} {:>3}/{:<3}  {}",
            red("✗"),
            index,
            total,
            red(error)
        ));
        self.with_guide(guide, |bar| bar.inc(1));
    }

    fn on_guide_complete(&self, guide: &str, outcome: &GuideOutcome) {
        if let Some(bar) = self.guides.lock().unwrap().remove(guide) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        let line = match outcome {
            GuideOutcome::Built { path, failed, .. } if failed.is_empty() => {
                format!("  {} {}", green("✓"), path.display())
            }
            GuideOutcome::Built { path, failed, .. } => format!(
                "  {} {}  {}",
                cyan("⚠"),
                path.display(),
                dim(&format!("missing sections {failed:?}"))
            ),
            GuideOutcome::SkippedExisting { path } => {
                format!("  {} {}", dim("="), dim(&path.display().to_string()))
            }
            other => format!("  {} {guide}  {}", red("✗"), red(other.label())),
        };
        self.overall.println(line);
        self.overall.inc(1);
    }

    fn on_catalog_complete(&self, _total_guides: usize, _built: usize) {
        self.overall.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Bind every guide of the account into ./output
  guide2pdf

  # Another catalog page, custom output directory, two guides at a time
  guide2pdf https://example.com/account/my_guides -o guides --max-in-progress 2

  # Mark missing sections with a placeholder page; drop blank snapshots
  guide2pdf --gaps placeholder --on-exhaustion fail

  # Machine-readable report
  guide2pdf --json > report.json

INPUT FILES (current directory by default):
  cookies.json     Cookies exported from a logged-in browser: [{name, value, domain, path}]
  stylesheet.css   Injected into every section page before printing
  config.json      Optional: {outputPath, overwrite, maxInProgress, maxRetries, minBytes, keepTemp}

ENVIRONMENT VARIABLES:
  CHROME_PATH      Chromium/Chrome executable; skips auto-detection
  RUST_LOG         Log filter, e.g. guide2pdf=debug
"#;

/// Render every guide of a catalog page to one PDF per guide.
#[derive(Parser, Debug)]
#[command(
    name = "guide2pdf",
    version,
    about = "Render paginated online guides into single PDF documents",
    long_about = "Logs into a guide catalog with exported browser cookies, prints every section \
of every guide as one tall page through headless Chromium, and merges each guide into \
<output>/<title>.pdf. Re-running only redoes missing work.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Catalog page listing the guides.
    #[arg(default_value = DEFAULT_CATALOG, env = "GUIDE2PDF_CATALOG")]
    catalog: String,

    /// JSON config file [default: config.json, if present].
    #[arg(long, env = "GUIDE2PDF_CONFIG")]
    config: Option<PathBuf>,

    /// Cookie list exported from a logged-in browser.
    #[arg(long, env = "GUIDE2PDF_COOKIES", default_value = "cookies.json")]
    cookies: PathBuf,

    /// Stylesheet injected into every section page.
    #[arg(long, env = "GUIDE2PDF_STYLESHEET", default_value = "stylesheet.css")]
    stylesheet: PathBuf,

    /// Output directory (overrides config).
    #[arg(short, long, env = "GUIDE2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Rebuild documents and snapshots that already exist.
    #[arg(long)]
    overwrite: bool,

    /// Guides assembled at the same time.
    #[arg(short = 'j', long)]
    max_in_progress: Option<usize>,

    /// Retry budget per navigation and per snapshot.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Snapshots smaller than this are re-rendered.
    #[arg(long)]
    min_bytes: Option<u64>,

    /// Keep per-section snapshots after merging.
    #[arg(long)]
    keep_temp: bool,

    /// What to do with a snapshot still undersized after all retries.
    #[arg(long, value_enum)]
    on_exhaustion: Option<ExhaustionArg>,

    /// What to put in a guide where a section failed.
    #[arg(long, value_enum)]
    gaps: Option<GapArg>,

    /// Abandon a guide after this many seconds (0 = never).
    #[arg(long)]
    guide_timeout: Option<u64>,

    /// Chromium/Chrome executable.
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long)]
    headful: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "GUIDE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GUIDE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GUIDE2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExhaustionArg {
    Accept,
    Fail,
}

impl From<ExhaustionArg> for ExhaustionPolicy {
    fn from(v: ExhaustionArg) -> Self {
        match v {
            ExhaustionArg::Accept => ExhaustionPolicy::Accept,
            ExhaustionArg::Fail => ExhaustionPolicy::Fail,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum GapArg {
    Skip,
    Placeholder,
}

impl From<GapArg> for GapPolicy {
    fn from(v: GapArg) -> Self {
        match v {
            GapArg::Skip => GapPolicy::Skip,
            GapArg::Placeholder => GapPolicy::Placeholder,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bars replace INFO lines; warnings still show above them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli, show_progress).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}

async fn run(cli: Cli, show_progress: bool) -> Result<()> {
    // ── Inputs ───────────────────────────────────────────────────────────
    let inputs = BindInputs {
        catalog_url: cli.catalog.clone(),
        cookies: input::load_cookies(&cli.cookies)
            .await
            .context("Failed to load cookies")?,
        stylesheet: input::load_stylesheet(&cli.stylesheet)
            .await
            .context("Failed to load stylesheet")?,
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BindProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Browser ──────────────────────────────────────────────────────────
    let browser = Arc::new(
        ChromiumBrowser::launch_located(cli.chrome.clone(), cli.headful)
            .await
            .context("Failed to launch Chromium")?,
    );

    // ── Run ──────────────────────────────────────────────────────────────
    let result = bind_catalog(browser.clone() as Arc<dyn Browser>, &inputs, &config).await;
    if let Err(e) = browser.shutdown().await {
        tracing::warn!("Browser did not shut down cleanly: {}", e);
    }
    let report = result.context("Binding failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &config.output_path);
    }

    Ok(())
}

/// Layer `config.json` and then CLI flags onto the defaults.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BinderConfig> {
    let config_path = match cli.config {
        Some(ref p) => Some(p.clone()),
        None if Path::new(DEFAULT_CONFIG).exists() => Some(PathBuf::from(DEFAULT_CONFIG)),
        None => None,
    };

    let mut builder = BinderConfig::builder();
    if let Some(ref path) = config_path {
        let file = input::load_file_config(path)
            .await
            .with_context(|| format!("Failed to load config from {:?}", path))?;
        builder = builder.apply_file(&file);
    }

    if let Some(ref out) = cli.output {
        builder = builder.output_path(out.clone());
    }
    if cli.overwrite {
        builder = builder.overwrite(true);
    }
    if let Some(n) = cli.max_in_progress {
        builder = builder.max_in_progress(n);
    }
    if let Some(n) = cli.max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(n) = cli.min_bytes {
        builder = builder.min_bytes(n);
    }
    if cli.keep_temp {
        builder = builder.keep_temp(true);
    }
    if let Some(p) = cli.on_exhaustion {
        builder = builder.exhaustion_policy(p.into());
    }
    if let Some(g) = cli.gaps {
        builder = builder.gap_policy(g.into());
    }
    if let Some(secs) = cli.guide_timeout {
        builder = builder.guide_timeout_secs(if secs == 0 { None } else { Some(secs) });
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &CatalogReport, output: &Path) {
    let failed = report.failed();
    eprintln!(
        "{}  {} built, {} skipped, {} without document  {}s  →  {}",
        if failed == 0 { green("✔") } else { cyan("⚠") },
        bold(&report.built().to_string()),
        report.skipped(),
        if failed == 0 {
            failed.to_string()
        } else {
            red(&failed.to_string())
        },
        report.duration_ms / 1000,
        bold(&output.display().to_string()),
    );
    for guide in report.guides.iter().filter(|g| !g.outcome.has_document()) {
        eprintln!("   {} {}  {}", red("✗"), guide.title, dim(&guide.url));
    }
}
