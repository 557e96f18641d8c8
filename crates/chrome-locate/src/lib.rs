//! # chrome-locate
//!
//! Find a Chromium-family browser executable on the host so CDP drivers can be
//! launched without the user spelling out the binary path.
//!
//! ## How it works
//!
//! On first call to [`locate_chrome`]:
//!
//! 1. `CHROME_PATH` wins when it points to an existing file.
//! 2. Well-known install locations for the current platform are probed.
//! 3. Every directory on `PATH` is searched for the usual executable names
//!    (`google-chrome`, `chromium`, `chromium-browser`, …).
//!
//! The first hit is cached for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! let chrome = chrome_locate::locate_chrome().expect("no Chrome/Chromium installed");
//! println!("using {}", chrome.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `CHROME_PATH` — explicit path to the browser executable.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

/// Environment variable that overrides discovery.
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chrome-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// `CHROME_PATH` is set but does not name an existing file.
    #[error("{CHROME_PATH_ENV} is set to '{path}' but that file does not exist")]
    OverrideMissing { path: PathBuf },

    /// Nothing usable was found in the platform locations or on `PATH`.
    #[error(
        "No Chrome/Chromium executable found.\n\
Install Google Chrome or Chromium, or set {CHROME_PATH_ENV}=/path/to/chrome.\n\
Searched: {searched}"
    )]
    NotFound { searched: String },
}

// ── Internal: platform metadata ──────────────────────────────────────────────

/// Executable names searched for on `PATH`, most preferred first.
fn path_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["chrome.exe", "msedge.exe", "chromium.exe"]
    } else {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
            "microsoft-edge",
        ]
    }
}

/// Fixed install locations for the current OS.
fn platform_candidates() -> Vec<PathBuf> {
    match std::env::consts::OS {
        "macos" => {
            let mut v: Vec<PathBuf> = [
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            ]
            .iter()
            .map(PathBuf::from)
            .collect();
            if let Some(home) = dirs::home_dir() {
                v.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
                v.push(home.join("Applications/Chromium.app/Contents/MacOS/Chromium"));
            }
            v
        }
        "windows" => {
            let mut v = Vec::new();
            for var in ["PROGRAMFILES", "PROGRAMFILES(X86)"] {
                if let Ok(base) = std::env::var(var) {
                    let base = PathBuf::from(base);
                    v.push(base.join(r"Google\Chrome\Application\chrome.exe"));
                    v.push(base.join(r"Microsoft\Edge\Application\msedge.exe"));
                }
            }
            if let Some(local) = dirs::data_local_dir() {
                v.push(local.join(r"Google\Chrome\Application\chrome.exe"));
            }
            v
        }
        _ => [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
        .iter()
        .map(PathBuf::from)
        .collect(),
    }
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the browser executable to launch.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; discovery runs at most
/// a handful of times and the first successful result is kept.
pub fn locate_chrome() -> Result<PathBuf, LocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve()?;
    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

/// Returns `true` when [`locate_chrome`] would succeed.
pub fn is_chrome_available() -> bool {
    locate_chrome().is_ok()
}

/// Searches `dirs` for any of `names`, returning the first existing file.
///
/// Exposed so callers (and tests) can search an explicit directory list
/// instead of the process `PATH`.
pub fn find_in_dirs<I, P>(dirs: I, names: &[&str]) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let dirs: Vec<PathBuf> = dirs.into_iter().map(|d| d.as_ref().to_path_buf()).collect();
    names
        .iter()
        .flat_map(|name| dirs.iter().map(move |d| d.join(name)))
        .find(|candidate| candidate.is_file())
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve() -> Result<PathBuf, LocateError> {
    // 1. Environment variable override.
    if let Some(raw) = std::env::var_os(CHROME_PATH_ENV) {
        let p = PathBuf::from(raw);
        if p.is_file() {
            return Ok(p);
        }
        return Err(LocateError::OverrideMissing { path: p });
    }

    // 2. Well-known install locations.
    let candidates = platform_candidates();
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    // 3. PATH lookup.
    let path_dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();
    if let Some(found) = find_in_dirs(&path_dirs, path_names()) {
        return Ok(found);
    }

    let searched = candidates
        .iter()
        .map(|p| p.display().to_string())
        .chain(std::iter::once(format!("$PATH for {}", path_names().join(", "))))
        .collect::<Vec<_>>()
        .join("; ");
    Err(LocateError::NotFound { searched })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
