//! Loading of the opaque run inputs: cookies, stylesheet, `config.json`.
//!
//! All three are read once before the pipeline starts. Failures are fatal and
//! mapped to specific [`BinderError`] variants so the CLI can tell the user
//! exactly which file is wrong.

use crate::config::FileConfig;
use crate::error::BinderError;
use crate::renderer::Cookie;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Read a file to a string, mapping missing/forbidden files to typed errors.
async fn read_input(path: &Path) -> Result<String, BinderError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => {
            debug!("Read {} bytes from {}", s.len(), path.display());
            Ok(s)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(BinderError::InputNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(BinderError::PermissionDenied {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(BinderError::io(path, e)),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BinderError> {
    let raw = read_input(path).await?;
    serde_json::from_str(&raw).map_err(|e| BinderError::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load the cookie list exported from a logged-in browser.
///
/// Extra fields (`expires`, `httpOnly`, …) are ignored. An empty list is
/// rejected: without cookies every page is the login screen.
pub async fn load_cookies(path: &Path) -> Result<Vec<Cookie>, BinderError> {
    let cookies: Vec<Cookie> = read_json(path).await?;
    if cookies.is_empty() {
        return Err(BinderError::InvalidInput {
            path: path.to_path_buf(),
            reason: "cookie list is empty".into(),
        });
    }
    debug!("Loaded {} cookies", cookies.len());
    Ok(cookies)
}

/// Load the stylesheet injected into every section page.
pub async fn load_stylesheet(path: &Path) -> Result<String, BinderError> {
    read_input(path).await
}

/// Load `config.json`.
pub async fn load_file_config(path: &Path) -> Result<FileConfig, BinderError> {
    read_json(path).await
}
