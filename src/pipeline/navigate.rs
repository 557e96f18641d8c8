//! Navigation with a bounded, shared retry budget.
//!
//! ## Retry Strategy
//!
//! Two kinds of failure draw from **one** counter:
//!
//! * a response arrived with a status other than exactly 200 → wait the
//!   cool-down and *reload* in place, re-checking the status;
//! * no response at all (transport error, timeout) → wait the cool-down and
//!   start a *fresh* navigation to the same URL.
//!
//! The loop is explicit, so stack depth stays constant however the two kinds
//! interleave. Exhaustion yields [`NavigationFailed`], a value the caller
//! turns into a skipped section, a skipped guide, or (for the catalog page)
//! a fatal error.

use crate::config::BinderConfig;
use crate::error::NavigationFailed;
use crate::renderer::{NavResponse, RenderError, Session, WaitUntil};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Knobs for one navigation.
#[derive(Debug, Clone, Copy)]
pub struct NavigationPolicy {
    pub max_retries: u32,
    pub timeout: Duration,
    pub cooldown: Duration,
    pub wait: WaitUntil,
}

impl NavigationPolicy {
    pub fn from_config(config: &BinderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout: config.navigation_timeout(),
            cooldown: config.navigation_cooldown(),
            wait: WaitUntil::NetworkIdle,
        }
    }
}

/// A successful navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigated {
    pub status: u16,
    /// Retries spent from the shared budget.
    pub retries: u32,
    /// How many of those retries were in-place reloads.
    pub reloads: u32,
}

/// Open `url` in `session`, retrying within `policy.max_retries`.
///
/// Success requires a final status of exactly 200 while the shared counter
/// is still below the budget.
pub async fn navigate(
    session: &dyn Session,
    url: &str,
    policy: &NavigationPolicy,
) -> Result<Navigated, NavigationFailed> {
    let mut retries = 0u32;
    let mut reloads = 0u32;

    loop {
        let mut response =
            with_timeout(policy.timeout, session.navigate(url, policy.wait, policy.timeout)).await;

        loop {
            let status = match &response {
                Ok(r) if !r.is_ok() && retries < policy.max_retries => r.status,
                _ => break,
            };
            warn!(
                "{}: HTTP {}, reload {}/{} in {:?}",
                url,
                status,
                retries + 1,
                policy.max_retries,
                policy.cooldown
            );
            sleep(policy.cooldown).await;
            retries += 1;
            reloads += 1;
            response = with_timeout(policy.timeout, session.reload(policy.wait, policy.timeout)).await;
        }

        match response {
            Ok(r) if r.is_ok() && retries < policy.max_retries => {
                debug!("{}: HTTP 200 after {} retries", url, retries);
                return Ok(Navigated {
                    status: r.status,
                    retries,
                    reloads,
                });
            }
            Ok(r) => {
                return Err(NavigationFailed {
                    url: url.to_string(),
                    retries,
                    last: format!("HTTP {}", r.status),
                });
            }
            Err(e) if retries < policy.max_retries => {
                warn!(
                    "{}: no response ({}), retry {}/{} in {:?}",
                    url,
                    e,
                    retries + 1,
                    policy.max_retries,
                    policy.cooldown
                );
                sleep(policy.cooldown).await;
                retries += 1;
            }
            Err(e) => {
                return Err(NavigationFailed {
                    url: url.to_string(),
                    retries,
                    last: e.to_string(),
                });
            }
        }
    }
}

/// Enforce the absolute timeout regardless of what the backend does with it.
async fn with_timeout<F>(timeout: Duration, fut: F) -> Result<NavResponse, RenderError>
where
    F: Future<Output = Result<NavResponse, RenderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(r) => r,
        Err(_) => Err(RenderError::Timeout {
            secs: timeout.as_secs(),
        }),
    }
}
