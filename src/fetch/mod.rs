//! Resilient page fetcher: URL normalization + GET with bounded retries,
//! exponential backoff and growing per-attempt timeouts.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub use transport::{FetchedPage, HttpTransport, ReqwestTransport, TransportError};

/// Everything except alphanumerics, `_ . - ~` and `: /` gets escaped.
const URL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b':')
    .remove(b'/');

/// Percent-encode `url` unless it already looks encoded.
///
/// Heuristic: if decoding changes the string it was already encoded and is
/// returned as-is; otherwise it is encoded. A URL that decodes to itself is
/// treated as unencoded.
pub fn ensure_url_encoded(url: &str) -> String {
    let decoded = percent_decode_str(url).decode_utf8_lossy();
    if decoded == url {
        utf8_percent_encode(url, URL_ESCAPE).to_string()
    } else {
        url.to_string()
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_timeout() -> u64 {
    5
}
fn default_timeout_step() -> u64 {
    5
}
fn default_initial_delay() -> u64 {
    2
}
fn default_backoff_factor() -> u32 {
    2
}
fn default_time_unit_ms() -> u64 {
    1_000
}

/// Retry schedule, expressed in time units (`time_unit_ms`, one second by default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_timeout")]
    pub initial_timeout: u64,
    #[serde(default = "default_timeout_step")]
    pub timeout_step: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_timeout: default_initial_timeout(),
            timeout_step: default_timeout_step(),
            initial_delay: default_initial_delay(),
            backoff_factor: default_backoff_factor(),
            time_unit_ms: default_time_unit_ms(),
        }
    }
}

/// One row of the retry plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPlan {
    pub attempt: u32,
    pub timeout: Duration,
    /// Sleep after this attempt fails; `None` for the last one.
    pub delay_after: Option<Duration>,
}

impl RetryPolicy {
    /// Clamp nonsensical values coming from config files.
    pub fn sanitized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self.backoff_factor = self.backoff_factor.max(1);
        if self.time_unit_ms == 0 {
            self.time_unit_ms = default_time_unit_ms();
        }
        self
    }

    fn units(&self, n: u64) -> Duration {
        Duration::from_millis(n.saturating_mul(self.time_unit_ms))
    }

    /// Timeout of the first attempt.
    pub fn first_timeout(&self) -> Duration {
        self.units(self.initial_timeout)
    }

    /// Per-attempt timeouts and delays, e.g. 5/10/15 and 2/4 for the defaults.
    pub fn schedule(&self) -> Vec<AttemptPlan> {
        let mut plan = Vec::with_capacity(self.max_attempts as usize);
        let mut timeout = self.initial_timeout;
        let mut delay = self.initial_delay;
        for attempt in 1..=self.max_attempts {
            let last = attempt == self.max_attempts;
            plan.push(AttemptPlan {
                attempt,
                timeout: self.units(timeout),
                delay_after: (!last).then(|| self.units(delay)),
            });
            delay = delay.saturating_mul(u64::from(self.backoff_factor));
            timeout = timeout.saturating_add(self.timeout_step);
        }
        plan
    }
}

/// GET with retries. Cheap to clone; the transport is shared.
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy: policy.sanitized(),
        }
    }

    /// Returns the first response the transport produces, whatever its status.
    /// `None` only when every attempt timed out or failed in transport.
    pub async fn get_with_retry(&self, url: &str) -> Option<FetchedPage> {
        debug!(url, "get_with_retry requesting");
        let url = ensure_url_encoded(url);

        for step in self.policy.schedule() {
            counter!("fetch_attempts_total").increment(1);
            debug!(
                url = %url,
                attempt = step.attempt,
                timeout_ms = step.timeout.as_millis() as u64,
                "sending GET request"
            );

            match self.transport.get(&url, step.timeout).await {
                Ok(page) => {
                    debug!(url = %url, status = page.status, "GET request returned");
                    return Some(page);
                }
                Err(TransportError::Timeout) => {
                    counter!("fetch_failures_total", "kind" => "timeout").increment(1);
                    error!(url = %url, attempt = step.attempt, "request timed out");
                }
                Err(TransportError::Request(cause)) => {
                    counter!("fetch_failures_total", "kind" => "transport").increment(1);
                    error!(url = %url, attempt = step.attempt, "request failed in get_with_retry");
                    debug!(error = %cause, "transport error");
                }
            }

            if let Some(delay) = step.delay_after {
                info!(
                    url = %url,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
            }
        }

        counter!("fetch_exhausted_total").increment(1);
        error!(url = %url, attempts = self.policy.max_attempts, "all attempts failed");
        None
    }
}
