//! HTTP plumbing shared by all three adapters.
//!
//! Adapters only see the [`Transport`] trait. [`UreqTransport`] talks HTTP;
//! [`Retrying`] wraps any transport with the fixed [`RetryPolicy`] so no
//! adapter hand-rolls its own retry loop. [`StaticTransport`] serves canned
//! bodies for offline replays.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hostmap_core::RetryPolicy;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Blocking JSON-over-HTTP capability.
pub trait Transport: Send + Sync {
    fn get_json(&self, url: &str) -> Result<Value, SourceError>;

    fn post_json(&self, url: &str, body: &Value) -> Result<Value, SourceError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        (**self).get_json(url)
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value, SourceError> {
        (**self).post_json(url, body)
    }
}

/// Join a base URL and a route without doubling or dropping the slash.
pub fn join_url(base: &str, route: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// ureq
// ---------------------------------------------------------------------------

/// [`Transport`] backed by a shared `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("hostmap/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        tracing::debug!(url, "GET");
        read_json(url, self.agent.get(url).set("Accept", "application/json").call())
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value, SourceError> {
        tracing::debug!(url, "POST");
        read_json(
            url,
            self.agent
                .post(url)
                .set("Accept", "application/json")
                .send_json(body),
        )
    }
}

fn read_json(url: &str, result: Result<ureq::Response, ureq::Error>) -> Result<Value, SourceError> {
    match result {
        Ok(response) => response.into_json::<Value>().map_err(|e| SourceError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        }),
        Err(ureq::Error::Status(status, _)) => Err(SourceError::Status {
            url: url.to_string(),
            status,
        }),
        Err(ureq::Error::Transport(transport)) => Err(SourceError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Retry decorator
// ---------------------------------------------------------------------------

/// Wraps a transport with a fixed attempt count and fixed backoff.
///
/// Transport errors and statuses listed in
/// [`RetryPolicy::retryable_statuses`] are retried; everything else surfaces
/// immediately. With a cancellation token attached, no new attempt starts
/// once it fires and a pending backoff is cut short.
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
    cancel: Option<CancellationToken>,
}

/// Granularity of the interruptible backoff sleep.
const CANCEL_POLL: Duration = Duration::from_millis(50);

impl<T: Transport> Retrying<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleep for the backoff; returns `false` if cancelled meanwhile.
    fn backoff(&self) -> bool {
        let deadline = Instant::now() + self.policy.backoff();
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }

    fn with_retries<F>(&self, url: &str, mut call: F) -> Result<Value, SourceError>
    where
        F: FnMut() -> Result<Value, SourceError>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if self.is_cancelled() {
                tracing::info!(url, attempt, "request cancelled");
                return Err(SourceError::Cancelled {
                    url: url.to_string(),
                });
            }
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && err.is_retryable(&self.policy) => {
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts,
                        error = %err,
                        "request failed, retrying",
                    );
                    if !self.backoff() {
                        tracing::info!(url, attempt, "request cancelled during backoff");
                        return Err(SourceError::Cancelled {
                            url: url.to_string(),
                        });
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 1 {
                        tracing::warn!(url, attempts = attempt, error = %err, "giving up");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl<T: Transport> Transport for Retrying<T> {
    fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        self.with_retries(url, || self.inner.get_json(url))
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value, SourceError> {
        self.with_retries(url, || self.inner.post_json(url, body))
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// Serves canned JSON bodies keyed by URL, ignoring the HTTP method.
/// Unknown URLs behave like a refused connection.
#[derive(Debug, Clone, Default)]
pub struct StaticTransport {
    bodies: HashMap<String, Value>,
    statuses: HashMap<String, u16>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: Value) -> Self {
        self.bodies.insert(url.into(), body);
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }

    fn lookup(&self, url: &str) -> Result<Value, SourceError> {
        if let Some(status) = self.statuses.get(url) {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Transport {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }
}

impl Transport for StaticTransport {
    fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        self.lookup(url)
    }

    fn post_json(&self, url: &str, _body: &Value) -> Result<Value, SourceError> {
        self.lookup(url)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
