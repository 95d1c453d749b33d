//! Error types for hostmap-sources.

use hostmap_core::{RetryPolicy, SourceKind};
use thiserror::Error;

/// Why a source could not produce its output. Any of these marks the source
/// as failed for the run; none of them aborts the run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection refused, DNS failure, timeout, ...
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// Non-2xx response that survived the retry budget.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body was not JSON at all.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// JSON decoded but does not have the shape the adapter expects.
    #[error("malformed {source_kind} response: {reason}")]
    Malformed {
        source_kind: SourceKind,
        reason: String,
    },

    /// The run was cancelled before or between attempts.
    #[error("request to {url} cancelled")]
    Cancelled { url: String },

    /// The lease service answered with an error result code.
    #[error("lease service returned result code {code}: {text}")]
    Api { code: i64, text: String },
}

impl SourceError {
    pub(crate) fn malformed(source_kind: SourceKind, reason: impl Into<String>) -> Self {
        SourceError::Malformed {
            source_kind,
            reason: reason.into(),
        }
    }

    /// Whether another attempt could plausibly succeed under `policy`.
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            SourceError::Status { status, .. } => policy.is_retryable_status(*status),
            _ => false,
        }
    }

    /// Short category label for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            SourceError::Transport { .. } | SourceError::Status { .. } => "transport",
            SourceError::Decode { .. } | SourceError::Malformed { .. } => "malformed",
            SourceError::Api { .. } => "api",
            SourceError::Cancelled { .. } => "cancelled",
        }
    }
}
