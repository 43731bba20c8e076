//! Retry policies for model calls and tool executions.
//!
//! Model calls retry on any failure with exponential backoff; tool
//! executions retry with linear backoff and only when the failure looks
//! transient. Transience is judged by substring, which is crude but covers
//! the realistic failure set (network hiccups, timeouts, 5xx) without a
//! typed error from every tool.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// delay = base * attempt
    Linear,
    /// delay = base * 2^(attempt - 1)
    Exponential,
}

/// How many times to retry a failed call and how long to wait between
/// attempts. `max_retries` counts retries, not total attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Policy for model calls: 2 retries, exponential from 1s.
    pub fn model_call() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            backoff: Backoff::Exponential,
        }
    }

    /// Policy for tool executions: 2 retries, linear from 500ms.
    pub fn tool_call() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            backoff: Backoff::Linear,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay * attempt,
            Backoff::Exponential => self.base_delay * 2u32.pow(attempt - 1),
        }
    }
}

const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection",
    "econnreset",
    "econnrefused",
    "enotfound",
    "rate limit",
    "429",
    "500",
    "502",
    "503",
    "504",
];

/// Whether an error message looks like a transient failure worth retrying.
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// A short actionable hint for a failure message, surfaced alongside the
/// error event so the UI can suggest a next step.
pub fn recovery_hint(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        Some("The provider is rate limiting requests. Wait a moment and retry.")
    } else if lower.contains("401") || lower.contains("unauthorized") || lower.contains("api key") {
        Some("Authentication failed. Check the configured API key.")
    } else if lower.contains("timeout") || lower.contains("timed out") {
        Some("The request timed out. The provider may be overloaded; retry shortly.")
    } else if lower.contains("network") || lower.contains("connection") || lower.contains("enotfound")
    {
        Some("A network error occurred. Check connectivity and the configured API URL.")
    } else if lower.contains("invalid argument")
        || lower.contains("invalid parameter")
        || lower.contains("missing field")
        || lower.contains("missing required")
    {
        Some("The tool was called with bad arguments. Check the parameter names and types against the tool's schema.")
    } else if lower.contains("no such file")
        || lower.contains("file not found")
        || lower.contains("does not exist")
    {
        Some("A referenced file does not exist. Verify the path, relative to the workspace root.")
    } else if lower.contains("permission denied") {
        Some("The operation was blocked by policy. Adjust the tool allowlist if intended.")
    } else {
        None
    }
}
