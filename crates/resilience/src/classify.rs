//! Transient / permanent error classification.
//!
//! Decision order (first match wins):
//! 1. cancellation or deadline → permanent
//! 2. HTTP status 429, 503 or 504 → transient
//! 3. known network-failure text anywhere in the source chain → transient
//! 4. anything else → permanent
//!
//! Rate-limit *hints* are extracted separately by [`rate_limit_hint`]; they
//! feed message enrichment only and never change the decision above.

use std::{error::Error, fmt};

/// HTTP statuses that indicate the server may accept the same request later.
pub const TRANSIENT_STATUS_CODES: &[u16] = &[429, 503, 504];

/// Lowercase substrings that mark transient network conditions.
pub const TRANSIENT_MESSAGE_PATTERNS: &[&str] = &[
    "timeout",
    "connection reset",
    "connection refused",
    "temporary failure",
    "try again",
    "i/o timeout",
    "no such host",
    "network unreachable",
];

/// Application-level API error codes that mean "slow down".
pub const RATE_LIMIT_CODES: &[&str] = &[
    "TooManyRequests",
    "activityLimitReached",
    "ApplicationThrottled",
    "MailboxConcurrency",
];

/// Structured facts an error can expose to the classifier.
///
/// Every method defaults to "unknown", so an error type only overrides what
/// it can actually report. Wrapping errors should delegate to their source so
/// classification survives enrichment.
pub trait ErrorSignals: Error {
    /// The caller gave up (cancellation token fired, deadline passed).
    fn is_cancellation(&self) -> bool {
        false
    }

    /// HTTP-like status code of the failed response, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Application error code from a structured API error payload.
    fn api_code(&self) -> Option<&str> {
        None
    }

    /// Raw `Retry-After` value sent with the failed response.
    fn retry_after(&self) -> Option<&str> {
        None
    }
}

/// Why an error was considered worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientReason {
    /// Status code from [`TRANSIENT_STATUS_CODES`].
    Status(u16),
    /// Matched pattern from [`TRANSIENT_MESSAGE_PATTERNS`].
    Network(&'static str),
}

impl fmt::Display for TransientReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "status {code}"),
            Self::Network(pattern) => write!(f, "network: {pattern}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    Transient(TransientReason),
    Permanent,
}

impl ErrorClassification {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Classify a failure. Never panics; unknown shapes are permanent.
pub fn classify<E: ErrorSignals>(error: &E) -> ErrorClassification {
    if error.is_cancellation() {
        return ErrorClassification::Permanent;
    }

    if let Some(status) = error.status_code()
        && TRANSIENT_STATUS_CODES.contains(&status)
    {
        return ErrorClassification::Transient(TransientReason::Status(status));
    }

    if let Some(pattern) = match_transient_text(error) {
        return ErrorClassification::Transient(TransientReason::Network(pattern));
    }

    ErrorClassification::Permanent
}

/// [`classify`] for call sites that may not have an error at all.
pub fn classify_optional<E: ErrorSignals>(error: Option<&E>) -> ErrorClassification {
    error.map_or(ErrorClassification::Permanent, classify)
}

fn match_transient_text(error: &dyn Error) -> Option<&'static str> {
    let mut current = Some(error);
    while let Some(err) = current {
        let text = err.to_string().to_ascii_lowercase();
        if let Some(pattern) = TRANSIENT_MESSAGE_PATTERNS
            .iter()
            .copied()
            .find(|p| text.contains(p))
        {
            return Some(pattern);
        }
        current = err.source();
    }
    None
}

/// Server-supplied details of a rate-limit rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHint {
    pub code: String,
    /// `Retry-After` header value, kept verbatim (seconds or HTTP date).
    pub retry_after_secs: Option<String>,
}

impl RateLimitHint {
    /// Human-readable explanation naming the operation that was throttled.
    #[must_use]
    pub fn describe(&self, operation: &str) -> String {
        let mut msg = format!("{operation}: rate limit reached (code {})", self.code);
        match self.retry_after_secs.as_deref() {
            Some(secs) if secs.parse::<u64>().is_ok() => {
                msg.push_str(&format!("; server asked to retry after {secs} seconds"));
            },
            Some(date) => msg.push_str(&format!("; server asked to retry after {date}")),
            None => msg.push_str("; server did not say when to retry"),
        }
        msg.push_str(
            ". Reduce request frequency or batch size for this mailbox, \
             or re-run the command later",
        );
        msg
    }
}

/// Extract a rate-limit hint when the error carries a known limit code.
pub fn rate_limit_hint<E: ErrorSignals + ?Sized>(error: &E) -> Option<RateLimitHint> {
    let code = error.api_code()?;
    let known = RATE_LIMIT_CODES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(code))?;
    Some(RateLimitHint {
        code: (*known).to_string(),
        retry_after_secs: error
            .retry_after()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string),
    })
}
