//! Error classification and bounded retry for outbound API calls.
//!
//! - [`classify`]: transient vs permanent, plus rate-limit hint extraction
//! - [`retry`]: exponential backoff executor with a cancellable wait

pub mod classify;
pub mod retry;

pub use {
    classify::{
        ErrorClassification, ErrorSignals, RateLimitHint, TransientReason, classify,
        classify_optional, rate_limit_hint,
    },
    retry::{
        RetryError, RetryExecutor, RetryObserver, RetryPolicy, Sleeper, TokioSleeper,
        TracingObserver, backoff_delay, execute,
    },
};

pub use tokio_util::sync::CancellationToken;
