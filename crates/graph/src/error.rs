//! Graph error types and their classification signals.

use std::{fmt, io};

use {
    graphbox_auth::TokenError,
    graphbox_resilience::{ErrorSignals, RateLimitHint},
    serde::Deserialize,
};

/// Structured error payload of a non-2xx Graph response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
    /// `Retry-After` header, verbatim.
    pub retry_after: Option<String>,
}

impl ApiError {
    /// Parse `{"error": {"code", "message", "innerError": {"request-id"}}}`.
    /// Bodies in any other shape keep only the status and a trimmed excerpt.
    pub fn from_response(status: u16, body: &str, retry_after: Option<String>) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: Detail,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Detail {
            code: Option<String>,
            message: Option<String>,
            inner_error: Option<Inner>,
        }
        #[derive(Deserialize)]
        struct Inner {
            #[serde(rename = "request-id")]
            request_id: Option<String>,
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(Envelope { error }) => Self {
                status,
                code: error.code,
                message: error.message,
                request_id: error.inner_error.and_then(|i| i.request_id),
                retry_after,
            },
            Err(_) => Self {
                status,
                code: None,
                message: Some(excerpt(body)).filter(|m| !m.is_empty()),
                request_id: None,
                retry_after,
            },
        }
    }
}

const EXCERPT_CHARS: usize = 200;

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graph API returned {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " {code}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " (request-id {request_id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph request failed{hint}: {0}", hint = transport_hint(.0))]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("access token unavailable{hint}: {0}", hint = token_hint(.0))]
    Token(#[from] TokenError),

    #[error("cannot decode Graph response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A throttling failure with the server's guidance attached.
    #[error("{}", .hint.describe(.operation))]
    RateLimited {
        operation: String,
        hint: RateLimitHint,
        #[source]
        source: Box<GraphError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),
}

impl GraphError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// The error underneath any enrichment wrapper.
    #[must_use]
    pub fn root(&self) -> &GraphError {
        match self {
            Self::RateLimited { source, .. } => source.root(),
            other => other,
        }
    }
}

/// reqwest reports timeouts as "operation timed out"; name them so the
/// network rule of the classifier sees the word. Other connect failures
/// (TLS handshake, certificate) get no hint and stay permanent unless their
/// own text says otherwise.
fn transport_hint(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        " (timeout)"
    } else if error.is_connect() && io_kind_in_chain(error, io::ErrorKind::ConnectionRefused) {
        " (connection refused)"
    } else {
        ""
    }
}

fn io_kind_in_chain(
    error: &(dyn std::error::Error + 'static),
    kind: io::ErrorKind,
) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == kind)
        {
            return true;
        }
        current = err.source();
    }
    false
}

fn token_hint(error: &TokenError) -> &'static str {
    match error {
        TokenError::Http(e) => transport_hint(e),
        _ => "",
    }
}

impl ErrorSignals for GraphError {
    fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::RateLimited { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(e) => Some(e.status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Token(e) => e.status(),
            Self::RateLimited { source, .. } => source.status_code(),
            Self::Decode(_) | Self::Cancelled | Self::Message(_) => None,
        }
    }

    fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api(e) => e.code.as_deref(),
            Self::Token(TokenError::Rejected { error, .. }) => error.as_deref(),
            Self::RateLimited { source, .. } => source.api_code(),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            Self::Api(e) => e.retry_after.as_deref(),
            Self::RateLimited { source, .. } => source.retry_after(),
            _ => None,
        }
    }
}
