//! Config schema types (identity, auth, retry, graph endpoints, output).
use std::{path::PathBuf, time::Duration};

use {
    graphbox_auth::{AuthParts, DEFAULT_AUTHORITY},
    graphbox_common::secret::serialize_option_redacted,
    graphbox_resilience::RetryPolicy,
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphboxConfig {
    /// Directory (tenant) id or verified domain.
    pub tenant_id: Option<String>,
    /// Application (client) id of the app registration.
    pub client_id: Option<String>,
    /// Default mailbox (UPN or object id) that actions run against.
    pub mailbox: Option<String>,
    pub auth: AuthConfig,
    pub retry: RetryConfig,
    pub graph: GraphConfig,
    pub output: OutputConfig,
}

/// Authentication alternatives. Exactly one must be set once flags and
/// environment have been merged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(serialize_with = "serialize_option_redacted")]
    pub client_secret: Option<Secret<String>>,
    /// PKCS#12 (`.pfx` / `.p12`) file holding the key and certificate chain.
    pub certificate_path: Option<PathBuf>,
    #[serde(serialize_with = "serialize_option_redacted")]
    pub certificate_password: Option<Secret<String>>,
    /// SHA-1 thumbprint of a certificate in the platform store.
    pub certificate_thumbprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub base_url: String,
    pub authority: String,
    pub scope: String,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Upper bound on `@odata.nextLink` pages followed by list commands.
    pub max_pages: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.into(),
            authority: DEFAULT_AUTHORITY.into(),
            scope: DEFAULT_SCOPE.into(),
            timeout_secs: 30,
            max_pages: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

impl GraphboxConfig {
    /// Raw authentication values for [`graphbox_auth::AuthInput::from_parts`].
    #[must_use]
    pub fn auth_parts(&self) -> AuthParts {
        AuthParts {
            client_secret: self.auth.client_secret.clone(),
            certificate_path: self.auth.certificate_path.clone(),
            certificate_password: self.auth.certificate_password.clone(),
            certificate_thumbprint: self.auth.certificate_thumbprint.clone(),
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
        .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.graph.timeout_secs)
    }
}
