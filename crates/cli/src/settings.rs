//! Global flags, their merge into the loaded config, and pipeline assembly.

use std::{path::PathBuf, time::Duration};

use {
    anyhow::Context,
    clap::{Args, ValueEnum},
    graphbox_auth::{AuthInput, CredentialResolver, default_store},
    graphbox_config::{GraphboxConfig, LoadedConfig, OutputFormat},
    graphbox_graph::{GraphClient, Pipeline},
    graphbox_resilience::CancellationToken,
    secrecy::Secret,
    tracing::debug,
    url::Url,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    Json,
    Text,
}

impl From<OutputArg> for OutputFormat {
    fn from(value: OutputArg) -> Self {
        match value {
            OutputArg::Json => Self::Json,
            OutputArg::Text => Self::Text,
        }
    }
}

/// Flags shared by every subcommand. Each one beats the config file and the
/// `GRAPHBOX_*` overrides the loader applies.
#[derive(Args, Default)]
pub struct Overrides {
    /// Config file (default: ./graphbox.toml, then ~/.config/graphbox/).
    #[arg(long, global = true, env = "GRAPHBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory (tenant) id or verified domain.
    #[arg(long, global = true, env = "GRAPHBOX_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Application (client) id.
    #[arg(long, global = true, env = "GRAPHBOX_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, global = true, env = "GRAPHBOX_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// PKCS#12 file with the app certificate and its private key.
    #[arg(long, global = true, env = "GRAPHBOX_CERT_PATH")]
    pub cert_path: Option<PathBuf>,

    #[arg(long, global = true, env = "GRAPHBOX_CERT_PASSWORD", hide_env_values = true)]
    pub cert_password: Option<String>,

    /// SHA-1 thumbprint of a certificate in the platform store.
    #[arg(long, global = true, env = "GRAPHBOX_CERT_THUMBPRINT")]
    pub cert_thumbprint: Option<String>,

    /// Mailbox (UPN or object id) the command acts on.
    #[arg(long, global = true, env = "GRAPHBOX_MAILBOX")]
    pub mailbox: Option<String>,

    /// Retries after the first attempt.
    #[arg(long, global = true, env = "GRAPHBOX_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    #[arg(long, global = true, env = "GRAPHBOX_RETRY_BASE_DELAY_MS")]
    pub retry_base_delay_ms: Option<u64>,

    /// Cancel the command, retries included, after this many seconds.
    #[arg(long, global = true, env = "GRAPHBOX_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    #[arg(long, global = true, value_enum, env = "GRAPHBOX_OUTPUT")]
    pub output: Option<OutputArg>,
}

impl Overrides {
    pub fn apply(&self, config: &mut GraphboxConfig) {
        if let Some(v) = non_empty(&self.tenant_id) {
            config.tenant_id = Some(v);
        }
        if let Some(v) = non_empty(&self.client_id) {
            config.client_id = Some(v);
        }
        if let Some(v) = non_empty(&self.client_secret) {
            config.auth.client_secret = Some(Secret::new(v));
        }
        if let Some(path) = &self.cert_path {
            config.auth.certificate_path = Some(path.clone());
        }
        if let Some(v) = &self.cert_password {
            config.auth.certificate_password = Some(Secret::new(v.clone()));
        }
        if let Some(v) = non_empty(&self.cert_thumbprint) {
            config.auth.certificate_thumbprint = Some(v);
        }
        if let Some(v) = non_empty(&self.mailbox) {
            config.mailbox = Some(v);
        }
        if let Some(v) = self.max_retries {
            config.retry.max_attempts = v;
        }
        if let Some(v) = self.retry_base_delay_ms {
            config.retry.base_delay_ms = v;
        }
        if let Some(v) = self.output {
            config.output.format = v.into();
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Effective configuration of one invocation.
pub struct Session {
    pub loaded: LoadedConfig,
    pub cancel: CancellationToken,
}

impl Session {
    pub fn load(overrides: &Overrides, cancel: CancellationToken) -> anyhow::Result<Self> {
        let mut loaded = graphbox_config::load(overrides.config.as_deref())?;
        overrides.apply(&mut loaded.config);
        debug!(path = ?loaded.path, "configuration loaded");
        Ok(Self { loaded, cancel })
    }

    pub fn config(&self) -> &GraphboxConfig {
        &self.loaded.config
    }

    pub fn format(&self) -> OutputFormat {
        self.loaded.config.output.format
    }

    /// Mailbox from --mailbox, the environment, or the config file.
    pub fn mailbox(&self) -> anyhow::Result<String> {
        self.config()
            .mailbox
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(ToString::to_string)
            .context("no mailbox given: pass --mailbox, set GRAPHBOX_MAILBOX, or add `mailbox` to graphbox.toml")
    }

    pub fn resolver(&self) -> anyhow::Result<CredentialResolver> {
        let config = self.config();
        let tenant_id = required(&config.tenant_id, "tenant id", "--tenant-id", "GRAPHBOX_TENANT_ID")?;
        let client_id = required(&config.client_id, "client id", "--client-id", "GRAPHBOX_CLIENT_ID")?;
        let authority = Url::parse(&config.graph.authority)
            .with_context(|| format!("invalid authority URL '{}'", config.graph.authority))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("building HTTP client for the token endpoint")?;

        Ok(CredentialResolver::new(tenant_id, client_id)
            .with_authority(authority)
            .with_http_client(http)
            .with_certificate_store(default_store()))
    }

    pub fn auth_input(&self) -> anyhow::Result<AuthInput> {
        Ok(AuthInput::from_parts(self.config().auth_parts())?)
    }

    /// Resolve the credential and wire it to a Graph client under the
    /// configured retry policy.
    pub fn pipeline(&self) -> anyhow::Result<Pipeline> {
        let config = self.config();
        let input = self.auth_input()?;
        let credential = self.resolver()?.resolve(input)?;

        let client = GraphClient::new(&config.graph.base_url, config.request_timeout())?
            .with_max_pages(config.graph.max_pages);

        Ok(Pipeline::new(credential, client, config.retry_policy())
            .with_cancellation(self.cancel.clone())
            .with_scope(config.graph.scope.clone()))
    }
}

fn required(value: &Option<String>, what: &str, flag: &str, env: &str) -> anyhow::Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .with_context(|| format!("{what} is not set: pass {flag} or set {env}"))
}
