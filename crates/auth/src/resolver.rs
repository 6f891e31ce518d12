//! Turns the selected [`AuthInput`] into a ready [`SigningCredential`].

use std::{path::Path, sync::Arc};

use {
    secrecy::Secret,
    tracing::{debug, info},
    url::Url,
};

use crate::{
    credential::{
        ClientCertificateCredential, ClientSecretCredential, SigningCredential, TokenEndpoint,
    },
    error::AuthError,
    input::AuthInput,
    pkcs12::{self, CertificateMaterial},
    store::{CertificateStore, default_store, normalize_thumbprint},
};

/// Microsoft identity platform authority for the public cloud.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Builds credentials for one tenant and app registration.
///
/// Resolution is synchronous and performs no network calls; the first token
/// request happens when the credential is first used.
pub struct CredentialResolver {
    tenant_id: String,
    client_id: String,
    authority: Option<Url>,
    http: Option<reqwest::Client>,
    store: Arc<dyn CertificateStore>,
}

impl CredentialResolver {
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            authority: None,
            http: None,
            store: default_store(),
        }
    }

    /// Override the authority host (sovereign clouds, tests).
    #[must_use]
    pub fn with_authority(mut self, authority: Url) -> Self {
        self.authority = Some(authority);
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn with_certificate_store(mut self, store: Arc<dyn CertificateStore>) -> Self {
        self.store = store;
        self
    }

    /// `{authority}/{tenant}/oauth2/v2.0/token`.
    pub fn token_url(&self) -> Result<Url, AuthError> {
        validate_tenant(&self.tenant_id)?;
        let authority = self
            .authority
            .as_ref()
            .map_or(DEFAULT_AUTHORITY, Url::as_str)
            .trim_end_matches('/');
        Url::parse(&format!(
            "{authority}/{}/oauth2/v2.0/token",
            self.tenant_id.trim()
        ))
        .map_err(|e| AuthError::InvalidIdentifier {
            field: "authority",
            reason: e.to_string(),
        })
    }

    pub fn resolve(&self, input: AuthInput) -> Result<Arc<dyn SigningCredential>, AuthError> {
        validate_client_id(&self.client_id)?;
        let endpoint = TokenEndpoint::new(
            self.http.clone().unwrap_or_default(),
            self.token_url()?,
            self.client_id.trim(),
        );
        let method = input.method();

        let credential: Arc<dyn SigningCredential> = match input {
            AuthInput::Secret(secret) => Arc::new(ClientSecretCredential::new(endpoint, secret)),
            AuthInput::CertificateFile { path, password } => {
                let material = load_certificate_file(&path, &password)?;
                log_certificate(&material, method);
                Arc::new(ClientCertificateCredential::new(endpoint, material)?)
            },
            AuthInput::StoreThumbprint(raw) => {
                let thumbprint =
                    normalize_thumbprint(&raw).map_err(|e| AuthError::InvalidIdentifier {
                        field: "certificate thumbprint",
                        reason: e.to_string(),
                    })?;
                let exported = self.store.export(&thumbprint)?;
                let material = pkcs12::decode(&exported.blob, &exported.password)?;
                log_certificate(&material, method);
                Arc::new(ClientCertificateCredential::new(endpoint, material)?)
            },
        };

        info!(
            method,
            tenant_id = %self.tenant_id,
            client_id = %self.client_id,
            "credential resolved"
        );
        Ok(credential)
    }
}

fn load_certificate_file(
    path: &Path,
    password: &Secret<String>,
) -> Result<CertificateMaterial, AuthError> {
    let blob = zeroize::Zeroizing::new(std::fs::read(path).map_err(|source| {
        AuthError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        }
    })?);
    debug!(path = %path.display(), bytes = blob.len(), "read certificate file");
    pkcs12::decode(&blob, password)
}

fn log_certificate(material: &CertificateMaterial, method: &'static str) {
    if let Ok(thumbprint) = material.leaf_thumbprint() {
        debug!(
            method,
            thumbprint,
            chain_len = material.chain.len(),
            "decoded client certificate"
        );
    }
}

fn validate_tenant(tenant: &str) -> Result<(), AuthError> {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return Err(AuthError::InvalidIdentifier {
            field: "tenant id",
            reason: "must not be empty".into(),
        });
    }
    if let Some(bad) = tenant
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(AuthError::InvalidIdentifier {
            field: "tenant id",
            reason: format!("unexpected character {bad:?} in '{tenant}'"),
        });
    }
    Ok(())
}

fn validate_client_id(client_id: &str) -> Result<(), AuthError> {
    uuid::Uuid::parse_str(client_id.trim())
        .map(|_| ())
        .map_err(|e| AuthError::InvalidIdentifier {
            field: "client id",
            reason: format!("'{}' is not a GUID: {e}", client_id.trim()),
        })
}
