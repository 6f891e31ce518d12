//! Client-credentials token acquisition for Microsoft Graph.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::debug,
    url::Url,
};

use crate::{
    assertion::AssertionSigner,
    error::{AuthError, TokenError},
    pkcs12::CertificateMaterial,
};

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const DEFAULT_TTL_SECS: u64 = 3600;
const MIN_TTL_SECS: u64 = 120;
const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// A bearer token for one scope.
#[derive(Clone)]
pub struct AccessToken {
    pub token: Secret<String>,
    pub expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + REFRESH_SKEW
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Anything that can produce a Graph access token.
///
/// Implementations cache tokens until shortly before expiry, so callers may
/// ask once per request.
#[async_trait]
pub trait SigningCredential: Send + Sync {
    /// Short name of the authentication method, for logs.
    fn kind(&self) -> &'static str;

    async fn access_token(&self, scope: &str) -> Result<AccessToken, TokenError>;
}

#[async_trait]
impl<T: SigningCredential + ?Sized> SigningCredential for Arc<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    async fn access_token(&self, scope: &str) -> Result<AccessToken, TokenError> {
        (**self).access_token(scope).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// The tenant's OAuth 2.0 token endpoint plus a per-scope token cache.
pub struct TokenEndpoint {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl TokenEndpoint {
    pub fn new(http: reqwest::Client, token_url: Url, client_id: impl Into<String>) -> Self {
        Self {
            http,
            token_url,
            client_id: client_id.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn cached(&self, scope: &str) -> Option<AccessToken> {
        let guard = self.cache.lock().await;
        guard.get(scope).filter(|t| t.is_fresh()).cloned()
    }

    async fn exchange(
        &self,
        scope: &str,
        credential_fields: &[(&str, &str)],
    ) -> Result<AccessToken, TokenError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("scope", scope),
        ];
        form.extend_from_slice(credential_fields);

        debug!(token_url = %self.token_url, scope, "requesting access token");
        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let details = serde_json::from_str::<TokenErrorResponse>(&body).ok();
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                error: details.as_ref().and_then(|d| d.error.clone()),
                description: details.and_then(|d| d.error_description),
            });
        }

        let body = resp.text().await?;
        let body: TokenResponse =
            serde_json::from_str(&body).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(TokenError::Malformed("empty access_token".into()));
        }

        let ttl = body.expires_in.unwrap_or(DEFAULT_TTL_SECS).max(MIN_TTL_SECS);
        let token = AccessToken {
            token: Secret::new(body.access_token),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        };

        let mut guard = self.cache.lock().await;
        guard.insert(scope.to_string(), token.clone());
        Ok(token)
    }
}

/// Client id + shared secret.
pub struct ClientSecretCredential {
    endpoint: TokenEndpoint,
    secret: Secret<String>,
}

impl ClientSecretCredential {
    pub fn new(endpoint: TokenEndpoint, secret: Secret<String>) -> Self {
        Self { endpoint, secret }
    }
}

#[async_trait]
impl SigningCredential for ClientSecretCredential {
    fn kind(&self) -> &'static str {
        "client_secret"
    }

    async fn access_token(&self, scope: &str) -> Result<AccessToken, TokenError> {
        if let Some(token) = self.endpoint.cached(scope).await {
            return Ok(token);
        }
        self.endpoint
            .exchange(scope, &[("client_secret", self.secret.expose_secret().as_str())])
            .await
    }
}

/// Client id + X.509 certificate, presented as a signed JWT assertion.
pub struct ClientCertificateCredential {
    endpoint: TokenEndpoint,
    signer: AssertionSigner,
}

impl ClientCertificateCredential {
    pub fn new(endpoint: TokenEndpoint, material: CertificateMaterial) -> Result<Self, AuthError> {
        let signer = AssertionSigner::from_material(material)?;
        debug!(chain_len = signer.chain_len(), "certificate credential ready");
        Ok(Self { endpoint, signer })
    }
}

#[async_trait]
impl SigningCredential for ClientCertificateCredential {
    fn kind(&self) -> &'static str {
        "client_certificate"
    }

    async fn access_token(&self, scope: &str) -> Result<AccessToken, TokenError> {
        if let Some(token) = self.endpoint.cached(scope).await {
            return Ok(token);
        }
        let assertion = self.signer.sign(
            self.endpoint.client_id(),
            self.endpoint.token_url().as_str(),
            SystemTime::now(),
        )?;
        self.endpoint
            .exchange(scope, &[
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
            ])
            .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{
        pkcs12::decode,
        test_support::{PFX_PASSWORD, chained_pfx},
    };

    const CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";
    const SCOPE: &str = "https://graph.microsoft.com/.default";

    fn endpoint(server: &mockito::Server) -> TokenEndpoint {
        let url = Url::parse(&format!("{}/contoso/oauth2/v2.0/token", server.url())).unwrap();
        TokenEndpoint::new(reqwest::Client::new(), url, CLIENT_ID)
    }

    fn token_body(token: &str, expires_in: u64) -> String {
        serde_json::json!({
            "token_type": "Bearer",
            "expires_in": expires_in,
            "access_token": token,
        })
        .to_string()
    }

    #[tokio::test]
    async fn secret_grant_is_cached_per_scope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("scope".into(), SCOPE.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok-1", 3600))
            .expect(1)
            .create_async()
            .await;

        let credential =
            ClientSecretCredential::new(endpoint(&server), Secret::new("s3cret".into()));
        let first = credential.access_token(SCOPE).await.unwrap();
        let second = credential.access_token(SCOPE).await.unwrap();

        assert_eq!(first.token.expose_secret(), "tok-1");
        assert_eq!(second.token.expose_secret(), "tok-1");
        assert_eq!(credential.kind(), "client_secret");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn short_expiry_is_floored_to_the_minimum_ttl() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .with_status(200)
            .with_body(token_body("tok-short", 5))
            .expect(1)
            .create_async()
            .await;

        let credential =
            ClientSecretCredential::new(endpoint(&server), Secret::new("s3cret".into()));
        let token = credential.access_token(SCOPE).await.unwrap();
        let ttl = token.expires_at.saturating_duration_since(Instant::now());
        assert!(ttl > Duration::from_secs(MIN_TTL_SECS - 5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_carries_oauth_error_fields() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .with_status(401)
            .with_body(
                serde_json::json!({
                    "error": "invalid_client",
                    "error_description": "AADSTS7000215: Invalid client secret provided.",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let credential =
            ClientSecretCredential::new(endpoint(&server), Secret::new("wrong".into()));
        let err = credential.access_token(SCOPE).await.unwrap_err();
        match &err {
            TokenError::Rejected {
                status,
                error,
                description,
            } => {
                assert_eq!(*status, 401);
                assert_eq!(error.as_deref(), Some("invalid_client"));
                assert!(description.as_deref().unwrap().starts_with("AADSTS7000215"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("wrong"));
    }

    #[tokio::test]
    async fn non_json_rejection_still_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let credential =
            ClientSecretCredential::new(endpoint(&server), Secret::new("s3cret".into()));
        let err = credential.access_token(SCOPE).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn malformed_success_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .with_status(200)
            .with_body("{\"token_type\":\"Bearer\"}")
            .create_async()
            .await;

        let credential =
            ClientSecretCredential::new(endpoint(&server), Secret::new("s3cret".into()));
        let err = credential.access_token(SCOPE).await.unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[tokio::test]
    async fn certificate_grant_posts_signed_assertion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
                Matcher::UrlEncoded("client_assertion_type".into(), CLIENT_ASSERTION_TYPE.into()),
                Matcher::Regex(
                    "client_assertion=[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+".into(),
                ),
            ]))
            .with_status(200)
            .with_body(token_body("cert-tok", 3600))
            .expect(1)
            .create_async()
            .await;

        let material = decode(
            &chained_pfx(PFX_PASSWORD),
            &Secret::new(PFX_PASSWORD.to_string()),
        )
        .unwrap();
        let credential = ClientCertificateCredential::new(endpoint(&server), material).unwrap();
        let token = credential.access_token(SCOPE).await.unwrap();
        credential.access_token(SCOPE).await.unwrap();

        assert_eq!(token.token.expose_secret(), "cert-tok");
        assert_eq!(credential.kind(), "client_certificate");
        mock.assert_async().await;
    }

    #[test]
    fn debug_redacts_token() {
        let token = AccessToken {
            token: Secret::new("eyJhbGciOi".into()),
            expires_at: Instant::now(),
        };
        assert!(!format!("{token:?}").contains("eyJ"));
    }
}
