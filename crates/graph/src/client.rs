//! Minimal Microsoft Graph REST client.
//!
//! Every call takes the bearer token explicitly; token acquisition and
//! retries belong to the [`Pipeline`](crate::Pipeline).

use std::time::Duration;

use {
    graphbox_auth::AccessToken,
    reqwest::{Response, header::RETRY_AFTER},
    secrecy::ExposeSecret,
    serde::{Serialize, de::DeserializeOwned},
    tracing::{debug, warn},
};

use crate::{
    error::{ApiError, GraphError},
    types::Page,
};

pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Ask Graph to render event times in UTC.
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    max_pages: u32,
}

impl GraphClient {
    /// Client with its own connection pool and a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("graphbox/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(http, base_url))
    }

    fn with_http_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GraphError> {
        self.get_url(token, &self.url(path), query).await
    }

    async fn get_url<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GraphError> {
        debug!(url, "GET");
        let resp = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token.token.expose_secret())
            .header("Prefer", PREFER_UTC)
            .send()
            .await?;
        decode(check(resp).await?).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        body: &B,
    ) -> Result<T, GraphError> {
        let resp = self.post(token, path, body).await?;
        decode(resp).await
    }

    /// POST for endpoints that answer `202 Accepted` / `204 No Content`.
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        token: &AccessToken,
        path: &str,
        body: &B,
    ) -> Result<(), GraphError> {
        self.post(token, path, body).await.map(|_| ())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        token: &AccessToken,
        path: &str,
        body: &B,
    ) -> Result<Response, GraphError> {
        let url = self.url(path);
        debug!(url, "POST");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token.token.expose_secret())
            .header("Prefer", PREFER_UTC)
            .json(body)
            .send()
            .await?;
        check(resp).await
    }

    /// GET a collection, following `@odata.nextLink` up to the page limit.
    ///
    /// Next links must stay under the client's base URL so the bearer token
    /// is never sent elsewhere.
    pub async fn get_paged<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GraphError> {
        let mut page: Page<T> = self.get(token, path, query).await?;
        let mut items = std::mem::take(&mut page.value);
        let mut fetched = 1;

        while let Some(next) = page.next_link.take() {
            if fetched >= self.max_pages {
                warn!(
                    pages = fetched,
                    items = items.len(),
                    "page limit reached, results truncated"
                );
                break;
            }
            if !next.starts_with(&format!("{}/", self.base_url)) {
                return Err(GraphError::message(format!(
                    "refusing to follow nextLink outside {}: {next}",
                    self.base_url
                )));
            }
            page = self.get_url(token, &next, &[]).await?;
            items.append(&mut page.value);
            fetched += 1;
        }

        Ok(items)
    }
}

async fn check(resp: Response) -> Result<Response, GraphError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::from_response(status.as_u16(), &body, retry_after).into())
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, GraphError> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
