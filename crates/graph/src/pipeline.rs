//! Token + call + retry, composed once per logical operation.

use std::{future::Future, sync::Arc};

use {
    graphbox_auth::{AccessToken, SigningCredential},
    graphbox_resilience::{
        CancellationToken, RetryError, RetryExecutor, RetryObserver, RetryPolicy, Sleeper,
        rate_limit_hint,
    },
    tracing::debug,
};

use crate::{client::GraphClient, error::GraphError};

pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Runs Graph operations with a fresh (or cached) token per attempt under a
/// retry policy.
#[derive(Clone)]
pub struct Pipeline {
    credential: Arc<dyn SigningCredential>,
    client: GraphClient,
    executor: RetryExecutor,
    cancel: CancellationToken,
    scope: String,
}

impl Pipeline {
    pub fn new(
        credential: Arc<dyn SigningCredential>,
        client: GraphClient,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            credential,
            client,
            executor: RetryExecutor::new(policy),
            cancel: CancellationToken::new(),
            scope: DEFAULT_SCOPE.into(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.executor = self.executor.with_sleeper(sleeper);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Acquire a token: the `auth check` path, retried like any call.
    pub async fn token(&self) -> Result<AccessToken, RetryError<GraphError>> {
        self.run("acquire token", |_, token| async move { Ok(token) })
            .await
    }

    /// Run `call` under the retry policy. A token is obtained before every
    /// attempt and `call` gets its own handle on the client. An in-flight
    /// attempt is abandoned when the cancellation token fires. A final
    /// rate-limit failure is wrapped with the server's hint naming
    /// `operation`.
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, RetryError<GraphError>>
    where
        F: Fn(GraphClient, AccessToken) -> Fut,
        Fut: Future<Output = Result<T, GraphError>>,
    {
        let credential = &self.credential;
        let client = &self.client;
        let scope = self.scope.as_str();
        let cancel = &self.cancel;
        let call = &call;

        debug!(operation, kind = credential.kind(), "starting operation");
        let result = self
            .executor
            .execute(cancel, move || async move {
                let attempt = async {
                    let token = credential.access_token(scope).await?;
                    call(client.clone(), token).await
                };
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(GraphError::Cancelled),
                    result = attempt => result,
                }
            })
            .await;

        result.map_err(|e| e.map_source(|source| enrich(operation, source)))
    }
}

/// Wrap a rate-limited failure with the server's hint. Other errors pass
/// through unchanged.
pub fn enrich(operation: &str, error: GraphError) -> GraphError {
    if matches!(error, GraphError::RateLimited { .. }) {
        return error;
    }
    match rate_limit_hint(&error) {
        Some(hint) => GraphError::RateLimited {
            operation: operation.to_string(),
            hint,
            source: Box::new(error),
        },
        None => error,
    }
}
