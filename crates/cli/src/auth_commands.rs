use std::time::Instant;

use {anyhow::Result, clap::Subcommand, tracing::info};

use crate::{
    output::{self, TokenStatus},
    settings::Session,
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Resolve the configured credential and acquire a token.
    Check,
}

pub async fn handle_auth(action: AuthAction, session: &Session) -> Result<()> {
    match action {
        AuthAction::Check => check(session).await,
    }
}

async fn check(session: &Session) -> Result<()> {
    let method = session.auth_input()?.method();
    let pipeline = session.pipeline()?;
    let token = pipeline.token().await?;

    let status = TokenStatus {
        method,
        scope: session.config().graph.scope.clone(),
        expires_in_secs: token
            .expires_at
            .saturating_duration_since(Instant::now())
            .as_secs(),
    };
    info!(method, "token acquired");
    output::print(session.format(), &status, output::token_status_text)
}
