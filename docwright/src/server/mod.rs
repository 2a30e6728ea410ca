//! # HTTP server
//!
//! JSON endpoints over the documentation pipeline. Handlers live in
//! [`routes`], the status mapping in [`error`] and the per-client limiter
//! guarding `/explain-code` in [`rate_limit`].

pub mod error;
pub mod rate_limit;
pub mod routes;

use anyhow::{Context, Result};
use docwright_core::config::{AppConfig, OutputConfig};
use docwright_core::contract::SourceLocator;
use docwright_core::narrate::Narrator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::completion::DeepSeekClient;
use crate::github::GitHubClient;
use rate_limit::RateLimiter;

/// Shared, read-only handler state. The limiter table is the only mutable part.
#[derive(Clone)]
pub struct AppState {
    pub narrator: Arc<Narrator>,
    pub locator: Arc<dyn SourceLocator>,
    pub output: Arc<OutputConfig>,
    pub explain_limiter: RateLimiter,
}

impl AppState {
    /// State wired to the real completion and repository clients.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let completer = DeepSeekClient::new(config.completion.clone())
            .context("Failed to construct completion client")?;
        let narrator =
            Narrator::with_max_concurrency(Arc::new(completer), config.completion.max_concurrency);
        let locator =
            GitHubClient::new(config.github.clone()).context("Failed to construct GitHub client")?;
        Ok(Self {
            narrator: Arc::new(narrator),
            locator: Arc::new(locator),
            output: Arc::new(config.output.clone()),
            explain_limiter: RateLimiter::per_minute(config.explain_per_minute)
                .trusting_forwarded_for(config.trust_forwarded_for),
        })
    }
}

pub fn build_router(state: AppState) -> axum::Router {
    routes::create_routes(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config)?;

    let limiter = state.explain_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.cleanup_expired().await;
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(addr = %listener.local_addr()?, "docwright server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;
    Ok(())
}
