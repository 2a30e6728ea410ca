//! Fixed-window, per-client rate limiting.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::error::ErrorResponse;
use super::AppState;

#[derive(Debug, Clone)]
struct WindowState {
    count: usize,
    window_start: Instant,
}

impl WindowState {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }
}

/// Allows `max_requests` per client per window. Clients are keyed by peer
/// address unless forwarded headers are trusted.
#[derive(Clone)]
pub struct RateLimiter {
    states: Arc<RwLock<HashMap<String, WindowState>>>,
    max_requests: usize,
    window: Duration,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
            trust_forwarded_for: false,
        }
    }

    /// Key clients on the first `X-Forwarded-For` address when present.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub async fn check(&self, client: &str) -> Result<(), RateLimitError> {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let state = states
            .entry(client.to_string())
            .or_insert_with(|| WindowState::new(now));

        if now.duration_since(state.window_start) >= self.window {
            *state = WindowState::new(now);
        }

        if state.count >= self.max_requests {
            let remaining = self
                .window
                .saturating_sub(now.duration_since(state.window_start));
            return Err(RateLimitError {
                retry_after: remaining.as_secs().max(1),
            });
        }

        state.count += 1;
        Ok(())
    }

    /// Forget clients whose window ended long ago.
    pub async fn cleanup_expired(&self) {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let keep_for = self.window * 2;
        states.retain(|_, state| now.duration_since(state.window_start) < keep_for);
    }
}

#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        tracing::warn!(retry_after = self.retry_after, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", self.retry_after.to_string())],
            Json(ErrorResponse {
                error: format!(
                    "Rate limit exceeded. Try again in {} seconds.",
                    self.retry_after
                ),
            }),
        )
            .into_response()
    }
}

/// Middleware guarding routes with the state's explain limiter.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client = client_id(&req, state.explain_limiter.trust_forwarded_for);
    state.explain_limiter.check(&client).await?;
    Ok(next.run(req).await)
}

fn client_id(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return format!("ip:{ip}");
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }

    "ip:unknown".to_string()
}
