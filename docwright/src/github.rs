//! # GitHub contents client
//!
//! Implements [`SourceLocator`] on top of the GitHub REST contents API.
//!
//! - Listing walks the repository depth-first, one request per directory, and
//!   keeps files whose name ends with the configured source extension.
//! - A rate-limit response is waited out until the advertised reset time (plus
//!   a one second buffer) and the same request is retried, bounded by the
//!   configured [`RetryPolicy`](docwright_core::config::RetryPolicy).
//! - Every other non-success status fails immediately with
//!   [`FetchError::Status`].
//! - The token is only sent to the `api_base` origin and the configured
//!   trusted origins. Download URLs come from callers and may point anywhere.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use docwright_core::config::GitHubConfig;
use docwright_core::contract::{FileRef, RepoRef, SourceLocator};
use docwright_core::error::FetchError;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

const RESET_BUFFER: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    download_url: Option<String>,
}

pub struct GitHubClient {
    http: reqwest::Client,
    config: GitHubConfig,
    token_origins: Vec<Url>,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build GitHub HTTP client");
                FetchError::Transport(e.to_string())
            })?;
        let token_origins = std::iter::once(config.api_base.as_str())
            .chain(config.trusted_origins.iter().map(String::as_str))
            .map(|origin| {
                Url::parse(origin).map_err(|e| {
                    tracing::error!(error = ?e, origin = %origin, "Invalid GitHub origin in config");
                    FetchError::Malformed(format!("invalid origin {origin}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            api_base = %config.api_base,
            token_set = config.token.is_some(),
            extension = %config.source_extension,
            "Initialized GitHubClient"
        );
        Ok(Self {
            http,
            config,
            token_origins,
        })
    }

    fn contents_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/repos/{}/{}/contents",
            self.config.api_base.trim_end_matches('/'),
            repo.owner,
            repo.repo
        )
    }

    fn may_receive_token(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        self.token_origins
            .iter()
            .any(|trusted| trusted.origin() == url.origin())
    }

    /// GET with rate-limit handling. Returns the successful response.
    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let policy = self.config.retry;
        let token = self
            .config
            .token
            .as_ref()
            .filter(|_| self.may_receive_token(url));
        if self.config.token.is_some() && token.is_none() {
            tracing::debug!(url = %url, "Untrusted origin, sending request without token");
        }
        let mut slept = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut request = self.http.get(url);
            if let Some(token) = token {
                request = request.header(AUTHORIZATION, format!("token {token}"));
            }

            let response = request.send().await.map_err(|e| {
                tracing::error!(error = ?e, url = %url, "Failed to reach GitHub");
                FetchError::Transport(e.to_string())
            })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            if !is_rate_limited(status, &body) {
                tracing::error!(status = %status, url = %url, "GitHub request failed");
                return Err(FetchError::Status {
                    status: status.as_u16(),
                });
            }

            let wait = rate_limit_wait(&headers, SystemTime::now());
            if attempt >= policy.max_attempts || slept + wait > policy.budget {
                tracing::error!(
                    url = %url,
                    attempt,
                    slept_secs = slept.as_secs(),
                    wait_secs = wait.as_secs(),
                    "GitHub rate limit not lifted within retry policy"
                );
                return Err(FetchError::RateLimited { attempts: attempt });
            }

            tracing::warn!(
                url = %url,
                attempt,
                wait_secs = wait.as_secs(),
                "GitHub rate limit exceeded, sleeping until reset"
            );
            tokio::time::sleep(wait).await;
            slept += wait;
        }
    }

    async fn list_dir(&self, url: &str) -> Result<Vec<ContentEntry>, FetchError> {
        let entries: Vec<ContentEntry> = self.get(url).await?.json().await.map_err(|e| {
            tracing::error!(error = ?e, url = %url, "Failed to decode directory listing");
            FetchError::Malformed(e.to_string())
        })?;
        tracing::debug!(url = %url, entries = entries.len(), "Listed directory");
        Ok(entries)
    }
}

#[async_trait]
impl SourceLocator for GitHubClient {
    async fn list_source_files(&self, repo: &RepoRef) -> Result<Vec<FileRef>, FetchError> {
        let root = self.contents_url(repo);
        tracing::info!(owner = %repo.owner, repo = %repo.repo, "Listing repository source files");

        let mut files = Vec::new();
        let mut stack = vec![self.list_dir(&root).await?.into_iter()];
        loop {
            let next = match stack.last_mut() {
                Some(entries) => entries.next(),
                None => break,
            };
            let Some(entry) = next else {
                stack.pop();
                continue;
            };

            match entry.kind.as_str() {
                "dir" => {
                    let children = self.list_dir(&entry.url).await?;
                    stack.push(children.into_iter());
                }
                "file" if entry.name.ends_with(&self.config.source_extension) => {
                    match entry.download_url {
                        Some(download_url) => files.push(FileRef {
                            name: entry.name,
                            path: entry.path,
                            download_url,
                        }),
                        None => {
                            tracing::warn!(path = %entry.path, "Source file has no download URL, skipping")
                        }
                    }
                }
                _ => {}
            }
        }

        tracing::info!(count = files.len(), "Listed repository source files");
        Ok(files)
    }

    async fn fetch(&self, download_url: &str) -> Result<String, FetchError> {
        let text = self.get(download_url).await?.text().await.map_err(|e| {
            tracing::error!(error = ?e, url = %download_url, "Failed to read file contents");
            FetchError::Malformed(e.to_string())
        })?;
        tracing::debug!(url = %download_url, bytes = text.len(), "Fetched file contents");
        Ok(text)
    }
}

fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && body.to_ascii_lowercase().contains("rate limit"))
}

/// Time to wait before retrying: until `X-RateLimit-Reset` (epoch seconds),
/// else `Retry-After` seconds, plus the buffer.
fn rate_limit_wait(headers: &HeaderMap, now: SystemTime) -> Duration {
    let header_secs = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    let until_reset = if let Some(reset) = header_secs("x-ratelimit-reset") {
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Duration::from_secs(reset.saturating_sub(now_secs))
    } else if let Some(after) = header_secs("retry-after") {
        Duration::from_secs(after)
    } else {
        Duration::ZERO
    };
    until_reset + RESET_BUFFER
}
