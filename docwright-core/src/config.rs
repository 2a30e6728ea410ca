use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_RAW_CONTENT_ORIGIN: &str = "https://raw.githubusercontent.com";
/// Completion requests in flight at once, per narrator.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Process-wide configuration, loaded once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    /// Key rate limiting on `X-Forwarded-For` instead of the peer address.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    pub output: OutputConfig,
    pub completion: CompletionConfig,
    pub github: GitHubConfig,
    /// Allowed `/explain-code` requests per client per minute.
    pub explain_per_minute: usize,
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            bind = %self.bind,
            trust_forwarded_for = self.trust_forwarded_for,
            output_dir = %self.output.dir.display(),
            completion_base_url = %self.completion.base_url,
            model = %self.completion.model,
            max_concurrency = self.completion.max_concurrency,
            github_api_base = %self.github.api_base,
            github_token_set = self.github.token.is_some(),
            explain_per_minute = self.explain_per_minute,
            "Loaded AppConfig"
        );
        debug!(retry = ?self.github.retry, "Repository retry policy");
    }
}

/// Where the generated documentation is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub markdown_name: String,
    pub html_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("docs"),
            markdown_name: "docs.md".to_string(),
            html_name: "index.html".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn markdown_path(&self) -> PathBuf {
        self.dir.join(&self.markdown_name)
    }

    pub fn html_path(&self) -> PathBuf {
        self.dir.join(&self.html_name)
    }
}

/// Settings for the text-completion endpoint.
#[derive(Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 200,
            temperature: 0.7,
            request_timeout: Duration::from_secs(60),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

// Hand-written so the API key never reaches the logs.
impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

/// Settings for the repository content service.
#[derive(Clone)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_base: String,
    /// File name suffix that marks a source file, e.g. `.py`.
    pub source_extension: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Origins besides `api_base` that may receive the token, e.g.
    /// `https://raw.githubusercontent.com`.
    pub trusted_origins: Vec<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            source_extension: ".py".to_string(),
            user_agent: concat!("docwright/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            trusted_origins: vec![DEFAULT_RAW_CONTENT_ORIGIN.to_string()],
        }
    }
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("source_extension", &self.source_extension)
            .field("user_agent", &self.user_agent)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("trusted_origins", &self.trusted_origins)
            .finish()
    }
}

/// Bounds on waiting out a repository rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for one request, the first one included.
    pub max_attempts: u32,
    /// Upper bound on the total time spent sleeping for one request.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            budget: Duration::from_secs(120),
        }
    }
}
