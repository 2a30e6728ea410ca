/// `load_config` module: reads the optional static YAML file and the secrets
/// from the environment, and produces the one [`AppConfig`] every component
/// is built from.
///
/// # Responsibilities
/// - Parse the user-supplied YAML (no secrets) into section structs where every
///   field has a default, so a missing file or a partial file is valid
/// - Inject `DEEPSEEK_API_KEY` (required) and `GITHUB_ACCESS_TOKEN` (optional)
/// - Fail with a clear diagnostic when the file cannot be read or parsed, or a
///   required secret is missing
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use anyhow::{anyhow, Result};
use docwright_core::config::{
    AppConfig, CompletionConfig, GitHubConfig, OutputConfig, RetryPolicy,
    DEFAULT_COMPLETION_BASE_URL, DEFAULT_GITHUB_API_BASE, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_RAW_CONTENT_ORIGIN,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticConfig {
    pub server: ServerSection,
    pub output: OutputSection,
    pub completion: CompletionSection,
    pub github: GitHubSection,
    pub rate_limit: RateLimitSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: String,
    pub trust_forwarded_for: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub dir: PathBuf,
    pub markdown_name: String,
    pub html_name: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        let output = OutputConfig::default();
        Self {
            dir: output.dir,
            markdown_name: output.markdown_name,
            html_name: output.html_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionSection {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for CompletionSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 200,
            temperature: 0.7,
            request_timeout_secs: 60,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSection {
    pub api_base: String,
    pub source_extension: String,
    pub max_attempts: u32,
    pub budget_secs: u64,
    pub user_agent: Option<String>,
    pub request_timeout_secs: u64,
    pub trusted_origins: Vec<String>,
}

impl Default for GitHubSection {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            source_extension: ".py".to_string(),
            max_attempts: retry.max_attempts,
            budget_secs: retry.budget.as_secs(),
            user_agent: None,
            request_timeout_secs: 60,
            trusted_origins: vec![DEFAULT_RAW_CONTENT_ORIGIN.to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSection {
    pub explain_per_minute: usize,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            explain_per_minute: 10,
        }
    }
}

/// Loads the optional YAML file and the environment secrets into an [`AppConfig`].
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let file = match path {
        Some(path) => read_static_config(path)?,
        None => {
            info!("No config file given, using defaults");
            StaticConfig::default()
        }
    };

    let api_key = match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!(env = API_KEY_ENV, "Completion API key is not set");
            return Err(anyhow!("{API_KEY_ENV} must be set"));
        }
    };
    let token = std::env::var(GITHUB_TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty());
    if token.is_none() {
        warn!(env = GITHUB_TOKEN_ENV, "No GitHub token set, using unauthenticated requests");
    }

    let config = into_app_config(file, api_key, token)?;
    config.trace_loaded();
    Ok(config)
}

fn read_static_config(path: &Path) -> Result<StaticConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    match serde_yaml::from_str::<Option<StaticConfig>>(&content) {
        Ok(parsed) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(parsed.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn into_app_config(file: StaticConfig, api_key: String, token: Option<String>) -> Result<AppConfig> {
    if file.github.max_attempts == 0 {
        return Err(anyhow!("github.max_attempts must be at least 1"));
    }
    if file.completion.max_concurrency == 0 {
        return Err(anyhow!("completion.max_concurrency must be at least 1"));
    }

    let completion = CompletionConfig {
        api_key,
        base_url: file.completion.base_url,
        model: file.completion.model,
        max_tokens: file.completion.max_tokens,
        temperature: file.completion.temperature,
        request_timeout: Duration::from_secs(file.completion.request_timeout_secs),
        max_concurrency: file.completion.max_concurrency,
    };

    let defaults = GitHubConfig::default();
    let github = GitHubConfig {
        token,
        api_base: file.github.api_base,
        source_extension: file.github.source_extension,
        user_agent: file.github.user_agent.unwrap_or(defaults.user_agent),
        request_timeout: Duration::from_secs(file.github.request_timeout_secs),
        retry: RetryPolicy {
            max_attempts: file.github.max_attempts,
            budget: Duration::from_secs(file.github.budget_secs),
        },
        trusted_origins: file.github.trusted_origins,
    };

    Ok(AppConfig {
        bind: file.server.bind,
        trust_forwarded_for: file.server.trust_forwarded_for,
        output: OutputConfig {
            dir: file.output.dir,
            markdown_name: file.output.markdown_name,
            html_name: file.output.html_name,
        },
        completion,
        github,
        explain_per_minute: file.rate_limit.explain_per_minute,
    })
}
