use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ReplyTemplates;
use crate::bot::oauth::Credentials;
use crate::bot::responder::ReplyMode;
use crate::generator::GenerationParams;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Directory for state files (logs, model, cursor). Defaults to current directory.
    data_dir: Option<String>,
    /// Upper bound for every outbound HTTP call.
    #[serde(default = "default_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default)]
    api: ApiSection,
    #[serde(default)]
    bot: BotSection,
}

#[derive(Deserialize, Default)]
struct ApiSection {
    bind: Option<String>,
    model_path: Option<String>,
    /// Base URL of the text-generation server. Generative replies are disabled without it.
    generator_url: Option<String>,
    #[serde(default)]
    replies: RepliesSection,
    max_new_tokens: Option<u32>,
    top_k: Option<u32>,
    seed: Option<u64>,
}

#[derive(Deserialize, Default)]
struct RepliesSection {
    positive: Option<String>,
    negative: Option<String>,
}

#[derive(Deserialize, Default)]
struct BotSection {
    /// Base URL of the reply API.
    api_url: Option<String>,
    #[serde(default)]
    reply_mode: ReplyMode,
    poll_interval_secs: Option<u64>,
    twitter_api_url: Option<String>,
    #[serde(default)]
    cursor_backend: CursorBackend,
    cursor_path: Option<String>,
    /// Consecutive fetch failures before the poller gives up (null = never).
    max_fetch_attempts: Option<u32>,
    api_key: Option<String>,
    api_key_secret: Option<String>,
    access_token: Option<String>,
    access_token_secret: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where the poller keeps its cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorBackend {
    /// Single-value text file, replaced atomically.
    #[default]
    File,
    /// SQLite database that also journals every reply.
    Sqlite,
}

pub struct Config {
    /// Directory for state files (logs, model, cursor).
    pub data_dir: PathBuf,
    pub api: ApiConfig,
    pub bot: BotConfig,
}

/// Settings for the reply API server.
pub struct ApiConfig {
    pub bind: SocketAddr,
    pub model_path: PathBuf,
    pub generator_url: Option<String>,
    pub replies: ReplyTemplates,
    pub generation: GenerationParams,
    pub request_timeout: Duration,
}

/// Settings for the mention poller.
pub struct BotConfig {
    pub api_url: String,
    pub reply_mode: ReplyMode,
    pub poll_interval: Duration,
    pub twitter_api_url: String,
    pub cursor_backend: CursorBackend,
    pub cursor_path: PathBuf,
    pub max_fetch_attempts: Option<u32>,
    pub request_timeout: Duration,
    api_key: Option<String>,
    api_key_secret: Option<String>,
    access_token: Option<String>,
    access_token_secret: Option<String>,
}

impl BotConfig {
    /// The four feed credentials. Any missing one is an error.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        fn require(value: &Option<String>, name: &str) -> Result<String, ConfigError> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v.clone()),
                _ => Err(ConfigError::Validation(format!(
                    "missing credential '{}' (set bot.{} or {})",
                    name,
                    name,
                    name.to_uppercase()
                ))),
            }
        }

        Ok(Credentials {
            consumer_key: require(&self.api_key, "api_key")?,
            consumer_secret: require(&self.api_key_secret, "api_key_secret")?,
            access_token: require(&self.access_token, "access_token")?,
            access_token_secret: require(&self.access_token_secret, "access_token_secret")?,
        })
    }
}

fn validate_url(url: &str, field: &str) -> Result<String, ConfigError> {
    reqwest::Url::parse(url)
        .map_err(|e| ConfigError::Validation(format!("{field} '{url}' is not a valid URL: {e}")))?;
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    /// Load from a JSON file, filling missing credentials from the environment.
    /// `main` loads a `.env` file into the environment first, if one exists.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be > 0".into()));
        }
        let request_timeout = Duration::from_secs(file.request_timeout_secs);

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        // API section
        let api = file.api;
        let bind_str = api.bind.unwrap_or_else(|| "127.0.0.1:8000".to_string());
        let bind: SocketAddr = bind_str.parse().map_err(|_| {
            ConfigError::Validation(format!("api.bind '{bind_str}' is not a socket address"))
        })?;
        let generator_url = api
            .generator_url
            .map(|u| validate_url(&u, "api.generator_url"))
            .transpose()?;

        let defaults = ReplyTemplates::default();
        let replies = ReplyTemplates {
            positive: api.replies.positive.unwrap_or(defaults.positive),
            negative: api.replies.negative.unwrap_or(defaults.negative),
        };

        let generation_defaults = GenerationParams::default();
        let generation = GenerationParams {
            max_new_tokens: api.max_new_tokens.unwrap_or(generation_defaults.max_new_tokens),
            top_k: api.top_k.unwrap_or(generation_defaults.top_k),
            seed: api.seed.unwrap_or(generation_defaults.seed),
        };

        let api = ApiConfig {
            bind,
            model_path: api
                .model_path
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("sentiment_model.json")),
            generator_url,
            replies,
            generation,
            request_timeout,
        };

        // Bot section
        let bot = file.bot;
        let poll_interval_secs = bot.poll_interval_secs.unwrap_or(60);
        if poll_interval_secs == 0 {
            return Err(ConfigError::Validation("bot.poll_interval_secs must be > 0".into()));
        }
        if bot.max_fetch_attempts == Some(0) {
            return Err(ConfigError::Validation(
                "bot.max_fetch_attempts must be > 0 (omit it to retry forever)".into(),
            ));
        }

        let api_url = validate_url(
            bot.api_url.as_deref().unwrap_or("http://127.0.0.1:8000"),
            "bot.api_url",
        )?;
        let twitter_api_url = validate_url(
            bot.twitter_api_url.as_deref().unwrap_or("https://api.twitter.com"),
            "bot.twitter_api_url",
        )?;

        let cursor_path = bot.cursor_path.map(PathBuf::from).unwrap_or_else(|| {
            match bot.cursor_backend {
                CursorBackend::File => data_dir.join("last_seen_id.txt"),
                CursorBackend::Sqlite => data_dir.join("state.db"),
            }
        });

        let bot = BotConfig {
            api_url,
            reply_mode: bot.reply_mode,
            poll_interval: Duration::from_secs(poll_interval_secs),
            twitter_api_url,
            cursor_backend: bot.cursor_backend,
            cursor_path,
            max_fetch_attempts: bot.max_fetch_attempts,
            request_timeout,
            api_key: bot.api_key.or_else(|| env("API_KEY")),
            api_key_secret: bot.api_key_secret.or_else(|| env("API_KEY_SECRET")),
            access_token: bot.access_token.or_else(|| env("ACCESS_TOKEN")),
            access_token_secret: bot.access_token_secret.or_else(|| env("ACCESS_TOKEN_SECRET")),
        };

        Ok(Self { data_dir, api, bot })
    }
}
