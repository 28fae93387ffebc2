//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.linetalk/config.json`) and environment.
//! Credentials are usually supplied through the environment (`CHANNEL_ACCESS_TOKEN`,
//! `CHANNEL_SECRET`, `A3RT_TALKAPI_KEY`, `A3RT_TALKAPI_URL`), which override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config. Immutable once loaded; shared as `Arc<Config>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE Messaging API credentials.
    #[serde(default)]
    pub line: LineConfig,

    /// A3RT Talk API settings.
    #[serde(default)]
    pub talk: TalkConfig,

    /// Background work queue sizing.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    8000
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// LINE channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Long-lived channel access token. Overridden by CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Channel secret used to verify `x-line-signature`. Overridden by CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Messaging API base URL (default "https://api.line.me").
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

fn default_line_api_base() -> String {
    crate::line::LINE_API_BASE.to_string()
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: None,
            channel_secret: None,
            api_base: default_line_api_base(),
        }
    }
}

/// A3RT Talk API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkConfig {
    /// Overridden by A3RT_TALKAPI_KEY env.
    pub api_key: Option<String>,
    /// Full endpoint URL, e.g. "https://api.a3rt.recruit.co.jp/talk/v1/smalltalk". Overridden by A3RT_TALKAPI_URL env.
    pub api_url: Option<String>,
    /// Request timeout in seconds (default 5).
    #[serde(default = "default_talk_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_talk_timeout_secs() -> u64 {
    5
}

impl Default for TalkConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            timeout_secs: default_talk_timeout_secs(),
        }
    }
}

/// Work queue sizing for webhook processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Number of worker tasks draining the queue (default 4).
    #[serde(default = "default_dispatch_workers")]
    pub workers: usize,
    /// Max queued webhook batches before `/callback` has to wait for a slot (default 64).
    #[serde(default = "default_dispatch_queue_capacity")]
    pub queue_capacity: usize,
    /// How long `/callback` waits for a free queue slot before answering 503 (default 1000 ms).
    #[serde(default = "default_dispatch_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
}

fn default_dispatch_workers() -> usize {
    4
}

fn default_dispatch_queue_capacity() -> usize {
    64
}

fn default_dispatch_submit_timeout_ms() -> u64 {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_dispatch_workers(),
            queue_capacity: default_dispatch_queue_capacity(),
            submit_timeout_ms: default_dispatch_submit_timeout_ms(),
        }
    }
}

/// Credentials required to serve webhooks, resolved from config and environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub channel_access_token: String,
    pub channel_secret: String,
    pub talk_api_key: String,
    pub talk_api_url: String,
}

impl Config {
    /// Apply process environment overrides in place.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup` (variable name -> value). Empty or whitespace-only
    /// values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).and_then(|s| non_empty(Some(&s)));
        if let Some(v) = get("CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = Some(v);
        }
        if let Some(v) = get("CHANNEL_SECRET") {
            self.line.channel_secret = Some(v);
        }
        if let Some(v) = get("A3RT_TALKAPI_KEY") {
            self.talk.api_key = Some(v);
        }
        if let Some(v) = get("A3RT_TALKAPI_URL") {
            self.talk.api_url = Some(v);
        }
    }

    /// Channel secret, trimmed; fails when absent or blank.
    pub fn require_channel_secret(&self) -> Result<String> {
        non_empty(self.line.channel_secret.as_deref())
            .ok_or_else(|| anyhow::anyhow!("missing credentials: CHANNEL_SECRET"))
    }

    /// Talk API key and URL, trimmed; fails naming whichever is absent or blank.
    pub fn require_talk(&self) -> Result<(String, String)> {
        let key = non_empty(self.talk.api_key.as_deref());
        let url = non_empty(self.talk.api_url.as_deref());
        match (key, url) {
            (Some(k), Some(u)) => Ok((k, u)),
            (None, Some(_)) => anyhow::bail!("missing credentials: A3RT_TALKAPI_KEY"),
            (Some(_), None) => anyhow::bail!("missing credentials: A3RT_TALKAPI_URL"),
            (None, None) => {
                anyhow::bail!("missing credentials: A3RT_TALKAPI_KEY, A3RT_TALKAPI_URL")
            }
        }
    }

    /// Return all credentials or fail naming every one that is missing.
    pub fn require_credentials(&self) -> Result<Credentials> {
        let token = non_empty(self.line.channel_access_token.as_deref());
        let secret = non_empty(self.line.channel_secret.as_deref());
        let key = non_empty(self.talk.api_key.as_deref());
        let url = non_empty(self.talk.api_url.as_deref());
        let mut missing = Vec::new();
        if token.is_none() {
            missing.push("CHANNEL_ACCESS_TOKEN");
        }
        if secret.is_none() {
            missing.push("CHANNEL_SECRET");
        }
        if key.is_none() {
            missing.push("A3RT_TALKAPI_KEY");
        }
        if url.is_none() {
            missing.push("A3RT_TALKAPI_URL");
        }
        match (token, secret, key, url) {
            (Some(t), Some(s), Some(k), Some(u)) => Ok(Credentials {
                channel_access_token: t,
                channel_secret: s,
                talk_api_key: k,
                talk_api_url: u,
            }),
            _ => anyhow::bail!("missing credentials: {}", missing.join(", ")),
        }
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("LINETALK_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".linetalk").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Environment overrides are applied after the file is read.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    config.apply_env();
    Ok((config, path))
}

/// Write a default config file (pretty JSON) if none exists. Returns true when a file was written.
pub fn init_config(path: &std::path::Path) -> Result<bool> {
    if path.exists() {
        log::debug!("config already exists at {}, skipping", path.display());
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
    }
    let body = serde_json::to_string_pretty(&Config::default())?;
    std::fs::write(path, body)
        .with_context(|| format!("writing default config to {}", path.display()))?;
    log::info!("created default config at {}", path.display());
    Ok(true)
}
