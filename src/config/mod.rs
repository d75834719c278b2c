//! Configuration (layered: defaults < TOML file < environment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DocentError;

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV: &str = "DOCENT_CONFIG";

/// Upper bound for the session durations: one year.
pub const MAX_SESSION_SECS: u64 = 365 * 24 * 60 * 60;

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocentConfig {
    pub model: ModelConfig,
    pub tool_server: ToolServerConfig,
    pub retrieval: RetrievalConfig,
    pub sessions: SessionConfig,
    pub server: ServerConfig,
}

/// Which model the agents talk to.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model_id: "gpt-4o-mini".into(),
            api_key: None,
            base_url: None,
            temperature: Some(0.2),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ModelConfig {
    /// Apply a `provider:model` (or bare `model`) selector.
    pub fn set_selector(&mut self, selector: &str) -> Result<(), DocentError> {
        let (provider, model) = match selector.split_once(':') {
            Some((provider, model)) => (Some(provider.trim()), model.trim()),
            None => (None, selector.trim()),
        };
        if model.is_empty() || provider.is_some_and(str::is_empty) {
            return Err(DocentError::Configuration(format!(
                "Invalid model selector '{selector}'. Use provider:model (e.g. openai:gpt-4o)"
            )));
        }
        if let Some(provider) = provider {
            self.provider = provider.to_string();
        }
        self.model_id = model.to_string();
        Ok(())
    }
}

/// The sibling process hosting the component metadata tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolServerConfig {
    /// Executable to spawn. `None` leaves the channel permanently unavailable.
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Remote tool enumerating every component.
    pub list_tool: String,
    /// Remote tool returning details for a batch of component names.
    pub details_tool: String,
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            list_tool: "list_components".into(),
            details_tool: "get_component_details".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Search endpoint of the documentation index.
    pub endpoint: Option<String>,
    pub top_k: usize,
    /// Build the index at startup instead of on the first query.
    pub eager: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            top_k: 5,
            eager: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted.
    pub idle_ttl_secs: u64,
    /// Delay between an access and the eviction check it schedules.
    pub check_delay_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 600,
            check_delay_secs: 300,
        }
    }
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn check_delay(&self) -> Duration {
        Duration::from_secs(self.check_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".into(),
            log_level: "info".into(),
            log_format: "pretty".into(),
        }
    }
}

impl DocentConfig {
    /// Load configuration for the service.
    ///
    /// Reads `.env` when present, then the TOML file at `path` (or
    /// `$DOCENT_CONFIG`), then environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, DocentError> {
        let _ = dotenvy::dotenv();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DocentError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            DocentError::Configuration(msg) => {
                DocentError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, DocentError> {
        toml::from_str(raw).map_err(|e| DocentError::Configuration(e.to_string()))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), DocentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(selector) = lookup("DOCENT_MODEL") {
            self.model.set_selector(&selector)?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.model.base_url = Some(url);
        }

        if let Some(command) = lookup("DOCENT_TOOL_SERVER_COMMAND") {
            self.tool_server.command = Some(command).filter(|c| !c.trim().is_empty());
        }
        if let Some(args) = lookup("DOCENT_TOOL_SERVER_ARGS") {
            self.tool_server.args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Some(endpoint) = lookup("DOCENT_INDEX_URL") {
            self.retrieval.endpoint = Some(endpoint);
        }
        if let Some(top_k) = lookup("DOCENT_TOP_K") {
            self.retrieval.top_k = parse_number("DOCENT_TOP_K", &top_k)?;
        }

        if let Some(secs) = lookup("DOCENT_SESSION_IDLE_SECS") {
            self.sessions.idle_ttl_secs = parse_number("DOCENT_SESSION_IDLE_SECS", &secs)?;
        }
        if let Some(secs) = lookup("DOCENT_SESSION_CHECK_SECS") {
            self.sessions.check_delay_secs = parse_number("DOCENT_SESSION_CHECK_SECS", &secs)?;
        }

        if let Some(bind) = lookup("DOCENT_BIND") {
            self.server.bind = bind;
        }
        if let Some(level) = lookup("DOCENT_LOG") {
            self.server.log_level = level;
        }
        if let Some(format) = lookup("DOCENT_LOG_FORMAT") {
            self.server.log_format = format;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DocentError> {
        if self.model.model_id.trim().is_empty() {
            return Err(DocentError::Configuration("model.model_id must not be empty".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(DocentError::Configuration("retrieval.top_k must be at least 1".into()));
        }
        for (key, secs) in [
            ("sessions.idle_ttl_secs", self.sessions.idle_ttl_secs),
            ("sessions.check_delay_secs", self.sessions.check_delay_secs),
        ] {
            if secs > MAX_SESSION_SECS {
                return Err(DocentError::Configuration(format!(
                    "{key} ({secs}) must not exceed {MAX_SESSION_SECS} (one year)"
                )));
            }
        }
        if self.sessions.idle_ttl_secs <= self.sessions.check_delay_secs {
            return Err(DocentError::Configuration(format!(
                "sessions.idle_ttl_secs ({}) must exceed sessions.check_delay_secs ({})",
                self.sessions.idle_ttl_secs, self.sessions.check_delay_secs
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, DocentError> {
    raw.trim()
        .parse()
        .map_err(|_| DocentError::Configuration(format!("{key} must be a number, got '{raw}'")))
}
