//! Configuration structures.
//!
//! Configuration is loaded from an optional JSON file and then overridden by
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{Error, Result};

/// Environment variable overriding `api.base_url`.
pub const ENV_API_URL: &str = "MINUTES_API_URL";
/// Environment variable selecting the log format (`json` or `compact`).
pub const ENV_LOG_FORMAT: &str = "MINUTES_LOG_FORMAT";
/// Environment variable overriding `observability.log_level`.
pub const ENV_LOG_LEVEL: &str = "MINUTES_LOG_LEVEL";

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server identity advertised during `initialize`.
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend REST API.
    #[serde(default)]
    pub api: ApiConfig,

    /// Browser authorization flow.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Stdio transport limits.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Tool behaviour knobs.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from `path` (if given), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(format!("cannot read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&content).map_err(|e| {
                    Error::config(format!("invalid config {}: {}", path.display(), e))
                })?
            }
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.observability.json_logs = format.eq_ignore_ascii_case("json");
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.observability.log_level = level;
        }
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::config(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.tools.max_quantity == 0 {
            return Err(Error::config("tools.max_quantity must be positive"));
        }
        if self.api.max_image_bytes == 0 {
            return Err(Error::config("api.max_image_bytes must be positive"));
        }
        if self.transport.max_message_bytes == 0 {
            return Err(Error::config("transport.max_message_bytes must be positive"));
        }
        Ok(())
    }
}

/// Server identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name reported in `serverInfo`.
    pub name: String,

    /// Version reported in `serverInfo`.
    pub version: String,

    /// Usage instructions handed to the assistant on `initialize`.
    pub instructions: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "minutes-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

const DEFAULT_INSTRUCTIONS: &str = "\
You are a quick-commerce shopping assistant. Call login_user before any cart, \
address or order tool. Search with search_products for direct item requests; \
when the user mentions a dish, ask how many people, dietary preference and \
allergies before searching. Always preview with add_to_cart (confirmed=false) \
and only call it again with confirmed=true after the user agrees. When an \
add_to_cart response carries has_recommendation=true, offer the recommended \
product without being pushy. Every tool returns JSON with success, message \
and optional data; read the message before deciding the next step.";

/// Backend REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the `/api` prefix.
    pub base_url: String,

    /// Whole-request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent to the backend.
    pub user_agent: String,

    /// Largest product image downloaded for display.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_max_image_bytes() -> usize {
    1024 * 1024
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("minutes-mcp/{}", env!("CARGO_PKG_VERSION")),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

/// Browser authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Upper bound on how long a pending authorization code is honoured.
    #[serde(with = "humantime_serde")]
    pub pending_ttl: Duration,

    /// How often the background sweeper evicts expired codes.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Stdio transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Maximum accepted size of one newline-delimited message.
    pub max_message_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Tool behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum quantity of one product per cart line.
    pub max_quantity: u32,

    /// Orders scanned when mining "frequently bought together" suggestions.
    pub recommendation_history_limit: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_quantity: 10,
            recommendation_history_limit: 50,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
