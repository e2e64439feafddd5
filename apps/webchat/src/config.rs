use crate::store::{HARD_CAP, RetentionPolicy};
use crate::transport::websocket::config::ChatEndpoint;
use clap::ValueEnum;
use std::env;
use thiserror::Error;

pub const SERVER_ENV: &str = "WEBCHAT_SERVER";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";
/// Mirrors the chat server's default text limit; longer lines are dropped
/// server side without feedback.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 140;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid server origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
    #[error("invalid retention policy: {0}")]
    InvalidRetention(String),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionMode {
    /// Keep up to 50 messages, then trim back to the newest 20
    #[default]
    Soft,
    /// Never hold more than 20 messages
    Hard,
}

/// Server origin as seen from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
}

impl Config {
    pub fn from_env() -> Self {
        let server = env::var(SERVER_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        Self {
            server: normalize_localhost(&server),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
        }
    }
}

/// Localhost resolves to ::1 first on some systems while chat servers
/// usually listen on IPv4 only.
pub fn normalize_localhost(server: &str) -> String {
    for prefix in ["", "http://", "https://", "ws://", "wss://"] {
        let Some(rest) = server.strip_prefix(prefix) else {
            continue;
        };
        if rest == "localhost" || rest.starts_with("localhost:") || rest.starts_with("localhost/")
        {
            return format!("{prefix}127.0.0.1{}", &rest["localhost".len()..]);
        }
    }
    server.to_string()
}

/// Fully resolved settings for one client run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: ChatEndpoint,
    pub retention: RetentionPolicy,
    pub max_input_chars: Option<usize>,
    pub headless: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    server: Option<String>,
    retention: RetentionMode,
    max_messages: Option<usize>,
    trim_to: Option<usize>,
    max_input_chars: Option<usize>,
    headless: bool,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn retention(mut self, mode: RetentionMode) -> Self {
        self.retention = mode;
        self
    }

    pub fn max_messages(mut self, max: Option<usize>) -> Self {
        self.max_messages = max;
        self
    }

    pub fn trim_to(mut self, target: Option<usize>) -> Self {
        self.trim_to = target;
        self
    }

    /// `Some(0)` disables the limit.
    pub fn max_input_chars(mut self, limit: Option<usize>) -> Self {
        self.max_input_chars = limit;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let server = self.server.unwrap_or_else(|| Config::from_env().server);
        let endpoint = ChatEndpoint::from_origin(&normalize_localhost(&server))?;
        let retention = resolve_retention(self.retention, self.max_messages, self.trim_to)?;
        let max_input_chars = match self.max_input_chars {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => Some(DEFAULT_MAX_INPUT_CHARS),
        };
        Ok(ClientConfig {
            endpoint,
            retention,
            max_input_chars,
            headless: self.headless,
        })
    }
}

fn resolve_retention(
    mode: RetentionMode,
    max: Option<usize>,
    target: Option<usize>,
) -> Result<RetentionPolicy, ConfigError> {
    let base = match mode {
        RetentionMode::Soft => RetentionPolicy::soft_cap(),
        RetentionMode::Hard => RetentionPolicy::hard_cap(HARD_CAP)?,
    };
    match (mode, max, target) {
        (_, None, None) => Ok(base),
        (RetentionMode::Hard, Some(limit), None) | (RetentionMode::Hard, None, Some(limit)) => {
            RetentionPolicy::hard_cap(limit)
        }
        (_, max, target) => RetentionPolicy::new(
            max.unwrap_or(base.max()),
            target.unwrap_or(base.target()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // Environment variables are process wide.
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_from_env_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var(SERVER_ENV);
        }
        let config = Config::from_env();
        assert_eq!(config.server, DEFAULT_SERVER);
    }

    #[test]
    fn test_config_from_env_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let original = env::var(SERVER_ENV).ok();

        unsafe {
            env::set_var(SERVER_ENV, "https://localhost:8443");
        }
        let config = Config::from_env();
        assert_eq!(config.server, "https://127.0.0.1:8443");

        unsafe {
            if let Some(orig) = original {
                env::set_var(SERVER_ENV, orig);
            } else {
                env::remove_var(SERVER_ENV);
            }
        }
    }

    #[test]
    fn normalizes_only_the_host() {
        assert_eq!(normalize_localhost("localhost:8080"), "127.0.0.1:8080");
        assert_eq!(normalize_localhost("ws://localhost"), "ws://127.0.0.1");
        assert_eq!(
            normalize_localhost("https://localhost.example.com"),
            "https://localhost.example.com"
        );
        assert_eq!(normalize_localhost("chat.example.com"), "chat.example.com");
    }

    #[test]
    fn builder_defaults_to_soft_cap() {
        let config = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .build()
            .unwrap();
        assert_eq!(config.retention, RetentionPolicy::soft_cap());
        assert_eq!(config.max_input_chars, Some(DEFAULT_MAX_INPUT_CHARS));
        assert_eq!(config.endpoint.url(), "ws://chat.example.com/chat/");
        assert!(!config.headless);
    }

    #[test]
    fn hard_mode_honours_single_override() {
        let config = ClientConfigBuilder::new()
            .server("https://chat.example.com")
            .retention(RetentionMode::Hard)
            .max_messages(Some(5))
            .max_input_chars(Some(0))
            .build()
            .unwrap();
        assert_eq!(config.retention, RetentionPolicy::hard_cap(5).unwrap());
        assert_eq!(config.max_input_chars, None);
        assert_eq!(config.endpoint.url(), "wss://chat.example.com/chat/");
    }

    #[test]
    fn explicit_numbers_are_validated() {
        let err = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .max_messages(Some(10))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRetention(_)));

        let config = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .max_messages(Some(100))
            .trim_to(Some(60))
            .build()
            .unwrap();
        assert_eq!(config.retention, RetentionPolicy::new(100, 60).unwrap());
    }
}
