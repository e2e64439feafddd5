use crate::config::ConfigError;
use url::Url;

/// Path of the chat endpoint on the server's own host.
pub const CHAT_PATH: &str = "/chat/";

/// WebSocket location derived from the server origin the client was pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEndpoint {
    url: String,
    use_tls: bool,
}

impl ChatEndpoint {
    /// Accepts `http(s)://host[:port]`, `ws(s)://host[:port]`, or a bare
    /// `host[:port]`. Encrypted origins map to `wss`, everything else to `ws`;
    /// any path on the origin is ignored.
    pub fn from_origin(origin: &str) -> Result<Self, ConfigError> {
        let trimmed = origin.trim();
        if trimmed.is_empty() {
            return Err(invalid(origin, "origin cannot be empty"));
        }
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{}{trimmed}", infer_scheme(trimmed))
        };
        let parsed = Url::parse(&with_scheme).map_err(|err| invalid(origin, &err.to_string()))?;
        let use_tls = match parsed.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => return Err(invalid(origin, &format!("unsupported scheme '{other}'"))),
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid(origin, "origin has no host"))?;
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let scheme = if use_tls { "wss://" } else { "ws://" };
        Ok(Self {
            url: format!("{scheme}{authority}{CHAT_PATH}"),
            use_tls,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }
}

fn invalid(origin: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidOrigin {
        origin: origin.to_string(),
        reason: reason.to_string(),
    }
}

/// Bare hosts on loopback, private ranges or mDNS `.local` names are assumed
/// to serve plain http.
fn infer_scheme(base: &str) -> &'static str {
    let host_part = base
        .split('/')
        .next()
        .unwrap_or(base)
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or(base);
    let host_lower = host_part.to_ascii_lowercase();
    let host_only = host_lower.split(':').next().unwrap_or(&host_lower);
    if host_only == "localhost"
        || host_only == "0.0.0.0"
        || host_only.starts_with("127.")
        || host_lower == "::1"
        || host_only.starts_with("10.")
        || host_only.starts_with("192.168.")
        || host_only.ends_with(".local")
        || host_only
            .strip_prefix("172.")
            .and_then(|rest| rest.split('.').next())
            .and_then(|octet| octet.parse::<u8>().ok())
            .map(|octet| (16..32).contains(&octet))
            .unwrap_or(false)
    {
        "http://"
    } else {
        "https://"
    }
}
