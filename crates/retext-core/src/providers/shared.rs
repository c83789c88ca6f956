//! Gateway error taxonomy and config resolution helpers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard User-Agent header for retext API requests.
pub const USER_AGENT: &str = concat!("retext/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Config resolution helpers
// ============================================================================

/// Resolves an API key with precedence: config > env.
///
/// Returns `None` when neither source has a non-blank value.
pub fn resolve_api_key(config_api_key: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = config_api_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    std::env::var(env_var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the chosen URL does not parse.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> anyhow::Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, provider_name: &str) -> anyhow::Result<()> {
    use anyhow::Context;

    url::Url::parse(url).with_context(|| format!("Invalid {provider_name} base URL: {url}"))?;
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Categories of gateway failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// Missing or rejected credential (HTTP 401/403)
    Auth,
    /// Remote throttling (HTTP 429)
    RateLimited,
    /// Connection failure or timeout
    Transport,
    /// Success status but the body lacks the expected completion
    MalformedResponse,
    /// Any other non-success HTTP status
    HttpStatus,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayErrorKind::Auth => write!(f, "auth"),
            GatewayErrorKind::RateLimited => write!(f, "rate_limited"),
            GatewayErrorKind::Transport => write!(f, "transport"),
            GatewayErrorKind::MalformedResponse => write!(f, "malformed_response"),
            GatewayErrorKind::HttpStatus => write!(f, "http_status"),
        }
    }
}

/// Structured error from the model gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    /// Error category
    pub kind: GatewayErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
    /// Server-suggested wait before retrying (rate limits only)
    pub retry_after: Option<Duration>,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Auth, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(GatewayErrorKind::RateLimited, message)
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::MalformedResponse, message)
    }

    /// Classifies a non-success HTTP response.
    ///
    /// Pulls `error.message` out of a JSON body when present.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let api_message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        let message = match api_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };

        let error = match status {
            401 | 403 => Self::auth(message),
            429 => Self::rate_limited(message, retry_after),
            _ => Self::new(GatewayErrorKind::HttpStatus, message),
        };
        if body.is_empty() {
            error
        } else {
            error.with_details(body)
        }
    }

    /// Whether a caller-level retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            GatewayErrorKind::RateLimited | GatewayErrorKind::Transport
        )
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GatewayError {}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
