//! OpenRouter gateway (OpenAI-compatible Chat Completions, non-streaming).

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::providers::ModelGateway;
use crate::providers::shared::{
    GatewayError, GatewayResult, USER_AGENT, resolve_api_key, resolve_base_url,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenRouter API configuration.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// `None` when no key is configured; requests then fail with an auth error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// `None` disables the request timeout.
    pub timeout: Option<Duration>,
    pub include_openrouter_headers: bool,
}

impl OpenRouterConfig {
    /// Builds the gateway config from the loaded [`Config`] plus environment.
    ///
    /// Environment variables:
    /// - `OPENROUTER_API_KEY` (fallback if not in config)
    /// - `OPENROUTER_BASE_URL` (overrides config)
    /// - `OPENROUTER_SITE_URL`, `OPENROUTER_APP_NAME` (optional attribution headers)
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = &config.providers.openrouter;
        let api_key = resolve_api_key(provider.effective_api_key(), API_KEY_ENV);
        let base_url = resolve_base_url(
            provider.effective_base_url(),
            BASE_URL_ENV,
            DEFAULT_BASE_URL,
            "OpenRouter",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.request_timeout(),
            include_openrouter_headers: true,
        })
    }
}

/// OpenRouter gateway. One POST per [`ModelGateway::transform`] call.
pub struct OpenRouterGateway {
    config: OpenRouterConfig,
    http: reqwest::Client,
    extra_headers: HeaderMap,
}

impl OpenRouterGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        let extra_headers = build_openrouter_headers(config.include_openrouter_headers);

        Ok(Self {
            config,
            http,
            extra_headers,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, source_text: &str, system_prompt: &str) -> GatewayResult<String> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(GatewayError::auth(format!(
                "No API key available. Set {API_KEY_ENV} or api_key in [providers.openrouter]."
            )));
        };

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: source_text,
                },
            ],
            temperature: self.config.temperature,
        };

        let headers = build_headers(api_key, &self.extra_headers)?;
        let url = format!("{}{}", self.config.base_url, CHAT_COMPLETIONS_PATH);
        tracing::debug!(model = %self.config.model, %url, "sending chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read error response body");
                    String::new()
                }
            };
            let error = GatewayError::from_status(status.as_u16(), &body, retry_after);
            tracing::warn!(status = status.as_u16(), kind = %error.kind, "chat completion failed");
            return Err(error);
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        let text = extract_completion(&body)?;
        tracing::debug!(chars = text.len(), "chat completion succeeded");
        Ok(text)
    }
}

impl ModelGateway for OpenRouterGateway {
    fn transform(
        &self,
        source_text: &str,
        system_prompt: &str,
    ) -> impl Future<Output = GatewayResult<String>> + Send {
        self.send(source_text, system_prompt)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Pulls `choices[0].message.content` out of a success body.
fn extract_completion(body: &str) -> GatewayResult<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        GatewayError::malformed(format!("Failed to parse completion response: {e}"))
            .with_details(body)
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| {
            GatewayError::malformed("Response has no choices[0].message.content").with_details(body)
        })
}

fn build_headers(api_key: &str, extra_headers: &HeaderMap) -> GatewayResult<HeaderMap> {
    let authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| GatewayError::auth("API key contains invalid header characters"))?;

    let mut headers = HeaderMap::new();
    headers.insert("Authorization", authorization);
    headers.insert("content-type", HeaderValue::from_static("application/json"));

    for (name, value) in extra_headers {
        headers.insert(name, value.clone());
    }

    Ok(headers)
}

fn build_openrouter_headers(include_openrouter_headers: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if include_openrouter_headers {
        if let Ok(site_url) = std::env::var("OPENROUTER_SITE_URL")
            && let Ok(value) = HeaderValue::from_str(site_url.trim())
            && !site_url.trim().is_empty()
        {
            headers.insert("HTTP-Referer", value);
        }
        let app_name = std::env::var("OPENROUTER_APP_NAME")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "retext".to_string());
        if let Ok(value) = HeaderValue::from_str(app_name.trim()) {
            headers.insert("X-Title", value);
        }
    }

    headers
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::transport(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        GatewayError::transport(format!("Connection failed: {e}"))
    } else if e.is_decode() {
        GatewayError::malformed(format!("Failed to read response body: {e}"))
    } else {
        GatewayError::transport(format!("Network error: {e}"))
    }
}
