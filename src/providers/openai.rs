use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::retry::{Backoff, RATE_LIMIT_BASE_DELAY, is_rate_limited, retry_after};
use super::{
    BatchItem, ProviderUsage, ToolSpec, TranslateFuture, TranslateRequest, TranslationClient,
    TranslationResult,
};
use crate::error::{Error, Result};
use crate::translations;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const PROVIDER: &str = "OpenAI";

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    base_url: String,
    temperature: f32,
    timeout_secs: u64,
    retry_base_delay: Duration,
    client: reqwest::Client,
}

impl OpenAI {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.5,
            timeout_secs: 30,
            retry_base_delay: RATE_LIMIT_BASE_DELAY,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Per-request timeout in seconds; 0 disables it.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// First delay after a rate-limited response; it doubles on each retry.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                provider: PROVIDER,
                seconds: self.timeout_secs,
            }
        } else {
            Error::Api {
                provider: PROVIDER,
                status: "request failed".to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl TranslationClient for OpenAI {
    fn translate<'a>(
        &'a self,
        batch: &'a [BatchItem],
        request: &'a TranslateRequest,
    ) -> TranslateFuture<'a> {
        Box::pin(call_with_chat_completions(self, batch, request))
    }
}

pub(crate) fn build_request_body(
    model: &str,
    temperature: f32,
    system_prompt: &str,
    user_input: &str,
    tool: &ToolSpec,
) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_input}
        ],
        "tools": [
            {
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters
                }
            }
        ],
        "tool_choice": {"type": "function", "function": {"name": tool.name}}
    })
}

async fn call_with_chat_completions(
    provider: &OpenAI,
    batch: &[BatchItem],
    request: &TranslateRequest,
) -> Result<TranslationResult> {
    let url = format!("{}/chat/completions", provider.base_url);
    let tool = translations::tool_spec(batch.len());
    let system_prompt = translations::render_system_prompt(request, batch.len())?;
    let user_input = translations::render_user_input(batch);
    debug!("system prompt:\n{}", system_prompt);
    debug!("user input: {}", user_input);
    let body = build_request_body(
        &provider.model,
        provider.temperature,
        &system_prompt,
        &user_input,
        &tool,
    );

    let mut backoff = Backoff::with_base_delay(PROVIDER, provider.retry_base_delay);
    loop {
        let mut builder = provider
            .client
            .post(&url)
            .bearer_auth(&provider.key)
            .json(&body);
        if provider.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(provider.timeout_secs));
        }
        let response = builder
            .send()
            .await
            .map_err(|err| provider.request_error(err))?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|err| provider.request_error(err))?;
        if status.is_success() {
            return extract_translations(&text, batch, &provider.model);
        }
        if is_rate_limited(status, &text) && backoff.wait(retry_after).await {
            continue;
        }
        return Err(Error::Api {
            provider: PROVIDER,
            status: status.to_string(),
            message: extract_openai_error(&text).unwrap_or(text),
        });
    }
}

pub(crate) fn extract_translations(
    text: &str,
    batch: &[BatchItem],
    fallback_model: &str,
) -> Result<TranslationResult> {
    let payload: OpenAIResponse = serde_json::from_str(text)
        .map_err(|err| Error::Parse(format!("failed to parse {} response JSON: {}", PROVIDER, err)))?;
    let tool_call = payload
        .choices
        .first()
        .and_then(|choice| choice.message.tool_calls.first())
        .ok_or_else(|| Error::Parse(format!("no tool call returned from {}", PROVIDER)))?;

    if tool_call.function.name != translations::TOOL_NAME {
        return Err(Error::Parse(format!(
            "unexpected tool name '{}' from {}",
            tool_call.function.name, PROVIDER
        )));
    }

    let args: Value = serde_json::from_str(&tool_call.function.arguments)
        .map_err(|err| Error::Parse(format!("failed to parse tool arguments: {}", err)))?;
    let translations = translations::parse_tool_args(args, batch)?;
    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    Ok(TranslationResult {
        translations,
        model,
        usage,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let parts = [
        error.message,
        error.kind.map(|kind| format!("type: {}", kind)),
        error.code.map(|code| format!("code: {}", code)),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>();
    if parts.is_empty() {
        Some("unknown error".to_string())
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}
