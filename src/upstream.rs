use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::models::{GeneratedCode, GenerationRequest, Language};

// Longest upstream error body written to the log
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize, Debug)]
struct ChatSettings<'a> {
    model: &'a str,
    temperature: f32,
    context_length: u32,
}

#[derive(Serialize, Debug)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

// Upstream API request format
#[derive(Serialize, Debug)]
struct UpstreamRequest<'a> {
    chat_settings: ChatSettings<'a>,
    messages: Vec<ChatMessage>,
    response_format: Value,
}

// Upstream API response format
#[derive(Deserialize, Debug)]
struct UpstreamResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for the external generation service.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    temperature: f32,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            temperature: config.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One POST to the upstream. `request_id` is sent as `X-Request-Id`.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        request_id: Uuid,
    ) -> Result<GeneratedCode, UpstreamError> {
        let body = UpstreamRequest {
            chat_settings: ChatSettings {
                model: request.model.id(),
                temperature: self.temperature,
                context_length: request.model.max_context_tokens(),
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction(request.language),
                },
                ChatMessage {
                    role: "user",
                    content: user_instruction(request.language, &request.prompt),
                },
            ],
            response_format: response_format(),
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header("X-Request-Id", request_id.to_string())
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(url = %self.url, "Calling upstream");
        let res = builder.send().await.map_err(|e| self.classify(e))?;
        let status = res.status();
        let text = res.text().await.map_err(|e| self.classify(e))?;

        // the body stays in our logs, callers only see the status
        if status.is_server_error() {
            error!(status = status.as_u16(), body = %truncate(&text), "Upstream server error");
            return Err(UpstreamError::ServerError {
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            error!(status = status.as_u16(), body = %truncate(&text), "Upstream rejected request");
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Protocol(format!(
                "unexpected status {}",
                status.as_u16()
            )));
        }

        parse_response(&text)
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            error!(timeout = ?self.timeout, "Upstream timed out");
            UpstreamError::Timeout(self.timeout)
        } else if err.is_decode() {
            UpstreamError::Protocol(err.to_string())
        } else {
            error!(error = %err, "Upstream connection failed");
            UpstreamError::Connection(err.to_string())
        }
    }
}

pub fn system_instruction(language: Language) -> String {
    if language.is_custom() {
        "You are an expert software engineer. Respond only with JSON matching the requested schema."
            .to_string()
    } else {
        format!(
            "You are an expert {language} developer. Respond only with JSON matching the requested schema."
        )
    }
}

pub fn user_instruction(language: Language, prompt: &str) -> String {
    if language.is_custom() {
        prompt.to_string()
    } else {
        format!(
            "Write {language} code for the following task. Include clear comments and proper error handling.\n\nTask: {prompt}"
        )
    }
}

fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "code_generation",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "code": { "type": "string" },
                    "explanation": { "type": "string" }
                },
                "required": ["code"],
                "additionalProperties": false
            }
        }
    })
}

fn parse_response(text: &str) -> Result<GeneratedCode, UpstreamError> {
    let response: UpstreamResponse = serde_json::from_str(text)
        .map_err(|e| UpstreamError::Protocol(format!("invalid response body: {e}")))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| UpstreamError::Protocol("response has no message content".to_string()))?;

    serde_json::from_str(&content)
        .map_err(|e| UpstreamError::Protocol(format!("message content is not valid JSON: {e}")))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
