//! Minimal OpenAI-compatible chat completion client

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::EnrichError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

pub struct ChatClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Run one completion at temperature 0 and return the first choice's text
    pub fn complete(
        &self,
        messages: &[ChatMessage],
        response_format: Option<Value>,
    ) -> Result<String, EnrichError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": messages,
        });
        if let Some(format) = response_format {
            body["response_format"] = format;
        }
        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let authorization = format!("Bearer {}", self.api_key);
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", authorization.as_str())
            .header("Content-Type", "application/json")
            .send(body.to_string())?;
        let raw = response.body_mut().read_to_string()?;
        let value: Value = serde_json::from_str(&raw)?;
        parse_completion(&value)
    }
}

pub(crate) fn parse_completion(value: &Value) -> Result<String, EnrichError> {
    value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| EnrichError::Response("completion has no message content".to_string()))
}
