//! Azure Translator v3 REST client

use serde_json::{json, Value};
use std::time::Duration;

use crate::error::EnrichError;

pub struct AzureTranslatorClient {
    agent: ureq::Agent,
    endpoint: String,
    key: String,
    region: String,
}

impl AzureTranslatorClient {
    pub fn new(endpoint: &str, key: &str, region: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            region: region.to_string(),
        }
    }

    fn post(&self, path: &str, query: &[(&str, &str)], text: &str) -> Result<Value, EnrichError> {
        let url = format!("{}{}", self.endpoint, path);
        tracing::debug!(%url, chars = text.chars().count(), "azure translator request");

        let body = json!([{ "Text": text }]);
        let mut request = self
            .agent
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", self.key.as_str())
            .header("Ocp-Apim-Subscription-Region", self.region.as_str())
            .header("Content-Type", "application/json")
            .query("api-version", "3.0");
        for (key, value) in query {
            request = request.query(*key, *value);
        }

        let mut response = request.send(body.to_string())?;
        let raw = response.body_mut().read_to_string()?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn translate(&self, text: &str, to: &str) -> Result<String, EnrichError> {
        let value = self.post("/translate", &[("to", to)], text)?;
        parse_translation(&value)
    }

    /// Detected language code and confidence
    /// Detected language code and confidence
    pub fn detect(&self, text: &str) -> Result<(String, f64), EnrichError> {
        let value = self.post("/detect", &[], text)?;
        parse_detection(&value)
            .ok_or_else(|| EnrichError::Response("detect response has no language".to_string()))
    }

    pub fn transliterate(
        &self,
        text: &str,
        language: &str,
        from_script: &str,
        to_script: &str,
    ) -> Result<String, EnrichError> {
        let value = self.post(
            "/transliterate",
            &[
                ("language", language),
                ("fromScript", from_script),
                ("toScript", to_script),
            ],
            text,
        )?;
        parse_transliteration(&value)
    }
}

fn first(value: &Value) -> Result<&Value, EnrichError> {
    value
        .as_array()
        .and_then(|items| items.first())
        .ok_or_else(|| EnrichError::Response(format!("expected a non-empty array, got {value}")))
}

pub(crate) fn parse_translation(value: &Value) -> Result<String, EnrichError> {
    first(value)?
        .get("translations")
        .and_then(Value::as_array)
        .and_then(|t| t.first())
        .and_then(|t| t.get("text"))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| EnrichError::Response("text was not translated".to_string()))
}

pub(crate) fn parse_detection(value: &Value) -> Option<(String, f64)> {
    let item = value.as_array()?.first()?;
    let language = item.get("language")?.as_str()?.to_string();
    let score = item.get("score").and_then(Value::as_f64).unwrap_or(0.0);
    Some((language, score))
}

pub(crate) fn parse_transliteration(value: &Value) -> Result<String, EnrichError> {
    first(value)?
        .get("text")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| EnrichError::Response("transliteration response has no text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translation() {
        let value = json!([{
            "detectedLanguage": {"language": "hi", "score": 1.0},
            "translations": [{"text": "When should I water?", "to": "en"}]
        }]);
        assert_eq!(parse_translation(&value).unwrap(), "When should I water?");
        assert!(parse_translation(&json!([])).is_err());
        assert!(parse_translation(&json!([{"translations": []}])).is_err());
    }

    #[test]
    fn test_parse_detection() {
        let value = json!([{"language": "mr", "score": 0.92, "isTranslationSupported": true}]);
        assert_eq!(parse_detection(&value), Some(("mr".to_string(), 0.92)));
        assert_eq!(parse_detection(&json!({"error": {}})), None);
    }

    #[test]
    fn test_parse_transliteration() {
        let value = json!([{"text": "paani kab dena hai", "script": "Latn"}]);
        assert_eq!(parse_transliteration(&value).unwrap(), "paani kab dena hai");
    }
}
