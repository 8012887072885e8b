//! Common/uncommon classification of user messages
//!
//! A whole conversation's pending user messages go out in one prompt,
//! preceded by the few-shot examples. The model answers with a list of
//! labels in input order.

use serde_json::{json, Value};

use super::{Annotation, ChatClient, ChatMessage, EnrichRequest, Enricher, Outcome, PassKind};
use crate::dataset::fewshot::{FewShotExample, Label};
use crate::error::EnrichError;

pub struct LlmClassifier {
    client: ChatClient,
    examples: Vec<FewShotExample>,
    batch_size: usize,
}

impl LlmClassifier {
    pub fn new(client: ChatClient, examples: Vec<FewShotExample>, batch_size: usize) -> Self {
        Self {
            client,
            examples,
            batch_size: batch_size.max(1),
        }
    }
}

impl Enricher for LlmClassifier {
    fn kind(&self) -> PassKind {
        PassKind::Classify
    }

    fn enrich(&self, request: &EnrichRequest) -> Result<Outcome, EnrichError> {
        let mut outcomes = self.enrich_batch(std::slice::from_ref(request))?;
        outcomes
            .pop()
            .ok_or(EnrichError::CountMismatch { expected: 1, actual: 0 })
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn enrich_batch(&self, requests: &[EnrichRequest]) -> Result<Vec<Outcome>, EnrichError> {
        let messages: Vec<&str> = requests.iter().map(|r| r.content.as_str()).collect();
        let prompt = build_prompt(&messages, &self.examples);
        let raw = self
            .client
            .complete(&[ChatMessage::user(prompt)], Some(response_format()))?;
        let labels = parse_labels(&raw, requests.len())?;
        Ok(labels
            .into_iter()
            .map(|common| Outcome::Enriched(Annotation::Flag(common)))
            .collect())
    }
}

pub fn build_prompt(messages: &[&str], examples: &[FewShotExample]) -> String {
    let mut parts = vec![
        "Classify each message as 'common' or 'uncommon' based on the following examples:\n"
            .to_string(),
    ];
    for example in examples {
        parts.push(format!(
            "Input: {}\nOutput: {}\n",
            example.input,
            example.output.as_str()
        ));
    }
    parts.push("Now classify these messages:\n".to_string());
    for (i, message) in messages.iter().enumerate() {
        parts.push(format!("{}. {}\n", i + 1, message));
    }
    parts.push("\nReturn classifications in the same order as the input messages.".to_string());
    parts.join("\n")
}

fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "message_classifications",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "classifications": {
                        "type": "array",
                        "description": "List of classifications for each message, in order",
                        "items": {"type": "string", "enum": ["common", "uncommon"]}
                    }
                },
                "required": ["classifications"],
                "additionalProperties": false
            }
        }
    })
}

/// Parse the model's answer into one flag per message (`true` = common).
/// Accepts `{"classifications": [...]}` or a bare JSON array.
pub fn parse_labels(raw: &str, expected: usize) -> Result<Vec<bool>, EnrichError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(o) => o
            .get("classifications")
            .and_then(Value::as_array)
            .ok_or_else(|| EnrichError::Response(format!("no classifications in {raw}")))?,
        _ => return Err(EnrichError::Response(format!("unexpected classification {raw}"))),
    };

    if items.len() != expected {
        return Err(EnrichError::CountMismatch {
            expected,
            actual: items.len(),
        });
    }

    items
        .iter()
        .map(|item| match item.as_str().map(Label::parse) {
            Some(Some(label)) => Ok(label.is_common()),
            _ => Err(EnrichError::Response(format!("unknown label {item}"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(input: &str, output: Label) -> FewShotExample {
        FewShotExample {
            conversation_id: "c1".to_string(),
            user_message_index: 0,
            input: input.to_string(),
            output,
        }
    }

    #[test]
    fn test_prompt_lists_examples_then_numbered_messages() {
        let examples = vec![
            example("नमस्ते", Label::Common),
            example("my tomato leaves curl at the tips", Label::Uncommon),
        ];
        let prompt = build_prompt(&["hello", "Should I water my crop?"], &examples);

        assert!(prompt.contains("Input: नमस्ते\nOutput: common"));
        assert!(prompt.contains("Output: uncommon"));
        let examples_at = prompt.find("Input: नमस्ते").unwrap();
        let messages_at = prompt.find("1. hello").unwrap();
        assert!(examples_at < messages_at);
        assert!(prompt.contains("2. Should I water my crop?"));
    }

    #[test]
    fn test_parse_labels_object_and_array() {
        let flags = parse_labels(r#"{"classifications": ["common", "uncommon"]}"#, 2).unwrap();
        assert_eq!(flags, vec![true, false]);

        let flags = parse_labels(r#"["uncommon"]"#, 1).unwrap();
        assert_eq!(flags, vec![false]);
    }

    #[test]
    fn test_parse_labels_rejects_count_mismatch() {
        let err = parse_labels(r#"{"classifications": ["common"]}"#, 3).unwrap_err();
        assert!(matches!(
            err,
            EnrichError::CountMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_parse_labels_rejects_unknown_label() {
        assert!(parse_labels(r#"["maybe"]"#, 1).is_err());
        assert!(parse_labels("not json", 1).is_err());
    }
}
