//! Conversation and message records
//!
//! Records are exported by an external step and mutated in place by the
//! annotation passes. Only the message list is typed; everything else is
//! kept as raw JSON and read through accessors, so that a load/save cycle
//! preserves fields added by other tools, nulls included.

mod files;

pub use files::{
    daily_file, daily_folder_name, discover, file_digest, load_conversations,
    save_conversations,
};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One chat session. Only `messages` is typed; every other top-level key
/// stays in `extra` whatever its JSON type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One turn of a conversation plus any enrichment fields attached to it.
/// `role`/`type`/`content`/`timestamp` are read through accessors so that
/// nulls and unexpected types survive a save untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "user" | "human" => Role::User,
            "assistant" | "ai" => Role::Assistant,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(s) => s,
        }
    }
}

/// A prior turn handed to an enrichment backend as context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("role".to_string(), Value::String(role.to_string()));
        fields.insert("content".to_string(), Value::String(content.to_string()));
        Self { fields }
    }

    pub fn user(content: &str) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new("assistant", content)
    }

    /// Speaker of the turn. Exports carry `type`, `role` or both; `type`
    /// wins when both are set.
    pub fn role(&self) -> Role {
        ["type", "role"]
            .iter()
            .filter_map(|name| self.field_str(name))
            .find(|s| !s.is_empty())
            .map(Role::parse)
            .unwrap_or_else(|| Role::Other(String::new()))
    }

    pub fn is_user(&self) -> bool {
        self.role() == Role::User
    }

    /// Message content, empty when missing, null or not a string
    pub fn text(&self) -> &str {
        self.field_str("content").unwrap_or("")
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn field_bool(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    /// Text of `content` or of another string field
    pub fn source_text(&self, name: &str) -> &str {
        self.field_str(name).unwrap_or("")
    }

    /// Attach an enrichment field. Existing fields are never overwritten;
    /// returns false when the field was already present.
    pub fn annotate(&mut self, name: &str, value: Value) -> bool {
        if self.fields.contains_key(name) {
            return false;
        }
        self.fields.insert(name.to_string(), value);
        true
    }

    /// Overwrite a field. Reserved for human corrections.
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Remove a field so the next pass recomputes it
    pub fn clear(&mut self, name: &str) -> bool {
        self.fields.remove(name).is_some()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.fields.get("timestamp").and_then(parse_timestamp)
    }
}

/// Prior turns with non-empty content, oldest first
pub fn history_before(messages: &[Message], index: usize) -> Vec<Turn> {
    messages
        .iter()
        .take(index)
        .filter(|m| !m.text().trim().is_empty())
        .map(|m| Turn {
            role: m.role().as_str().to_string(),
            content: m.text().to_string(),
        })
        .collect()
}

impl Conversation {
    pub fn with_id(id: &str, messages: Vec<Message>) -> Self {
        let mut extra = Map::new();
        extra.insert("_id".to_string(), Value::String(id.to_string()));
        Self { messages, extra }
    }

    /// Exported `_id`, in whatever shape the export wrote it
    pub fn id(&self) -> Option<&Value> {
        self.extra.get("_id")
    }

    /// Farmer identifier as text; numeric ids are formatted
    pub fn farmer_id(&self) -> Option<String> {
        self.extra.get("farmer_id").and_then(id_string)
    }

    pub fn language(&self) -> Option<&str> {
        self.extra
            .get("language")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Stable identity for the conversation.
    ///
    /// Uses the exported `_id` (plain or `{"$oid": ..}`), then a
    /// `conversation_id` field, then a digest of the message sequence.
    pub fn key(&self) -> String {
        if let Some(id) = self.id().and_then(id_string) {
            return id;
        }
        if let Some(id) = self.extra.get("conversation_id").and_then(id_string) {
            return id;
        }

        let mut hasher = Sha256::new();
        for msg in &self.messages {
            hasher.update(msg.role().as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(msg.text().as_bytes());
            hasher.update([0x1eu8]);
        }
        let digest = hex::encode(hasher.finalize());
        format!("sha:{}", &digest[..12])
    }

    /// Calendar day of the conversation: `conv_date` if present,
    /// otherwise the first message timestamp
    pub fn date(&self) -> Option<NaiveDate> {
        if let Some(value) = self.extra.get("conv_date") {
            let raw = match value {
                Value::String(s) => Some(s.as_str()),
                Value::Object(o) => o.get("$date").and_then(Value::as_str),
                _ => None,
            };
            if let Some(day) = raw
                .and_then(|s| s.split('T').next())
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            {
                return Some(day);
            }
        }

        self.messages
            .iter()
            .find_map(Message::timestamp)
            .map(|ts| ts.date_naive())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.extra
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn user_messages(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages.iter().enumerate().filter(|(_, m)| m.is_user())
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => o.get("$oid").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

/// Parse an exported timestamp: RFC 3339 text, `{"$date": "..."}`,
/// `{"$date": millis}` or `{"$date": {"$numberLong": "millis"}}`
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(o) => {
            let inner = o.get("$date")?;
            match inner {
                Value::Object(long) => long
                    .get("$numberLong")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                other => parse_timestamp(other),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "_id": {"$oid": "6651f0c2a1"},
            "farmer_id": "f-17",
            "language": "hi",
            "farmer_plot_ids": ["p1", "p2"],
            "messages": [
                {"role": "user", "content": "पानी कब दें?", "en": "When to water?",
                 "timestamp": {"$date": "2025-07-29T06:52:19.040Z"}}
            ]
        });
        let conv: Conversation = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(conv.farmer_id().as_deref(), Some("f-17"));
        assert_eq!(conv.language(), Some("hi"));
        assert_eq!(conv.messages[0].field_str("en"), Some("When to water?"));
        assert_eq!(serde_json::to_value(&conv).unwrap(), raw);
    }

    #[test]
    fn test_role_prefers_type_then_role() {
        let msg: Message = serde_json::from_value(json!({"type": "user", "content": "hi"})).unwrap();
        assert!(msg.is_user());
        let msg: Message =
            serde_json::from_value(json!({"type": "human", "role": "assistant"})).unwrap();
        assert!(msg.is_user());
        let msg: Message =
            serde_json::from_value(json!({"type": null, "role": "assistant"})).unwrap();
        assert_eq!(msg.role(), Role::Assistant);
        let msg: Message = serde_json::from_value(json!({"content": "orphan"})).unwrap();
        assert_eq!(msg.role(), Role::Other(String::new()));
    }

    #[test]
    fn test_null_and_foreign_types_round_trip() {
        let raw = json!({
            "_id": "c1",
            "farmer_id": 4711,
            "language": null,
            "messages": [{"role": "user", "content": null, "timestamp": null, "type": 3}]
        });
        let conv: Conversation = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(conv.farmer_id().as_deref(), Some("4711"));
        assert_eq!(conv.language(), None);
        assert!(conv.messages[0].is_user());
        assert_eq!(conv.messages[0].text(), "");
        assert_eq!(conv.messages[0].timestamp(), None);
        assert_eq!(serde_json::to_value(&conv).unwrap(), raw);
    }

    #[test]
    fn test_null_content_is_empty_text() {
        let msg: Message = serde_json::from_value(json!({"role": "user", "content": null})).unwrap();
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_annotate_is_additive() {
        let mut msg = Message::user("Should I water my crop?");
        assert!(msg.annotate("is_query_common", json!(true)));
        assert!(!msg.annotate("is_query_common", json!(false)));
        assert_eq!(msg.field_bool("is_query_common"), Some(true));

        assert!(msg.clear("is_query_common"));
        assert!(msg.annotate("is_query_common", json!(false)));
        assert_eq!(msg.field_bool("is_query_common"), Some(false));
    }

    #[test]
    fn test_key_prefers_exported_id() {
        let conv: Conversation =
            serde_json::from_value(json!({"_id": {"$oid": "abc123"}, "messages": []})).unwrap();
        assert_eq!(conv.key(), "abc123");

        let conv: Conversation =
            serde_json::from_value(json!({"conversation_id": "c-9", "messages": []})).unwrap();
        assert_eq!(conv.key(), "c-9");
    }

    #[test]
    fn test_key_digest_is_stable_and_content_sensitive() {
        let a = Conversation {
            messages: vec![Message::user("hello"), Message::assistant("hi")],
            ..Default::default()
        };
        let mut b = a.clone();
        assert_eq!(a.key(), b.key());
        assert!(a.key().starts_with("sha:"));
        assert_eq!(a.key().len(), "sha:".len() + 12);

        b.messages[0].set_field("content", json!("hello?"));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_date_from_conv_date_then_timestamp() {
        let conv: Conversation = serde_json::from_value(json!({
            "conv_date": "2025-11-19T08:00:00Z",
            "messages": [{"role": "user", "content": "x", "timestamp": "2025-12-01T00:00:00Z"}]
        }))
        .unwrap();
        assert_eq!(conv.date(), NaiveDate::from_ymd_opt(2025, 11, 19));

        let conv: Conversation = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "x",
                          "timestamp": {"$date": {"$numberLong": "1764547200000"}}}]
        }))
        .unwrap();
        assert_eq!(conv.date(), NaiveDate::from_ymd_opt(2025, 12, 1));
    }

    #[test]
    fn test_history_skips_empty_turns() {
        let messages = vec![
            Message::user("drip setup?"),
            Message::assistant(""),
            Message::assistant("Which crop?"),
            Message::user("sugarcane"),
        ];
        let history = history_before(&messages, 3);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].content, "Which crop?");
        assert!(history_before(&messages, 0).is_empty());
    }
}
