//! Conversations where retrieval came back empty for some user message

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::model::{self, Conversation, Message};

fn is_empty_list(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// A user message that went through retrieval with no tool or FAQ hits.
/// Messages that never went through retrieval do not count.
pub fn has_empty_retrieval(message: &Message) -> bool {
    if !message.is_user() {
        return false;
    }
    match message.field("retrieval") {
        Some(Value::Object(retrieval)) => {
            is_empty_list(retrieval.get("tools")) && is_empty_list(retrieval.get("faq"))
        }
        _ => false,
    }
}

pub fn is_excluded(conversation: &Conversation, excluded: &[String]) -> bool {
    conversation
        .farmer_id()
        .map_or(false, |id| excluded.iter().any(|e| *e == id))
}

pub fn select(records: &[Conversation], excluded: &[String]) -> Vec<Conversation> {
    records
        .iter()
        .filter(|c| !is_excluded(c, excluded))
        .filter(|c| c.messages.iter().any(has_empty_retrieval))
        .cloned()
        .collect()
}

/// `<parent folder>_<file stem>.json`, so files from different days do
/// not collide
pub fn output_name(source: &Path) -> String {
    let parent = source
        .parent()
        .and_then(Path::file_name)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{parent}_{stem}.json")
}

/// Filter one file into `out_dir`. Returns the output path and count, or
/// None when nothing matched.
pub fn separate_file(
    source: &Path,
    out_dir: &Path,
    excluded: &[String],
) -> Result<(usize, Option<(PathBuf, usize)>)> {
    let records = model::load_conversations(source)?;
    let selected = select(&records, excluded);
    if selected.is_empty() {
        return Ok((records.len(), None));
    }
    let path = out_dir.join(output_name(source));
    model::save_conversations(&path, &selected)?;
    Ok((records.len(), Some((path, selected.len()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn conversation(farmer: &str, retrieval: Value) -> Conversation {
        serde_json::from_value(json!({
            "farmer_id": farmer,
            "messages": [
                {"role": "user", "content": "q", "retrieval": retrieval},
                {"role": "assistant", "content": "a", "retrieval": {"tools": [], "faq": []}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_retrieval_detection() {
        let hit = conversation("f1", json!({"tools": [{"id": 1}], "faq": []}));
        let miss = conversation("f1", json!({"tools": [], "faq": []}));
        let missing_keys = conversation("f1", json!({}));
        assert!(!has_empty_retrieval(&hit.messages[0]));
        assert!(has_empty_retrieval(&miss.messages[0]));
        assert!(has_empty_retrieval(&missing_keys.messages[0]));
        // assistant turns never count
        assert!(!has_empty_retrieval(&miss.messages[1]));
        assert!(!has_empty_retrieval(&Message::user("no retrieval")));
    }

    #[test]
    fn test_select_skips_excluded_farmers() {
        let records = vec![
            conversation("f1", json!({"tools": [], "faq": []})),
            conversation("tester", json!({"tools": [], "faq": []})),
            conversation("f2", json!({"tools": [], "faq": ["x"]})),
        ];
        let selected = select(&records, &["tester".to_string()]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].farmer_id().as_deref(), Some("f1"));
    }

    #[test]
    fn test_separate_file_names_output_after_folder() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("19_Nov_2025/conversations.json");
        model::save_conversations(
            &source,
            &[conversation("f1", json!({"tools": [], "faq": []}))],
        )
        .unwrap();

        let out = dir.path().join("non_retrieval");
        let (total, written) = separate_file(&source, &out, &[]).unwrap();
        assert_eq!(total, 1);
        let (path, count) = written.unwrap();
        assert_eq!(count, 1);
        assert_eq!(path, out.join("19_Nov_2025_conversations.json"));
        assert!(path.exists());
    }
}
