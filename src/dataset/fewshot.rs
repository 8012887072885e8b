//! Few-shot example sets for the message classifier
//!
//! Built from user messages in previously classified daily files. Inputs are
//! unique by exact (trimmed) text; the first occurrence wins. A message
//! without a `true` classification counts as uncommon.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::{self, Conversation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Common,
    Uncommon,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Common => "common",
            Label::Uncommon => "uncommon",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "common" => Some(Label::Common),
            "uncommon" => Some(Label::Uncommon),
            _ => None,
        }
    }

    pub fn is_common(&self) -> bool {
        *self == Label::Common
    }

    /// Missing or null flags are uncommon
    pub fn from_flag(flag: Option<bool>) -> Self {
        if flag == Some(true) {
            Label::Common
        } else {
            Label::Uncommon
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub user_message_index: usize,
    pub input: String,
    pub output: Label,
}

#[derive(Debug, Default)]
pub struct FewShotSet {
    pub examples: Vec<FewShotExample>,
    pub files_read: usize,
    /// Files that could not be read, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl FewShotSet {
    /// (common, uncommon)
    pub fn distribution(&self) -> (usize, usize) {
        let common = self.examples.iter().filter(|e| e.output.is_common()).count();
        (common, self.examples.len() - common)
    }
}

/// Last day included by default: the day before yesterday
pub fn default_end_date(today: NaiveDate) -> NaiveDate {
    today - Duration::days(2)
}

/// Daily files between `start` and `end` inclusive that exist on disk
pub fn daily_files(root: &Path, file_name: &str, start: NaiveDate, end: NaiveDate) -> Vec<PathBuf> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| model::daily_file(root, day, file_name))
        .filter(|path| path.exists())
        .collect()
}

/// Build a fresh example set from `files`. Unreadable files are recorded and
/// skipped.
pub fn build(files: &[PathBuf]) -> FewShotSet {
    let mut set = FewShotSet::default();
    let mut seen = HashSet::new();

    for path in files {
        match model::load_conversations(path) {
            Ok(records) => {
                collect(&records, &mut seen, &mut set.examples);
                set.files_read += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                set.failures.push((path.clone(), format!("{e:#}")));
            }
        }
    }

    set
}

/// Append examples for unseen user messages of `records`
pub fn collect(
    records: &[Conversation],
    seen: &mut HashSet<String>,
    examples: &mut Vec<FewShotExample>,
) {
    for conversation in records {
        let conversation_id = conversation.key();
        for (user_index, (_, message)) in conversation.user_messages().enumerate() {
            let input = message.text().trim();
            if input.is_empty() || !seen.insert(input.to_string()) {
                continue;
            }
            examples.push(FewShotExample {
                conversation_id: conversation_id.clone(),
                user_message_index: user_index,
                input: input.to_string(),
                output: Label::from_flag(message.field_bool("is_query_common")),
            });
        }
    }
}

pub fn load_few_shot(path: &Path) -> Result<Vec<FewShotExample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read few-shot examples {}", path.display()))?;
    let examples = serde_json::from_str(&content)
        .with_context(|| format!("Invalid few-shot file {}", path.display()))?;
    Ok(examples)
}

/// Overwrite the example file (4-space indent)
pub fn save_few_shot(path: &Path, examples: &[FewShotExample]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut bytes = vec![];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    examples.serialize(&mut serializer)?;
    bytes.push(b'\n');
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use serde_json::json;
    use tempfile::tempdir;

    fn tagged(text: &str, flag: Option<bool>) -> Message {
        let mut message = Message::user(text);
        if let Some(flag) = flag {
            message.annotate("is_query_common", json!(flag));
        }
        message
    }

    fn conversation(id: &str, messages: Vec<Message>) -> Conversation {
        Conversation::with_id(id, messages)
    }

    #[test]
    fn test_collect_dedupes_and_labels() {
        let records = vec![
            conversation(
                "c1",
                vec![
                    tagged("नमस्ते", Some(true)),
                    Message::assistant("नमस्ते!"),
                    tagged("", None),
                    tagged("leaf curl on tomato", Some(false)),
                ],
            ),
            conversation(
                "c2",
                vec![tagged("  नमस्ते ", Some(false)), tagged("when to spray?", None)],
            ),
        ];

        let mut seen = HashSet::new();
        let mut examples = vec![];
        collect(&records, &mut seen, &mut examples);

        let inputs: Vec<&str> = examples.iter().map(|e| e.input.as_str()).collect();
        assert_eq!(inputs, vec!["नमस्ते", "leaf curl on tomato", "when to spray?"]);
        assert_eq!(examples[0].output, Label::Common);
        assert_eq!(examples[1].output, Label::Uncommon);
        // user index counts the empty message too
        assert_eq!(examples[1].user_message_index, 2);
        assert_eq!(examples[2].conversation_id, "c2");
        assert_eq!(examples[2].user_message_index, 1);
        assert_eq!(examples[2].output, Label::Uncommon);
    }

    #[test]
    fn test_build_never_emits_duplicate_inputs() {
        let dir = tempdir().unwrap();
        let day1 = NaiveDate::from_ymd_opt(2025, 11, 19).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        for day in [day1, day2] {
            let path = model::daily_file(dir.path(), day, "conversations.json");
            let records = vec![conversation(
                "c",
                vec![tagged("hello", Some(true)), tagged(&format!("{day}"), None)],
            )];
            model::save_conversations(&path, &records).unwrap();
        }
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();

        let mut files = daily_files(dir.path(), "conversations.json", day1, day2);
        assert_eq!(files.len(), 2);
        files.push(broken.clone());

        let set = build(&files);
        assert_eq!(set.files_read, 2);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].0, broken);
        assert_eq!(set.examples.len(), 3);
        let unique: HashSet<&str> = set.examples.iter().map(|e| e.input.as_str()).collect();
        assert_eq!(unique.len(), set.examples.len());
        assert_eq!(set.distribution(), (1, 2));
    }

    #[test]
    fn test_daily_files_range_is_inclusive() {
        let dir = tempdir().unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 11, 28).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        for day in start.iter_days().take(4) {
            let path = model::daily_file(dir.path(), day, "conversations.json");
            model::save_conversations(&path, &[]).unwrap();
        }
        assert_eq!(daily_files(dir.path(), "conversations.json", start, end).len(), 4);
        assert!(daily_files(dir.path(), "conversations.json", end, start).is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("few_shot_examples/few_shot_examples.json");
        let examples = vec![FewShotExample {
            conversation_id: "c1".into(),
            user_message_index: 0,
            input: "नमस्ते".into(),
            output: Label::Common,
        }];
        save_few_shot(&path, &examples).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("    {"));
        assert!(raw.contains("\"output\": \"common\""));
        assert_eq!(load_few_shot(&path).unwrap(), examples);
    }

    #[test]
    fn test_default_end_date() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(
            default_end_date(today),
            NaiveDate::from_ymd_opt(2025, 11, 29).unwrap()
        );
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(Label::parse(" Common "), Some(Label::Common));
        assert_eq!(Label::parse("uncommon"), Some(Label::Uncommon));
        assert_eq!(Label::parse("rare"), None);
        assert_eq!(Label::from_flag(None), Label::Uncommon);
    }
}
