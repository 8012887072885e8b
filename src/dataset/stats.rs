//! Enrichment coverage per file

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::enrich::PassKind;
use crate::model::Conversation;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub enriched: usize,
    pub errored: usize,
    pub not_applicable: usize,
    /// Eligible user messages with no marker yet
    pub pending: usize,
}

#[derive(Debug)]
pub struct FileStats {
    pub path: PathBuf,
    pub conversations: usize,
    pub messages: usize,
    pub user_messages: usize,
    pub passes: Vec<(PassKind, Coverage)>,
}

pub fn coverage(records: &[Conversation], kind: PassKind) -> Coverage {
    let mut coverage = Coverage::default();
    for (_, message) in records.iter().flat_map(|c| c.user_messages()) {
        if message.has_field(kind.result_field()) {
            coverage.enriched += 1;
        } else if message.has_field(kind.error_field()) {
            coverage.errored += 1;
        } else if message.has_field(kind.skipped_field()) {
            coverage.not_applicable += 1;
        } else if !message.source_text(kind.source_field()).trim().is_empty() {
            coverage.pending += 1;
        }
    }
    coverage
}

pub fn file_stats(path: &Path, records: &[Conversation]) -> FileStats {
    FileStats {
        path: path.to_path_buf(),
        conversations: records.len(),
        messages: records.iter().map(|c| c.messages.len()).sum(),
        user_messages: records.iter().map(|c| c.user_messages().count()).sum(),
        passes: PassKind::ALL
            .iter()
            .map(|&kind| (kind, coverage(records, kind)))
            .collect(),
    }
}

/// JSON files under `root` named `file_name`, sorted
pub fn find_files(root: &Path, file_name: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str() == Some(file_name))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_coverage_counts_each_state_once() {
        let mut done = Message::user("a");
        done.annotate("content_en", json!("A"));
        let mut failed = Message::user("b");
        failed.annotate("translation_error", json!("timeout"));
        let mut english = Message::user("hello");
        english.annotate("content_transliterated_skipped", json!("en"));

        let records = vec![Conversation {
            messages: vec![
                done,
                failed,
                english,
                Message::user("c"),
                Message::user(""),
                Message::assistant("reply"),
            ],
            ..Default::default()
        }];

        let translate = coverage(&records, PassKind::Translate);
        assert_eq!(
            translate,
            Coverage {
                enriched: 1,
                errored: 1,
                not_applicable: 0,
                pending: 2
            }
        );
        let transliterate = coverage(&records, PassKind::Transliterate);
        assert_eq!(transliterate.not_applicable, 1);
        assert_eq!(transliterate.pending, 3);

        // nothing to translate until a standalone question exists
        assert_eq!(coverage(&records, PassKind::StandaloneTranslate).pending, 0);

        let stats = file_stats(Path::new("x.json"), &records);
        assert_eq!(stats.messages, 6);
        assert_eq!(stats.user_messages, 5);
        assert_eq!(stats.passes.len(), PassKind::ALL.len());
    }

    #[test]
    fn test_find_files_walks_day_folders() {
        let dir = tempdir().unwrap();
        for day in ["19_Nov_2025", "20_Nov_2025"] {
            let folder = dir.path().join(day);
            std::fs::create_dir_all(&folder).unwrap();
            std::fs::write(folder.join("conversations.json"), "[]").unwrap();
            std::fs::write(folder.join("notes.json"), "[]").unwrap();
        }
        let files = find_files(dir.path(), "conversations.json");
        assert_eq!(files.len(), 2);
        assert!(files[0].starts_with(dir.path().join("19_Nov_2025")));
    }
}
