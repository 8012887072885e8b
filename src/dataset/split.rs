//! Split one export into per-day files

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::{self, Conversation};

#[derive(Debug, Default)]
pub struct DateSplit {
    pub days: BTreeMap<NaiveDate, Vec<Conversation>>,
    /// Conversations with no usable date
    pub undated: Vec<Conversation>,
}

pub fn split_by_date(records: Vec<Conversation>) -> DateSplit {
    let mut split = DateSplit::default();
    for conversation in records {
        match conversation.date() {
            Some(day) => split.days.entry(day).or_default().push(conversation),
            None => split.undated.push(conversation),
        }
    }
    split
}

pub fn output_path(out_dir: &Path, day: NaiveDate) -> PathBuf {
    out_dir.join(format!("conversations_{}.json", day.format("%Y-%m-%d")))
}

/// Write one file per day, replacing existing ones
pub fn write_split(out_dir: &Path, split: &DateSplit) -> Result<Vec<(PathBuf, usize)>> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = vec![];
    for (day, conversations) in &split.days {
        let path = output_path(out_dir, *day);
        model::save_conversations(&path, conversations)?;
        written.push((path, conversations.len()));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn dated(id: &str, date: &str) -> Conversation {
        serde_json::from_value(json!({"_id": id, "conv_date": date, "messages": []})).unwrap()
    }

    #[test]
    fn test_groups_by_day_in_order() {
        let records = vec![
            dated("a", "2025-11-20T10:00:00Z"),
            dated("b", "2025-11-19T23:59:00Z"),
            dated("c", "2025-11-20"),
            Conversation::default(),
        ];
        let split = split_by_date(records);
        let days: Vec<_> = split.days.keys().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2025-11-19", "2025-11-20"]);
        let ids: Vec<String> = split.days.values().last().unwrap().iter().map(|c| c.key()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(split.undated.len(), 1);
    }

    #[test]
    fn test_write_split_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("conversations_by_date");
        let split = split_by_date(vec![dated("a", "2025-11-20"), dated("b", "2025-11-21")]);
        let written = write_split(&out, &split).unwrap();
        assert_eq!(written.len(), 2);
        assert!(out.join("conversations_2025-11-20.json").exists());
        let back = model::load_conversations(&out.join("conversations_2025-11-21.json")).unwrap();
        assert_eq!(back[0].key(), "b");
    }
}
