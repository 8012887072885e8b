//! JSON file I/O and discovery for conversation exports

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::Conversation;

pub fn load_conversations(path: &Path) -> Result<Vec<Conversation>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<Conversation> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of conversations", path.display()))?;
    Ok(records)
}

/// Overwrite `path` with the full record set.
///
/// Writes a sibling temp file and renames it over the target, so an
/// interrupted save leaves the previous contents in place. Returns the
/// SHA-256 of the bytes written.
pub fn save_conversations(path: &Path, records: &[Conversation]) -> Result<String> {
    let mut bytes = serde_json::to_vec_pretty(records)?;
    bytes.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(hex::encode(Sha256::digest(&bytes)))
}

pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Folder name for one day of exports, e.g. `19_Nov_2025`
pub fn daily_folder_name(date: NaiveDate) -> String {
    date.format("%d_%b_%Y").to_string()
}

pub fn daily_file(root: &Path, date: NaiveDate, file_name: &str) -> PathBuf {
    root.join(daily_folder_name(date)).join(file_name)
}

/// Files under `root` matching a glob pattern, sorted
pub fn discover(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = root.join(pattern);
    let full = full.to_string_lossy();
    let mut paths = vec![];
    for entry in glob::glob(&full).with_context(|| format!("Bad glob pattern: {}", full))? {
        let path = entry?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
