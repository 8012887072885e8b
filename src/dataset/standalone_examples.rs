//! Curated rephrasing examples for the standalone-question prompt
//!
//! The examples file is plain text: numbered blocks separated by a line of
//! 40 dashes, and terminated by one. Blocks are only ever appended.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::path::Path;

use crate::model::{history_before, Conversation, Turn};

pub const SEPARATOR: &str = "----------------------------------------";

const INPUT_PREFIX: &str = "Follow Up Input:";

/// Flag set on a message once it has been appended
pub const ADDED_FIELD: &str = "added_to_standalone_examples";

/// Human-authored standalone rephrasing
pub const CORRECTION_FIELD: &str = "correct_translation";

/// True when some block already has exactly this follow-up input
pub fn contains_input(existing: &str, input: &str) -> bool {
    existing
        .lines()
        .filter_map(|line| line.trim().strip_prefix(INPUT_PREFIX))
        .any(|found| found.trim() == input)
}

pub fn next_example_number(existing: &str) -> Result<usize> {
    let pattern = Regex::new(r"Example (\d+):")?;
    let max = pattern
        .captures_iter(existing)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .max();
    Ok(max.map_or(1, |n| n + 1))
}

pub fn format_example(
    history: &[Turn],
    input: &str,
    wrong: Option<&str>,
    correct: &str,
    number: usize,
) -> String {
    let mut lines = vec![format!("Example {number}:"), "Chat History:".to_string()];
    if history.is_empty() {
        lines.push("None".to_string());
    }
    for turn in history {
        lines.push(format!("{}: {}", turn.role, turn.content));
    }
    lines.push(format!("{INPUT_PREFIX} {input}"));
    match wrong.map(str::trim).filter(|w| !w.is_empty()) {
        Some(wrong) => lines.push(format!("Wrong Standalone: {wrong}")),
        None => lines.push("Wrong Standalone: None".to_string()),
    }
    lines.push(format!("Correct Standalone Question: {correct}"));
    lines.join("\n")
}

/// Append `block` as the last example of the file, creating it if needed
pub fn append_block(path: &Path, block: &str) -> Result<()> {
    let existing = read_examples(path)?;

    let mut body = existing.trim_end();
    while let Some(stripped) = body.strip_suffix(SEPARATOR) {
        body = stripped.trim_end();
    }

    let mut content = String::with_capacity(body.len() + block.len() + 2 * SEPARATOR.len());
    if !body.is_empty() {
        content.push_str(body);
        content.push('\n');
        content.push_str(SEPARATOR);
        content.push('\n');
    }
    content.push_str(block);
    content.push('\n');
    content.push_str(SEPARATOR);
    content.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_examples(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Turn a corrected user message into a new example and flag the message.
///
/// Returns the example number. The caller saves the conversation file.
pub fn add_message(
    conversation: &mut Conversation,
    message_index: usize,
    examples_path: &Path,
) -> Result<usize> {
    let Some(message) = conversation.messages.get(message_index) else {
        bail!("Invalid message index: {}", message_index);
    };
    if !message.is_user() {
        bail!("Message {} is not a user message", message_index);
    }
    if message.field_bool(ADDED_FIELD) == Some(true) {
        bail!("Message {} was already added to the standalone examples", message_index);
    }
    let correct = message.field_str(CORRECTION_FIELD).unwrap_or("").trim();
    if correct.is_empty() {
        bail!("Message {} has no {}; add one first", message_index, CORRECTION_FIELD);
    }
    let input = message.text().trim();
    if input.is_empty() {
        bail!("Message {} has no content", message_index);
    }

    let existing = read_examples(examples_path)?;
    if contains_input(&existing, input) {
        bail!("An example with this follow-up input already exists");
    }

    let number = next_example_number(&existing)?;
    let block = format_example(
        &history_before(&conversation.messages, message_index),
        input,
        message.field_str("standalone_question"),
        correct,
        number,
    );
    append_block(examples_path, &block)?;

    conversation.messages[message_index].set_field(ADDED_FIELD, Value::Bool(true));
    Ok(number)
}
