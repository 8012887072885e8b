//! Show command implementation

use anyhow::Result;
use serde_json::Value;
use std::path::Path;

use super::truncate;
use crate::dataset::review;
use crate::enrich::PassKind;
use crate::model::{self, Conversation, Message};

/// Without a conversation, list the file; with one, print its messages and
/// every enrichment attached to them
pub fn run(file: &Path, conversation: Option<&str>, hide_common: bool) -> Result<()> {
    let records = model::load_conversations(file)?;

    match conversation {
        None => list(&records, hide_common),
        Some(query) => match review::find_conversation(&records, query) {
            Some(index) => print_conversation(index, &records[index]),
            None => println!("Conversation '{}' not found.", query),
        },
    }

    Ok(())
}

fn list(records: &[Conversation], hide_common: bool) {
    let shown: Vec<(usize, &Conversation)> = records
        .iter()
        .enumerate()
        .filter(|(_, c)| !hide_common || !review::is_fully_common(c))
        .collect();

    if shown.is_empty() {
        println!("No conversations to show.");
        return;
    }

    println!(
        "{:<6} {:<26} {:<12} {:<12} {:<6} {}",
        "#", "Key", "Date", "Farmer", "User", "First message"
    );
    println!("{}", "-".repeat(100));

    for (index, conversation) in &shown {
        let first = conversation
            .user_messages()
            .map(|(_, m)| m.text())
            .find(|t| !t.trim().is_empty())
            .unwrap_or("-");
        println!(
            "{:<6} {:<26} {:<12} {:<12} {:<6} {}",
            index,
            truncate(&conversation.key(), 26),
            conversation
                .date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(conversation.farmer_id().as_deref().unwrap_or("-"), 12),
            conversation.user_messages().count(),
            truncate(first, 40),
        );
    }

    println!("\n{} of {} conversations", shown.len(), records.len());
}

fn print_conversation(index: usize, conversation: &Conversation) {
    println!("\n{}", "=".repeat(80));
    println!("Conversation #{}: {}", index, conversation.key());
    if let Some(farmer) = conversation.farmer_id() {
        println!("Farmer: {}", farmer);
    }
    if let Some(language) = conversation.language() {
        println!("Language: {}", language);
    }
    if let Some(date) = conversation.date() {
        println!("Date: {}", date);
    }
    let tags = conversation.tags();
    if !tags.is_empty() {
        println!("Tags: {}", tags.join(", "));
    }
    println!("{}", "=".repeat(80));

    if conversation.messages.is_empty() {
        println!("\nNo messages.");
        return;
    }

    for (i, message) in conversation.messages.iter().enumerate() {
        let timestamp = message
            .timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "\n[{}] {} ({})",
            i,
            message.role().as_str().to_uppercase(),
            timestamp
        );
        println!("{}", message.text());
        print_enrichments(message);
        println!("{}", "-".repeat(40));
    }
}

fn print_enrichments(message: &Message) {
    for kind in PassKind::ALL {
        if let Some(value) = message.field(kind.result_field()) {
            println!("  {} {}: {}", icon(kind), kind, display(value));
        }
        if let Some(error) = message.field_str(kind.error_field()) {
            println!("  ⚠️  {} error: {}", kind, error);
        }
        if let Some(reason) = message.field_str(kind.skipped_field()) {
            println!("  ·  {} skipped: {}", kind, reason);
        }
    }
    if let Some(correction) = message.field_str("correct_translation") {
        println!("  ✎ correction: {}", correction);
    }
    if message.field_bool("added_to_standalone_examples") == Some(true) {
        println!("  ★ in standalone examples");
    }
}

fn icon(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Translate | PassKind::StandaloneTranslate => "🌐",
        PassKind::Transliterate => "🔤",
        PassKind::Classify => "🏷️ ",
        PassKind::Standalone => "❓",
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "common".to_string(),
        Value::Bool(false) => "uncommon".to_string(),
        other => other.to_string(),
    }
}
