//! Review commands: list, tag and correct user messages

use anyhow::{bail, Result};
use std::path::Path;

use super::truncate;
use crate::dataset::review::{self, ReviewFilter};
use crate::model::{self, Conversation};
use crate::store::RunLedger;

fn resolve(records: &[Conversation], conversation: &str, file: &Path) -> Result<usize> {
    match review::find_conversation(records, conversation) {
        Some(index) => Ok(index),
        None => bail!("Conversation '{}' not found in {}", conversation, file.display()),
    }
}

pub fn list(file: &Path, filter: ReviewFilter) -> Result<()> {
    let records = model::load_conversations(file)?;
    let items = review::collect(&records, filter);

    if items.is_empty() {
        println!("No matching user messages in {}.", file.display());
        return Ok(());
    }

    println!(
        "{:<6} {:<14} {:<5} {:<9} {:<40} {}",
        "Conv", "Key", "Msg", "Label", "Original", "Standalone"
    );
    println!("{}", "-".repeat(110));

    for item in &items {
        let label = match item.is_common {
            Some(true) => "common",
            Some(false) => "uncommon",
            None => "-",
        };
        let standalone = item
            .correction
            .as_deref()
            .map(|c| format!("✎ {}", c))
            .or_else(|| item.standalone.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<14} {:<5} {:<9} {:<40} {}",
            item.conversation_index,
            truncate(&item.conversation_key, 14),
            item.message_index,
            label,
            truncate(&item.original, 40),
            truncate(&standalone, 40),
        );
    }

    println!("\n{} messages", items.len());
    Ok(())
}

pub fn tag(
    ledger: &RunLedger,
    file: &Path,
    conversation: &str,
    message: usize,
    common: bool,
) -> Result<()> {
    let mut records = model::load_conversations(file)?;
    let index = resolve(&records, conversation, file)?;

    let previous = review::set_label(&mut records, index, message, common)?;
    ledger.save_conversations(file, &records)?;

    let describe = |flag: Option<bool>| match flag {
        Some(true) => "common",
        Some(false) => "uncommon",
        None => "unclassified",
    };
    println!(
        "✓ {} message {}: {} → {}",
        records[index].key(),
        message,
        describe(previous),
        describe(Some(common))
    );
    Ok(())
}

pub fn correct(
    ledger: &RunLedger,
    file: &Path,
    conversation: &str,
    message: usize,
    text: &str,
) -> Result<()> {
    let mut records = model::load_conversations(file)?;
    let index = resolve(&records, conversation, file)?;

    review::set_correction(&mut records, index, message, text)?;
    ledger.save_conversations(file, &records)?;

    println!("✓ Saved correction for {} message {}", records[index].key(), message);
    Ok(())
}
