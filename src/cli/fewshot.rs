//! Few-shot commands

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dataset::{fewshot, review, standalone_examples};
use crate::model;
use crate::store::RunLedger;

pub fn build(
    config: &Config,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    output: Option<PathBuf>,
) -> Result<()> {
    let start = start.unwrap_or(config.fewshot.start_date);
    let end = end.unwrap_or_else(|| fewshot::default_end_date(Utc::now().date_naive()));
    let output = output.unwrap_or_else(|| config.fewshot_path());

    if end < start {
        bail!("End date {} is before start date {}", end, start);
    }

    println!("Scanning {} to {}...", start, end);
    let files = fewshot::daily_files(&config.data_root(), &config.data.file_name, start, end);
    if files.is_empty() {
        println!("No conversation files found in range.");
        return Ok(());
    }

    let set = fewshot::build(&files);
    for (path, reason) in &set.failures {
        println!("   ⚠️  {}: {}", path.display(), reason);
    }

    fewshot::save_few_shot(&output, &set.examples)?;

    let (common, uncommon) = set.distribution();
    println!("\n{}", "=".repeat(60));
    println!("Files read:        {}", set.files_read);
    println!("Examples:          {}", set.examples.len());
    println!("  common:          {}", common);
    println!("  uncommon:        {}", uncommon);
    println!("Saved to:          {}", output.display());
    println!("{}", "=".repeat(60));
    Ok(())
}

/// Append a corrected user message to the standalone examples file
pub fn append_standalone(
    config: &Config,
    ledger: &RunLedger,
    file: &Path,
    conversation: &str,
    message: usize,
    examples: Option<PathBuf>,
) -> Result<()> {
    let examples = examples.unwrap_or_else(|| config.standalone_examples_path());
    let mut records = model::load_conversations(file)?;

    let Some(index) = review::find_conversation(&records, conversation) else {
        bail!("Conversation '{}' not found in {}", conversation, file.display());
    };

    let number = standalone_examples::add_message(&mut records[index], message, &examples)?;
    ledger.save_conversations(file, &records)?;

    println!(
        "✅ Added Example {} to {} and flagged message {} of {}",
        number,
        examples.display(),
        message,
        records[index].key()
    );
    Ok(())
}
