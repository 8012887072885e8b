//! Stats command implementation

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::dataset::stats;
use crate::enrich::PassKind;
use crate::model;

pub fn run(config: &Config, root: Option<PathBuf>) -> Result<()> {
    let root = root.unwrap_or_else(|| config.data_root());
    let files = stats::find_files(&root, &config.data.file_name);

    if files.is_empty() {
        println!("No {} files under {}.", config.data.file_name, root.display());
        return Ok(());
    }

    let mut totals: Vec<(PassKind, stats::Coverage)> = PassKind::ALL
        .iter()
        .map(|&k| (k, stats::Coverage::default()))
        .collect();
    let mut conversations = 0;
    let mut user_messages = 0;

    for path in &files {
        let records = match model::load_conversations(path) {
            Ok(r) => r,
            Err(e) => {
                println!("⚠️  {}: {:#}", path.display(), e);
                continue;
            }
        };
        let file = stats::file_stats(path, &records);
        conversations += file.conversations;
        user_messages += file.user_messages;

        let label = path
            .strip_prefix(&root)
            .unwrap_or(path)
            .display()
            .to_string();
        println!(
            "\n📁 {} ({} conversations, {} user messages)",
            label, file.conversations, file.user_messages
        );
        for ((kind, coverage), (_, total)) in file.passes.iter().zip(totals.iter_mut()) {
            print_row(*kind, coverage);
            total.enriched += coverage.enriched;
            total.errored += coverage.errored;
            total.not_applicable += coverage.not_applicable;
            total.pending += coverage.pending;
        }
    }

    println!("\n{}", "=".repeat(70));
    println!(
        "{} files, {} conversations, {} user messages",
        files.len(),
        conversations,
        user_messages
    );
    for (kind, coverage) in &totals {
        print_row(*kind, coverage);
    }
    Ok(())
}

fn print_row(kind: PassKind, coverage: &stats::Coverage) {
    println!(
        "   {:<22} done {:<6} errors {:<6} n/a {:<6} pending {}",
        kind.as_str(),
        coverage.enriched,
        coverage.errored,
        coverage.not_applicable,
        coverage.pending
    );
}
