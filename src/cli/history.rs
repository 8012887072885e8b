//! History command implementation: past runs from the ledger

use anyhow::Result;

use super::truncate;
use crate::enrich::PassKind;
use crate::store::RunLedger;

pub fn run(ledger: &RunLedger, pass: Option<PassKind>, run: Option<&str>) -> Result<()> {
    match run {
        Some(id) => show_run(ledger, id),
        None => list_runs(ledger, pass),
    }
}

fn list_runs(ledger: &RunLedger, pass: Option<PassKind>) -> Result<()> {
    let runs = ledger.list_runs(pass)?;

    if runs.is_empty() {
        println!("No runs recorded yet. Run 'furrow annotate' first.");
        return Ok(());
    }

    println!(
        "{:<10} {:<20} {:<21} {:<10} {:<8} {:<8} {:<6} {}",
        "ID", "Started", "Pass", "Status", "Enriched", "Errors", "N/A", "File"
    );
    println!("{}", "-".repeat(110));

    for run in runs {
        println!(
            "{:<10} {:<20} {:<21} {:<10} {:<8} {:<8} {:<6} {}",
            &run.id[..8.min(run.id.len())],
            run.started_at.as_deref().unwrap_or("-"),
            run.pass,
            run.status,
            run.enriched,
            run.errored,
            run.not_applicable,
            truncate(&run.source_path, 50),
        );
    }

    Ok(())
}

fn show_run(ledger: &RunLedger, id: &str) -> Result<()> {
    let run = match ledger.get_run(id)? {
        Some(r) => r,
        None => {
            println!("Run '{}' not found.", id);
            return Ok(());
        }
    };

    println!("\n{}", "=".repeat(80));
    println!("Run: {} ({})", run.id, run.pass);
    println!("File: {}", run.source_path);
    println!(
        "Status: {} | started {} | finished {}",
        run.status,
        run.started_at.as_deref().unwrap_or("?"),
        run.finished_at.as_deref().unwrap_or("-")
    );
    println!(
        "Conversations: {} | calls: {} | enriched: {} | n/a: {} | errors: {}",
        run.conversations, run.calls, run.enriched, run.not_applicable, run.errored
    );
    println!("{}", "=".repeat(80));

    let checkpoints = ledger.get_checkpoints(&run.id)?;
    if checkpoints.is_empty() {
        println!("\nNo checkpoints (nothing was pending).");
        return Ok(());
    }

    for cp in checkpoints {
        println!(
            "  #{:<5} {:<26} +{} enriched, {} n/a, {} errors, {} done before ({})",
            cp.conversation_index,
            truncate(&cp.conversation_key, 26),
            cp.enriched,
            cp.not_applicable,
            cp.errored,
            cp.skipped,
            cp.saved_at.as_deref().unwrap_or("?")
        );
    }

    Ok(())
}
