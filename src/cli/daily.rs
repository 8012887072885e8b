//! Daily command implementation

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};

use super::annotate::{options, print_summary, Flags};
use crate::annotate::Annotator;
use crate::config::{Config, Credentials};
use crate::enrich::build_enricher;
use crate::model;
use crate::store::RunLedger;

/// Run the configured passes over one day's export (default: yesterday, UTC)
pub fn run(
    config: &Config,
    credentials: &Credentials,
    ledger: &RunLedger,
    date: Option<NaiveDate>,
) -> Result<()> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));
    let path = model::daily_file(&config.data_root(), date, &config.data.file_name);

    if !path.exists() {
        println!("No export for {} at {}", date, path.display());
        return Ok(());
    }

    // Build every backend first so a missing credential stops the run early
    let enrichers = config
        .daily
        .passes
        .iter()
        .map(|&kind| build_enricher(kind, config, credentials))
        .collect::<Result<Vec<_>>>()?;

    println!("📅 {} ({})", date, path.display());
    for enricher in &enrichers {
        let kind = enricher.kind();
        println!("\n▶ {}", kind);
        let annotator = Annotator::new(enricher.as_ref(), options(config, kind, &Flags::default()));
        let summary = annotator
            .run_file(&path, Some(ledger))
            .with_context(|| format!("{} pass aborted on {}", kind, path.display()))?;
        print_summary(&summary);
    }

    println!("\n✅ Daily run complete!");
    Ok(())
}
