//! Annotate command implementation

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::annotate::{AnnotateOptions, Annotator, RoleFilter, RunSummary};
use crate::config::{Config, Credentials};
use crate::enrich::{build_enricher, PassKind};
use crate::model;
use crate::store::RunLedger;

/// Where the conversations to annotate come from
#[derive(Debug, Default)]
pub struct Target {
    pub files: Vec<PathBuf>,
    pub date: Option<NaiveDate>,
    pub glob: Option<String>,
}

impl Target {
    pub fn resolve(&self, config: &Config) -> Result<Vec<PathBuf>> {
        let mut paths = self.files.clone();
        if let Some(date) = self.date {
            paths.push(model::daily_file(
                &config.data_root(),
                date,
                &config.data.file_name,
            ));
        }
        if let Some(pattern) = &self.glob {
            paths.extend(model::discover(&config.data_root(), pattern)?);
        }
        if paths.is_empty() {
            bail!("No input: pass --file, --date or --glob");
        }
        Ok(paths)
    }
}

#[derive(Debug, Default)]
pub struct Flags {
    pub redo: bool,
    pub retry_errors: bool,
    pub delay_ms: Option<u64>,
    pub all_roles: bool,
}

pub fn options(config: &Config, kind: PassKind, flags: &Flags) -> AnnotateOptions {
    AnnotateOptions {
        delay: flags
            .delay_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or_else(|| config.pass_delay(kind)),
        redo: flags.redo,
        retry_errors: flags.retry_errors,
        roles: if flags.all_roles {
            RoleFilter::All
        } else {
            RoleFilter::User
        },
    }
}

pub fn run(
    config: &Config,
    credentials: &Credentials,
    ledger: &RunLedger,
    kind: PassKind,
    target: &Target,
    flags: &Flags,
) -> Result<()> {
    let paths = target.resolve(config)?;
    // Missing credentials fail here, before any file is opened
    let enricher = build_enricher(kind, config, credentials)?;
    let annotator = Annotator::new(enricher.as_ref(), options(config, kind, flags));

    // A failed file stops that file only
    let mut failed = 0;
    for path in &paths {
        if !path.exists() {
            println!("⚠️  {} not found, skipping", path.display());
            continue;
        }
        println!("📝 {} → {}", kind, path.display());
        match annotator
            .run_file(path, Some(ledger))
            .with_context(|| format!("{} pass aborted on {}", kind, path.display()))
        {
            Ok(summary) => print_summary(&summary),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{e:#}"), "file aborted");
                println!("   ❌ {:#}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files aborted", failed, paths.len());
    }
    Ok(())
}

pub fn print_summary(summary: &RunSummary) {
    let counts = &summary.counts;
    println!(
        "   {} conversations, {} calls, {} checkpoints",
        summary.conversations, summary.calls, summary.checkpoints
    );
    println!(
        "   enriched {} | not applicable {} | errors {} | already done {}",
        counts.enriched, counts.not_applicable, counts.errored, counts.skipped
    );
}
