//! Resumable batch annotation
//!
//! Walks every conversation, offers each eligible message without a marker
//! to the enrichment backend, and attaches exactly one marker per message:
//! result, error, or not-applicable. After each conversation that changed,
//! the caller's checkpoint persists the full record set, so an interrupted
//! run loses at most the conversation in flight and a rerun picks up where
//! the last checkpoint left off.
//!
//! Per message and pass: `unprocessed -> {enriched | errored | not applicable}`.
//! All three end states are terminal; only `redo` or `retry_errors` clears them.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::enrich::{Annotation, EnrichRequest, Enricher, Outcome, PassKind};
use crate::error::EnrichError;
use crate::model::{self, history_before, Conversation, Message};
use crate::store::RunLedger;

/// Which roles a pass looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleFilter {
    #[default]
    User,
    All,
}

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Fixed pause between backend calls
    pub delay: Duration,
    /// Clear all markers of the pass and recompute
    pub redo: bool,
    /// Clear only error markers and recompute those messages
    pub retry_errors: bool,
    pub roles: RoleFilter,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            redo: false,
            retry_errors: false,
            roles: RoleFilter::User,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub enriched: usize,
    pub not_applicable: usize,
    pub errored: usize,
    /// Already carried a marker
    pub skipped: usize,
    /// Wrong role or empty source text
    pub ineligible: usize,
}

impl Counts {
    pub fn add(&mut self, other: &Counts) {
        self.enriched += other.enriched;
        self.not_applicable += other.not_applicable;
        self.errored += other.errored;
        self.skipped += other.skipped;
        self.ineligible += other.ineligible;
    }

    /// Markers written
    pub fn written(&self) -> usize {
        self.enriched + self.not_applicable + self.errored
    }
}

#[derive(Debug, Clone)]
pub struct ConversationReport {
    pub index: usize,
    pub key: String,
    pub counts: Counts,
    pub calls: usize,
    /// Markers removed by redo / retry
    pub cleared: usize,
}

impl ConversationReport {
    pub fn changed(&self) -> bool {
        self.counts.written() > 0 || self.cleared > 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub conversations: usize,
    pub checkpoints: usize,
    pub calls: usize,
    pub counts: Counts,
}

pub struct Annotator<'a> {
    enricher: &'a dyn Enricher,
    options: AnnotateOptions,
}

impl<'a> Annotator<'a> {
    pub fn new(enricher: &'a dyn Enricher, options: AnnotateOptions) -> Self {
        Self { enricher, options }
    }

    pub fn kind(&self) -> PassKind {
        self.enricher.kind()
    }

    /// Annotate `records` in place.
    ///
    /// `checkpoint` runs after every conversation that changed and receives
    /// the full record set. An error from it aborts the run.
    pub fn run<F>(&self, records: &mut [Conversation], mut checkpoint: F) -> Result<RunSummary>
    where
        F: FnMut(&[Conversation], &ConversationReport) -> Result<()>,
    {
        let mut summary = RunSummary::default();
        let mut calls = 0usize;

        for index in 0..records.len() {
            let report = self.process(&mut records[index], index, &mut calls);
            summary.conversations += 1;
            summary.calls += report.calls;
            summary.counts.add(&report.counts);

            if report.changed() {
                checkpoint(records, &report).with_context(|| {
                    format!("checkpoint failed after conversation {}", report.key)
                })?;
                summary.checkpoints += 1;
            }
        }

        Ok(summary)
    }

    /// Load a conversations file, annotate it, and save after every changed
    /// conversation. Runs and checkpoints are recorded in the ledger when
    /// one is given.
    pub fn run_file(&self, path: &Path, ledger: Option<&RunLedger>) -> Result<RunSummary> {
        if let Some(ledger) = ledger {
            if let Some(previous) = ledger.last_digest(path)? {
                let current = model::file_digest(path)?;
                if current != previous {
                    tracing::warn!(
                        path = %path.display(),
                        "file changed since furrow last saved it"
                    );
                }
            }
        }

        let mut records = model::load_conversations(path)?;
        let run_id = match ledger {
            Some(l) => Some(l.begin_run(self.kind(), path)?),
            None => None,
        };

        let result = self.run(&mut records, |records, report| {
            let digest = model::save_conversations(path, records)?;
            if let (Some(ledger), Some(run_id)) = (ledger, run_id.as_deref()) {
                ledger.record_checkpoint(run_id, report)?;
                ledger.record_file_digest(path, &digest, records.len())?;
            }
            tracing::info!(
                conversation = %report.key,
                enriched = report.counts.enriched,
                errored = report.counts.errored,
                "checkpoint saved"
            );
            Ok(())
        });

        if let (Some(ledger), Some(run_id)) = (ledger, run_id.as_deref()) {
            let status = if result.is_ok() { "completed" } else { "aborted" };
            ledger.finish_run(run_id, status)?;
        }

        result
    }

    fn eligible(&self, message: &Message) -> bool {
        if self.options.roles == RoleFilter::User && !message.is_user() {
            return false;
        }
        !message
            .source_text(self.kind().source_field())
            .trim()
            .is_empty()
    }

    fn process(
        &self,
        conversation: &mut Conversation,
        index: usize,
        calls: &mut usize,
    ) -> ConversationReport {
        let kind = self.kind();
        let mut report = ConversationReport {
            index,
            key: conversation.key(),
            counts: Counts::default(),
            calls: 0,
            cleared: 0,
        };

        let mut pending = vec![];
        for (i, message) in conversation.messages.iter_mut().enumerate() {
            if !self.eligible(message) {
                report.counts.ineligible += 1;
                continue;
            }

            if self.options.redo {
                for field in kind.marker_fields() {
                    if message.clear(field) {
                        report.cleared += 1;
                    }
                }
            } else if self.options.retry_errors && message.clear(kind.error_field()) {
                report.cleared += 1;
            }

            if kind.marker_fields().iter().any(|f| message.has_field(f)) {
                report.counts.skipped += 1;
                continue;
            }
            pending.push(i);
        }

        if pending.is_empty() {
            return report;
        }

        let requests: Vec<EnrichRequest> = pending
            .iter()
            .map(|&i| EnrichRequest {
                content: conversation.messages[i]
                    .source_text(kind.source_field())
                    .to_string(),
                history: history_before(&conversation.messages, i),
                language: conversation.language().map(String::from),
            })
            .collect();

        let batch_size = self.enricher.batch_size();
        if batch_size > 1 {
            for (chunk, indices) in requests.chunks(batch_size).zip(pending.chunks(batch_size)) {
                self.pause(calls);
                *calls += 1;
                report.calls += 1;

                let results: Vec<Result<Outcome, EnrichError>> =
                    match self.enricher.enrich_batch(chunk) {
                        Ok(outcomes) if outcomes.len() == chunk.len() => {
                            outcomes.into_iter().map(Ok).collect()
                        }
                        Ok(outcomes) => {
                            let marker = EnrichError::CountMismatch {
                                expected: chunk.len(),
                                actual: outcomes.len(),
                            }
                            .marker();
                            chunk
                                .iter()
                                .map(|_| Err(EnrichError::Other(marker.clone())))
                                .collect()
                        }
                        Err(e) => {
                            tracing::warn!(pass = %kind, conversation = %report.key, error = %e, "batch failed");
                            let marker = e.marker();
                            chunk
                                .iter()
                                .map(|_| Err(EnrichError::Other(marker.clone())))
                                .collect()
                        }
                    };

                for (&i, result) in indices.iter().zip(results) {
                    apply(kind, &mut conversation.messages[i], result, &mut report.counts);
                }
            }
        } else {
            for (&i, request) in pending.iter().zip(&requests) {
                self.pause(calls);
                *calls += 1;
                report.calls += 1;

                let result = self.enricher.enrich(request);
                if let Err(e) = &result {
                    tracing::warn!(pass = %kind, conversation = %report.key, message = i, error = %e, "enrichment failed");
                }
                apply(kind, &mut conversation.messages[i], result, &mut report.counts);
            }
        }

        report
    }

    /// Sleep before every backend call except the first of the run
    fn pause(&self, calls: &usize) {
        if *calls > 0 && !self.options.delay.is_zero() {
            std::thread::sleep(self.options.delay);
        }
    }
}

fn apply(
    kind: PassKind,
    message: &mut Message,
    result: Result<Outcome, EnrichError>,
    counts: &mut Counts,
) {
    let result = match result {
        Ok(Outcome::Enriched(Annotation::Text(text))) if text.trim().is_empty() => {
            Err(EnrichError::EmptyResult)
        }
        other => other,
    };

    match result {
        Ok(Outcome::Enriched(annotation)) => {
            message.annotate(kind.result_field(), annotation.into_value());
            counts.enriched += 1;
        }
        Ok(Outcome::NotApplicable(reason)) => {
            message.annotate(kind.skipped_field(), Value::String(reason));
            counts.not_applicable += 1;
        }
        Err(e) => {
            message.annotate(kind.error_field(), Value::String(e.marker()));
            counts.errored += 1;
        }
    }
}
