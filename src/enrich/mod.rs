//! Enrichment passes and the backends that compute them
//!
//! Each pass reads one source field of a message and writes exactly one of
//! three marker fields back: the result, an error marker, or a
//! not-applicable marker. Presence of any of the three means the message is
//! done for that pass.
//!
//! Backends:
//! - Translate / StandaloneTranslate: Azure Translator `/translate`
//! - Transliterate: Azure Translator `/detect` + `/transliterate`
//! - Classify: OpenAI-compatible chat completion, few-shot, batched
//! - Standalone: OpenAI-compatible chat completion over the chat history

mod azure;
mod classify;
mod llm;
mod standalone;
mod translate;
mod transliterate;

pub use azure::AzureTranslatorClient;
pub use classify::{build_prompt as build_classification_prompt, parse_labels, LlmClassifier};
pub use llm::{ChatClient, ChatMessage};
pub use standalone::{extract_question, format_history, LlmRephraser};
pub use translate::AzureTranslator;
pub use transliterate::{script_for, AzureTransliterator};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::{Config, Credentials};
use crate::dataset::fewshot;
use crate::error::EnrichError;
use crate::model::Turn;

/// Which enrichment a pass computes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PassKind {
    Translate,
    Transliterate,
    Classify,
    Standalone,
    StandaloneTranslate,
}

impl PassKind {
    pub const ALL: [PassKind; 5] = [
        PassKind::Translate,
        PassKind::Transliterate,
        PassKind::Classify,
        PassKind::Standalone,
        PassKind::StandaloneTranslate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Translate => "translate",
            PassKind::Transliterate => "transliterate",
            PassKind::Classify => "classify",
            PassKind::Standalone => "standalone",
            PassKind::StandaloneTranslate => "standalone-translate",
        }
    }

    /// Message field the pass reads
    pub fn source_field(&self) -> &'static str {
        match self {
            PassKind::StandaloneTranslate => "standalone_question",
            _ => "content",
        }
    }

    /// Field written on success
    pub fn result_field(&self) -> &'static str {
        match self {
            PassKind::Translate => "content_en",
            PassKind::Transliterate => "content_transliterated",
            PassKind::Classify => "is_query_common",
            PassKind::Standalone => "standalone_question",
            PassKind::StandaloneTranslate => "standalone_en",
        }
    }

    /// Field written when the backend call failed
    pub fn error_field(&self) -> &'static str {
        match self {
            PassKind::Translate => "translation_error",
            PassKind::Transliterate => "transliteration_error",
            PassKind::Classify => "is_query_common_error",
            PassKind::Standalone => "standalone_question_error",
            PassKind::StandaloneTranslate => "standalone_en_error",
        }
    }

    /// Field written when the pass does not apply (e.g. English text
    /// offered for transliteration)
    pub fn skipped_field(&self) -> &'static str {
        match self {
            PassKind::Translate => "content_en_skipped",
            PassKind::Transliterate => "content_transliterated_skipped",
            PassKind::Classify => "is_query_common_skipped",
            PassKind::Standalone => "standalone_question_skipped",
            PassKind::StandaloneTranslate => "standalone_en_skipped",
        }
    }

    pub fn marker_fields(&self) -> [&'static str; 3] {
        [self.result_field(), self.error_field(), self.skipped_field()]
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful enrichment value
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Text(String),
    Flag(bool),
}

impl Annotation {
    pub fn into_value(self) -> Value {
        match self {
            Annotation::Text(s) => Value::String(s),
            Annotation::Flag(b) => Value::Bool(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Enriched(Annotation),
    NotApplicable(String),
}

impl Outcome {
    /// Successful text results must carry content
    pub fn text(value: &str) -> Result<Self, EnrichError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(EnrichError::EmptyResult);
        }
        Ok(Outcome::Enriched(Annotation::Text(value.to_string())))
    }
}

/// One message offered to a backend
#[derive(Debug, Clone, Default)]
pub struct EnrichRequest {
    pub content: String,
    pub history: Vec<Turn>,
    pub language: Option<String>,
}

impl EnrichRequest {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Default::default()
        }
    }
}

/// An enrichment backend
pub trait Enricher {
    fn kind(&self) -> PassKind;

    fn enrich(&self, request: &EnrichRequest) -> Result<Outcome, EnrichError>;

    /// Messages per backend call. The annotator uses `enrich_batch` only
    /// when this is greater than one.
    fn batch_size(&self) -> usize {
        1
    }

    /// Enrich several messages in one call. A failure applies to the whole
    /// batch.
    fn enrich_batch(&self, requests: &[EnrichRequest]) -> Result<Vec<Outcome>, EnrichError> {
        requests.iter().map(|r| self.enrich(r)).collect()
    }
}

/// Construct the backend for a pass from configuration.
/// Missing credentials are fatal here, before any file is touched.
pub fn build_enricher(
    kind: PassKind,
    config: &Config,
    credentials: &Credentials,
) -> Result<Box<dyn Enricher>> {
    let enricher: Box<dyn Enricher> = match kind {
        PassKind::Translate | PassKind::StandaloneTranslate => {
            let client = translator_client(config, credentials)?;
            Box::new(AzureTranslator::new(client, kind))
        }
        PassKind::Transliterate => {
            let client = translator_client(config, credentials)?;
            Box::new(AzureTransliterator::new(client))
        }
        PassKind::Classify => {
            let api_key = credentials.require_llm(config)?;
            let client = ChatClient::new(
                &config.llm.base_url,
                api_key,
                &config.llm.classifier_model,
                Duration::from_secs(config.llm.timeout_secs),
            );
            let path = config.fewshot_path();
            let examples = if path.exists() {
                fewshot::load_few_shot(&path)?
            } else {
                tracing::warn!(path = %path.display(), "few-shot file missing, classifying without examples");
                vec![]
            };
            Box::new(LlmClassifier::new(
                client,
                examples,
                config.pass_batch_size(kind),
            ))
        }
        PassKind::Standalone => {
            let api_key = credentials.require_llm(config)?;
            let client = ChatClient::new(
                &config.llm.base_url,
                api_key,
                &config.llm.standalone_model,
                Duration::from_secs(config.llm.timeout_secs),
            );
            Box::new(LlmRephraser::new(client))
        }
    };
    Ok(enricher)
}

fn translator_client(config: &Config, credentials: &Credentials) -> Result<AzureTranslatorClient> {
    let (key, region) = credentials.require_translator()?;
    let endpoint = credentials
        .translator_endpoint
        .as_deref()
        .unwrap_or(&config.translator.endpoint);
    Ok(AzureTranslatorClient::new(
        endpoint,
        key,
        region,
        Duration::from_secs(config.translator.timeout_secs),
    ))
}
