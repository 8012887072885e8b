//! Script conversion of Indic-language messages to Latin script

use super::{AzureTranslatorClient, EnrichRequest, Enricher, Outcome, PassKind};
use crate::error::EnrichError;

/// Detected language code -> (transliteration language, source script).
/// Target script is always Latin. `ma` is a common mis-detection of Marathi.
const SCRIPTS: &[(&str, &str, &str)] = &[
    ("hi", "hi", "Deva"),
    ("gu", "gu", "Gujr"),
    ("mr", "mr", "Deva"),
    ("ma", "mr", "Deva"),
    ("ta", "ta", "Taml"),
    ("te", "te", "Telu"),
    ("kn", "kn", "Knda"),
    ("ml", "ml", "Mlym"),
    ("bn", "bn", "Beng"),
    ("pa", "pa", "Guru"),
    ("or", "or", "Orya"),
];

const TARGET_SCRIPT: &str = "Latn";

/// Transliteration language and source script for a detected language
pub fn script_for(detected: &str) -> Option<(&'static str, &'static str)> {
    SCRIPTS
        .iter()
        .find(|(code, _, _)| *code == detected)
        .map(|(_, language, script)| (*language, *script))
}

pub struct AzureTransliterator {
    client: AzureTranslatorClient,
}

impl AzureTransliterator {
    pub fn new(client: AzureTranslatorClient) -> Self {
        Self { client }
    }
}

impl Enricher for AzureTransliterator {
    fn kind(&self) -> PassKind {
        PassKind::Transliterate
    }

    fn enrich(&self, request: &EnrichRequest) -> Result<Outcome, EnrichError> {
        let (detected, score) = self.client.detect(&request.content)?;
        tracing::debug!(language = %detected, score, "detected language");

        let (language, from_script) = match route(&detected) {
            Ok(scripts) => scripts,
            Err(outcome) => return Ok(outcome),
        };
        let transliterated =
            self.client
                .transliterate(&request.content, language, from_script, TARGET_SCRIPT)?;
        finish(&request.content, &transliterated)
    }
}

/// Scripts to convert from, or the terminal outcome when the detected
/// language needs no transliteration
fn route(detected: &str) -> Result<(&'static str, &'static str), Outcome> {
    if detected == "en" {
        return Err(Outcome::NotApplicable("en".into()));
    }
    script_for(detected).ok_or_else(|| Outcome::NotApplicable(format!("unsupported: {detected}")))
}

fn finish(original: &str, transliterated: &str) -> Result<Outcome, EnrichError> {
    if transliterated.trim() == original.trim() {
        return Ok(Outcome::NotApplicable("unchanged".into()));
    }
    Outcome::text(transliterated)
}
