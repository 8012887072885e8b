//! Machine translation to English

use super::{AzureTranslatorClient, EnrichRequest, Enricher, Outcome, PassKind};
use crate::error::EnrichError;

/// Translates message content (or a generated standalone question) to English
pub struct AzureTranslator {
    client: AzureTranslatorClient,
    kind: PassKind,
}

impl AzureTranslator {
    pub fn new(client: AzureTranslatorClient, kind: PassKind) -> Self {
        Self { client, kind }
    }
}

impl Enricher for AzureTranslator {
    fn kind(&self) -> PassKind {
        self.kind
    }

    fn enrich(&self, request: &EnrichRequest) -> Result<Outcome, EnrichError> {
        let translated = self.client.translate(&request.content, "en")?;
        tracing::debug!(to = "en", %translated, "translated");
        Outcome::text(&translated)
    }
}
