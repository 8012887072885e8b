//! Rewriting follow-up messages as standalone questions

use super::{ChatClient, ChatMessage, EnrichRequest, Enricher, Outcome, PassKind};
use crate::error::EnrichError;
use crate::model::Turn;

const MARKER: &str = "Standalone Question:";

const ASSISTANT_CONTEXT: &str = "- The assistant is a precision agricultural assistant \
supporting farmers, designed to help them grow their crops precisely using real-time farm \
data and current agricultural practice.";

const INSTRUCTIONS: &str = "- You rephrase follow-up questions into standalone questions.

Given the chat history and follow-up question, produce a single standalone question that \
preserves the user's original intent and wording as much as possible, adding only the missing \
contextual references from the history needed for clarity. If there's no clear link to the \
history, return the follow-up question exactly as given. Do not answer; output only the question.

The follow-up message is authored by the user, not the assistant.
Return only the standalone question, after `Standalone Question:`.";

const REPHRASE_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in English. Translate to English \
if not so already.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone Question:";

pub struct LlmRephraser {
    client: ChatClient,
}

impl LlmRephraser {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

impl Enricher for LlmRephraser {
    fn kind(&self) -> PassKind {
        PassKind::Standalone
    }

    fn enrich(&self, request: &EnrichRequest) -> Result<Outcome, EnrichError> {
        let prompt = build_prompt(&request.history, &request.content);
        let mut messages = vec![
            ChatMessage::system(ASSISTANT_CONTEXT),
            ChatMessage::system(INSTRUCTIONS),
        ];
        if let Some(language) = request.language.as_deref() {
            messages.push(ChatMessage::system(format!(
                "- The user's preferred language code is {language}."
            )));
        }
        messages.push(ChatMessage::user(prompt));

        let raw = self.client.complete(&messages, None)?;
        Outcome::text(&extract_question(&raw))
    }
}

/// `role: content` lines, oldest first
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(history: &[Turn], question: &str) -> String {
    REPHRASE_TEMPLATE
        .replace("{chat_history}", &format_history(history))
        .replace("{question}", &format!("user: {question}"))
}

/// Pull the question out of a model reply.
///
/// Text after the first `Standalone Question:` marker wins when present;
/// surrounding quotes, colons and emphasis are stripped.
pub fn extract_question(raw: &str) -> String {
    let text = match raw.split_once(MARKER) {
        Some((_, after)) => after.split(MARKER).next().unwrap_or(after),
        None => raw,
    };
    text.trim()
        .trim_matches(|c: char| matches!(c, '"' | ':' | '*' | ' ' | '\n'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_history_and_question() {
        let history = vec![
            Turn {
                role: "user".into(),
                content: "किस तरह से ड्रिप इरीगेशन सेटअप करते हैं?".into(),
            },
            Turn {
                role: "assistant".into(),
                content: "आप किस फसल के लिए पूछ रहे हैं?".into(),
            },
        ];
        let prompt = build_prompt(&history, "गन्ने के लिए बताओ।");
        assert!(prompt.contains("Chat History:\nuser: किस तरह"));
        assert!(prompt.contains("assistant: आप किस फसल"));
        assert!(prompt.contains("Follow Up Input: user: गन्ने के लिए बताओ।"));
        assert!(prompt.ends_with("Standalone Question:"));
    }

    #[test]
    fn test_extract_question_after_marker() {
        let raw = "Reasoning: the crop is sugarcane.\nStandalone Question: **How do I set up drip irrigation for sugarcane?**";
        assert_eq!(
            extract_question(raw),
            "How do I set up drip irrigation for sugarcane?"
        );
    }

    #[test]
    fn test_extract_question_without_marker() {
        assert_eq!(
            extract_question("  \"When should I spray my grapes?\"\n"),
            "When should I spray my grapes?"
        );
    }
}
