//! Human review of classifications and standalone rephrasings
//!
//! Human edits are the one place where enrichment fields are overwritten.

use anyhow::{bail, Result};
use serde_json::Value;

use super::standalone_examples::CORRECTION_FIELD;
use crate::enrich::PassKind;
use crate::model::{Conversation, Message};

/// Which user messages a review pass lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReviewFilter {
    /// Explicitly labelled common
    Common,
    /// Labelled uncommon or not classified at all
    Uncommon,
}

#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub conversation_index: usize,
    pub message_index: usize,
    pub conversation_key: String,
    pub original: String,
    pub standalone: Option<String>,
    pub correction: Option<String>,
    pub is_common: Option<bool>,
}

fn common_flag(message: &Message) -> Option<bool> {
    message.field_bool(PassKind::Classify.result_field())
}

pub fn collect(records: &[Conversation], filter: ReviewFilter) -> Vec<ReviewItem> {
    let mut items = vec![];
    for (conversation_index, conversation) in records.iter().enumerate() {
        for (message_index, message) in conversation.user_messages() {
            let is_common = common_flag(message);
            let wanted = match filter {
                ReviewFilter::Common => is_common == Some(true),
                ReviewFilter::Uncommon => is_common != Some(true),
            };
            if !wanted {
                continue;
            }
            items.push(ReviewItem {
                conversation_index,
                message_index,
                conversation_key: conversation.key(),
                original: message.text().to_string(),
                standalone: message.field_str("standalone_question").map(String::from),
                correction: message.field_str(CORRECTION_FIELD).map(String::from),
                is_common,
            });
        }
    }
    items
}

/// Every user message is labelled common. Conversations without user
/// messages are not.
pub fn is_fully_common(conversation: &Conversation) -> bool {
    let mut user_messages = conversation.user_messages().peekable();
    if user_messages.peek().is_none() {
        return false;
    }
    user_messages.all(|(_, m)| common_flag(m) == Some(true))
}

/// Resolve a conversation by position or by key prefix
pub fn find_conversation(records: &[Conversation], query: &str) -> Option<usize> {
    if let Ok(index) = query.parse::<usize>() {
        if index < records.len() {
            return Some(index);
        }
    }
    records.iter().position(|c| c.key() == query).or_else(|| {
        let mut matches = records
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key().starts_with(query));
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Some(index),
            _ => None,
        }
    })
}

fn user_message_mut<'a>(
    records: &'a mut [Conversation],
    conversation: usize,
    message: usize,
) -> Result<&'a mut Message> {
    let Some(conv) = records.get_mut(conversation) else {
        bail!("No conversation at index {}", conversation);
    };
    let Some(msg) = conv.messages.get_mut(message) else {
        bail!("Conversation {} has no message {}", conversation, message);
    };
    if !msg.is_user() {
        bail!("Message {} is not a user message", message);
    }
    Ok(msg)
}

/// Overwrite the classification with a human label. Returns the previous one.
pub fn set_label(
    records: &mut [Conversation],
    conversation: usize,
    message: usize,
    common: bool,
) -> Result<Option<bool>> {
    let msg = user_message_mut(records, conversation, message)?;
    let kind = PassKind::Classify;
    let previous = msg.field_bool(kind.result_field());
    msg.set_field(kind.result_field(), Value::Bool(common));
    msg.clear(kind.error_field());
    msg.clear(kind.skipped_field());
    Ok(previous)
}

/// Store a human standalone rephrasing for the message
pub fn set_correction(
    records: &mut [Conversation],
    conversation: usize,
    message: usize,
    text: &str,
) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("Correction text is empty");
    }
    let msg = user_message_mut(records, conversation, message)?;
    msg.set_field(CORRECTION_FIELD, Value::String(text.to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labelled(text: &str, flag: Option<bool>) -> Message {
        let mut m = Message::user(text);
        if let Some(flag) = flag {
            m.annotate("is_query_common", json!(flag));
        }
        m
    }

    fn records() -> Vec<Conversation> {
        vec![
            Conversation::with_id(
                "aa11",
                vec![
                    labelled("hello", Some(true)),
                    Message::assistant("Hi!"),
                    labelled("thanks", Some(true)),
                ],
            ),
            Conversation::with_id(
                "bb22",
                vec![
                    labelled("hello", Some(true)),
                    labelled("leaf spots on cotton", Some(false)),
                    labelled("when to sow?", None),
                ],
            ),
            Conversation::with_id("bb33", vec![Message::assistant("Welcome")]),
        ]
    }

    #[test]
    fn test_collect_splits_common_and_rest() {
        let records = records();
        let common = collect(&records, ReviewFilter::Common);
        assert_eq!(common.len(), 3);

        let rest = collect(&records, ReviewFilter::Uncommon);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].conversation_key, "bb22");
        assert_eq!(rest[0].message_index, 1);
        assert_eq!(rest[1].is_common, None);
    }

    #[test]
    fn test_is_fully_common() {
        let records = records();
        assert!(is_fully_common(&records[0]));
        assert!(!is_fully_common(&records[1]));
        assert!(!is_fully_common(&records[2]));
    }

    #[test]
    fn test_set_label_overwrites_and_clears_markers() {
        let mut records = records();
        records[1].messages[2].annotate("is_query_common_error", json!("timeout"));

        assert_eq!(set_label(&mut records, 1, 1, true).unwrap(), Some(false));
        assert_eq!(set_label(&mut records, 1, 2, true).unwrap(), None);
        assert!(!records[1].messages[2].has_field("is_query_common_error"));
        assert!(is_fully_common(&records[1]));

        assert!(set_label(&mut records, 0, 1, true).is_err());
        assert!(set_label(&mut records, 7, 0, true).is_err());
    }

    #[test]
    fn test_set_correction() {
        let mut records = records();
        set_correction(&mut records, 1, 2, "  When should wheat be sown? ").unwrap();
        assert_eq!(
            records[1].messages[2].field_str("correct_translation"),
            Some("When should wheat be sown?")
        );
        assert!(set_correction(&mut records, 1, 2, "   ").is_err());
    }

    #[test]
    fn test_find_conversation() {
        let records = records();
        assert_eq!(find_conversation(&records, "1"), Some(1));
        assert_eq!(find_conversation(&records, "aa"), Some(0));
        assert_eq!(find_conversation(&records, "bb33"), Some(2));
        // ambiguous prefix
        assert_eq!(find_conversation(&records, "bb"), None);
        assert_eq!(find_conversation(&records, "zz"), None);
    }
}
