use std::fmt::Write as _;

use super::{ConversationTurn, TurnRole};
use crate::index::ScoredDocument;
use crate::llm::ChatMessage;

pub const NOT_FOUND_REPLY: &str = "I don't have that information.";

/// Assistant policy sent as the system message of every completion
pub const SYSTEM_POLICY: &str = "You are the customer-support assistant of The Bake Story bakery.
Answer only from the bakery context supplied with the question. Be accurate and concise.
If the context does not contain the answer, reply exactly: \"I don't have that information.\"
Only help with bakery topics such as menu items, prices, availability, orders, deliveries and payments. \
Politely decline anything else.
Address the customer as \"buddy\" or \"dear\". Never greet or address the customer by a name found in the records.
When asked for recommendations, suggest available items from the menu.
When several things are asked, answer each of them in a short structured reply.
Be friendly and invite the customer to visit again.";

/// Messages for one completion: policy, recent history, then the context and question
#[inline]
pub fn build_messages(
    query: &str,
    documents: &[ScoredDocument],
    history: &[ConversationTurn],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_POLICY));

    messages.extend(history.iter().map(|turn| match turn.role {
        TurnRole::User => ChatMessage::user(turn.text.clone()),
        TurnRole::Bot => ChatMessage::assistant(turn.text.clone()),
    }));

    messages.push(ChatMessage::user(context_block(query, documents)));
    messages
}

fn context_block(query: &str, documents: &[ScoredDocument]) -> String {
    let mut block = String::from("CONTEXT FROM THE BAKERY DATABASE:\n");
    for (position, scored) in documents.iter().enumerate() {
        let _ = write!(
            block,
            "\n[{}] ({})\n{}\n",
            position + 1,
            scored.document.citation(),
            scored.document.text.trim()
        );
    }
    let _ = write!(block, "\nQUESTION: {}", query.trim());
    block
}
