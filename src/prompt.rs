// src/prompt.rs
// Fixed instructions and outgoing turn construction for both forwarders

use crate::llm::ChatMessage;

/// Restricts the chat model to legal topics
pub const LEGAL_ASSISTANT_PROMPT: &str = "You are JurisAI, an AI legal assistant. You must strictly answer only legal-related questions, including laws, contracts, rights, regulations, and legal cases. If a user asks something unrelated to law, you must firmly refuse to answer. If the question is ambiguous, ask the user to clarify its legal relevance before responding. Do not answer general knowledge, medical, technical, political, or personal questions (if not related to legal aspects). Always maintain a formal, professional tone as a legal assistant.";

/// Persona for the summarization endpoint
pub const SUMMARIZER_PROMPT: &str = "You are an AI legal assistant specializing in document summarization. Provide concise yet detailed summaries of legal documents while preserving key details.";

pub const SUMMARY_REQUEST_PREFIX: &str = "Summarize this document:\n\n";

/// System instruction first, then the caller's turns in their original order.
pub fn chat_messages(turns: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(ChatMessage::system(LEGAL_ASSISTANT_PROMPT));
    messages.extend(turns);
    messages
}

/// Exactly two turns: the summarizer persona and the prefixed document.
pub fn summary_messages(document: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARIZER_PROMPT),
        ChatMessage::user(format!("{SUMMARY_REQUEST_PREFIX}{document}")),
    ]
}

/// Chat input with an attached document folded in.
pub fn with_document_context(input: &str, document_text: Option<&str>) -> String {
    match document_text {
        Some(text) => format!("Document Context: {text}\n\nUser Query: {input}"),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_chat_messages_prepends_system_turn() {
        let turns = vec![
            ChatMessage::user("Can I break a lease early?"),
            ChatMessage::assistant("It depends on the lease terms."),
            ChatMessage::user("What about a fixed-term lease?"),
        ];
        let messages = chat_messages(turns.clone());

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, LEGAL_ASSISTANT_PROMPT);
        assert_eq!(&messages[1..], &turns[..]);
    }

    #[test]
    fn test_summary_prefix_exact() {
        let messages = summary_messages("The quick brown fox.");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system(SUMMARIZER_PROMPT));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Summarize this document:\n\nThe quick brown fox.");
    }

    #[test]
    fn test_document_context_wrapper() {
        assert_eq!(
            with_document_context("Is clause 4 enforceable?", Some("Clause 4: no pets.")),
            "Document Context: Clause 4: no pets.\n\nUser Query: Is clause 4 enforceable?"
        );
        assert_eq!(with_document_context("Hello", None), "Hello");
    }
}
