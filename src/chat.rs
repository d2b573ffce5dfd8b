//! Chat transcript and the rules for sending a question.

use crate::api::ChatAnswer;

pub const NO_ANSWER_FALLBACK: &str = "I'm sorry, I couldn't find an answer to that question.";
pub const REQUEST_FAILED_MESSAGE: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// A document page the backend used to build an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub document: String,
    pub page: u32,
}

impl SourceRef {
    pub fn new(document: impl Into<String>, page: u32) -> Self {
        SourceRef {
            document: document.into(),
            page,
        }
    }

    pub fn label(&self) -> String {
        format!("{} - Page {}", self.document, self.page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Normal,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub kind: MessageKind,
    /// Whether the source list is unfolded in the view.
    pub sources_expanded: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), Vec::new(), MessageKind::Normal)
    }

    pub fn bot(text: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self::new(Role::Bot, text.into(), sources, MessageKind::Normal)
    }

    pub fn bot_error(text: impl Into<String>) -> Self {
        Self::new(Role::Bot, text.into(), Vec::new(), MessageKind::Error)
    }

    fn new(role: Role, text: String, sources: Vec<SourceRef>, kind: MessageKind) -> Self {
        ChatMessage {
            role,
            text,
            sources,
            kind,
            sources_expanded: false,
        }
    }

    pub fn sources_summary(&self) -> String {
        match self.sources.len() {
            1 => "1 source".to_string(),
            n => format!("{n} sources"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageRejected {
    #[error("Message is empty")]
    Empty,
    #[error("Message is too long (max {max} characters)")]
    TooLong { max: usize },
}

/// Checks a composed message and returns the text to send.
pub fn validate_message(input: &str, max_chars: usize) -> Result<String, MessageRejected> {
    let text = input.trim();
    if text.is_empty() {
        return Err(MessageRejected::Empty);
    }
    if text.chars().count() > max_chars {
        return Err(MessageRejected::TooLong { max: max_chars });
    }
    Ok(text.to_string())
}

/// Ordered, append-only list of messages shown on the chat screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    /// True while an answer is being generated.
    composing: bool,
}

impl Transcript {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.composing = false;
    }

    /// Appends the question and shows the composing indicator.
    pub fn begin_exchange(&mut self, question: String) {
        self.messages.push(ChatMessage::user(question));
        self.composing = true;
    }

    pub fn apply_answer(&mut self, answer: ChatAnswer) {
        self.composing = false;
        let text = answer
            .answer
            .filter(|text| !text.trim().is_empty());

        match text {
            Some(text) => self.messages.push(ChatMessage::bot(text, answer.sources)),
            None => self.messages.push(ChatMessage::bot(NO_ANSWER_FALLBACK, Vec::new())),
        }
    }

    pub fn apply_failure(&mut self) {
        self.composing = false;
        self.messages.push(ChatMessage::bot_error(REQUEST_FAILED_MESSAGE));
    }

    pub fn toggle_sources(&mut self, index: usize) {
        if let Some(message) = self.messages.get_mut(index) {
            if !message.sources.is_empty() {
                message.sources_expanded = !message.sources_expanded;
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: Option<&str>, sources: Vec<SourceRef>) -> ChatAnswer {
        ChatAnswer {
            query: "q".to_string(),
            answer: text.map(str::to_string),
            sources,
        }
    }

    #[test]
    fn test_validate_trims_and_accepts() {
        assert_eq!(validate_message("  hello  ", 2000).unwrap(), "hello");
    }

    #[test]
    fn test_validate_rejects_blank() {
        assert_eq!(validate_message("   \n\t", 2000), Err(MessageRejected::Empty));
        assert_eq!(validate_message("", 2000), Err(MessageRejected::Empty));
    }

    #[test]
    fn test_validate_length_limit_counts_chars() {
        let at_limit = "é".repeat(2000);
        assert!(validate_message(&at_limit, 2000).is_ok());

        let over = "a".repeat(2001);
        assert_eq!(
            validate_message(&over, 2000),
            Err(MessageRejected::TooLong { max: 2000 })
        );
    }

    #[test]
    fn test_source_label() {
        assert_eq!(SourceRef::new("thermo.pdf", 42).label(), "thermo.pdf - Page 42");
    }

    #[test]
    fn test_exchange_preserves_order() {
        let mut transcript = Transcript::default();
        transcript.begin_exchange("What is entropy?".to_string());
        assert!(transcript.is_composing());

        transcript.apply_answer(answer(
            Some("Entropy measures disorder."),
            vec![SourceRef::new("thermo.pdf", 42)],
        ));

        assert!(!transcript.is_composing());
        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "What is entropy?");
        assert_eq!(messages[1].role, Role::Bot);
        assert_eq!(messages[1].text, "Entropy measures disorder.");
        assert_eq!(messages[1].sources_summary(), "1 source");
        assert!(!messages[1].sources_expanded);
    }

    #[test]
    fn test_blank_answer_uses_fallback() {
        let mut transcript = Transcript::default();
        transcript.begin_exchange("hi".to_string());
        transcript.apply_answer(answer(Some("   "), vec![SourceRef::new("a.pdf", 1)]));

        let reply = transcript.get(1).unwrap();
        assert_eq!(reply.text, NO_ANSWER_FALLBACK);
        assert_eq!(reply.kind, MessageKind::Normal);
        assert!(reply.sources.is_empty());
    }

    #[test]
    fn test_failure_keeps_question() {
        let mut transcript = Transcript::default();
        transcript.begin_exchange("hi".to_string());
        transcript.apply_failure();

        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hi");
        assert_eq!(messages[1].text, REQUEST_FAILED_MESSAGE);
        assert_eq!(messages[1].kind, MessageKind::Error);
        assert!(messages[1].sources.is_empty());
        assert!(!transcript.is_composing());
    }

    #[test]
    fn test_toggle_sources_ignores_messages_without_sources() {
        let mut transcript = Transcript::default();
        transcript.push(ChatMessage::bot("welcome", Vec::new()));
        transcript.push(ChatMessage::bot(
            "answer",
            vec![SourceRef::new("a.pdf", 1), SourceRef::new("b.pdf", 3)],
        ));

        transcript.toggle_sources(0);
        transcript.toggle_sources(1);
        transcript.toggle_sources(7);

        assert!(!transcript.get(0).unwrap().sources_expanded);
        assert!(transcript.get(1).unwrap().sources_expanded);
        assert_eq!(transcript.get(1).unwrap().sources_summary(), "2 sources");
    }
}
