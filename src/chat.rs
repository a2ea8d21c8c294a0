//! Conversational question answering.
//!
//! A session keeps the system prompt apart from the running history and
//! sends both with every question. Answers are not grounded in the record
//! store; the model only sees what was said in the session.

use crate::llm::{ChatMessage, CompletionClient, CompletionError, GenerationParams};
use std::sync::Arc;
use tracing::{debug, warn};

/// Printed when a question is empty.
pub const EMPTY_QUESTION: &str = "Please enter a valid question.";

/// Oldest turns are dropped beyond this many history messages.
const MAX_HISTORY_MESSAGES: usize = 40;

pub struct ChatSession {
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
    system_prompt: ChatMessage,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        params: GenerationParams,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            client,
            params,
            system_prompt: ChatMessage::system(system_prompt),
            history: Vec::new(),
        }
    }

    /// Ask a question, recording it and the answer in the history.
    ///
    /// A failed call leaves the history as it was before the question.
    pub async fn ask(&mut self, question: &str) -> Result<String, CompletionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CompletionError::InvalidRequest(EMPTY_QUESTION.to_string()));
        }

        self.history.push(ChatMessage::user(question));

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(self.system_prompt.clone());
        messages.extend(self.history.iter().cloned());

        match self.client.chat(&messages, self.params).await {
            Ok(answer) => {
                self.history.push(ChatMessage::assistant(answer.clone()));
                self.trim_history();
                Ok(answer)
            }
            Err(e) => {
                warn!("Chat completion failed: {}", e);
                self.history.pop();
                Err(e)
            }
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn trim_history(&mut self) {
        if self.history.len() > MAX_HISTORY_MESSAGES {
            let excess = self.history.len() - MAX_HISTORY_MESSAGES;
            debug!("Dropping {} oldest chat messages", excess);
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::llm::Role;

    fn session(client: Arc<ScriptedClient>) -> ChatSession {
        ChatSession::new(client, GenerationParams::new(1024, 0.0), "Be brief.")
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_without_calling() {
        let client = Arc::new(ScriptedClient::echo());
        let mut chat = session(client.clone());

        let err = chat.ask("   ").await.unwrap_err();

        assert_eq!(err, CompletionError::InvalidRequest(EMPTY_QUESTION.to_string()));
        assert_eq!(client.call_count(), 0);
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_sent_with_each_question() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("Fintech.".to_string()),
            Ok("Yes.".to_string()),
        ]));
        let mut chat = session(client.clone());

        assert_eq!(chat.ask("Which industry?").await.unwrap(), "Fintech.");
        assert_eq!(chat.ask("Is it regulated?").await.unwrap(), "Yes.");

        let calls = client.calls();
        let second = &calls[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[0].role, Role::System);
        assert_eq!(second[0].content, "Be brief.");
        assert_eq!(second[1].content, "Which industry?");
        assert_eq!(second[2].role, Role::Assistant);
        assert_eq!(second[3].content, "Is it regulated?");
        assert_eq!(chat.history().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_question_is_not_kept() {
        let client = Arc::new(ScriptedClient::new(vec![Err(CompletionError::Timeout(30))]));
        let mut chat = session(client);

        assert!(chat.ask("Hello?").await.is_err());
        assert!(chat.history().is_empty());

        // Queue is empty now, so the client echoes
        assert_eq!(chat.ask("Hello again").await.unwrap(), "Hello again");
        assert_eq!(chat.history().len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let mut chat = session(Arc::new(ScriptedClient::echo()));

        for i in 0..30 {
            chat.ask(&format!("question {}", i)).await.unwrap();
        }

        assert_eq!(chat.history().len(), MAX_HISTORY_MESSAGES);
        assert_eq!(chat.history()[0].role, Role::User);
        assert_eq!(chat.history().last().unwrap().content, "question 29");
    }
}
