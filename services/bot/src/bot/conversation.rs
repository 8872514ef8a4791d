//! services/bot/src/bot/conversation.rs
//!
//! Per-user dialogue state. A user is either idle or has asked to submit feedback
//! and the bot is waiting for the text.

use std::collections::HashMap;
use tokio::sync::Mutex;

/// An enum representing where a user is in the feedback dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingFeedbackText,
}

/// Tracks the dialogue state of every user. Idle users have no entry.
#[derive(Default)]
pub struct ConversationEngine {
    states: Mutex<HashMap<i64, ConversationState>>,
}

impl ConversationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state_of(&self, user_id: i64) -> ConversationState {
        self.states
            .lock()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Idle -> AwaitingFeedbackText. A no-op if the user is already waiting.
    pub async fn await_feedback(&self, user_id: i64) {
        self.states
            .lock()
            .await
            .insert(user_id, ConversationState::AwaitingFeedbackText);
    }

    /// Returns the user to idle, reporting the state they were in.
    pub async fn finish(&self, user_id: i64) -> ConversationState {
        self.states
            .lock()
            .await
            .remove(&user_id)
            .unwrap_or_default()
    }

    /// Number of users currently mid-dialogue.
    pub async fn open_dialogues(&self) -> usize {
        self.states.lock().await.len()
    }
}
