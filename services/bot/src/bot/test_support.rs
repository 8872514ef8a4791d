//! services/bot/src/bot/test_support.rs
//!
//! In-memory fakes and builders shared by the bot tests.

use crate::adapters::EmployeeDirectory;
use crate::bot::conversation::ConversationEngine;
use crate::bot::state::AppState;
use crate::config::Config;
use async_trait::async_trait;
use bytes::Bytes;
use feedback_desk_core::domain::{
    Envelope, FeedbackEntry, FeedbackStats, InboundMessage, OutboundMessage, Sender, UserCount,
};
use feedback_desk_core::ports::{
    ChatTransport, FeedbackRepository, InboundStream, PortError, PortResult,
};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;

pub const ADMIN_ID: i64 = 1;

pub fn test_config(employees_path: &Path) -> Config {
    Config {
        bot_token: "test-token".to_string(),
        admin_chat_id: ADMIN_ID,
        feedback_path: PathBuf::from("unused.json"),
        employees_path: employees_path.to_path_buf(),
        log_level: Level::DEBUG,
        telegram_api_url: "http://localhost".to_string(),
        poll_timeout_secs: 1,
    }
}

/// Builds an `AppState` over the given feedback fake. Without an employee file the
/// directory points at a path that does not exist.
pub fn test_state(feedback: Arc<MemoryFeedback>, employees: Option<&Path>) -> AppState {
    let employees_path = employees
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/nonexistent/employees.csv"));
    AppState {
        config: Arc::new(test_config(&employees_path)),
        feedback,
        directory: Arc::new(EmployeeDirectory::new(employees_path)),
        conversations: Arc::new(ConversationEngine::new()),
    }
}

/// A private-chat message, so the chat id equals the user id.
pub fn inbound(user_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: user_id,
        sender: Sender {
            id: user_id,
            username: Some(format!("user{}", user_id)),
            full_name: None,
        },
        text: Some(text.to_string()),
    }
}

/// The text bodies of the given envelopes, skipping documents.
pub fn texts(envelopes: &[Envelope]) -> Vec<String> {
    envelopes
        .iter()
        .filter_map(|envelope| match &envelope.message {
            OutboundMessage::Text(text) => Some(text.clone()),
            OutboundMessage::Document { .. } => None,
        })
        .collect()
}

//=========================================================================================
// Feedback Fake
//=========================================================================================

#[derive(Default)]
pub struct MemoryFeedback {
    entries: Mutex<Vec<FeedbackEntry>>,
    fail_writes: bool,
    panic_on_write: bool,
}

impl MemoryFeedback {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_on_write: true,
            ..Default::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.text.clone())
            .collect()
    }
}

#[async_trait]
impl FeedbackRepository for MemoryFeedback {
    async fn add_feedback(&self, entry: FeedbackEntry) -> PortResult<()> {
        if self.panic_on_write {
            panic!("feedback store exploded");
        }
        if self.fail_writes {
            return Err(PortError::Storage("disk full".to_string()));
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn get_stats(&self) -> PortResult<FeedbackStats> {
        let entries = self.entries.lock().unwrap();
        let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
        for entry in entries.iter() {
            *counts.entry(entry.user_id).or_insert(0) += 1;
        }
        let mut top_users: Vec<UserCount> = counts
            .into_iter()
            .map(|(user_id, count)| UserCount { user_id, count })
            .collect();
        top_users.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(FeedbackStats {
            total_messages: entries.len() as u64,
            top_users,
        })
    }

    async fn export_csv(&self) -> PortResult<Bytes> {
        let entries = self.entries.lock().unwrap();
        if entries.is_empty() {
            return Err(PortError::Empty("no feedback to export".to_string()));
        }
        let body: Vec<String> = entries.iter().map(|entry| entry.text.clone()).collect();
        Ok(Bytes::from(body.join("\n")))
    }

    async fn clear(&self) -> PortResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

//=========================================================================================
// Transport Fake
//=========================================================================================

/// Replays a fixed list of inbound messages and records everything sent.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Vec<InboundMessage>>,
    sent: Mutex<Vec<(i64, OutboundMessage)>>,
    /// Sends to this chat fail.
    unreachable_chat: Option<i64>,
    /// Delay before each scripted message is yielded.
    gap: Option<Duration>,
    /// Keep the stream pending after the script instead of ending it.
    hold_open: bool,
}

impl ScriptedTransport {
    pub fn new(script: Vec<InboundMessage>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Default::default()
        }
    }

    pub fn with_unreachable_chat(mut self, chat_id: i64) -> Self {
        self.unreachable_chat = Some(chat_id);
        self
    }

    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = Some(gap);
        self
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn sent(&self) -> Vec<(i64, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(chat, _)| *chat == chat_id)
            .filter_map(|(_, message)| match message {
                OutboundMessage::Text(text) => Some(text),
                OutboundMessage::Document { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn inbound(&self) -> InboundStream {
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        let gap = self.gap;
        let scripted = futures::stream::iter(script).then(move |message| async move {
            if let Some(gap) = gap {
                tokio::time::sleep(gap).await;
            }
            Ok::<_, PortError>(message)
        });
        if self.hold_open {
            scripted.chain(futures::stream::pending()).boxed()
        } else {
            scripted.boxed()
        }
    }

    async fn send(&self, chat_id: i64, message: OutboundMessage) -> PortResult<()> {
        if self.unreachable_chat == Some(chat_id) {
            return Err(PortError::Transport(format!("chat {} unreachable", chat_id)));
        }
        self.sent.lock().unwrap().push((chat_id, message));
        Ok(())
    }
}
