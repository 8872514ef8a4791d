//! crates/feedback_desk_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or wire format.

use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;

/// Label used when an employee record carries no department.
pub const UNSPECIFIED_DEPARTMENT: &str = "Unspecified";

/// File name of the CSV attachment produced by a feedback export.
pub const EXPORT_FILENAME: &str = "feedback_export.csv";

//=========================================================================================
// Identities and Messages
//=========================================================================================

/// The identity of whoever sent an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// A single message delivered by the chat transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub sender: Sender,
    /// `None` for messages without text (stickers, photos, ...).
    pub text: Option<String>,
}

/// What the bot can send back through the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Document { filename: String, bytes: Bytes },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Why an envelope is being sent. Used for logging delivery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Reply,
    AdminNotice,
}

/// An outbound message addressed to a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub chat_id: i64,
    pub message: OutboundMessage,
    pub purpose: Purpose,
}

impl Envelope {
    pub fn reply(chat_id: i64, message: OutboundMessage) -> Self {
        Self { chat_id, message, purpose: Purpose::Reply }
    }

    pub fn admin_notice(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            message: OutboundMessage::Text(text.into()),
            purpose: Purpose::AdminNotice,
        }
    }
}

//=========================================================================================
// Feedback
//=========================================================================================

/// A single piece of feedback submitted by a user. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEntry {
    /// Creates an entry stamped with the current time, truncated to whole seconds.
    pub fn new(sender: &Sender, text: impl Into<String>) -> Self {
        Self {
            user_id: sender.id,
            username: sender.username.clone(),
            full_name: sender.full_name.clone(),
            text: text.into(),
            timestamp: Utc::now().trunc_subsecs(0),
        }
    }
}

/// How many messages one user has submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCount {
    pub user_id: i64,
    pub count: u64,
}

/// Aggregate view over the feedback journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    pub total_messages: u64,
    /// Sorted by count descending, ties by ascending user id.
    pub top_users: Vec<UserCount>,
}

//=========================================================================================
// Employee Directory
//=========================================================================================

/// A single employee record loaded from the directory source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub name: String,
    pub department: String,
    pub role: String,
    pub email: String,
}

/// Head count of the directory, broken down per department.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySummary {
    pub total: usize,
    /// Ordered by department name ascending.
    pub per_department: BTreeMap<String, usize>,
}
