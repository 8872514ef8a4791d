//! services/bot/src/bot/state.rs
//!
//! Defines the application's shared state.

use crate::bot::conversation::ConversationEngine;
use crate::config::Config;
use feedback_desk_core::ports::{EmployeeDirectoryService, FeedbackRepository};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Lanes)
//=========================================================================================

/// The shared application state, created once at startup and passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub directory: Arc<dyn EmployeeDirectoryService>,
    pub conversations: Arc<ConversationEngine>,
}

impl AppState {
    pub fn is_admin(&self, user_id: i64) -> bool {
        is_admin(user_id, self.config.admin_chat_id)
    }
}

/// The admin gate. Pure, so it can never touch any state.
pub fn is_admin(user_id: i64, admin_chat_id: i64) -> bool {
    user_id == admin_chat_id
}
