//! services/bot/src/bot/feedback.rs
//!
//! Handlers for the feedback dialogue and the feedback admin commands.

use crate::bot::conversation::ConversationState;
use crate::bot::replies;
use crate::bot::state::AppState;
use feedback_desk_core::domain::{
    Envelope, FeedbackEntry, InboundMessage, OutboundMessage, EXPORT_FILENAME,
};
use feedback_desk_core::ports::{PortError, PortResult};
use tracing::{error, info};

/// `/feedback [text]`: submits inline text right away, otherwise opens the dialogue.
pub async fn start_feedback(
    state: &AppState,
    message: &InboundMessage,
    args: &str,
) -> PortResult<Vec<Envelope>> {
    let text = args.trim();
    if !text.is_empty() {
        return submit(state, message, text, replies::FEEDBACK_THANKS).await;
    }

    state.conversations.await_feedback(message.sender.id).await;
    Ok(replies::reply(message, replies::FEEDBACK_PROMPT))
}

/// Plain text from a user who is in the middle of the dialogue.
pub async fn receive_feedback_text(
    state: &AppState,
    message: &InboundMessage,
    text: &str,
) -> PortResult<Vec<Envelope>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(replies::reply(message, replies::EMPTY_FEEDBACK));
    }
    submit(state, message, text, replies::FEEDBACK_SAVED).await
}

/// Stores the entry, ends the dialogue and queues the admin notice after the user's reply.
///
/// If the write fails the dialogue stays open so the user can simply resend.
async fn submit(
    state: &AppState,
    message: &InboundMessage,
    text: &str,
    thanks: &str,
) -> PortResult<Vec<Envelope>> {
    let entry = FeedbackEntry::new(&message.sender, text);
    let notice = replies::admin_notice(&entry);

    state.feedback.add_feedback(entry).await?;
    state.conversations.finish(message.sender.id).await;

    Ok(vec![
        Envelope::reply(message.chat_id, OutboundMessage::text(thanks)),
        Envelope::admin_notice(state.config.admin_chat_id, notice),
    ])
}

pub async fn cancel(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    let text = match state.conversations.finish(message.sender.id).await {
        ConversationState::AwaitingFeedbackText => replies::CANCELLED,
        ConversationState::Idle => replies::NOTHING_TO_CANCEL,
    };
    Ok(replies::reply(message, text))
}

pub async fn stats(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    let stats = state.feedback.get_stats().await?;
    Ok(replies::reply(message, replies::stats(&stats)))
}

pub async fn export(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    match state.feedback.export_csv().await {
        Ok(bytes) => {
            info!("Exporting {} bytes of feedback to user {}", bytes.len(), message.sender.id);
            Ok(vec![Envelope::reply(
                message.chat_id,
                OutboundMessage::Document {
                    filename: EXPORT_FILENAME.to_string(),
                    bytes,
                },
            )])
        }
        Err(PortError::Empty(_)) => Ok(replies::reply(message, replies::NOTHING_TO_EXPORT)),
        Err(e) => {
            error!("Unexpected error during export: {:?}", e);
            Ok(replies::reply(message, replies::EXPORT_FAILED))
        }
    }
}

pub async fn clear(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    state.feedback.clear().await?;
    info!("Feedback storage cleared by user {}", message.sender.id);
    Ok(replies::reply(message, replies::STORAGE_CLEARED))
}
