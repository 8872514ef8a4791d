//! services/bot/src/bot/router.rs
//!
//! Routes one inbound message to its handler, taking the sender's dialogue state
//! into account, and turns any handler failure into a generic reply.

use crate::bot::conversation::ConversationState;
use crate::bot::protocol::{Command, Input};
use crate::bot::state::AppState;
use crate::bot::{directory, feedback, replies};
use feedback_desk_core::domain::{Envelope, InboundMessage};
use feedback_desk_core::ports::PortResult;
use tracing::{debug, error};

/// Handles a single message and returns everything that should be sent in response.
///
/// This is the outermost handler boundary: it never fails.
pub async fn dispatch(state: &AppState, message: InboundMessage) -> Vec<Envelope> {
    match route(state, &message).await {
        Ok(envelopes) => envelopes,
        Err(e) => {
            error!(
                "Failed to handle message from user {} in chat {}: {:?}",
                message.sender.id, message.chat_id, e
            );
            replies::reply(&message, replies::GENERIC_ERROR)
        }
    }
}

async fn route(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    let input = Input::parse(message.text.as_deref());
    let conversation = state.conversations.state_of(message.sender.id).await;

    match (conversation, input) {
        // Commands run the same way whether or not a dialogue is open; only /feedback
        // and /cancel touch the dialogue.
        (_, Input::Command { command, args }) => run_command(state, message, command, &args).await,
        (_, Input::UnknownCommand(token)) => {
            Ok(replies::reply(message, replies::unknown_command(&token)))
        }
        (ConversationState::AwaitingFeedbackText, Input::Text(text)) => {
            feedback::receive_feedback_text(state, message, &text).await
        }
        (ConversationState::AwaitingFeedbackText, Input::Empty) => {
            Ok(replies::reply(message, replies::EMPTY_FEEDBACK))
        }
        (ConversationState::Idle, Input::Text(_)) => {
            Ok(replies::reply(message, replies::IDLE_HINT))
        }
        (ConversationState::Idle, Input::Empty) => Ok(Vec::new()),
    }
}

async fn run_command(
    state: &AppState,
    message: &InboundMessage,
    command: Command,
    args: &str,
) -> PortResult<Vec<Envelope>> {
    debug!("User {} invoked {}", message.sender.id, command);

    if command.requires_admin() && !state.is_admin(message.sender.id) {
        debug!("Refused {} for non-admin user {}", command, message.sender.id);
        return Ok(replies::reply(message, replies::ADMIN_ONLY));
    }

    match command {
        Command::Start => Ok(replies::reply(message, replies::welcome())),
        Command::Help => Ok(replies::reply(message, replies::help())),
        Command::Feedback => feedback::start_feedback(state, message, args).await,
        Command::Cancel => feedback::cancel(state, message).await,
        Command::Stats => feedback::stats(state, message).await,
        Command::Export => feedback::export(state, message).await,
        Command::Clear => feedback::clear(state, message).await,
        Command::Employees => directory::summary(state, message).await,
        Command::FindEmployee => directory::find_employee(state, message, args).await,
        Command::Department => directory::department(state, message, args).await,
        Command::EmployeeEmail => directory::employee_email(state, message, args).await,
        Command::ReloadEmployees => directory::reload(state, message).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::{inbound, test_state, texts, MemoryFeedback, ADMIN_ID};
    use feedback_desk_core::domain::{OutboundMessage, Purpose, EXPORT_FILENAME};
    use feedback_desk_core::ports::FeedbackRepository;
    use std::sync::Arc;

    const USER: i64 = 1001;

    #[tokio::test]
    async fn feedback_dialogue_cycle() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);

        let out = dispatch(&state, inbound(USER, "/feedback")).await;
        assert_eq!(texts(&out), vec![replies::FEEDBACK_PROMPT]);
        assert_eq!(
            state.conversations.state_of(USER).await,
            ConversationState::AwaitingFeedbackText
        );

        let out = dispatch(&state, inbound(USER, "hello")).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].purpose, Purpose::Reply);
        assert_eq!(out[0].chat_id, USER);
        assert_eq!(out[1].purpose, Purpose::AdminNotice);
        assert_eq!(out[1].chat_id, ADMIN_ID);
        assert_eq!(store.texts(), vec!["hello"]);
        assert_eq!(state.conversations.state_of(USER).await, ConversationState::Idle);

        let out = dispatch(&state, inbound(USER, "/feedback hello2")).await;
        assert_eq!(texts(&out)[0], replies::FEEDBACK_THANKS);
        assert_eq!(store.texts(), vec!["hello", "hello2"]);
        assert_eq!(state.conversations.state_of(USER).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn blank_text_keeps_waiting() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);
        dispatch(&state, inbound(USER, "/feedback   ")).await;

        let out = dispatch(&state, inbound(USER, "   ")).await;
        assert_eq!(texts(&out), vec![replies::EMPTY_FEEDBACK]);

        let mut sticker = inbound(USER, "");
        sticker.text = None;
        let out = dispatch(&state, sticker).await;
        assert_eq!(texts(&out), vec![replies::EMPTY_FEEDBACK]);

        assert!(store.texts().is_empty());
        assert_eq!(
            state.conversations.state_of(USER).await,
            ConversationState::AwaitingFeedbackText
        );
    }

    #[tokio::test]
    async fn cancel_aborts_dialogue_without_recording() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);
        dispatch(&state, inbound(USER, "/feedback")).await;

        let out = dispatch(&state, inbound(USER, "/cancel")).await;
        assert_eq!(texts(&out), vec![replies::CANCELLED]);

        let out = dispatch(&state, inbound(USER, "this is not feedback")).await;
        assert_eq!(texts(&out), vec![replies::IDLE_HINT]);
        assert!(store.texts().is_empty());

        let out = dispatch(&state, inbound(USER, "/cancel")).await;
        assert_eq!(texts(&out), vec![replies::NOTHING_TO_CANCEL]);
    }

    #[tokio::test]
    async fn other_commands_leave_dialogue_open() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);
        dispatch(&state, inbound(USER, "/feedback")).await;

        let out = dispatch(&state, inbound(USER, "/stats")).await;
        assert!(texts(&out)[0].starts_with("Total messages: 0"));

        dispatch(&state, inbound(USER, "still here")).await;
        assert_eq!(store.texts(), vec!["still here"]);
    }

    #[tokio::test]
    async fn dialogues_are_per_user() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);
        dispatch(&state, inbound(USER, "/feedback")).await;

        let out = dispatch(&state, inbound(2002, "random chatter")).await;
        assert_eq!(texts(&out), vec![replies::IDLE_HINT]);
        assert!(store.texts().is_empty());

        dispatch(&state, inbound(USER, "mine")).await;
        assert_eq!(store.texts(), vec!["mine"]);
    }

    #[tokio::test]
    async fn non_admin_is_refused_and_nothing_changes() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);
        dispatch(&state, inbound(USER, "/feedback keep me")).await;
        let before = store.get_stats().await.unwrap();

        for command in ["/export", "/clear", "/reload_employees"] {
            let out = dispatch(&state, inbound(USER, command)).await;
            assert_eq!(texts(&out), vec![replies::ADMIN_ONLY]);
        }

        assert_eq!(store.get_stats().await.unwrap(), before);
    }

    #[tokio::test]
    async fn admin_can_export_and_clear() {
        let store = Arc::new(MemoryFeedback::default());
        let state = test_state(store.clone(), None);

        let out = dispatch(&state, inbound(ADMIN_ID, "/export")).await;
        assert_eq!(texts(&out), vec![replies::NOTHING_TO_EXPORT]);

        dispatch(&state, inbound(USER, "/feedback report")).await;
        let out = dispatch(&state, inbound(ADMIN_ID, "/export")).await;
        match &out[0].message {
            OutboundMessage::Document { filename, bytes } => {
                assert_eq!(filename, EXPORT_FILENAME);
                assert!(!bytes.is_empty());
            }
            other => panic!("expected a document, got {:?}", other),
        }

        let out = dispatch(&state, inbound(ADMIN_ID, "/clear")).await;
        assert_eq!(texts(&out), vec![replies::STORAGE_CLEARED]);
        assert!(store.texts().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_becomes_generic_error_and_keeps_dialogue() {
        let store = Arc::new(MemoryFeedback::failing());
        let state = test_state(store.clone(), None);
        dispatch(&state, inbound(USER, "/feedback")).await;

        let out = dispatch(&state, inbound(USER, "will not be saved")).await;
        assert_eq!(texts(&out), vec![replies::GENERIC_ERROR]);
        assert_eq!(
            state.conversations.state_of(USER).await,
            ConversationState::AwaitingFeedbackText
        );
    }

    #[tokio::test]
    async fn unknown_commands_are_rejected() {
        let state = test_state(Arc::new(MemoryFeedback::default()), None);
        let out = dispatch(&state, inbound(USER, "/launch rockets")).await;
        assert_eq!(texts(&out), vec![replies::unknown_command("/launch")]);
    }

    #[tokio::test]
    async fn directory_commands_validate_and_answer() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv = dir.path().join("employees.csv");
        std::fs::write(
            &csv,
            "name,department,role,email\nIvan Petrov,IT,Developer,ivan@example.com\n",
        )
        .unwrap();
        let state = test_state(Arc::new(MemoryFeedback::default()), Some(csv.as_path()));

        let out = dispatch(&state, inbound(USER, "/find_employee")).await;
        assert_eq!(texts(&out), vec![replies::FIND_EMPLOYEE_USAGE]);

        let out = dispatch(&state, inbound(USER, "/find_employee IVAN")).await;
        assert!(texts(&out)[0].contains("Email: ivan@example.com"));

        let out = dispatch(&state, inbound(USER, "/department Sales")).await;
        assert_eq!(texts(&out), vec![replies::NO_DEPARTMENT_MEMBERS]);

        let out = dispatch(&state, inbound(USER, "/employee_email petrov")).await;
        assert_eq!(texts(&out), vec!["Employee emails:\nIvan Petrov: ivan@example.com"]);

        let out = dispatch(&state, inbound(USER, "/employees")).await;
        assert!(texts(&out)[0].starts_with("Total employees: 1\nBy department:\n• IT: 1"));
    }

    #[tokio::test]
    async fn schema_errors_name_missing_columns() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv = dir.path().join("employees.csv");
        std::fs::write(&csv, "name,role\nIvan,Dev\n").unwrap();
        let state = test_state(Arc::new(MemoryFeedback::default()), Some(csv.as_path()));

        let out = dispatch(&state, inbound(USER, "/employees")).await;
        assert_eq!(
            texts(&out),
            vec![replies::schema_error(&["department".to_string(), "email".to_string()])]
        );

        let out = dispatch(&state, inbound(ADMIN_ID, "/reload_employees")).await;
        assert!(texts(&out)[0].contains("department, email"));
    }

    #[tokio::test]
    async fn missing_employee_file_reports_empty_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv = dir.path().join("absent.csv");
        let state = test_state(Arc::new(MemoryFeedback::default()), Some(csv.as_path()));

        let out = dispatch(&state, inbound(USER, "/employees")).await;
        assert_eq!(texts(&out), vec![replies::EMPLOYEES_EMPTY]);
    }
}
