//! services/bot/src/bot/directory.rs
//!
//! Handlers for the employee directory lookups.

use crate::bot::replies;
use crate::bot::state::AppState;
use feedback_desk_core::domain::{Employee, Envelope, InboundMessage};
use feedback_desk_core::ports::{PortError, PortResult};
use tracing::{error, info};

pub const SEARCH_LIMIT: usize = 10;
pub const DEPARTMENT_LIMIT: usize = 20;

/// Turns a directory failure into something the user can act on. Schema problems are
/// spelled out; anything else is logged and reported generically.
fn failure(message: &InboundMessage, action: &str, e: PortError) -> Vec<Envelope> {
    match e {
        PortError::MissingColumns(columns) => {
            replies::reply(message, replies::schema_error(&columns))
        }
        other => {
            error!("Failed to {}: {:?}", action, other);
            replies::reply(message, replies::DIRECTORY_UNAVAILABLE)
        }
    }
}

pub async fn summary(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    Ok(match state.directory.summarize().await {
        Ok(summary) if summary.total == 0 => replies::reply(message, replies::EMPLOYEES_EMPTY),
        Ok(summary) => replies::reply(message, replies::directory_summary(&summary)),
        Err(e) => failure(message, "summarize employees", e),
    })
}

pub async fn find_employee(
    state: &AppState,
    message: &InboundMessage,
    args: &str,
) -> PortResult<Vec<Envelope>> {
    let query = args.trim();
    if query.is_empty() {
        return Ok(replies::reply(message, replies::FIND_EMPLOYEE_USAGE));
    }

    Ok(match state.directory.search(query, SEARCH_LIMIT).await {
        Ok(found) => list_or(
            message,
            &found,
            replies::NO_EMPLOYEES_FOUND,
            replies::found_employees,
        ),
        Err(e) => failure(message, "search employee data", e),
    })
}

pub async fn department(
    state: &AppState,
    message: &InboundMessage,
    args: &str,
) -> PortResult<Vec<Envelope>> {
    let department = args.trim();
    if department.is_empty() {
        return Ok(replies::reply(message, replies::DEPARTMENT_USAGE));
    }

    Ok(match state.directory.by_department(department, DEPARTMENT_LIMIT).await {
        Ok(found) => list_or(message, &found, replies::NO_DEPARTMENT_MEMBERS, |employees| {
            replies::department_members(department, employees)
        }),
        Err(e) => failure(message, "load department data", e),
    })
}

pub async fn employee_email(
    state: &AppState,
    message: &InboundMessage,
    args: &str,
) -> PortResult<Vec<Envelope>> {
    let name = args.trim();
    if name.is_empty() {
        return Ok(replies::reply(message, replies::EMPLOYEE_EMAIL_USAGE));
    }

    Ok(match state.directory.find_email(name).await {
        Ok(found) => list_or(message, &found, replies::NO_EMAIL_MATCHES, replies::employee_emails),
        Err(e) => failure(message, "search emails", e),
    })
}

pub async fn reload(state: &AppState, message: &InboundMessage) -> PortResult<Vec<Envelope>> {
    Ok(match state.directory.reload().await {
        Ok(count) => {
            info!("Employee directory reloaded by user {}: {} records", message.sender.id, count);
            replies::reply(message, replies::directory_reloaded(count))
        }
        Err(e) => failure(message, "reload employee data", e),
    })
}

fn list_or<F>(message: &InboundMessage, found: &[Employee], none: &str, render: F) -> Vec<Envelope>
where
    F: Fn(&[Employee]) -> String,
{
    if found.is_empty() {
        replies::reply(message, none)
    } else {
        replies::reply(message, render(found))
    }
}
