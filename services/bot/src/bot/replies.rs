//! services/bot/src/bot/replies.rs
//!
//! Every piece of user-facing text the bot sends.

use crate::bot::protocol::Command;
use feedback_desk_core::domain::{
    DirectorySummary, Employee, Envelope, FeedbackEntry, FeedbackStats, InboundMessage,
    OutboundMessage,
};

/// How many users `/stats` lists.
const TOP_USERS_SHOWN: usize = 5;

pub const FEEDBACK_THANKS: &str = "Thank you for your feedback!";
pub const FEEDBACK_SAVED: &str = "Thank you! Your message has been saved.";
pub const FEEDBACK_PROMPT: &str = "Please send the text of your feedback.";
pub const EMPTY_FEEDBACK: &str = "The text cannot be empty. Please try again.";
pub const CANCELLED: &str = "Cancelled.";
pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";
pub const IDLE_HINT: &str = "To leave feedback send /feedback. Send /help to see all commands.";

pub const ADMIN_ONLY: &str = "This command is available to the administrator only.";
pub const NOTHING_TO_EXPORT: &str = "There is no feedback to export yet.";
pub const EXPORT_FAILED: &str = "Could not prepare the export. Please try again later.";
pub const STORAGE_CLEARED: &str = "The feedback storage has been cleared.";

pub const EMPLOYEES_EMPTY: &str = "The employee list is empty or unavailable.";
pub const NO_EMPLOYEES_FOUND: &str = "No employees found.";
pub const NO_DEPARTMENT_MEMBERS: &str = "No employees found in this department.";
pub const NO_EMAIL_MATCHES: &str = "No employees with that name were found.";
pub const FIND_EMPLOYEE_USAGE: &str =
    "Add a name or role after the command, for example /find_employee Ivan.";
pub const DEPARTMENT_USAGE: &str =
    "Add a department name after the command, for example /department IT.";
pub const EMPLOYEE_EMAIL_USAGE: &str =
    "Add an employee name after the command, for example /employee_email Maria.";
pub const DIRECTORY_UNAVAILABLE: &str = "Could not load employee data. Please try again later.";

pub const GENERIC_ERROR: &str = "An error occurred. Please try again later.";

/// A single text reply to the chat the message came from.
pub(crate) fn reply(message: &InboundMessage, text: impl Into<String>) -> Vec<Envelope> {
    vec![Envelope::reply(message.chat_id, OutboundMessage::text(text))]
}

fn usage(command: Command) -> &'static str {
    match command {
        Command::Feedback => " [text]",
        Command::FindEmployee => " <query>",
        Command::Department => " <name>",
        Command::EmployeeEmail => " <name>",
        _ => "",
    }
}

fn description(command: Command) -> &'static str {
    match command {
        Command::Start => "greeting",
        Command::Help => "this help",
        Command::Feedback => "send feedback right away, or without text to be asked for it",
        Command::Cancel => "cancel the feedback dialogue",
        Command::Stats => "message statistics",
        Command::Export => "export feedback as CSV (administrator only)",
        Command::Clear => "delete all feedback (administrator only)",
        Command::Employees => "employee summary by department",
        Command::FindEmployee => "find employees by name or role",
        Command::Department => "employees of a department",
        Command::EmployeeEmail => "look up an employee's email",
        Command::ReloadEmployees => "re-read the employee file (administrator only)",
    }
}

pub fn command_list() -> String {
    Command::ALL
        .iter()
        .map(|&command| format!("{}{} - {}", command, usage(command), description(command)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn welcome() -> String {
    format!(
        "Hi! I collect feedback and can help you find colleagues.\nHere is what I can do:\n{}",
        command_list()
    )
}

pub fn help() -> String {
    format!("Available commands:\n{}", command_list())
}

pub fn unknown_command(token: &str) -> String {
    format!("Unknown command {}. Send /help to see what I can do.", token)
}

pub fn admin_notice(entry: &FeedbackEntry) -> String {
    let from = entry
        .full_name
        .as_deref()
        .or(entry.username.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| entry.user_id.to_string());
    format!(
        "📬 New feedback\nFrom: {}\nID: {}\nText: {}",
        from, entry.user_id, entry.text
    )
}

pub fn stats(stats: &FeedbackStats) -> String {
    let mut lines = vec![format!("Total messages: {}", stats.total_messages)];
    if stats.top_users.is_empty() {
        lines.push("No user data yet.".to_string());
    } else {
        lines.push("Top users:".to_string());
        for (rank, user) in stats.top_users.iter().take(TOP_USERS_SHOWN).enumerate() {
            lines.push(format!("{}. {}: {}", rank + 1, user.user_id, user.count));
        }
    }
    lines.join("\n")
}

pub fn directory_summary(summary: &DirectorySummary) -> String {
    let mut lines = vec![
        format!("Total employees: {}", summary.total),
        "By department:".to_string(),
    ];
    for (department, count) in &summary.per_department {
        lines.push(format!("• {}: {}", department, count));
    }
    lines.push(format!(
        "\nUse {}, {} or {} for details.",
        Command::FindEmployee,
        Command::Department,
        Command::EmployeeEmail
    ));
    lines.join("\n")
}

pub fn employee_card(employee: &Employee) -> String {
    format!(
        "Name: {}\nDepartment: {}\nRole: {}\nEmail: {}",
        employee.name, employee.department, employee.role, employee.email
    )
}

pub fn employee_list(title: &str, employees: &[Employee]) -> String {
    let cards: Vec<String> = employees.iter().map(employee_card).collect();
    format!("{}\n{}", title, cards.join("\n\n"))
}

pub fn found_employees(employees: &[Employee]) -> String {
    employee_list("Employees found:", employees)
}

pub fn department_members(department: &str, employees: &[Employee]) -> String {
    employee_list(&format!("Employees of '{}':", department), employees)
}

pub fn employee_emails(employees: &[Employee]) -> String {
    let mut lines = vec!["Employee emails:".to_string()];
    lines.extend(
        employees
            .iter()
            .map(|employee| format!("{}: {}", employee.name, employee.email)),
    );
    lines.join("\n")
}

pub fn schema_error(columns: &[String]) -> String {
    format!(
        "The employee file has errors: missing required columns: {}",
        columns.join(", ")
    )
}

pub fn directory_reloaded(count: usize) -> String {
    format!("Employee data reloaded: {} records.", count)
}
