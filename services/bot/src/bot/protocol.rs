//! services/bot/src/bot/protocol.rs
//!
//! Defines the closed set of bot commands and how raw message text is classified
//! before routing.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// `/token`, an optional `@botname` suffix, then free-form arguments.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_]+)(?:@[A-Za-z0-9_]+)?(?:\s+([\s\S]*))?$")
        .expect("command pattern is a valid regex")
});

//=========================================================================================
// Commands
//=========================================================================================

/// Every command the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Help,
    Feedback,
    Cancel,
    Stats,
    Export,
    Clear,
    Employees,
    FindEmployee,
    Department,
    EmployeeEmail,
    ReloadEmployees,
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::Start,
        Command::Help,
        Command::Feedback,
        Command::Cancel,
        Command::Stats,
        Command::Export,
        Command::Clear,
        Command::Employees,
        Command::FindEmployee,
        Command::Department,
        Command::EmployeeEmail,
        Command::ReloadEmployees,
    ];

    /// The token users type after the slash.
    pub fn token(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Feedback => "feedback",
            Command::Cancel => "cancel",
            Command::Stats => "stats",
            Command::Export => "export",
            Command::Clear => "clear",
            Command::Employees => "employees",
            Command::FindEmployee => "find_employee",
            Command::Department => "department",
            Command::EmployeeEmail => "employee_email",
            Command::ReloadEmployees => "reload_employees",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.token().eq_ignore_ascii_case(token))
    }

    /// Admin-only commands are refused for everybody but the configured admin.
    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            Command::Export | Command::Clear | Command::ReloadEmployees
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.token())
    }
}

//=========================================================================================
// Input Classification
//=========================================================================================

/// What an inbound message turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A known command. `args` is whitespace-normalized and may be empty.
    Command { command: Command, args: String },
    /// Looked like a command but is not one we know.
    UnknownCommand(String),
    /// Free-form text.
    Text(String),
    /// The message carried no text at all.
    Empty,
}

impl Input {
    pub fn parse(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Input::Empty;
        };
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return Input::Text(text.to_string());
        }

        match COMMAND_RE.captures(trimmed) {
            Some(captures) => {
                let token = &captures[1];
                let args = captures
                    .get(2)
                    .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();
                match Command::from_token(token) {
                    Some(command) => Input::Command { command, args },
                    None => Input::UnknownCommand(format!("/{}", token)),
                }
            }
            None => Input::UnknownCommand(
                trimmed.split_whitespace().next().unwrap_or(trimmed).to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(command: Command, args: &str) -> Input {
        Input::Command {
            command,
            args: args.to_string(),
        }
    }

    #[test]
    fn test_parse_bare_commands() {
        assert_eq!(Input::parse(Some("/start")), command(Command::Start, ""));
        assert_eq!(Input::parse(Some("  /stats  ")), command(Command::Stats, ""));
        assert_eq!(Input::parse(Some("/EXPORT")), command(Command::Export, ""));
    }

    #[test]
    fn test_parse_command_arguments_are_normalized() {
        assert_eq!(
            Input::parse(Some("/feedback   the  lift\nis broken ")),
            command(Command::Feedback, "the lift is broken")
        );
        assert_eq!(
            Input::parse(Some("/find_employee Ivan")),
            command(Command::FindEmployee, "Ivan")
        );
    }

    #[test]
    fn test_parse_strips_bot_mention() {
        assert_eq!(
            Input::parse(Some("/department@FeedbackDeskBot IT")),
            command(Command::Department, "IT")
        );
    }

    #[test]
    fn test_parse_unknown_commands() {
        assert_eq!(
            Input::parse(Some("/launch now")),
            Input::UnknownCommand("/launch".to_string())
        );
        assert_eq!(
            Input::parse(Some("/привет")),
            Input::UnknownCommand("/привет".to_string())
        );
        // No space between token and argument makes it a different token.
        assert_eq!(
            Input::parse(Some("/feedbackhello")),
            Input::UnknownCommand("/feedbackhello".to_string())
        );
    }

    #[test]
    fn test_parse_text_and_empty() {
        assert_eq!(Input::parse(Some("hello")), Input::Text("hello".to_string()));
        assert_eq!(Input::parse(Some("   ")), Input::Text("   ".to_string()));
        assert_eq!(Input::parse(None), Input::Empty);
    }

    #[test]
    fn test_every_token_round_trips() {
        for command in Command::ALL {
            assert_eq!(Command::from_token(command.token()), Some(command));
        }
    }

    #[test]
    fn test_admin_commands() {
        let admin: Vec<Command> = Command::ALL
            .into_iter()
            .filter(|c| c.requires_admin())
            .collect();
        assert_eq!(
            admin,
            vec![Command::Export, Command::Clear, Command::ReloadEmployees]
        );
    }
}
