use std::str::FromStr;

use crate::events::UserRole;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new chat
    New,
    /// Ask the last question again
    Regenerate,
    /// Switch the role queries are sent as
    Role,
    /// Delete the current session
    Delete,
    /// Copy the last answer to the clipboard
    Copy,
    /// Exit the application
    Bye,
    /// Show help
    Help,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn role_target(&self) -> Option<UserRole> {
        if self.command != SlashCommand::Role {
            return None;
        }

        let arg = self.argument()?.trim().to_lowercase();
        match arg.as_str() {
            "e" | "emp" => Some(UserRole::Employee),
            "m" | "mgr" => Some(UserRole::Manager),
            other => UserRole::from_str(other).ok(),
        }
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new chat",
            SlashCommand::Regenerate => "ask the last question again",
            SlashCommand::Role => "switch role (employee, hr, manager)",
            SlashCommand::Delete => "delete the current chat",
            SlashCommand::Copy => "copy the last answer to the clipboard",
            SlashCommand::Bye => "exit the application",
            SlashCommand::Help => "show available commands",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a query is in flight.
    pub fn available_while_submitting(self) -> bool {
        match self {
            SlashCommand::Regenerate => false,
            SlashCommand::New
            | SlashCommand::Role
            | SlashCommand::Delete
            | SlashCommand::Copy
            | SlashCommand::Bye
            | SlashCommand::Help => true,
        }
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "n" | "clear" => Some(SlashCommand::New),
            "r" | "retry" => Some(SlashCommand::Regenerate),
            "rm" => Some(SlashCommand::Delete),
            "cp" | "yank" => Some(SlashCommand::Copy),
            _ => None,
        })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /n for /new, /r for /regenerate, /rm for /delete, /cp for /copy.");
    help.push_str("\nKeys: Tab switches to the chat list, Ctrl+N new chat, Ctrl+R regenerate, Ctrl+C quit.");

    help
}
