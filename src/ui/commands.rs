use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a line with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Print the command list
    Help,
    /// Delete every conversation, then start a new one
    Clear,
    /// List recent conversations
    List,
    /// Show the record of the current conversation
    History,
    /// Set the title of the current conversation
    Name,
    /// Stop and reset the current conversation
    Restart,
    /// Start a new conversation
    New,
    /// Switch to another conversation by id
    Change,
    /// Regenerate the last answer
    Repeat,
    /// Ask for an image and print its link
    Draw,
    /// Leave the program
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Help => "Print this help message.",
            SlashCommand::Clear => "Clear all conversations.",
            SlashCommand::List => "List all conversations.",
            SlashCommand::History => "List the chat history of the current conversation.",
            SlashCommand::Name => "Set the name of the current conversation.",
            SlashCommand::Restart => "Restart the current conversation.",
            SlashCommand::New => "Create a new conversation.",
            SlashCommand::Change => "Change the current conversation.",
            SlashCommand::Repeat => "Regenerate the last reply.",
            SlashCommand::Draw => "Draw an image from a description and print its link.",
            SlashCommand::Exit => "Exit the program.",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Usage hint for commands that take an argument
    pub fn usage(self) -> Option<&'static str> {
        match self {
            SlashCommand::Name => Some("/name <title>"),
            SlashCommand::Change => Some("/change <chat id>"),
            SlashCommand::Draw => Some("/draw <description>"),
            _ => None,
        }
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input.
///
/// Returns `None` for input that is not a slash command or names an unknown
/// command. The argument is the rest of the line with its inner spacing
/// preserved.
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let body = input.trim().strip_prefix('/')?;
    let (head, rest) = body
        .split_once(char::is_whitespace)
        .unwrap_or((body, ""));

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "bye" => Some(SlashCommand::Exit),
            "h" | "?" => Some(SlashCommand::Help),
            "setname" | "rename" => Some(SlashCommand::Name),
            _ => None,
        })?;

    let rest = rest.trim();
    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Commands:\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("    /{:<12}{}\n", command_str, command.description()));
    }
    help.push_str("\nAny other input is sent as a prompt. Alt+Enter or a trailing \\ starts a new line.");
    help.push_str("\nCtrl-C or Ctrl-D exits.");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_built_in_command() {
        for (keyword, command) in built_in_slash_commands() {
            let parsed = parse_slash_command(&format!("/{keyword}")).unwrap();
            assert_eq!(parsed.command, command);
            assert_eq!(parsed.argument(), None);
        }
    }

    #[test]
    fn argument_keeps_inner_spacing() {
        let parsed = parse_slash_command("/name  Weekend   trip plans ").unwrap();
        assert_eq!(parsed.command, SlashCommand::Name);
        assert_eq!(parsed.argument(), Some("Weekend   trip plans"));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(parse_slash_command("/quit").unwrap().command, SlashCommand::Exit);
        assert_eq!(parse_slash_command("/setName x").unwrap().command, SlashCommand::Name);
        assert_eq!(parse_slash_command("/?").unwrap().command, SlashCommand::Help);
    }

    #[test]
    fn unknown_and_plain_input_are_not_commands() {
        assert_eq!(parse_slash_command("/teleport now"), None);
        assert_eq!(parse_slash_command("hello /help"), None);
        assert_eq!(parse_slash_command(""), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for (keyword, _) in built_in_slash_commands() {
            assert!(help.contains(&format!("/{keyword}")));
        }
    }
}
