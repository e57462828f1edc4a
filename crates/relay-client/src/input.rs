//! Parsing of typed input lines.

use std::path::PathBuf;

/// What a line typed by the user asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Send the line as a chat message.
    Text(String),

    /// Send a file: `/file <path>`.
    SendFile(PathBuf),

    /// Leave the chat: `/quit`.
    Quit,

    /// Blank line or a command missing its argument.
    Ignore,
}

impl InputCommand {
    /// Parses one line of user input.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return InputCommand::Ignore;
        }

        if line.eq_ignore_ascii_case("/quit") {
            return InputCommand::Quit;
        }

        if let Some(rest) = line.strip_prefix("/file") {
            // "/filename" is ordinary text, only "/file" or "/file <path>" is the command
            if rest.is_empty() {
                return InputCommand::Ignore;
            }
            if rest.starts_with(char::is_whitespace) {
                let path = rest.trim();
                return if path.is_empty() {
                    InputCommand::Ignore
                } else {
                    InputCommand::SendFile(PathBuf::from(path))
                };
            }
        }

        InputCommand::Text(line.to_string())
    }
}
