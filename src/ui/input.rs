use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use crossterm::style::Stylize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Context, Editor, Helper, KeyCode, KeyEvent, Modifiers};

use super::commands::built_in_slash_commands;

/// rustyline helper completing and hinting slash commands
#[derive(Clone)]
pub struct CommandHelper {
    commands: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        Self {
            commands: built_in_slash_commands()
                .into_iter()
                .map(|(keyword, _)| format!("/{keyword}"))
                .collect(),
        }
    }

    fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.commands.iter().filter(move |cmd| cmd.starts_with(prefix))
    }
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }

        let candidates = self
            .matching(line)
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CommandHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.dark_grey().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }

        self.matching(line)
            .find(|cmd| cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

/// Line ending that asks for another line instead of sending
const CONTINUATION: char = '\\';

/// Whether the input so far ends in a continuation marker
fn is_continued(input: &str) -> bool {
    input.trim_end_matches([' ', '\t']).ends_with(CONTINUATION)
}

/// Drop the continuation markers, keeping the line breaks they asked for
fn join_continued(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            match line.trim_end_matches([' ', '\t']).strip_suffix(CONTINUATION) {
                Some(head) => head.trim_end(),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Validator for CommandHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if is_continued(ctx.input()) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// What the user did at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C or Ctrl-D
    Exit,
}

/// Line editor with history and command completion.
///
/// Enter sends the input. Alt+Enter, or a trailing `\`, starts another line
/// of the same prompt.
pub struct PromptReader {
    editor: Editor<CommandHelper, DefaultHistory>,
}

impl PromptReader {
    pub fn new() -> Result<Self> {
        let mut editor = Editor::new()?;
        editor.set_helper(Some(CommandHelper::new()));
        editor.bind_sequence(KeyEvent(KeyCode::Enter, Modifiers::ALT), Cmd::Newline);
        Ok(Self { editor })
    }

    pub fn read(&mut self, prompt: &str) -> Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        tracing::debug!(error = %err, "input not added to history");
                    }
                }
                Ok(Input::Line(join_continued(&line)))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(Input::Exit),
            Err(err) => Err(err.into()),
        }
    }
}
