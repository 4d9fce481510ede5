//! In-place markdown repaint of a streaming answer.
//!
//! Each repaint moves the cursor back over the lines drawn last time, clears
//! everything below it and prints the freshly formatted answer. While the
//! answer is still arriving only its tail that fits on screen is drawn, so the
//! cursor never has to climb past the top row. The final repaint prints the
//! whole answer. Markdown goes through `termimad`; terminal control through
//! `crossterm`.

use crossterm::cursor::{MoveToColumn, MoveToPreviousLine};
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use std::io::{self, Stdout, Write};
use termimad::MadSkin;

use crate::streaming::Renderer;

/// Marker drawn after the text while the answer is still arriving
pub const CURSOR: char = '█';

const FALLBACK_WIDTH: usize = 80;
const FALLBACK_HEIGHT: usize = 24;

pub struct TerminalRenderer<W: Write> {
    out: W,
    skin: MadSkin,
    drawn_lines: usize,
    /// Fixed viewport height; the terminal is queried when unset
    height: Option<usize>,
}

impl TerminalRenderer<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        let mut skin = MadSkin::default();
        skin.inline_code
            .set_fg(termimad::crossterm::style::Color::Yellow);

        Self {
            out,
            skin,
            drawn_lines: 0,
            height: None,
        }
    }

    #[cfg(test)]
    fn with_height(mut self, rows: usize) -> Self {
        self.height = Some(rows);
        self
    }

    fn viewport_height(&self) -> usize {
        self.height
            .or_else(|| terminal::size().ok().map(|(_, rows)| rows as usize))
            .unwrap_or(FALLBACK_HEIGHT)
    }
}

/// Markdown source for one repaint
pub fn compose(text: &str, show_cursor: bool) -> String {
    let mut markdown = text.trim().to_string();
    if show_cursor {
        markdown.push(CURSOR);
    }
    markdown
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, text: &str, show_cursor: bool) -> io::Result<()> {
        let markdown = compose(text, show_cursor);
        let width = terminal::size()
            .map(|(columns, _)| columns as usize)
            .unwrap_or(FALLBACK_WIDTH);
        let formatted = self.skin.text(&markdown, Some(width)).to_string();
        let lines: Vec<&str> = formatted.lines().collect();

        let shown = if show_cursor {
            // one row stays free for the line the cursor ends on
            let rows = self.viewport_height().saturating_sub(1).max(1);
            &lines[lines.len().saturating_sub(rows)..]
        } else {
            &lines[..]
        };

        if self.drawn_lines > 0 {
            let up = u16::try_from(self.drawn_lines).unwrap_or(u16::MAX);
            queue!(self.out, MoveToPreviousLine(up))?;
        } else {
            queue!(self.out, MoveToColumn(0))?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        for line in shown {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;

        self.drawn_lines = shown.len();
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.drawn_lines = 0;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_trims_and_appends_cursor() {
        assert_eq!(compose("  hello \n", true), format!("hello{CURSOR}"));
        assert_eq!(compose("  hello \n", false), "hello");
    }

    #[test]
    fn repeated_render_differs_only_by_cursor() {
        assert_eq!(compose("same", true), format!("{}{CURSOR}", compose("same", false)));
        assert_eq!(compose("same", true), compose("same", true));
    }

    #[test]
    fn second_render_moves_back_over_previous_output() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render("first", true).unwrap();
        assert_eq!(renderer.drawn_lines, 1);
        let first_len = renderer.out.len();

        renderer.render("first second", false).unwrap();
        let second = String::from_utf8_lossy(&renderer.out[first_len..]).into_owned();

        assert!(second.starts_with("\u{1b}[1F"));
        assert!(second.contains("second"));
        assert!(!second.contains(CURSOR));
    }

    #[test]
    fn live_repaint_stays_within_the_viewport() {
        let answer: String = (0..400).map(|i| format!("line {i}\n")).collect();
        let mut renderer = TerminalRenderer::new(Vec::new()).with_height(10);

        renderer.render(&answer, true).unwrap();
        assert_eq!(renderer.drawn_lines, 9);
        let first_len = renderer.out.len();

        renderer.render(&answer, true).unwrap();
        let second = String::from_utf8_lossy(&renderer.out[first_len..]).into_owned();
        assert!(second.starts_with("\u{1b}[9F"));
        assert!(second.contains("line 399"));
        assert!(!second.contains("line 0\n"));
        assert_eq!(renderer.drawn_lines, 9);
    }

    #[test]
    fn final_repaint_prints_the_whole_answer() {
        let answer: String = (0..50).map(|i| format!("row {i}\n")).collect();
        let mut renderer = TerminalRenderer::new(Vec::new()).with_height(10);

        renderer.render(&answer, true).unwrap();
        let live_len = renderer.out.len();
        renderer.render(&answer, false).unwrap();
        let last = String::from_utf8_lossy(&renderer.out[live_len..]).into_owned();

        assert!(last.starts_with("\u{1b}[9F"));
        assert!(last.contains("row 0"));
        assert!(last.contains("row 49"));
        assert!(renderer.drawn_lines >= 50);
    }

    #[test]
    fn finish_starts_the_next_answer_below() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render("line", false).unwrap();
        renderer.finish().unwrap();
        assert_eq!(renderer.drawn_lines, 0);

        let before = renderer.out.len();
        renderer.render("next", true).unwrap();
        let output = String::from_utf8_lossy(&renderer.out[before..]).into_owned();
        assert!(!output.contains("\u{1b}[1F"));
    }
}
