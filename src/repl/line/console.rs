//! Terminal output

use std::io::{self, Write};

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;

use crate::repl::error::SessionError;

/// Where the console writes its own messages
pub trait Console {
    /// Plain line
    fn line(
        &mut self,
        text: &str,
    ) -> io::Result<()>;

    /// Confirmation line, green on a color terminal
    fn success(
        &mut self,
        text: &str,
    ) -> io::Result<()>;

    /// Failure line, red on a color terminal
    fn error(
        &mut self,
        text: &str,
    ) -> io::Result<()>;

    /// Clear the viewport
    fn clear(&mut self) -> io::Result<()>;

    /// Report a recoverable error; the engine diagnostic only in debug mode
    fn report(
        &mut self,
        err: &SessionError,
        debug_mode: bool,
    ) -> io::Result<()> {
        self.error(&err.to_string())?;
        if debug_mode {
            if let Some(diagnostic) = err.diagnostic() {
                self.error(&diagnostic)?;
            }
        }
        Ok(())
    }
}

/// Console on stdout
#[derive(Debug)]
pub struct StdConsole {
    colors: bool,
}

impl StdConsole {
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    fn write_line(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", text)?;
        stdout.flush()
    }
}

impl Console for StdConsole {
    fn line(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        self.write_line(text)
    }

    fn success(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        if self.colors {
            self.write_line(&text.green().to_string())
        } else {
            self.write_line(text)
        }
    }

    fn error(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        if self.colors {
            self.write_line(&text.red().to_string())
        } else {
            self.write_line(text)
        }
    }

    fn clear(&mut self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))
    }
}

/// Style of a recorded line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    Success,
    Error,
}

/// Console that records everything, for tests and embedding
#[derive(Debug, Default)]
pub struct BufferConsole {
    lines: Vec<(LineStyle, String)>,
    clears: usize,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[(LineStyle, String)] {
        &self.lines
    }

    /// All output joined with newlines
    pub fn output(&self) -> String {
        self.lines
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn errors(&self) -> Vec<&str> {
        self.with_style(LineStyle::Error)
    }

    pub fn successes(&self) -> Vec<&str> {
        self.with_style(LineStyle::Success)
    }

    fn with_style(
        &self,
        style: LineStyle,
    ) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(s, _)| *s == style)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    fn push(
        &mut self,
        style: LineStyle,
        text: &str,
    ) {
        // multi-line messages are recorded line by line
        for line in text.lines() {
            self.lines.push((style, line.to_string()));
        }
        if text.is_empty() {
            self.lines.push((style, String::new()));
        }
    }
}

impl Console for BufferConsole {
    fn line(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        self.push(LineStyle::Plain, text);
        Ok(())
    }

    fn success(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        self.push(LineStyle::Success, text);
        Ok(())
    }

    fn error(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        self.push(LineStyle::Error, text);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }
}
