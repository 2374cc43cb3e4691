//! Line input
//!
//! [`RustylineSource`] drives an interactive terminal; [`ScriptedSource`]
//! replays canned input.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, EditMode, Editor};

use super::completer::ReplHelper;

/// One read attempt
#[derive(Debug)]
pub enum ReadEvent {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D or end of input
    Eof,
    /// Hard read failure
    Failed(io::Error),
}

/// Something that yields lines of input
pub trait LineSource {
    fn read_line(
        &mut self,
        prompt: &str,
    ) -> ReadEvent;

    /// Replace the completion candidates
    fn set_candidates(
        &mut self,
        _candidates: Vec<String>,
    ) {
    }

    fn add_history(
        &mut self,
        _line: &str,
    ) {
    }

    fn save_history(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Line editor settings
#[derive(Debug, Clone)]
pub struct LineEditorConfig {
    /// Enable VI mode
    pub vi_mode: bool,
    /// History file path, `None` disables persistence
    pub history_file: Option<PathBuf>,
    /// Maximum history size
    pub history_size: usize,
}

impl Default for LineEditorConfig {
    fn default() -> Self {
        Self {
            vi_mode: false,
            history_file: None,
            history_size: 1000,
        }
    }
}

fn readline_error(e: ReadlineError) -> io::Error {
    match e {
        ReadlineError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, format!("Readline error: {}", other)),
    }
}

/// Interactive terminal input with history and completion
pub struct RustylineSource {
    editor: Editor<ReplHelper, FileHistory>,
    helper: ReplHelper,
    history_file: Option<PathBuf>,
}

impl RustylineSource {
    pub fn new(config: &LineEditorConfig) -> io::Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .edit_mode(if config.vi_mode {
                EditMode::Vi
            } else {
                EditMode::Emacs
            })
            .max_history_size(config.history_size)
            .map_err(readline_error)?
            .build();

        let mut editor = Editor::with_config(rl_config).map_err(readline_error)?;
        let helper = ReplHelper::new();
        editor.set_helper(Some(helper.clone()));

        // Load history if file exists
        if let Some(ref history_file) = config.history_file {
            if history_file.exists() {
                if let Err(e) = editor.load_history(history_file) {
                    tracing::warn!("Failed to load history from {}: {}", history_file.display(), e);
                }
            }
        }

        Ok(Self {
            editor,
            helper,
            history_file: config.history_file.clone(),
        })
    }
}

impl LineSource for RustylineSource {
    fn read_line(
        &mut self,
        prompt: &str,
    ) -> ReadEvent {
        match self.editor.readline(prompt) {
            Ok(line) => ReadEvent::Line(line),
            Err(ReadlineError::Interrupted) => ReadEvent::Interrupted,
            Err(ReadlineError::Eof) => ReadEvent::Eof,
            Err(e) => ReadEvent::Failed(readline_error(e)),
        }
    }

    fn set_candidates(
        &mut self,
        candidates: Vec<String>,
    ) {
        self.helper.set_candidates(candidates);
    }

    fn add_history(
        &mut self,
        line: &str,
    ) {
        if let Err(e) = self.editor.add_history_entry(line) {
            tracing::debug!("history entry dropped: {}", e);
        }
    }

    fn save_history(&mut self) -> io::Result<()> {
        match self.history_file {
            Some(ref history_file) => self.editor.save_history(history_file).map_err(readline_error),
            None => Ok(()),
        }
    }
}

/// Canned input; runs out with [`ReadEvent::Eof`]
#[derive(Debug, Default)]
pub struct ScriptedSource {
    events: VecDeque<ReadEvent>,
    prompts: Vec<String>,
    candidates: Vec<String>,
    history: Vec<String>,
}

impl ScriptedSource {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            events: lines.into_iter().map(|l| ReadEvent::Line(l.into())).collect(),
            ..Self::default()
        }
    }

    /// Queue an arbitrary event, e.g. an interrupt
    pub fn push(
        &mut self,
        event: ReadEvent,
    ) {
        self.events.push_back(event);
    }

    pub fn push_line(
        &mut self,
        line: impl Into<String>,
    ) {
        self.push(ReadEvent::Line(line.into()));
    }

    /// Every prompt shown so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Candidates from the most recent refresh
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

impl LineSource for ScriptedSource {
    fn read_line(
        &mut self,
        prompt: &str,
    ) -> ReadEvent {
        self.prompts.push(prompt.to_string());
        self.events.pop_front().unwrap_or(ReadEvent::Eof)
    }

    fn set_candidates(
        &mut self,
        candidates: Vec<String>,
    ) {
        self.candidates = candidates;
    }

    fn add_history(
        &mut self,
        line: &str,
    ) {
        self.history.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_runs_out_with_eof() {
        let mut source = ScriptedSource::new(["1 + 1"]);
        source.push(ReadEvent::Interrupted);
        assert!(matches!(source.read_line("db > "), ReadEvent::Line(l) if l == "1 + 1"));
        assert!(matches!(source.read_line("db > "), ReadEvent::Interrupted));
        assert!(matches!(source.read_line("... "), ReadEvent::Eof));
        assert_eq!(source.prompts(), ["db > ", "db > ", "... "]);
    }
}
