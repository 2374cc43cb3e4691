//! Completion Source
//!
//! Supplies completion candidates to rustyline from the session state.

use std::cell::RefCell;
use std::rc::Rc;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;

use crate::repl::commands::MetaCommand;
use crate::repl::engine::context::SessionContext;

/// Builds the candidate list: commands, function names and variable names
#[derive(Debug, Clone)]
pub struct CompletionSource {
    commands: Vec<String>,
}

impl Default for CompletionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSource {
    pub fn new() -> Self {
        let mut commands: Vec<String> = MetaCommand::ALL
            .iter()
            .map(|command| format!(":{}", command.name()))
            .collect();
        commands.push("exit".to_string());
        commands.push("quit".to_string());
        Self { commands }
    }

    /// Sorted, deduplicated candidates for the current state
    pub fn candidates(
        &self,
        ctx: &SessionContext,
    ) -> Vec<String> {
        let mut candidates = self.commands.clone();
        candidates.extend(ctx.functions.names().map(str::to_string));
        candidates.extend(ctx.bindings.user_names().into_iter().map(str::to_string));
        candidates.sort();
        candidates.dedup();
        candidates
    }
}

/// Word under the cursor and the candidates it prefixes.
///
/// Returns the byte offset where the word starts.
pub fn complete_word(
    line: &str,
    pos: usize,
    candidates: &[String],
) -> (usize, Vec<String>) {
    let pos = pos.min(line.len());
    let head = line.get(..pos).unwrap_or(line);
    let start = head
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = &head[start..];
    if word.is_empty() {
        return (start, Vec::new());
    }

    let matches = candidates
        .iter()
        .filter(|candidate| candidate.starts_with(word))
        .cloned()
        .collect();
    (start, matches)
}

/// rustyline helper sharing the candidate list with the session
#[derive(Debug, Clone, Default)]
pub struct ReplHelper {
    candidates: Rc<RefCell<Vec<String>>>,
}

impl ReplHelper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_candidates(
        &self,
        candidates: Vec<String>,
    ) {
        *self.candidates.borrow_mut() = candidates;
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, matches) = complete_word(line, pos, &self.candidates.borrow());
        let pairs = matches
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}
