//! Input Classifier
//!
//! Decides what a chunk of console input is before anything is evaluated.
//! Everything here is a heuristic over raw text: braces inside string
//! literals or comments are counted like any other brace.

use once_cell::sync::Lazy;
use regex::Regex;

/// Classified console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line
    Empty,
    /// `exit` or `quit`
    Exit,
    /// `:command args`
    Meta { command: String, args: String },
    /// `def x = expr` / `var x = expr`
    Declaration {
        keyword: String,
        name: String,
        expr: String,
    },
    /// `def name(params) { body }`; `source` is the whole definition
    FunctionDefinition { name: String, source: String },
    /// Bare `x = expr`
    Assignment { name: String, expr: String },
    /// Anything else, handed to the evaluator as is
    Expression(String),
    /// More lines are needed before the input can be classified
    Incomplete,
}

impl Input {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Input::Empty => "empty",
            Input::Exit => "exit",
            Input::Meta { .. } => "meta",
            Input::Declaration { .. } => "declaration",
            Input::FunctionDefinition { .. } => "function-definition",
            Input::Assignment { .. } => "assignment",
            Input::Expression(_) => "expression",
            Input::Incomplete => "incomplete",
        }
    }
}

static META: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^:(\S*)\s*(.*)$").expect("meta-command pattern"));

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(def|var)\s+([\p{XID_Start}_][\p{XID_Continue}]*)\s*(.*)$")
        .expect("declaration pattern")
});

/// Classify an accumulated input buffer
pub fn classify(buffer: &str) -> Input {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }

    // Commands are never continued, whatever braces their arguments hold
    if let Some(caps) = META.captures(trimmed) {
        return Input::Meta {
            command: caps[1].to_lowercase(),
            args: caps[2].trim().to_string(),
        };
    }

    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return Input::Exit;
    }

    if !is_complete(trimmed) {
        return Input::Incomplete;
    }

    if let Some(caps) = DECLARATION.captures(trimmed) {
        let rest = &caps[3];
        if rest.starts_with('(') && rest.contains(')') {
            return Input::FunctionDefinition {
                name: caps[2].to_string(),
                source: trimmed.to_string(),
            };
        }
        if let Some(expr) = rest.strip_prefix('=').filter(|e| !e.starts_with('=')) {
            let expr = expr.trim();
            if !expr.is_empty() {
                return Input::Declaration {
                    keyword: caps[1].to_string(),
                    name: caps[2].to_string(),
                    expr: expr.to_string(),
                };
            }
        }
        return Input::Expression(trimmed.to_string());
    }

    match find_assignment(trimmed) {
        Some((name, expr)) => Input::Assignment {
            name: name.to_string(),
            expr: expr.to_string(),
        },
        None => Input::Expression(trimmed.to_string()),
    }
}

/// `true` unless the buffer has more `{` than `}`.
///
/// Surplus closing braces count as complete so the evaluator can report them.
pub fn is_complete(buffer: &str) -> bool {
    let opens = buffer.chars().filter(|&c| c == '{').count();
    let closes = buffer.chars().filter(|&c| c == '}').count();
    opens <= closes
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || unicode_ident::is_xid_start(first) => {
            chars.all(unicode_ident::is_xid_continue)
        }
        _ => false,
    }
}

/// Split `name = expr` on the first `=` that is not part of `==`, `>=`,
/// `<=` or `!=`. The left-hand side must be a bare identifier.
pub fn find_assignment(line: &str) -> Option<(&str, &str)> {
    let index = line.find('=')?;
    let before = line[..index].chars().next_back();
    let after = line[index + 1..].chars().next();
    if matches!(before, Some('=' | '!' | '<' | '>')) || after == Some('=') {
        return None;
    }

    let name = line[..index].trim();
    let expr = line[index + 1..].trim();
    if is_identifier(name) && !expr.is_empty() {
        Some((name, expr))
    } else {
        None
    }
}
