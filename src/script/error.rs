//! Script error types

use std::fmt;

use thiserror::Error;

/// Position in script source (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(
        line: usize,
        col: usize,
    ) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

/// Broad class of a script failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tokenizer or parser rejected the source
    Syntax,
    /// Reference to a name that is not bound anywhere
    Unbound,
    /// Operation applied to a value of the wrong type
    Type,
    /// Division by zero, overflow and friends
    Arithmetic,
    /// Anything else raised while running
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Unbound => "UnboundReference",
            ErrorKind::Type => "TypeError",
            ErrorKind::Arithmetic => "ArithmeticError",
            ErrorKind::Runtime => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// Error raised while compiling or running a script.
///
/// `trace` collects one entry per function frame the error unwound through,
/// innermost first. It is only shown to the user in debug mode.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub pos: Option<Pos>,
    pub trace: Vec<String>,
}

impl ScriptError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            pos: None,
            trace: Vec::new(),
        }
    }

    pub fn syntax(
        message: impl Into<String>,
        pos: Pos,
    ) -> Self {
        Self::new(ErrorKind::Syntax, message).at(pos)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Attach a position unless one is already known
    pub fn at(
        mut self,
        pos: Pos,
    ) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
        self
    }

    /// Record that the error unwound through a call to `function`
    pub fn with_frame(
        mut self,
        function: &str,
        call_site: Pos,
    ) -> Self {
        self.trace
            .push(format!("at {}() ({})", function, call_site));
        self
    }

    /// Multi-line diagnostic: kind, message, origin and the frame trace
    pub fn diagnostic(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        match self.pos {
            Some(pos) => out.push_str(&format!("\n    at <input> ({})", pos)),
            None => out.push_str("\n    at <input>"),
        }
        for frame in &self.trace {
            out.push_str("\n    ");
            out.push_str(frame);
        }
        out
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_message_only() {
        let err = ScriptError::runtime("boom").at(Pos::new(2, 3));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_diagnostic_lists_frames() {
        let err = ScriptError::type_error("bad operand")
            .at(Pos::new(1, 5))
            .with_frame("inner", Pos::new(3, 1))
            .with_frame("outer", Pos::new(1, 1));
        let diag = err.diagnostic();
        assert!(diag.starts_with("TypeError: bad operand"));
        assert!(diag.contains("at <input> (line 1, column 5)"));
        let inner = diag.find("inner()").unwrap();
        let outer = diag.find("outer()").unwrap();
        assert!(inner < outer);
    }

    #[test]
    fn test_first_position_wins() {
        let err = ScriptError::runtime("x")
            .at(Pos::new(4, 4))
            .at(Pos::new(1, 1));
        assert_eq!(err.pos, Some(Pos::new(4, 4)));
    }
}
