//! Session error types

use thiserror::Error;

use crate::repl::engine::context::BindingError;
use crate::script::ScriptError;

/// Errors surfaced by the console. Everything except `Io` is reported and
/// the session carries on.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The engine failed on a plain expression or assignment
    #[error("Error evaluating expression: {0}")]
    Evaluation(ScriptError),

    /// The engine failed while evaluating a declaration's initializer
    #[error("Error declaring variable '{name}': {source}")]
    Declaration { name: String, source: ScriptError },

    #[error("Error defining function: {0}")]
    FunctionDefinition(ScriptError),

    /// Write to a reserved or malformed name
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Meta-command missing a required argument
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Cannot inspect '{name}': {source}")]
    Inspect { name: String, source: ScriptError },

    #[error("Error listing tables: {0}")]
    Tables(ScriptError),

    /// Line reading or terminal writing failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Full engine diagnostic (kind, position, call trace), when there is one
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            SessionError::Evaluation(e)
            | SessionError::FunctionDefinition(e)
            | SessionError::Tables(e)
            | SessionError::Declaration { source: e, .. }
            | SessionError::Inspect { source: e, .. } => Some(e.diagnostic()),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Io(_))
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Pos;

    #[test]
    fn test_evaluation_message_is_concise() {
        let err = SessionError::Evaluation(
            ScriptError::runtime("boom").at(Pos::new(1, 3)).with_frame("f", Pos::new(2, 1)),
        );
        assert_eq!(err.to_string(), "Error evaluating expression: boom");
        let diagnostic = err.diagnostic().unwrap();
        assert!(diagnostic.contains("RuntimeError: boom"));
        assert!(diagnostic.contains("at f()"));
    }

    #[test]
    fn test_binding_error_is_transparent() {
        let err: SessionError = BindingError::Reserved("repl".into()).into();
        assert_eq!(err.to_string(), "Cannot assign to 'repl': it is a reserved name");
        assert!(err.diagnostic().is_none());
    }

    #[test]
    fn test_only_io_is_fatal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(SessionError::from(io_err).is_fatal());
        assert!(!SessionError::UnknownCommand(":nope".into()).is_fatal());
    }
}
