//! REPL Module
//!
//! The interactive session engine.
//!
//! This module contains:
//! - [`backend_trait::ScriptEngine`] - Capability interface to the scripting engine
//! - [`classify`] - Input classifier
//! - [`engine::Evaluator`] - Evaluator adapter
//! - [`engine::SessionContext`] - Binding store, function registry and session flags
//! - [`commands::CommandHandler`] - Meta-command processor
//! - [`line::Session`] - Read-classify-evaluate-print loop

pub mod backend_trait;
pub mod classify;
pub mod commands;
pub mod engine;
pub mod error;
pub mod line;

pub use backend_trait::{EvalResult, ScriptEngine};
pub use classify::{classify, Input};
pub use commands::{CommandHandler, MetaCommand};
pub use engine::{Bindings, Evaluator, FunctionRegistry, SessionContext};
pub use error::{SessionError, SessionResult};
pub use line::{Session, SessionConfig, SessionState};
