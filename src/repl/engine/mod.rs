//! REPL Engine Module
//!
//! Session state and the evaluator adapter.

pub mod context;
pub mod evaluator;

pub use context::{Bindings, FunctionRegistry, RegisteredFunction, SessionContext};
pub use evaluator::Evaluator;
