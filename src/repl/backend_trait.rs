//! Script Engine Trait
//!
//! The narrow capability the console needs from a scripting engine.

use crate::repl::engine::context::Bindings;
use crate::script::{ScriptResult, ScriptRuntime, Value};

/// Outcome of evaluating one complete input without an interactive loop
#[derive(Debug)]
pub enum EvalResult {
    /// Evaluation produced a value
    Value(Value),
    /// Evaluation produced no value
    Ok,
    /// Evaluation failed; the message is ready to show
    Error(String),
    /// More input needed (unbalanced braces)
    Incomplete,
}

/// Script Engine Trait
///
/// Implemented by [`ScriptRuntime`]; tests plug in stubs with canned results.
pub trait ScriptEngine {
    /// Run `code` against the bindings. New top-level names are written
    /// through `bindings`.
    fn evaluate(
        &mut self,
        code: &str,
        bindings: &mut Bindings,
    ) -> ScriptResult<Value>;

    /// Compile `source` into a callable named `name` without binding it
    fn compile_function(
        &mut self,
        name: &str,
        source: &str,
    ) -> ScriptResult<Value>;

    /// Human-readable structural dump
    fn inspect(
        &self,
        value: &Value,
    ) -> ScriptResult<String>;

    /// Table names exposed by a data-source handle
    fn list_tables(
        &self,
        source: &Value,
    ) -> ScriptResult<Vec<String>>;
}

impl ScriptEngine for ScriptRuntime {
    fn evaluate(
        &mut self,
        code: &str,
        bindings: &mut Bindings,
    ) -> ScriptResult<Value> {
        self.run(code, bindings)
    }

    fn compile_function(
        &mut self,
        name: &str,
        source: &str,
    ) -> ScriptResult<Value> {
        ScriptRuntime::compile_function(self, name, source)
    }

    fn inspect(
        &self,
        value: &Value,
    ) -> ScriptResult<String> {
        Ok(ScriptRuntime::inspect(self, value))
    }

    fn list_tables(
        &self,
        source: &Value,
    ) -> ScriptResult<Vec<String>> {
        ScriptRuntime::list_tables(self, source)
    }
}
