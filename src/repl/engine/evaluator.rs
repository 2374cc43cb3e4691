//! Evaluator Adapter
//!
//! Binds a [`ScriptEngine`] to a [`SessionContext`]. Every operation either
//! completes or leaves the bindings exactly as they were.

use std::time::Instant;

use crate::repl::backend_trait::ScriptEngine;
use crate::repl::engine::context::{Bindings, RegisteredFunction, SessionContext};
use crate::repl::error::{SessionError, SessionResult};
use crate::script::{ScriptError, Value};

/// Binding that `:tables` treats as the data-source handle
pub const DATA_SOURCE_BINDING: &str = "db";

/// Evaluator Adapter
#[derive(Debug)]
pub struct Evaluator<E: ScriptEngine> {
    engine: E,
}

impl<E: ScriptEngine> Evaluator<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Run `code` with the bindings rolled back if it fails
    fn run_atomic(
        &mut self,
        ctx: &mut SessionContext,
        code: &str,
    ) -> Result<Value, ScriptError> {
        let start = Instant::now();
        let snapshot = ctx.bindings.snapshot();
        let result = self.engine.evaluate(code, &mut ctx.bindings);
        if result.is_err() {
            ctx.bindings.restore(snapshot);
        }
        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "evaluated input"
        );
        result
    }

    /// Evaluate a plain expression or script
    pub fn evaluate(
        &mut self,
        ctx: &mut SessionContext,
        code: &str,
    ) -> SessionResult<Value> {
        self.run_atomic(ctx, code).map_err(SessionError::Evaluation)
    }

    /// `def name = expr`: evaluate `expr` and bind the result
    pub fn declare_variable(
        &mut self,
        ctx: &mut SessionContext,
        name: &str,
        expr: &str,
    ) -> SessionResult<Value> {
        Bindings::check_name(name)?;
        let statement = format!("def {} = {}", name, expr);
        self.bind_statement(ctx, name, &statement)
            .map_err(|source| SessionError::Declaration {
                name: name.to_string(),
                source,
            })
    }

    /// `name = expr` without a keyword
    pub fn assign(
        &mut self,
        ctx: &mut SessionContext,
        name: &str,
        expr: &str,
    ) -> SessionResult<Value> {
        Bindings::check_name(name)?;
        let statement = format!("{} = {}", name, expr);
        self.bind_statement(ctx, name, &statement)
            .map_err(SessionError::Evaluation)
    }

    /// Run a whole binding statement and read `name` back, so trailing
    /// statements on the same line cannot change what `name` receives
    fn bind_statement(
        &mut self,
        ctx: &mut SessionContext,
        name: &str,
        statement: &str,
    ) -> Result<Value, ScriptError> {
        self.run_atomic(ctx, statement)?;
        Ok(ctx.bindings.get(name).cloned().unwrap_or(Value::Null))
    }

    /// Compile a typed `def name(...) { ... }` and expose it both in the
    /// registry and as a binding
    pub fn declare_function(
        &mut self,
        ctx: &mut SessionContext,
        name: &str,
        source: &str,
    ) -> SessionResult<()> {
        Bindings::check_name(name)?;
        let handle = self
            .engine
            .compile_function(name, source)
            .map_err(SessionError::FunctionDefinition)?;
        ctx.bindings.set(name, handle.clone())?;
        let replaced = ctx
            .functions
            .register(RegisteredFunction {
                name: name.to_string(),
                source: source.to_string(),
                handle,
            })
            .is_some();
        tracing::debug!(name, replaced, "function defined");
        Ok(())
    }

    /// Register a function from a body, wrapping it as `def name() { body }`
    /// unless it already is a definition of `name`
    pub fn register_script(
        &mut self,
        ctx: &mut SessionContext,
        name: &str,
        body: &str,
    ) -> SessionResult<()> {
        let trimmed = body.trim();
        let source = if trimmed.starts_with(&format!("def {}", name)) {
            trimmed.to_string()
        } else {
            format!("def {}() {{\n{}\n}}", name, trimmed)
        };
        self.declare_function(ctx, name, &source)?;
        tracing::info!("Registered function: {}", name);
        Ok(())
    }

    /// Seed a binding from outside the session
    pub fn set_variable(
        &mut self,
        ctx: &mut SessionContext,
        name: &str,
        value: Value,
    ) -> SessionResult<()> {
        ctx.bindings.set(name, value)?;
        tracing::debug!(name, "variable seeded");
        Ok(())
    }

    /// Structural dump of a binding; `None` when unbound or null
    pub fn inspect(
        &self,
        ctx: &SessionContext,
        name: &str,
    ) -> SessionResult<Option<String>> {
        match ctx.bindings.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self
                .engine
                .inspect(value)
                .map(Some)
                .map_err(|source| SessionError::Inspect {
                    name: name.to_string(),
                    source,
                }),
        }
    }

    /// Tables of the `db` binding; `None` when no data source is bound
    pub fn list_tables(
        &self,
        ctx: &SessionContext,
    ) -> SessionResult<Option<Vec<String>>> {
        match ctx.bindings.get(DATA_SOURCE_BINDING) {
            None | Some(Value::Null) => Ok(None),
            Some(source) => self
                .engine
                .list_tables(source)
                .map(Some)
                .map_err(SessionError::Tables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptRuntime, SharedOutput};

    fn evaluator() -> (Evaluator<ScriptRuntime>, SessionContext) {
        let runtime = ScriptRuntime::with_output(Box::new(SharedOutput::new())).with_max_depth(32);
        (Evaluator::new(runtime), SessionContext::new())
    }

    #[test]
    fn test_set_variable_then_evaluate() {
        let (mut ev, mut ctx) = evaluator();
        ev.set_variable(&mut ctx, "n", Value::str("abc")).unwrap();
        assert_eq!(ev.evaluate(&mut ctx, "n").unwrap(), Value::str("abc"));
    }

    #[test]
    fn test_declare_variable() {
        let (mut ev, mut ctx) = evaluator();
        assert_eq!(ev.declare_variable(&mut ctx, "n", "1+1").unwrap(), Value::Int(2));
        assert_eq!(ctx.bindings.get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_failed_evaluation_leaves_no_partial_bindings() {
        let (mut ev, mut ctx) = evaluator();
        let err = ev.evaluate(&mut ctx, "a = 1\nb = missing + 1").unwrap_err();
        assert!(matches!(err, SessionError::Evaluation(_)));
        assert!(!ctx.bindings.contains("a"));
        assert!(!ctx.bindings.contains("b"));
    }

    #[test]
    fn test_assignment_reads_back_its_own_name() {
        let (mut ev, mut ctx) = evaluator();
        assert_eq!(ev.assign(&mut ctx, "x", "5; y = 6").unwrap(), Value::Int(5));
        assert_eq!(ctx.bindings.get("x"), Some(&Value::Int(5)));
        assert_eq!(ctx.bindings.get("y"), Some(&Value::Int(6)));

        assert_eq!(ev.declare_variable(&mut ctx, "z", "1; z = z + 1").unwrap(), Value::Int(2));
        assert!(ev.assign(&mut ctx, "x", "1; repl = 2").is_err());
        assert_eq!(ctx.bindings.get("x"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_failed_declaration_keeps_previous_value() {
        let (mut ev, mut ctx) = evaluator();
        ev.declare_variable(&mut ctx, "x", "1").unwrap();
        assert!(ev.declare_variable(&mut ctx, "x", "1 / 0").is_err());
        assert_eq!(ctx.bindings.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_reserved_names_are_rejected() {
        let (mut ev, mut ctx) = evaluator();
        assert!(matches!(
            ev.assign(&mut ctx, "repl", "1"),
            Err(SessionError::Binding(_))
        ));
        assert!(ev.evaluate(&mut ctx, "terminal = 2").is_err());
        assert_eq!(ctx.bindings.get("terminal"), Some(&Value::Handle("terminal")));
    }

    #[test]
    fn test_declare_function_binds_and_registers() {
        let (mut ev, mut ctx) = evaluator();
        ev.declare_function(&mut ctx, "greet", "def greet() { return 'hi' }")
            .unwrap();
        assert!(ctx.functions.get("greet").is_some());
        assert_eq!(ev.evaluate(&mut ctx, "greet()").unwrap(), Value::str("hi"));

        ev.declare_function(&mut ctx, "greet", "def greet() { 'hello' }")
            .unwrap();
        assert_eq!(ctx.functions.len(), 1);
        assert_eq!(ev.evaluate(&mut ctx, "greet()").unwrap(), Value::str("hello"));
    }

    #[test]
    fn test_bad_function_registers_nothing() {
        let (mut ev, mut ctx) = evaluator();
        let err = ev.declare_function(&mut ctx, "f", "def f() { 1 + }").unwrap_err();
        assert!(matches!(err, SessionError::FunctionDefinition(_)));
        assert!(ctx.functions.is_empty());
        assert!(!ctx.bindings.contains("f"));
    }

    #[test]
    fn test_register_script_wraps_body() {
        let (mut ev, mut ctx) = evaluator();
        ev.register_script(&mut ctx, "answer", "40 + 2").unwrap();
        ev.register_script(&mut ctx, "twice", "def twice(x) { x * 2 }")
            .unwrap();
        assert_eq!(ev.evaluate(&mut ctx, "twice(answer())").unwrap(), Value::Int(84));
        assert_eq!(
            ctx.functions.get("answer").map(|f| f.source.as_str()),
            Some("def answer() {\n40 + 2\n}")
        );
    }

    #[test]
    fn test_inspect_missing_is_none() {
        let (ev, ctx) = evaluator();
        assert_eq!(ev.inspect(&ctx, "missing").unwrap(), None);
    }

    #[test]
    fn test_list_tables() {
        let (mut ev, mut ctx) = evaluator();
        assert_eq!(ev.list_tables(&ctx).unwrap(), None);
        ev.evaluate(&mut ctx, "db = [users: [], orders: []]").unwrap();
        assert_eq!(
            ev.list_tables(&ctx).unwrap(),
            Some(vec!["users".to_string(), "orders".to_string()])
        );
        ev.evaluate(&mut ctx, "db = 5").unwrap();
        assert!(matches!(ev.list_tables(&ctx), Err(SessionError::Tables(_))));
    }
}
