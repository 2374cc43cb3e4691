//! A small Groovy-flavoured scripting language
//!
//! The console only talks to this module through [`ScriptRuntime`]; the
//! lexer, parser and interpreter are implementation details.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

pub use error::{ErrorKind, Pos, ScriptError, ScriptResult};
pub use interpreter::{Globals, Interpreter};
pub use value::Value;

use ast::Stmt;

/// Call depth allowed before evaluation is aborted
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Entry point for running script source against a set of globals
pub struct ScriptRuntime {
    out: Box<dyn Write>,
    max_depth: usize,
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRuntime {
    /// Runtime printing to stdout
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            out,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(
        mut self,
        max_depth: usize,
    ) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parse and run `source`. Top-level declarations land in `globals`.
    pub fn run(
        &mut self,
        source: &str,
        globals: &mut dyn Globals,
    ) -> ScriptResult<Value> {
        let program = parser::parse(source)?;
        tracing::debug!(statements = program.len(), "running script");
        let mut interp = Interpreter::new(globals, self.out.as_mut(), self.max_depth);
        interp.run(&program)
    }

    /// Compile a named zero-or-more parameter function without running it.
    ///
    /// `source` is either a full `def name(...) { ... }` definition or a bare
    /// body, which is wrapped as `def name() { body }`.
    pub fn compile_function(
        &mut self,
        name: &str,
        source: &str,
    ) -> ScriptResult<Value> {
        let trimmed = source.trim();
        let wrapped;
        let definition = if is_definition_of(trimmed, name) {
            trimmed
        } else {
            wrapped = format!("def {}() {{\n{}\n}}", name, trimmed);
            &wrapped
        };

        let program = parser::parse(definition)?;
        match program.as_slice() {
            [Stmt::Function(def)] if def.name.as_deref() == Some(name) => {
                Ok(interpreter::make_function(def))
            }
            _ => Err(ScriptError::runtime(format!(
                "Expected a single definition of function '{}'",
                name
            ))),
        }
    }

    pub fn inspect(
        &self,
        value: &Value,
    ) -> String {
        builtins::inspect(value)
    }

    /// Table names exposed by a data-source value
    pub fn list_tables(
        &self,
        source: &Value,
    ) -> ScriptResult<Vec<String>> {
        match source {
            Value::Map(tables) => Ok(tables.keys().cloned().collect()),
            other => Err(ScriptError::type_error(format!(
                "A {} does not expose tables",
                other.type_name()
            ))),
        }
    }
}

fn is_definition_of(
    source: &str,
    name: &str,
) -> bool {
    ["def", "var"].iter().any(|keyword| {
        source
            .strip_prefix(keyword)
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix(name))
            .is_some_and(|rest| rest.trim_start().starts_with('('))
    })
}

/// Cloneable in-memory writer, handy for capturing script output
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Drain everything written so far
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
