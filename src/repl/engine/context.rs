//! Session Context
//!
//! The Binding Store, the Function Registry and the session flags. The
//! session loop owns one [`SessionContext`] and lends it to the evaluator
//! adapter and the command handler.

use indexmap::IndexMap;
use thiserror::Error;

use crate::repl::classify::is_identifier;
use crate::script::lexer::is_keyword;
use crate::script::{Globals, Value};

/// Names bound to internal handles. Hidden from listings and write-protected.
pub const RESERVED_NAMES: [&str; 3] = ["repl", "terminal", "reader"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Rejected binding write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Cannot assign to '{0}': it is a reserved name")]
    Reserved(String),
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),
}

/// Binding Store
///
/// One flat, insertion-ordered namespace for the whole session.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: IndexMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a name without writing anything
    pub fn check_name(name: &str) -> Result<(), BindingError> {
        if !is_identifier(name) || is_keyword(name) {
            Err(BindingError::InvalidName(name.to_string()))
        } else if is_reserved(name) {
            Err(BindingError::Reserved(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Bind or rebind `name`
    pub fn set(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<(), BindingError> {
        Self::check_name(name)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.values.contains_key(name)
    }

    /// Every bound name, internal ones included
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Names a user should see: no reserved names, nothing starting with `_`
    pub fn user_names(&self) -> Vec<&str> {
        self.names()
            .filter(|name| !is_reserved(name) && !name.starts_with('_'))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bind the internal handles. Bypasses the reserved-name check.
    pub fn install_reserved(&mut self) {
        for name in RESERVED_NAMES {
            self.values.insert(name.to_string(), Value::Handle(name));
        }
    }

    pub fn snapshot(&self) -> Bindings {
        self.clone()
    }

    pub fn restore(
        &mut self,
        snapshot: Bindings,
    ) {
        *self = snapshot;
    }
}

impl Globals for Bindings {
    fn lookup(
        &self,
        name: &str,
    ) -> Option<Value> {
        self.get(name).cloned()
    }

    fn assign(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<(), String> {
        self.set(name, value).map_err(|e| e.to_string())
    }
}

/// A named function known to the session
#[derive(Debug, Clone)]
pub struct RegisteredFunction {
    pub name: String,
    /// Source text as typed or registered
    pub source: String,
    /// Compiled callable, also bound under `name`
    pub handle: Value,
}

/// Function Registry
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, RegisteredFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one of the same name
    pub fn register(
        &mut self,
        function: RegisteredFunction,
    ) -> Option<RegisteredFunction> {
        self.functions.insert(function.name.clone(), function)
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&RegisteredFunction> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Session Context
///
/// Everything a session mutates: bindings, functions, the debug flag and the
/// multi-line buffer.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub bindings: Bindings,
    pub functions: FunctionRegistry,
    debug_mode: bool,
    pending: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Create a context with the internal handles bound
    pub fn new() -> Self {
        let mut bindings = Bindings::new();
        bindings.install_reserved();
        Self {
            bindings,
            functions: FunctionRegistry::new(),
            debug_mode: false,
            pending: String::new(),
        }
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn set_debug_mode(
        &mut self,
        enabled: bool,
    ) {
        self.debug_mode = enabled;
    }

    /// Flip debug mode and return the new state
    pub fn toggle_debug(&mut self) -> bool {
        self.debug_mode = !self.debug_mode;
        self.debug_mode
    }

    /// Append a line to the multi-line buffer
    pub fn push_pending(
        &mut self,
        line: &str,
    ) {
        if !self.pending.is_empty() {
            self.pending.push('\n');
        }
        self.pending.push_str(line);
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}
