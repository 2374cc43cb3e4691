//! Meta-Command Handler
//!
//! Handles the commands starting with ':'.

use crate::repl::backend_trait::ScriptEngine;
use crate::repl::engine::context::SessionContext;
use crate::repl::engine::evaluator::Evaluator;
use crate::repl::error::{SessionError, SessionResult};
use crate::repl::line::console::Console;

/// Known meta-commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    Functions,
    Vars,
    Inspect,
    Tables,
    Clear,
    Debug,
}

impl MetaCommand {
    pub const ALL: [MetaCommand; 7] = [
        MetaCommand::Help,
        MetaCommand::Functions,
        MetaCommand::Vars,
        MetaCommand::Inspect,
        MetaCommand::Tables,
        MetaCommand::Clear,
        MetaCommand::Debug,
    ];

    /// Parse a command token (without the ':'), case-insensitively
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(token))
    }

    pub fn name(self) -> &'static str {
        match self {
            MetaCommand::Help => "help",
            MetaCommand::Functions => "functions",
            MetaCommand::Vars => "vars",
            MetaCommand::Inspect => "inspect",
            MetaCommand::Tables => "tables",
            MetaCommand::Clear => "clear",
            MetaCommand::Debug => "debug",
        }
    }
}

const HELP: &str = "\
Available commands:
  :help           - Show this help and usage examples
  :functions      - List registered functions
  :vars           - List defined variables
  :inspect <name> - Inspect a variable or database object
  :tables         - List available database tables
  :clear          - Clear the screen
  :debug          - Toggle debug mode
  exit/quit       - Exit the REPL

Examples:
  def x = 10
  var y = 20
  x = 30  (Python-style assignment)
  def myFunction() { println 'Hello' }
  rows.filter { r -> r.age > 30 }.map { it.name }

Any other input will be evaluated as a script.";

/// Command handler
///
/// Borrows the session's state for the duration of one command.
pub struct CommandHandler<'a, E: ScriptEngine, C: Console> {
    evaluator: &'a Evaluator<E>,
    context: &'a mut SessionContext,
    console: &'a mut C,
}

impl<'a, E: ScriptEngine, C: Console> CommandHandler<'a, E, C> {
    pub fn new(
        evaluator: &'a Evaluator<E>,
        context: &'a mut SessionContext,
        console: &'a mut C,
    ) -> Self {
        Self {
            evaluator,
            context,
            console,
        }
    }

    /// Run one meta-command. Only I/O failures are returned; everything
    /// else is reported to the console.
    pub fn dispatch(
        &mut self,
        command: &str,
        args: &str,
    ) -> SessionResult<()> {
        let result = match MetaCommand::parse(command) {
            Some(meta) => {
                tracing::debug!(command = meta.name(), "meta-command");
                self.execute(meta, args)
            }
            None => Err(SessionError::UnknownCommand(format!(":{}", command))),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.console.report(&e, self.context.debug_mode())?;
                if matches!(e, SessionError::UnknownCommand(_)) {
                    self.print_help()?;
                }
                Ok(())
            }
        }
    }

    fn execute(
        &mut self,
        command: MetaCommand,
        args: &str,
    ) -> SessionResult<()> {
        match command {
            MetaCommand::Help => self.print_help()?,
            MetaCommand::Functions => self.list_functions()?,
            MetaCommand::Vars => self.list_variables()?,
            MetaCommand::Inspect => {
                let name = args
                    .split_whitespace()
                    .next()
                    .ok_or(SessionError::Usage(":inspect <variable-name>"))?;
                match self.evaluator.inspect(self.context, name)? {
                    Some(dump) => self.console.line(&dump)?,
                    None => self.console.line(&format!("Variable '{}' is null", name))?,
                }
            }
            MetaCommand::Tables => match self.evaluator.list_tables(self.context)? {
                Some(tables) if tables.is_empty() => self.console.line("No tables found")?,
                Some(tables) => {
                    for table in tables {
                        self.console.line(&format!("  {}", table))?;
                    }
                }
                None => self.console.line("No database connection available")?,
            },
            MetaCommand::Clear => self.console.clear()?,
            MetaCommand::Debug => {
                let state = if self.context.toggle_debug() {
                    "enabled"
                } else {
                    "disabled"
                };
                self.console.line(&format!("Debug mode {}", state))?;
            }
        }
        Ok(())
    }

    fn print_help(&mut self) -> SessionResult<()> {
        self.console.line(HELP)?;
        Ok(())
    }

    fn list_functions(&mut self) -> SessionResult<()> {
        if self.context.functions.is_empty() {
            self.console.line("No functions registered")?;
            return Ok(());
        }
        self.console.line("Registered functions:")?;
        for name in self.context.functions.names() {
            self.console.line(&format!("  {}()", name))?;
        }
        Ok(())
    }

    fn list_variables(&mut self) -> SessionResult<()> {
        let names = self.context.bindings.user_names();
        if names.is_empty() {
            self.console.line("No variables registered")?;
            return Ok(());
        }
        self.console.line("Defined variables:")?;
        for name in names {
            self.console.line(&format!("  {}", name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::line::console::BufferConsole;
    use crate::script::{ScriptRuntime, SharedOutput, Value};

    struct Fixture {
        evaluator: Evaluator<ScriptRuntime>,
        context: SessionContext,
        console: BufferConsole,
    }

    impl Fixture {
        fn new() -> Self {
            let runtime = ScriptRuntime::with_output(Box::new(SharedOutput::new()));
            Self {
                evaluator: Evaluator::new(runtime),
                context: SessionContext::new(),
                console: BufferConsole::new(),
            }
        }

        fn run(
            &mut self,
            command: &str,
            args: &str,
        ) -> String {
            let before = self.console.lines().len();
            CommandHandler::new(&self.evaluator, &mut self.context, &mut self.console)
                .dispatch(command, args)
                .unwrap();
            self.console.lines()[before..]
                .iter()
                .map(|(_, text)| text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(MetaCommand::parse("VARS"), Some(MetaCommand::Vars));
        assert_eq!(MetaCommand::parse("nope"), None);
    }

    #[test]
    fn test_help_lists_every_command() {
        let mut f = Fixture::new();
        let out = f.run("help", "");
        for command in MetaCommand::ALL {
            assert!(out.contains(&format!(":{}", command.name())), "{}", command.name());
        }
        assert!(out.contains("exit/quit"));
    }

    #[test]
    fn test_vars_hides_reserved_names() {
        let mut f = Fixture::new();
        assert_eq!(f.run("vars", ""), "No variables registered");
        f.context.bindings.set("rows", Value::list(vec![])).unwrap();
        assert_eq!(f.run("vars", ""), "Defined variables:\n  rows");
    }

    #[test]
    fn test_functions_listing() {
        let mut f = Fixture::new();
        assert_eq!(f.run("functions", ""), "No functions registered");
        f.evaluator
            .declare_function(&mut f.context, "greet", "def greet() { 'hi' }")
            .unwrap();
        assert_eq!(f.run("functions", ""), "Registered functions:\n  greet()");
    }

    #[test]
    fn test_inspect() {
        let mut f = Fixture::new();
        assert_eq!(f.run("inspect", ""), "Usage: :inspect <variable-name>");
        assert_eq!(f.run("inspect", "missing"), "Variable 'missing' is null");
        f.context.bindings.set("n", Value::Int(3)).unwrap();
        assert_eq!(f.run("inspect", "n"), "int 3");
    }

    #[test]
    fn test_tables_without_connection() {
        let mut f = Fixture::new();
        assert_eq!(f.run("tables", ""), "No database connection available");
    }

    #[test]
    fn test_debug_toggle_and_clear() {
        let mut f = Fixture::new();
        assert_eq!(f.run("debug", ""), "Debug mode enabled");
        assert_eq!(f.run("DEBUG", ""), "Debug mode disabled");
        f.run("clear", "");
        assert_eq!(f.console.clears(), 1);
    }

    #[test]
    fn test_unknown_command_prints_help() {
        let mut f = Fixture::new();
        let out = f.run("frob", "");
        assert!(out.starts_with("Unknown command: :frob\nAvailable commands:"));
    }
}
