//! Session Loop
//!
//! Reads lines, buffers multi-line blocks until their braces balance, then
//! classifies and routes each complete input.

use crate::repl::backend_trait::{EvalResult, ScriptEngine};
use crate::repl::classify::{classify, Input};
use crate::repl::commands::CommandHandler;
use crate::repl::engine::context::SessionContext;
use crate::repl::engine::evaluator::Evaluator;
use crate::repl::error::{SessionError, SessionResult};
use crate::script::Value;

pub mod completer;
pub mod console;
pub mod source;

pub use completer::{complete_word, CompletionSource, ReplHelper};
pub use console::{BufferConsole, Console, LineStyle, StdConsole};
pub use source::{LineEditorConfig, LineSource, ReadEvent, RustylineSource, ScriptedSource};

const BANNER: &str = "DB REPL started. Type 'exit' to quit.";
const HELP_HINT: &str = "Type ':help' for available commands.";
const FAREWELL: &str = "Exiting REPL...";

/// Prompts
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub prompt: String,
    /// Shown while a block is still open
    pub continuation_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: "db > ".into(),
            continuation_prompt: "... ".into(),
        }
    }
}

/// Where the loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Reading,
    Classifying,
    DispatchingMeta,
    Declaring,
    Defining,
    Assigning,
    Evaluating,
    Printing,
    Exited,
}

/// Interactive session
///
/// Owns the session context and lends it to the evaluator adapter and the
/// command handler; nothing else changes the state.
pub struct Session<E: ScriptEngine, S: LineSource, C: Console> {
    evaluator: Evaluator<E>,
    context: SessionContext,
    source: S,
    console: C,
    completion: CompletionSource,
    config: SessionConfig,
    state: SessionState,
}

impl<E: ScriptEngine, S: LineSource, C: Console> Session<E, S, C> {
    pub fn new(
        engine: E,
        source: S,
        console: C,
    ) -> Self {
        Self::with_config(engine, source, console, SessionConfig::default())
    }

    pub fn with_config(
        engine: E,
        source: S,
        console: C,
        config: SessionConfig,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(engine),
            context: SessionContext::new(),
            source,
            console,
            completion: CompletionSource::new(),
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn engine(&self) -> &E {
        self.evaluator.engine()
    }

    /// Seed a binding before the loop starts
    pub fn set_variable(
        &mut self,
        name: &str,
        value: Value,
    ) -> SessionResult<()> {
        self.evaluator.set_variable(&mut self.context, name, value)
    }

    /// Register a named function from a script body
    pub fn register_script(
        &mut self,
        name: &str,
        body: &str,
    ) -> SessionResult<()> {
        self.evaluator.register_script(&mut self.context, name, body)
    }

    /// Run until `exit`, end of input or a fatal I/O error
    pub fn run(&mut self) -> SessionResult<()> {
        self.console.success(BANNER)?;
        self.console.success(HELP_HINT)?;
        tracing::info!("session started");

        while self.state != SessionState::Exited {
            self.state = SessionState::Reading;
            self.source
                .set_candidates(self.completion.candidates(&self.context));
            let prompt = if self.context.has_pending() {
                self.config.continuation_prompt.clone()
            } else {
                self.config.prompt.clone()
            };

            match self.source.read_line(&prompt) {
                ReadEvent::Line(line) => self.handle_line(&line)?,
                ReadEvent::Interrupted => {
                    self.context.clear_pending();
                    self.console.error("Interrupted")?;
                    self.state = SessionState::Idle;
                }
                ReadEvent::Eof => self.exit()?,
                ReadEvent::Failed(e) => {
                    tracing::warn!("line input failed: {}", e);
                    self.console.error(&SessionError::Io(e).to_string())?;
                    self.exit()?;
                }
            }
        }

        if let Err(e) = self.source.save_history() {
            tracing::warn!("Failed to save history: {}", e);
        }
        tracing::info!("session ended");
        Ok(())
    }

    /// Feed one line from the reader
    pub fn handle_line(
        &mut self,
        line: &str,
    ) -> SessionResult<()> {
        if line.trim().is_empty() && !self.context.has_pending() {
            self.state = SessionState::Idle;
            return Ok(());
        }
        if !line.trim().is_empty() {
            self.source.add_history(line);
        }

        self.context.push_pending(line);
        self.state = SessionState::Classifying;
        let input = classify(self.context.pending());
        if input == Input::Incomplete {
            tracing::debug!("block still open, awaiting continuation");
            return Ok(());
        }
        self.context.clear_pending();
        self.dispatch(input)
    }

    /// Process a complete input without the interactive loop
    pub fn eval_line(
        &mut self,
        code: &str,
    ) -> EvalResult {
        match classify(code) {
            Input::Incomplete => EvalResult::Incomplete,
            Input::Expression(text) => {
                self.state = SessionState::Evaluating;
                let result = self.evaluator.evaluate(&mut self.context, &text);
                self.state = SessionState::Idle;
                match result {
                    Ok(value) if value.is_null() => EvalResult::Ok,
                    Ok(value) => EvalResult::Value(value),
                    Err(e) => EvalResult::Error(self.describe(&e)),
                }
            }
            input => match self.dispatch(input) {
                Ok(()) => EvalResult::Ok,
                Err(e) => EvalResult::Error(self.describe(&e)),
            },
        }
    }

    fn describe(
        &self,
        err: &SessionError,
    ) -> String {
        match err.diagnostic() {
            Some(diagnostic) if self.context.debug_mode() => format!("{}\n{}", err, diagnostic),
            _ => err.to_string(),
        }
    }

    fn dispatch(
        &mut self,
        input: Input,
    ) -> SessionResult<()> {
        tracing::debug!(kind = input.kind(), "classified input");

        let outcome = match input {
            Input::Empty | Input::Incomplete => {
                self.state = SessionState::Idle;
                return Ok(());
            }
            Input::Exit => return self.exit(),
            Input::Meta { command, args } => {
                self.state = SessionState::DispatchingMeta;
                CommandHandler::new(&self.evaluator, &mut self.context, &mut self.console)
                    .dispatch(&command, &args)?;
                self.state = SessionState::Idle;
                return Ok(());
            }
            Input::Declaration { name, expr, .. } => {
                self.state = SessionState::Declaring;
                self.evaluator
                    .declare_variable(&mut self.context, &name, &expr)
                    .map(|value| (Some(format!("Variable set: {}", name)), value))
            }
            Input::FunctionDefinition { name, source } => {
                self.state = SessionState::Defining;
                self.evaluator
                    .declare_function(&mut self.context, &name, &source)
                    .map(|()| (Some(format!("Function defined: {}", name)), Value::Null))
            }
            Input::Assignment { name, expr } => {
                self.state = SessionState::Assigning;
                self.evaluator
                    .assign(&mut self.context, &name, &expr)
                    .map(|value| (Some(format!("Variable set: {}", name)), value))
            }
            Input::Expression(text) => {
                self.state = SessionState::Evaluating;
                self.evaluator
                    .evaluate(&mut self.context, &text)
                    .map(|value| (None, value))
            }
        };

        self.state = SessionState::Printing;
        match outcome {
            Ok((message, value)) => {
                if let Some(message) = message {
                    self.console.success(&message)?;
                }
                if !value.is_null() {
                    self.console.line(&value.to_string())?;
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "input failed");
                self.console.report(&e, self.context.debug_mode())?;
            }
        }
        self.state = SessionState::Idle;
        Ok(())
    }

    fn exit(&mut self) -> SessionResult<()> {
        self.context.clear_pending();
        self.console.success(FAREWELL)?;
        self.state = SessionState::Exited;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::classify::find_assignment;
    use crate::script::{ScriptError, ScriptResult};
    use crate::repl::engine::context::Bindings;

    /// Engine with canned answers
    #[derive(Default)]
    struct StubEngine {
        seen: Vec<String>,
    }

    impl ScriptEngine for StubEngine {
        fn evaluate(
            &mut self,
            code: &str,
            bindings: &mut Bindings,
        ) -> ScriptResult<Value> {
            self.seen.push(code.to_string());
            if let Some((name, expr)) = find_assignment(code) {
                let value = Value::from(expr.len() as i64);
                bindings
                    .set(name, value.clone())
                    .map_err(|e| ScriptError::runtime(e.to_string()))?;
                return Ok(value);
            }
            match code {
                "fail" => Err(ScriptError::runtime("stub failure")),
                "nothing" => Ok(Value::Null),
                other => Ok(Value::from(other.len() as i64)),
            }
        }

        fn compile_function(
            &mut self,
            name: &str,
            _source: &str,
        ) -> ScriptResult<Value> {
            Ok(Value::str(name))
        }

        fn inspect(
            &self,
            value: &Value,
        ) -> ScriptResult<String> {
            Ok(value.repr())
        }

        fn list_tables(
            &self,
            _source: &Value,
        ) -> ScriptResult<Vec<String>> {
            Ok(vec!["users".into()])
        }
    }

    fn session(lines: &[&str]) -> Session<StubEngine, ScriptedSource, BufferConsole> {
        let mut session = Session::new(
            StubEngine::default(),
            ScriptedSource::new(lines.iter().copied()),
            BufferConsole::new(),
        );
        session.run().unwrap();
        session
    }

    #[test]
    fn test_banner_and_farewell_on_eof() {
        let s = session(&[]);
        assert_eq!(
            s.console().successes(),
            vec![BANNER, HELP_HINT, FAREWELL]
        );
        assert_eq!(s.state(), SessionState::Exited);
    }

    #[test]
    fn test_exit_stops_reading() {
        let s = session(&["exit", "never"]);
        assert!(s.engine().seen.is_empty());
        assert_eq!(s.source().prompts().len(), 1);
    }

    #[test]
    fn test_expression_output() {
        let s = session(&["abc", "nothing", "   "]);
        assert_eq!(s.engine().seen, vec!["abc", "nothing"]);
        let plain: Vec<_> = s
            .console()
            .lines()
            .iter()
            .filter(|(style, _)| *style == LineStyle::Plain)
            .map(|(_, text)| text.as_str())
            .collect();
        assert_eq!(plain, vec!["3"]);
    }

    #[test]
    fn test_continuation_prompt_and_buffering() {
        let s = session(&["x {", "y", "}"]);
        assert_eq!(s.source().prompts()[..3], ["db > ", "... ", "... "]);
        assert_eq!(s.engine().seen, vec!["x {\ny\n}"]);
    }

    #[test]
    fn test_interrupt_discards_open_block() {
        let mut source = ScriptedSource::new(["def f() {"]);
        source.push(ReadEvent::Interrupted);
        source.push_line("abc");
        let mut s = Session::new(StubEngine::default(), source, BufferConsole::new());
        s.run().unwrap();
        assert_eq!(s.engine().seen, vec!["abc"]);
        assert!(s.console().errors().contains(&"Interrupted"));
        assert!(s.context().functions.is_empty());
    }

    #[test]
    fn test_errors_do_not_end_the_session() {
        let s = session(&["fail", "ab"]);
        assert_eq!(s.console().errors(), vec!["Error evaluating expression: stub failure"]);
        assert_eq!(s.engine().seen, vec!["fail", "ab"]);
    }

    #[test]
    fn test_read_failure_exits_gracefully() {
        let mut source = ScriptedSource::default();
        source.push(ReadEvent::Failed(std::io::Error::new(
            std::io::ErrorKind::Other,
            "tty gone",
        )));
        let mut s = Session::new(StubEngine::default(), source, BufferConsole::new());
        assert!(s.run().is_ok());
        assert_eq!(s.console().errors(), vec!["IO error: tty gone"]);
        assert_eq!(s.state(), SessionState::Exited);
    }

    #[test]
    fn test_completions_refresh_before_each_prompt() {
        let s = session(&["x = 1"]);
        assert!(s.source().candidates().contains(&"x".to_string()));
    }

    #[test]
    fn test_eval_line() {
        let mut s = Session::new(StubEngine::default(), ScriptedSource::default(), BufferConsole::new());
        assert!(matches!(s.eval_line("abcd"), EvalResult::Value(Value::Int(4))));
        assert!(matches!(s.eval_line("nothing"), EvalResult::Ok));
        assert!(matches!(s.eval_line("f {"), EvalResult::Incomplete));
        assert!(matches!(s.eval_line("fail"), EvalResult::Error(m) if m.contains("stub failure")));
    }
}
