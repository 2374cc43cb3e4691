//! End-to-end console sessions driven by scripted input

use proptest::prelude::*;
use rowscope::repl::backend_trait::EvalResult;
use rowscope::repl::line::{BufferConsole, ReadEvent, ScriptedSource};
use rowscope::repl::{Session, SessionState};
use rowscope::script::{ScriptRuntime, SharedOutput, Value};
use rowscope::util::config::UserConfig;

type TestSession = Session<ScriptRuntime, ScriptedSource, BufferConsole>;

fn new_session(lines: &[&str]) -> (TestSession, SharedOutput) {
    let out = SharedOutput::new();
    let runtime = ScriptRuntime::with_output(Box::new(out.clone())).with_max_depth(48);
    let session = Session::new(
        runtime,
        ScriptedSource::new(lines.iter().copied()),
        BufferConsole::new(),
    );
    (session, out)
}

fn run_session(lines: &[&str]) -> (TestSession, SharedOutput) {
    let (mut session, out) = new_session(lines);
    session.run().unwrap();
    (session, out)
}

fn output(session: &TestSession) -> String {
    session.console().output()
}

#[test]
fn test_declarations_bind_and_report() {
    let (session, _) = run_session(&["def n = 1+1", "var m = n * 10"]);
    assert_eq!(session.context().bindings.get("n"), Some(&Value::Int(2)));
    assert_eq!(session.context().bindings.get("m"), Some(&Value::Int(20)));
    let successes = session.console().successes();
    assert!(successes.contains(&"Variable set: n"));
    assert!(successes.contains(&"Variable set: m"));
    assert!(output(&session).contains("Variable set: n\n2\n"));
}

#[test]
fn test_plain_assignment_and_comparisons() {
    let (session, _) = run_session(&["x = 5", "x == 5", "x >= 6"]);
    assert_eq!(session.context().bindings.get("x"), Some(&Value::Int(5)));
    let out = output(&session);
    assert!(out.contains("Variable set: x\n5\ntrue\nfalse"));
}

#[test]
fn test_assignment_binds_its_own_value_on_a_multi_statement_line() {
    let (session, _) = run_session(&["x = 5; y = 6", "def z = 7; w = 8"]);
    let bindings = &session.context().bindings;
    assert_eq!(bindings.get("x"), Some(&Value::Int(5)));
    assert_eq!(bindings.get("y"), Some(&Value::Int(6)));
    assert_eq!(bindings.get("z"), Some(&Value::Int(7)));
    assert_eq!(bindings.get("w"), Some(&Value::Int(8)));
    let out = output(&session);
    assert!(out.contains("Variable set: x\n5\n"));
    assert!(out.contains("Variable set: z\n7\n"));
}

#[test]
fn test_meta_command_with_brace_is_dispatched() {
    let (session, _) = run_session(&[":inspect {", "n = 1", ":vars", "exit", "never"]);
    assert_eq!(session.source().prompts(), ["db > "; 4]);
    let out = output(&session);
    assert!(out.contains("Variable '{' is null"));
    assert!(out.contains("Defined variables:\n  n"));
    assert_eq!(session.state(), SessionState::Exited);
}

#[test]
fn test_keywords_cannot_be_assigned() {
    let (session, _) = run_session(&["true = 3", "true", ":vars"]);
    assert!(!session.context().bindings.contains("true"));
    assert_eq!(
        session.console().errors(),
        vec!["'true' is not a valid identifier"]
    );
    let out = output(&session);
    assert!(out.contains("No variables registered"));
}

#[test]
fn test_function_definition_listing_and_call() {
    let (session, _) = run_session(&["def greet() { return 'hi' }", ":functions", "greet()"]);
    let out = output(&session);
    assert!(session.console().successes().contains(&"Function defined: greet"));
    assert!(out.contains("Registered functions:\n  greet()"));
    assert!(out.ends_with("hi\nExiting REPL..."));
}

#[test]
fn test_multiline_definition_is_buffered() {
    let (mut session, _) = new_session(&[]);
    session.handle_line("def f(a) {").unwrap();
    assert_eq!(session.state(), SessionState::Classifying);
    session.handle_line("  def b = a * 2").unwrap();
    assert!(session.context().functions.is_empty());
    assert!(!session.context().bindings.contains("f"));
    assert!(!session.context().bindings.contains("b"));

    session.handle_line("  b + 1").unwrap();
    session.handle_line("}").unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.context().functions.get("f").is_some());
    assert!(matches!(session.eval_line("f(20)"), EvalResult::Value(Value::Int(41))));
}

#[test]
fn test_multiline_prompts() {
    let (session, _) = run_session(&["def f() {", "1", "}", "f()"]);
    assert_eq!(
        session.source().prompts(),
        ["db > ", "... ", "... ", "db > ", "db > "]
    );
    assert!(output(&session).contains("Function defined: f"));
}

#[test]
fn test_inspect_commands() {
    let (session, _) = run_session(&[":inspect missing", ":inspect", "rows = [[id: 1]]", ":inspect rows"]);
    let out = output(&session);
    assert!(out.contains("Variable 'missing' is null"));
    assert!(session.console().errors().contains(&"Usage: :inspect <variable-name>"));
    assert!(out.contains("list (1 items)\n  [0] map (1 entries)\n    id: int 1"));
}

#[test]
fn test_debug_mode_controls_diagnostics() {
    let (quiet, _) = run_session(&["missing + 1"]);
    assert_eq!(
        quiet.console().errors(),
        vec!["Error evaluating expression: No such variable: missing"]
    );

    let (verbose, _) = run_session(&[":debug", "missing + 1", ":debug"]);
    let errors = verbose.console().errors().join("\n");
    assert!(errors.contains("UnboundReference: No such variable: missing"));
    assert!(errors.contains("at <input> (line 1, column 1)"));
    assert!(output(&verbose).contains("Debug mode disabled"));
    assert!(!verbose.context().debug_mode());
}

#[test]
fn test_debug_trace_names_the_call_chain() {
    let (session, _) = run_session(&[":debug", "def inner() { missing }", "def outer() { inner() }", "outer()"]);
    let errors = session.console().errors().join("\n");
    assert!(errors.contains("at inner()"));
    assert!(errors.contains("at outer()"));
}

#[test]
fn test_failed_statement_is_atomic() {
    let (session, _) = run_session(&["a = 1", "a = 2\nb = nope"]);
    assert_eq!(session.context().bindings.get("a"), Some(&Value::Int(1)));
    assert!(!session.context().bindings.contains("b"));
}

#[test]
fn test_reserved_names_are_write_protected() {
    let (session, _) = run_session(&["repl = 1", "def terminal = 2", ":vars"]);
    let errors = session.console().errors();
    assert!(errors.contains(&"Cannot assign to 'repl': it is a reserved name"));
    assert!(errors.contains(&"Cannot assign to 'terminal': it is a reserved name"));
    assert!(output(&session).contains("No variables registered"));
}

#[test]
fn test_unknown_command_shows_help() {
    let (session, _) = run_session(&[":nope"]);
    let out = output(&session);
    assert!(out.contains("Unknown command: :nope\nAvailable commands:"));
}

#[test]
fn test_script_output_goes_to_the_runtime_writer() {
    let (_, out) = run_session(&["println 'Hello'", "[1, 2, 3].each { print it }"]);
    assert_eq!(out.contents(), "Hello\n123");
}

#[test]
fn test_interrupt_resumes_reading() {
    let mut source = ScriptedSource::new(["def f() {"]);
    source.push(ReadEvent::Interrupted);
    source.push_line("x = 1");
    let mut session = Session::new(
        ScriptRuntime::with_output(Box::new(SharedOutput::new())),
        source,
        BufferConsole::new(),
    );
    session.run().unwrap();
    assert!(session.console().errors().contains(&"Interrupted"));
    assert_eq!(session.context().bindings.get("x"), Some(&Value::Int(1)));
    assert!(!session.context().bindings.contains("f"));
}

#[test]
fn test_eof_exits_without_error() {
    let (session, _) = run_session(&["def f() {"]);
    assert_eq!(session.state(), SessionState::Exited);
    assert!(session.console().successes().contains(&"Exiting REPL..."));
    assert!(!session.context().has_pending());
}

#[test]
fn test_tables_on_seeded_data_source() {
    let (mut session, _) = new_session(&[":tables", "db.users.size()"]);
    let mut tables = indexmap::IndexMap::new();
    tables.insert("users".to_string(), Value::list(vec![Value::Int(1), Value::Int(2)]));
    rowscope::data::seed(&mut session, tables).unwrap();
    session.run().unwrap();
    let out = output(&session);
    assert!(out.contains("  users\n2"));
}

#[test]
fn test_registered_scripts_are_callable() {
    let (mut session, _) = new_session(&["adults().size()", ":functions"]);
    session
        .set_variable("rows", Value::list(vec![Value::Int(12), Value::Int(30), Value::Int(45)]))
        .unwrap();
    session.register_script("adults", "rows.filter { it >= 18 }").unwrap();
    session.run().unwrap();
    assert!(output(&session).contains("2\nRegistered functions:\n  adults()"));
}

#[test]
fn test_default_startup_functions_are_listed() {
    let (mut session, out) = new_session(&[":functions", "welcome()"]);
    for (name, body) in &UserConfig::default().functions {
        session.register_script(name, body).unwrap();
    }
    session.run().unwrap();
    assert!(output(&session).contains("Registered functions:\n  welcome()"));
    assert_eq!(out.contents(), "Welcome to rowscope!\n");
}

const NOT_PLAIN_NAMES: &[&str] = &[
    "def", "var", "if", "else", "while", "for", "in", "return", "break", "continue", "true",
    "false", "null", "exit", "quit", "repl", "terminal", "reader",
];

proptest! {
    #[test]
    fn prop_set_variable_then_evaluate(name in "[a-z][a-z0-9_]{0,10}", value in any::<i64>()) {
        prop_assume!(!NOT_PLAIN_NAMES.contains(&name.as_str()));
        let (mut session, _) = new_session(&[]);
        session.set_variable(&name, Value::Int(value)).unwrap();
        prop_assert!(matches!(session.eval_line(&name), EvalResult::Value(Value::Int(v)) if v == value));
    }
}
