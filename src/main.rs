//! rowscope - CLI

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use rowscope::data::{self, LoadSpec};
use rowscope::repl::backend_trait::EvalResult;
use rowscope::repl::line::{
    Console, LineEditorConfig, LineSource, RustylineSource, ScriptedSource, StdConsole,
};
use rowscope::repl::{Session, SessionConfig};
use rowscope::script::{ScriptRuntime, Value};
use rowscope::util::config::{load_config_from, load_user_config, UserConfig};
use rowscope::util::logger::{self, LogLevel};
use rowscope::{NAME, VERSION};

/// Interactive console for exploring JSON row sets
#[derive(Parser, Debug)]
#[command(name = "rowscope")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/rowscope/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start with debug mode on
    #[arg(short, long)]
    debug: bool,

    /// Log more to stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Don't read or write the history file
    #[arg(long)]
    no_history: bool,

    /// Load a JSON row set and bind it as NAME
    #[arg(short, long, value_name = "NAME=FILE")]
    load: Vec<LoadSpec>,

    /// Evaluate CODE and exit instead of starting the console
    #[arg(short, long, value_name = "CODE")]
    eval: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_level(LogLevel::from_verbosity(args.verbose));
    tracing::debug!("{} {}", NAME, VERSION);

    let config = match &args.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => load_user_config().context("Failed to load user config")?,
    };
    let tables = data::load_all(&args.load).context("Failed to load row sets")?;
    let session_config = SessionConfig {
        prompt: config.repl.prompt.clone(),
        continuation_prompt: config.repl.continuation_prompt.clone(),
    };
    let console = StdConsole::new(config.repl.colors);

    if let Some(code) = &args.eval {
        let mut session = Session::with_config(
            ScriptRuntime::new(),
            ScriptedSource::default(),
            console,
            session_config,
        );
        prepare(&mut session, &config, args.debug, tables)?;
        return match session.eval_line(code) {
            EvalResult::Value(value) => {
                println!("{}", value);
                Ok(())
            }
            EvalResult::Ok => Ok(()),
            EvalResult::Error(message) => bail!("{}", message),
            EvalResult::Incomplete => bail!("Incomplete input: unbalanced braces"),
        };
    }

    let editor = LineEditorConfig {
        vi_mode: config.repl.vi_mode,
        history_file: if args.no_history {
            None
        } else {
            config.repl.history_path()
        },
        history_size: config.repl.history_size,
    };
    let source = RustylineSource::new(&editor).context("Failed to open the terminal")?;
    let mut session = Session::with_config(ScriptRuntime::new(), source, console, session_config);
    prepare(&mut session, &config, args.debug, tables)?;
    session.run().context("Console session failed")?;

    Ok(())
}

/// Debug flag, row sets and startup functions
fn prepare<S: LineSource, C: Console>(
    session: &mut Session<ScriptRuntime, S, C>,
    config: &UserConfig,
    debug: bool,
    tables: IndexMap<String, Value>,
) -> Result<()> {
    session
        .context_mut()
        .set_debug_mode(debug || config.repl.debug);
    data::seed(session, tables).context("Failed to bind row sets")?;
    for (name, body) in &config.functions {
        if let Err(e) = session.register_script(name, body) {
            tracing::warn!("Skipping startup function '{}': {}", name, e);
        }
    }
    Ok(())
}
