//! rowscope
//!
//! An interactive console for exploring in-memory row sets with a small,
//! Groovy-flavoured scripting language.
//!
//! # Example
//!
//! ```no_run
//! use rowscope::repl::line::{RustylineSource, StdConsole, LineEditorConfig};
//! use rowscope::repl::Session;
//! use rowscope::script::ScriptRuntime;
//!
//! fn main() -> rowscope::Result<()> {
//!     let source = RustylineSource::new(&LineEditorConfig::default())?;
//!     let mut session = Session::new(ScriptRuntime::new(), source, StdConsole::new(true));
//!     session.run()?;
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod data;
pub mod repl;
pub mod script;
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "rowscope - interactive row-set console";
