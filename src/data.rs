//! Row-set loading for `--load NAME=FILE.json`

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use crate::repl::backend_trait::ScriptEngine;
use crate::repl::engine::context::Bindings;
use crate::repl::error::SessionResult;
use crate::repl::line::{Console, LineSource, Session};
use crate::script::Value;

/// Binding holding every loaded row set, keyed by name
pub const TABLES_BINDING: &str = "db";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Expected NAME=FILE, got '{0}'")]
    BadSpec(String),

    #[error("'{0}' is not a valid variable name")]
    BadName(String),

    #[error("'{0}' is reserved for the map of all loaded tables")]
    TablesName(String),

    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A `NAME=FILE` pair from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for LoadSpec {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .filter(|(_, path)| !path.is_empty())
            .ok_or_else(|| DataError::BadSpec(s.to_string()))?;
        let name = name.trim();
        if Bindings::check_name(name).is_err() {
            return Err(DataError::BadName(name.to_string()));
        }
        if name == TABLES_BINDING {
            return Err(DataError::TablesName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Parse a JSON document into a script value; objects keep their key order
pub fn load_json(path: &Path) -> Result<Value, DataError> {
    let content = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|source| DataError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Value::from(json))
}

/// Load every spec, in order; a later spec with the same name wins
pub fn load_all(specs: &[LoadSpec]) -> Result<IndexMap<String, Value>, DataError> {
    let mut tables = IndexMap::new();
    for spec in specs {
        let value = load_json(&spec.path)?;
        tracing::info!("loaded {} from {}", spec.name, spec.path.display());
        tables.insert(spec.name.clone(), value);
    }
    Ok(tables)
}

/// Bind each row set by name, plus all of them under `db`
pub fn seed<E: ScriptEngine, S: LineSource, C: Console>(
    session: &mut Session<E, S, C>,
    tables: IndexMap<String, Value>,
) -> SessionResult<()> {
    if tables.is_empty() {
        return Ok(());
    }
    for (name, rows) in &tables {
        session.set_variable(name, rows.clone())?;
    }
    session.set_variable(TABLES_BINDING, Value::map(tables))
}
