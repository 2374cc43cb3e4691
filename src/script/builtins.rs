//! Builtin functions and methods

use std::rc::Rc;

use indexmap::IndexMap;

use super::error::{ErrorKind, Pos, ScriptError, ScriptResult};
use super::interpreter::Interpreter;
use super::value::{NativeFn, Value};

/// Largest list `range()` will build
const MAX_RANGE: i64 = 1_000_000;

/// Deepest nesting rendered by `inspect`
const INSPECT_DEPTH: usize = 6;

/// Items shown per container by `inspect`
const INSPECT_ITEMS: usize = 50;

static BUILTINS: &[NativeFn] = &[
    NativeFn { name: "println", func: println },
    NativeFn { name: "print", func: print },
    NativeFn { name: "len", func: len },
    NativeFn { name: "str", func: to_str },
    NativeFn { name: "int", func: to_int },
    NativeFn { name: "float", func: to_float },
    NativeFn { name: "type", func: type_of },
    NativeFn { name: "keys", func: keys },
    NativeFn { name: "range", func: range },
    NativeFn { name: "inspect", func: inspect_fn },
];

pub fn lookup(name: &str) -> Option<NativeFn> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}

fn arity(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> ScriptResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(ScriptError::runtime(format!(
            "{}() expects {} argument(s) but got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn join_display(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn println(
    interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    interp.write_line(&join_display(&args))?;
    Ok(Value::Null)
}

fn print(
    interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    interp.write(&join_display(&args))?;
    Ok(Value::Null)
}

fn size_of(value: &Value) -> ScriptResult<usize> {
    match value {
        Value::List(items) => Ok(items.len()),
        Value::Map(entries) => Ok(entries.len()),
        Value::Str(s) => Ok(s.chars().count()),
        other => Err(ScriptError::type_error(format!(
            "{} has no size",
            other.type_name()
        ))),
    }
}

fn len(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("len", &args, 1, 1)?;
    Ok(Value::Int(size_of(&args[0])? as i64))
}

fn to_str(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("str", &args, 1, 1)?;
    Ok(Value::from(args[0].to_string()))
}

fn parse_int(value: &Value) -> ScriptResult<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| ScriptError::runtime(format!("Cannot convert '{}' to int", s))),
        other => Err(ScriptError::type_error(format!(
            "Cannot convert {} to int",
            other.type_name()
        ))),
    }
}

fn to_int(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("int", &args, 1, 1)?;
    parse_int(&args[0])
}

fn to_float(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("float", &args, 1, 1)?;
    match &args[0] {
        Value::Str(s) => s
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| ScriptError::runtime(format!("Cannot convert '{}' to float", s))),
        other => other.as_f64().map(Value::Float).ok_or_else(|| {
            ScriptError::type_error(format!("Cannot convert {} to float", other.type_name()))
        }),
    }
}

fn type_of(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("type", &args, 1, 1)?;
    Ok(Value::str(args[0].type_name()))
}

fn map_keys(value: &Value) -> ScriptResult<Value> {
    match value {
        Value::Map(entries) => Ok(Value::list(entries.keys().map(Value::str).collect())),
        other => Err(ScriptError::type_error(format!(
            "keys() expects a map but got {}",
            other.type_name()
        ))),
    }
}

fn keys(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("keys", &args, 1, 1)?;
    map_keys(&args[0])
}

fn int_arg(
    function: &str,
    value: &Value,
) -> ScriptResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(ScriptError::type_error(format!(
            "{}() expects an int but got {}",
            function,
            other.type_name()
        ))),
    }
}

fn range(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    let (start, end) = match args.as_slice() {
        [end] => (0, int_arg("range", end)?),
        [start, end] => (int_arg("range", start)?, int_arg("range", end)?),
        _ => return arity("range", &args, 1, 2).map(|()| Value::Null),
    };
    if end.saturating_sub(start) > MAX_RANGE {
        return Err(ScriptError::runtime(format!(
            "range() is limited to {} elements",
            MAX_RANGE
        )));
    }
    Ok(Value::list((start..end).map(Value::Int).collect()))
}

fn inspect_fn(
    _interp: &mut Interpreter<'_>,
    args: Vec<Value>,
    _pos: Pos,
) -> ScriptResult<Value> {
    arity("inspect", &args, 1, 1)?;
    Ok(Value::from(inspect(&args[0])))
}

/// Human-readable structural dump of a value
pub fn inspect(value: &Value) -> String {
    let mut out = String::new();
    render(value, 0, &mut out);
    out
}

fn render(
    value: &Value,
    depth: usize,
    out: &mut String,
) {
    let indent = "  ".repeat(depth + 1);
    match value {
        Value::List(items) => {
            out.push_str(&format!("list ({} items)", items.len()));
            if depth >= INSPECT_DEPTH {
                out.push_str(" ...");
                return;
            }
            for (i, item) in items.iter().take(INSPECT_ITEMS).enumerate() {
                out.push_str(&format!("\n{}[{}] ", indent, i));
                render(item, depth + 1, out);
            }
            if items.len() > INSPECT_ITEMS {
                out.push_str(&format!("\n{}... {} more", indent, items.len() - INSPECT_ITEMS));
            }
        }
        Value::Map(entries) => {
            out.push_str(&format!("map ({} entries)", entries.len()));
            if depth >= INSPECT_DEPTH {
                out.push_str(" ...");
                return;
            }
            for (key, item) in entries.iter().take(INSPECT_ITEMS) {
                out.push_str(&format!("\n{}{}: ", indent, key));
                render(item, depth + 1, out);
            }
            if entries.len() > INSPECT_ITEMS {
                out.push_str(&format!("\n{}... {} more", indent, entries.len() - INSPECT_ITEMS));
            }
        }
        Value::Null => out.push_str("null"),
        other => out.push_str(&format!("{} {}", other.type_name(), other.repr())),
    }
}

fn closure_arg(
    method: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    match args {
        [f] if f.is_callable() => Ok(f.clone()),
        _ => Err(ScriptError::runtime(format!(
            "{}() expects a closure argument",
            method
        ))),
    }
}

fn no_method(
    receiver: &Value,
    name: &str,
) -> ScriptError {
    ScriptError::new(
        ErrorKind::Type,
        format!("No such method '{}' for {}", name, receiver.type_name()),
    )
}

/// Dispatch `receiver.name(args)` for the builtin value types
pub fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: Value,
    name: &str,
    args: Vec<Value>,
    pos: Pos,
) -> ScriptResult<Value> {
    match name {
        "toString" => return Ok(Value::from(receiver.to_string())),
        "inspect" => return Ok(Value::from(inspect(&receiver))),
        _ => {}
    }
    match receiver {
        Value::List(items) => list_method(interp, items, name, args, pos),
        Value::Map(entries) => map_method(interp, entries, name, args, pos),
        Value::Str(s) => string_method(&s, name, &args),
        Value::Int(i) if name == "abs" => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::new(ErrorKind::Arithmetic, "Integer overflow")),
        Value::Float(x) if name == "abs" => Ok(Value::Float(x.abs())),
        Value::Function(_) | Value::Native(_) if name == "call" => interp.call_value(&receiver, args, pos),
        Value::Null => Err(ScriptError::runtime(format!(
            "Cannot invoke method {}() on null value",
            name
        ))),
        other => Err(no_method(&other, name)),
    }
}

fn list_method(
    interp: &mut Interpreter<'_>,
    items: Rc<Vec<Value>>,
    name: &str,
    args: Vec<Value>,
    pos: Pos,
) -> ScriptResult<Value> {
    match name {
        "size" => Ok(Value::Int(items.len() as i64)),
        "isEmpty" => Ok(Value::Bool(items.is_empty())),
        "first" => Ok(items.first().cloned().unwrap_or_default()),
        "last" => Ok(items.last().cloned().unwrap_or_default()),
        "get" => {
            arity("get", &args, 1, 1)?;
            super::interpreter::index_value(&Value::List(items), &args[0])
        }
        "contains" => {
            arity("contains", &args, 1, 1)?;
            Ok(Value::Bool(items.contains(&args[0])))
        }
        "reverse" => Ok(Value::list(items.iter().rev().cloned().collect())),
        "unique" => {
            let mut seen: Vec<Value> = Vec::new();
            for item in items.iter() {
                if !seen.contains(item) {
                    seen.push(item.clone());
                }
            }
            Ok(Value::list(seen))
        }
        "take" | "drop" => {
            arity(name, &args, 1, 1)?;
            let n = usize::try_from(int_arg(name, &args[0])?.max(0)).unwrap_or(usize::MAX);
            let result = if name == "take" {
                items.iter().take(n).cloned().collect()
            } else {
                items.iter().skip(n).cloned().collect()
            };
            Ok(Value::list(result))
        }
        "join" => {
            arity("join", &args, 0, 1)?;
            let separator = args.first().map(|s| s.to_string()).unwrap_or_default();
            Ok(Value::from(
                items
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        "sum" => {
            let mut total = Value::Int(0);
            for item in items.iter() {
                total = super::interpreter::binary(super::ast::BinOp::Add, total, item.clone())?;
            }
            Ok(total)
        }
        "sort" => {
            arity("sort", &args, 0, 1)?;
            let mut keyed = Vec::with_capacity(items.len());
            for item in items.iter() {
                let key = match args.first() {
                    Some(f) => interp.call_value(f, vec![item.clone()], pos)?,
                    None => item.clone(),
                };
                keyed.push((key, item.clone()));
            }
            let mut failed = false;
            keyed.sort_by(|(a, _), (b, _)| {
                a.compare(b).unwrap_or_else(|| {
                    failed = true;
                    std::cmp::Ordering::Equal
                })
            });
            if failed {
                return Err(ScriptError::type_error("sort() found values that cannot be compared"));
            }
            Ok(Value::list(keyed.into_iter().map(|(_, item)| item).collect()))
        }
        "filter" | "findAll" | "map" | "collect" | "find" | "each" | "any" | "every" | "count" | "groupBy" => {
            let f = closure_arg(name, &args)?;
            let mut results = Vec::with_capacity(items.len());
            for item in items.iter() {
                results.push((item.clone(), interp.call_value(&f, vec![item.clone()], pos)?));
                if name == "find" && results.last().is_some_and(|(_, r)| r.truthy()) {
                    break;
                }
            }
            Ok(match name {
                "filter" | "findAll" => Value::list(
                    results
                        .into_iter()
                        .filter(|(_, r)| r.truthy())
                        .map(|(item, _)| item)
                        .collect(),
                ),
                "map" | "collect" => Value::list(results.into_iter().map(|(_, r)| r).collect()),
                "find" => results
                    .into_iter()
                    .find(|(_, r)| r.truthy())
                    .map(|(item, _)| item)
                    .unwrap_or_default(),
                "each" => Value::List(items),
                "any" => Value::Bool(results.iter().any(|(_, r)| r.truthy())),
                "every" => Value::Bool(results.iter().all(|(_, r)| r.truthy())),
                "count" => Value::Int(results.iter().filter(|(_, r)| r.truthy()).count() as i64),
                _ => {
                    let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();
                    for (item, key) in results {
                        groups.entry(key.to_string()).or_default().push(item);
                    }
                    Value::map(groups.into_iter().map(|(k, v)| (k, Value::list(v))).collect())
                }
            })
        }
        _ => Err(no_method(&Value::List(items), name)),
    }
}

fn map_method(
    interp: &mut Interpreter<'_>,
    entries: Rc<IndexMap<String, Value>>,
    name: &str,
    args: Vec<Value>,
    pos: Pos,
) -> ScriptResult<Value> {
    match name {
        "size" => Ok(Value::Int(entries.len() as i64)),
        "isEmpty" => Ok(Value::Bool(entries.is_empty())),
        "keys" | "keySet" => map_keys(&Value::Map(entries)),
        "values" => Ok(Value::list(entries.values().cloned().collect())),
        "get" => {
            arity("get", &args, 1, 2)?;
            let found = super::interpreter::index_value(&Value::Map(Rc::clone(&entries)), &args[0])?;
            Ok(match (found, args.get(1)) {
                (Value::Null, Some(default)) => default.clone(),
                (found, _) => found,
            })
        }
        "containsKey" => {
            arity("containsKey", &args, 1, 1)?;
            let key = match &args[0] {
                Value::Str(s) => s.to_string(),
                other => other.to_string(),
            };
            Ok(Value::Bool(entries.contains_key(&key)))
        }
        "each" => {
            let f = closure_arg(name, &args)?;
            let two_params = matches!(&f, Value::Function(func) if func.params.len() == 2);
            for (key, value) in entries.iter() {
                let call_args = if two_params {
                    vec![Value::str(key), value.clone()]
                } else {
                    let mut entry = IndexMap::new();
                    entry.insert("key".to_string(), Value::str(key));
                    entry.insert("value".to_string(), value.clone());
                    vec![Value::map(entry)]
                };
                interp.call_value(&f, call_args, pos)?;
            }
            Ok(Value::Map(entries))
        }
        _ => Err(no_method(&Value::Map(entries), name)),
    }
}

fn str_arg<'v>(
    method: &str,
    args: &'v [Value],
    index: usize,
) -> ScriptResult<&'v str> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(&**s),
        _ => Err(ScriptError::runtime(format!(
            "{}() expects a string argument",
            method
        ))),
    }
}

fn string_method(
    s: &str,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    match name {
        "size" | "length" => Ok(Value::Int(s.chars().count() as i64)),
        "isEmpty" => Ok(Value::Bool(s.is_empty())),
        "toUpperCase" => Ok(Value::from(s.to_uppercase())),
        "toLowerCase" => Ok(Value::from(s.to_lowercase())),
        "trim" => Ok(Value::str(s.trim())),
        "contains" => Ok(Value::Bool(s.contains(str_arg(name, args, 0)?))),
        "startsWith" => Ok(Value::Bool(s.starts_with(str_arg(name, args, 0)?))),
        "endsWith" => Ok(Value::Bool(s.ends_with(str_arg(name, args, 0)?))),
        "replace" => Ok(Value::from(s.replace(str_arg(name, args, 0)?, str_arg(name, args, 1)?))),
        "split" => {
            let parts: Vec<Value> = match args.first() {
                Some(_) => s.split(str_arg(name, args, 0)?).map(Value::str).collect(),
                None => s.split_whitespace().map(Value::str).collect(),
            };
            Ok(Value::list(parts))
        }
        "toInteger" => parse_int(&Value::str(s)),
        _ => Err(no_method(&Value::str(s), name)),
    }
}
