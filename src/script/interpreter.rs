//! Tree-walking interpreter
//!
//! Globals live outside the interpreter behind [`Globals`], so the console's
//! binding store stays the single source of truth for top-level names.
//! Function and closure bodies get their own frame with local scopes.

use std::io::Write;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ast::{AssignOp, BinOp, Expr, FunctionDef, Stmt, UnaryOp};
use super::builtins;
use super::error::{ErrorKind, Pos, ScriptError, ScriptResult};
use super::value::{Function, Value};

/// Top-level name storage seen by scripts
pub trait Globals {
    fn lookup(
        &self,
        name: &str,
    ) -> Option<Value>;

    /// Bind or rebind a top-level name. `Err` carries a user-facing reason.
    fn assign(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<(), String>;
}

impl Globals for IndexMap<String, Value> {
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
        self.insert(name.to_string(), value);
        Ok(())
    }
}

/// Statement outcome
enum Flow {
    Next(Value),
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    scopes: Vec<IndexMap<String, Value>>,
    /// Declarations in the top-level frame go to the globals
    top_level: bool,
}

impl Frame {
    fn top_level() -> Self {
        Self {
            scopes: Vec::new(),
            top_level: true,
        }
    }
}

pub struct Interpreter<'a> {
    globals: &'a mut dyn Globals,
    out: &'a mut dyn Write,
    frames: Vec<Frame>,
    max_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        globals: &'a mut dyn Globals,
        out: &'a mut dyn Write,
        max_depth: usize,
    ) -> Self {
        Self {
            globals,
            out,
            frames: vec![Frame::top_level()],
            max_depth,
        }
    }

    /// Run a program; the result is the value of the last statement
    pub fn run(
        &mut self,
        program: &[Stmt],
    ) -> ScriptResult<Value> {
        match self.exec_block(program)? {
            Flow::Next(value) | Flow::Return(value) => Ok(value),
            Flow::Break | Flow::Continue => Err(ScriptError::runtime(
                "'break' or 'continue' used outside of a loop",
            )),
        }
    }

    pub fn write_line(
        &mut self,
        text: &str,
    ) -> ScriptResult<()> {
        writeln!(self.out, "{}", text)
            .and_then(|_| self.out.flush())
            .map_err(|e| ScriptError::runtime(format!("Output error: {}", e)))
    }

    pub fn write(
        &mut self,
        text: &str,
    ) -> ScriptResult<()> {
        write!(self.out, "{}", text)
            .and_then(|_| self.out.flush())
            .map_err(|e| ScriptError::runtime(format!("Output error: {}", e)))
    }

    fn frame(&self) -> &Frame {
        // the top-level frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn lookup(
        &self,
        name: &str,
    ) -> Option<Value> {
        for scope in self.frame().scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        self.globals
            .lookup(name)
            .or_else(|| builtins::lookup(name).map(Value::Native))
    }

    fn declare(
        &mut self,
        name: &str,
        value: Value,
    ) -> ScriptResult<()> {
        let frame = self.frame_mut();
        if !frame.top_level {
            if let Some(scope) = frame.scopes.last_mut() {
                scope.insert(name.to_string(), value);
                return Ok(());
            }
        }
        self.globals.assign(name, value).map_err(ScriptError::runtime)
    }

    fn assign_var(
        &mut self,
        name: &str,
        value: Value,
    ) -> ScriptResult<()> {
        for scope in self.frame_mut().scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        self.globals.assign(name, value).map_err(ScriptError::runtime)
    }

    fn exec_block(
        &mut self,
        stmts: &[Stmt],
    ) -> ScriptResult<Flow> {
        let mut last = Value::Null;
        for stmt in stmts {
            match self.exec(stmt)? {
                Flow::Next(value) => last = value,
                other => return Ok(other),
            }
        }
        Ok(Flow::Next(last))
    }

    fn exec_scoped(
        &mut self,
        stmts: &[Stmt],
        scope: IndexMap<String, Value>,
    ) -> ScriptResult<Flow> {
        self.frame_mut().scopes.push(scope);
        let result = self.exec_block(stmts);
        self.frame_mut().scopes.pop();
        result
    }

    fn exec(
        &mut self,
        stmt: &Stmt,
    ) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => Ok(Flow::Next(self.eval(expr)?)),
            Stmt::Declare { name, init, pos } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                self.declare(name, value.clone()).map_err(|e| e.at(*pos))?;
                Ok(Flow::Next(value))
            }
            Stmt::Assign {
                target,
                op,
                value,
                pos,
            } => {
                let rhs = self.eval(value)?;
                let new_value = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => {
                        let current = self.eval(target)?;
                        binary(BinOp::Add, current, rhs).map_err(|e| e.at(*pos))?
                    }
                    AssignOp::Sub => {
                        let current = self.eval(target)?;
                        binary(BinOp::Sub, current, rhs).map_err(|e| e.at(*pos))?
                    }
                };
                self.store(target, new_value.clone(), *pos)?;
                Ok(Flow::Next(new_value))
            }
            Stmt::Function(def) => {
                let function = Value::Function(Rc::new(function_from_def(def, IndexMap::new())));
                let name = def.name.as_deref().unwrap_or_default();
                self.declare(name, function).map_err(|e| e.at(def.pos))?;
                Ok(Flow::Next(Value::Null))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond)?.truthy() {
                    self.exec_scoped(then_branch, IndexMap::new())
                } else if let Some(branch) = else_branch {
                    self.exec_scoped(branch, IndexMap::new())
                } else {
                    Ok(Flow::Next(Value::Null))
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.truthy() {
                    match self.exec_scoped(body, IndexMap::new())? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next(_) | Flow::Continue => {}
                    }
                }
                Ok(Flow::Next(Value::Null))
            }
            Stmt::For {
                var,
                iter,
                body,
                pos,
            } => {
                let items = iterate(self.eval(iter)?).map_err(|e| e.at(*pos))?;
                for item in items {
                    let mut scope = IndexMap::new();
                    scope.insert(var.clone(), item);
                    match self.exec_scoped(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next(_) | Flow::Continue => {}
                    }
                }
                Ok(Flow::Next(Value::Null))
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    /// Write `value` into an assignable expression, copying containers on write
    fn store(
        &mut self,
        target: &Expr,
        value: Value,
        pos: Pos,
    ) -> ScriptResult<()> {
        match target {
            Expr::Var(name, _) => self.assign_var(name, value).map_err(|e| e.at(pos)),
            Expr::Member(object, key, member_pos) => {
                let container = self.eval(object)?;
                let updated = set_member(container, key, value).map_err(|e| e.at(*member_pos))?;
                self.store(object, updated, pos)
            }
            Expr::Index(object, index, index_pos) => {
                let container = self.eval(object)?;
                let index = self.eval(index)?;
                let updated = set_index(container, &index, value).map_err(|e| e.at(*index_pos))?;
                self.store(object, updated, pos)
            }
            _ => Err(ScriptError::runtime("Cannot assign to a temporary value").at(pos)),
        }
    }

    pub fn eval(
        &mut self,
        expr: &Expr,
    ) -> ScriptResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(x) => Ok(Value::Float(*x)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<ScriptResult<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            Expr::Map(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, expr) in entries {
                    map.insert(key.clone(), self.eval(expr)?);
                }
                Ok(Value::map(map))
            }
            Expr::Var(name, pos) => self.lookup(name).ok_or_else(|| {
                ScriptError::new(ErrorKind::Unbound, format!("No such variable: {}", name)).at(*pos)
            }),
            Expr::Unary(op, operand, pos) => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| overflow().at(*pos)),
                    (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::Neg, other) => Err(ScriptError::type_error(format!(
                        "Cannot negate a {}",
                        other.type_name()
                    ))
                    .at(*pos)),
                }
            }
            Expr::Binary(op, left, right, pos) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right).map_err(|e| e.at(*pos))
            }
            Expr::And(left, right) => {
                let result = self.eval(left)?.truthy() && self.eval(right)?.truthy();
                Ok(Value::Bool(result))
            }
            Expr::Or(left, right) => {
                let result = self.eval(left)?.truthy() || self.eval(right)?.truthy();
                Ok(Value::Bool(result))
            }
            Expr::Member(object, name, pos) => {
                let value = self.eval(object)?;
                member(&value, name).map_err(|e| e.at(*pos))
            }
            Expr::Index(object, index, pos) => {
                let value = self.eval(object)?;
                let index = self.eval(index)?;
                index_value(&value, &index).map_err(|e| e.at(*pos))
            }
            Expr::Call(callee, args, pos) => {
                let function = match &**callee {
                    Expr::Var(name, _) => self.lookup(name).ok_or_else(|| {
                        ScriptError::new(ErrorKind::Unbound, format!("No such function: {}()", name)).at(*pos)
                    })?,
                    other => self.eval(other)?,
                };
                let args = self.eval_args(args)?;
                self.call_value(&function, args, *pos)
            }
            Expr::MethodCall(receiver, name, args, pos) => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_args(args)?;
                self.call_method(receiver, name, args, *pos)
            }
            Expr::Closure(def) => {
                let mut captured = IndexMap::new();
                for scope in &self.frame().scopes {
                    for (name, value) in scope {
                        captured.insert(name.clone(), value.clone());
                    }
                }
                Ok(Value::Function(Rc::new(function_from_def(def, captured))))
            }
        }
    }

    fn eval_args(
        &mut self,
        args: &[Expr],
    ) -> ScriptResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    /// Invoke anything callable: user functions, closures and builtins
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        pos: Pos,
    ) -> ScriptResult<Value> {
        match callee {
            Value::Native(native) => (native.func)(self, args, pos).map_err(|e| e.at(pos)),
            Value::Function(function) => self.call_function(Rc::clone(function), args, pos),
            other => Err(ScriptError::type_error(format!(
                "Value of type {} is not callable",
                other.type_name()
            ))
            .at(pos)),
        }
    }

    fn call_function(
        &mut self,
        function: Rc<Function>,
        args: Vec<Value>,
        pos: Pos,
    ) -> ScriptResult<Value> {
        if self.frames.len() >= self.max_depth {
            return Err(ScriptError::runtime(format!(
                "Maximum call depth of {} exceeded",
                self.max_depth
            ))
            .at(pos));
        }
        if !function.is_closure() && args.len() != function.params.len() {
            return Err(ScriptError::runtime(format!(
                "{}() expects {} argument(s) but got {}",
                function.display_name(),
                function.params.len(),
                args.len()
            ))
            .at(pos));
        }

        let mut locals = IndexMap::new();
        if function.is_closure() && function.params.is_empty() {
            locals.insert("it".to_string(), args.first().cloned().unwrap_or_default());
        }
        for (i, param) in function.params.iter().enumerate() {
            locals.insert(param.clone(), args.get(i).cloned().unwrap_or_default());
        }

        tracing::trace!(function = function.display_name(), depth = self.frames.len(), "call");
        self.frames.push(Frame {
            scopes: vec![function.captured.clone(), locals],
            top_level: false,
        });
        let result = self.exec_block(&function.body);
        self.frames.pop();

        match result {
            Ok(Flow::Next(value)) | Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Break) | Ok(Flow::Continue) => Err(ScriptError::runtime(
                "'break' or 'continue' used outside of a loop",
            )
            .with_frame(function.display_name(), pos)),
            Err(e) => Err(e.with_frame(function.display_name(), pos)),
        }
    }

    fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        pos: Pos,
    ) -> ScriptResult<Value> {
        if let Value::Map(entries) = &receiver {
            if let Some(function) = entries.get(name).filter(|v| v.is_callable()).cloned() {
                return self.call_value(&function, args, pos);
            }
        }
        builtins::call_method(self, receiver, name, args, pos).map_err(|e| e.at(pos))
    }
}

fn function_from_def(
    def: &FunctionDef,
    captured: IndexMap<String, Value>,
) -> Function {
    Function {
        name: def.name.clone(),
        params: def.params.clone(),
        body: Rc::clone(&def.body),
        captured,
    }
}

/// Build a function value from a parsed definition
pub fn make_function(def: &FunctionDef) -> Value {
    Value::Function(Rc::new(function_from_def(def, IndexMap::new())))
}

fn overflow() -> ScriptError {
    ScriptError::new(ErrorKind::Arithmetic, "Integer overflow")
}

fn division_by_zero() -> ScriptError {
    ScriptError::new(ErrorKind::Arithmetic, "Division by zero")
}

fn operand_error(
    op: BinOp,
    left: &Value,
    right: &Value,
) -> ScriptError {
    ScriptError::type_error(format!(
        "Cannot apply '{}' to {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn numeric(
    op: BinOp,
    left: &Value,
    right: &Value,
) -> ScriptResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let result = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div => {
                if b == 0 {
                    return Err(division_by_zero());
                }
                if a % b != 0 {
                    return Ok(Value::Float(a as f64 / b as f64));
                }
                a.checked_div(b)
            }
            BinOp::Rem => {
                if b == 0 {
                    return Err(division_by_zero());
                }
                a.checked_rem(b)
            }
            _ => return Err(operand_error(op, left, right)),
        };
        return result.map(Value::Int).ok_or_else(overflow);
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(operand_error(op, left, right));
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => return Err(division_by_zero()),
        BinOp::Div => a / b,
        BinOp::Rem if b == 0.0 => return Err(division_by_zero()),
        BinOp::Rem => a % b,
        _ => return Err(operand_error(op, left, right)),
    };
    Ok(Value::Float(result))
}

pub(crate) fn binary(
    op: BinOp,
    left: Value,
    right: Value,
) -> ScriptResult<Value> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(left == right)),
        BinOp::Ne => return Ok(Value::Bool(left != right)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = left.compare(&right).ok_or_else(|| {
                ScriptError::type_error(format!(
                    "Cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (op, &left, &right) {
        (BinOp::Add, Value::Str(a), b) => Ok(Value::from(format!("{}{}", a, b))),
        (BinOp::Add, a, Value::Str(b)) if a.as_f64().is_some() => Ok(Value::from(format!("{}{}", a, b))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Add, Value::List(a), b) => {
            let mut items = a.to_vec();
            items.push(b.clone());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Map(a), Value::Map(b)) => {
            let mut merged = (**a).clone();
            merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::map(merged))
        }
        (BinOp::Sub, Value::List(a), Value::List(b)) => {
            Ok(Value::list(a.iter().filter(|item| !b.contains(*item)).cloned().collect()))
        }
        (BinOp::Sub, Value::List(a), b) => Ok(Value::list(a.iter().filter(|item| *item != b).cloned().collect())),
        (BinOp::Mul, Value::Str(s), Value::Int(n)) => {
            let count = usize::try_from(*n).map_err(|_| ScriptError::runtime("Negative repeat count"))?;
            Ok(Value::from(s.repeat(count)))
        }
        _ => numeric(op, &left, &right),
    }
}

/// Property access: map keys, or a spread over a list of maps
pub(crate) fn member(
    value: &Value,
    name: &str,
) -> ScriptResult<Value> {
    match value {
        Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or_default()),
        Value::List(items) => items
            .iter()
            .map(|item| member(item, name))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Value::list),
        Value::Null => Err(ScriptError::runtime(format!(
            "Cannot get property '{}' on null value",
            name
        ))),
        other => Err(ScriptError::type_error(format!(
            "No such property '{}' on {}",
            name,
            other.type_name()
        ))),
    }
}

fn resolve_index(
    index: i64,
    len: usize,
) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

pub(crate) fn index_value(
    value: &Value,
    index: &Value,
) -> ScriptResult<Value> {
    match (value, index) {
        (Value::List(items), Value::Int(i)) => Ok(resolve_index(*i, items.len())
            .map(|i| items[i].clone())
            .unwrap_or_default()),
        (Value::Map(entries), key) => {
            let key = match key {
                Value::Str(s) => s.to_string(),
                other => other.to_string(),
            };
            Ok(entries.get(&key).cloned().unwrap_or_default())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*i, chars.len())
                .map(|i| Value::from(chars[i].to_string()))
                .ok_or_else(|| ScriptError::runtime(format!("String index out of range: {}", i)))
        }
        (Value::Null, _) => Err(ScriptError::runtime("Cannot index into null value")),
        (container, index) => Err(ScriptError::type_error(format!(
            "Cannot index {} with {}",
            container.type_name(),
            index.type_name()
        ))),
    }
}

fn set_member(
    container: Value,
    key: &str,
    value: Value,
) -> ScriptResult<Value> {
    match container {
        Value::Map(mut entries) => {
            Rc::make_mut(&mut entries).insert(key.to_string(), value);
            Ok(Value::Map(entries))
        }
        other => Err(ScriptError::type_error(format!(
            "Cannot set property '{}' on {}",
            key,
            other.type_name()
        ))),
    }
}

fn set_index(
    container: Value,
    index: &Value,
    value: Value,
) -> ScriptResult<Value> {
    match (container, index) {
        (Value::List(mut items), Value::Int(i)) => {
            let len = items.len();
            let list = Rc::make_mut(&mut items);
            match resolve_index(*i, len) {
                Some(slot) => list[slot] = value,
                None if *i == len as i64 => list.push(value),
                None => return Err(ScriptError::runtime(format!("List index out of range: {}", i))),
            }
            Ok(Value::List(items))
        }
        (Value::Map(mut entries), key) => {
            let key = match key {
                Value::Str(s) => s.to_string(),
                other => other.to_string(),
            };
            Rc::make_mut(&mut entries).insert(key, value);
            Ok(Value::Map(entries))
        }
        (container, index) => Err(ScriptError::type_error(format!(
            "Cannot index {} with {}",
            container.type_name(),
            index.type_name()
        ))),
    }
}

/// Elements visited by `for (x in value)`
pub(crate) fn iterate(value: Value) -> ScriptResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.to_vec()),
        Value::Map(entries) => Ok(entries
            .iter()
            .map(|(key, value)| {
                let mut entry = IndexMap::new();
                entry.insert("key".to_string(), Value::str(key));
                entry.insert("value".to_string(), value.clone());
                Value::map(entry)
            })
            .collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(ScriptError::type_error(format!(
            "Cannot iterate over {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;

    fn run_with(
        source: &str,
        globals: &mut IndexMap<String, Value>,
    ) -> ScriptResult<Value> {
        let program = parse(source)?;
        let mut out = Vec::new();
        let mut interp = Interpreter::new(globals, &mut out, 64);
        interp.run(&program)
    }

    fn run(source: &str) -> ScriptResult<Value> {
        run_with(source, &mut IndexMap::new())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 1").unwrap(), Value::Int(2));
        assert_eq!(run("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(run("8 / 2").unwrap(), Value::Int(4));
        assert_eq!(run("'a' + 1").unwrap(), Value::str("a1"));
        assert_eq!(run("-(2 * 3) % 4").unwrap(), Value::Int(-2));
    }

    #[test]
    fn test_division_by_zero() {
        let err = run("1 / 0").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arithmetic);
        assert_eq!(err.pos, Some(Pos::new(1, 3)));
    }

    #[test]
    fn test_top_level_assignment_reaches_globals() {
        let mut globals = IndexMap::new();
        run_with("x = 5\ndef y = x * 2", &mut globals).unwrap();
        assert_eq!(globals.get("x"), Some(&Value::Int(5)));
        assert_eq!(globals.get("y"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_function_locals_stay_local() {
        let mut globals = IndexMap::new();
        let result = run_with(
            "def f(a) { def tmp = a + 1\n return tmp * 2 }\nf(3)",
            &mut globals,
        )
        .unwrap();
        assert_eq!(result, Value::Int(8));
        assert!(globals.contains_key("f"));
        assert!(!globals.contains_key("tmp"));
        assert!(!globals.contains_key("a"));
    }

    #[test]
    fn test_implicit_return_and_recursion() {
        let result = run("def fact(n) { if (n <= 1) { 1 } else { n * fact(n - 1) } }\nfact(10)").unwrap();
        assert_eq!(result, Value::Int(3628800));
    }

    #[test]
    fn test_runaway_recursion_is_bounded() {
        let err = run("def f(n) { f(n + 1) }\nf(0)").unwrap_err();
        assert!(err.message.contains("Maximum call depth"));
        assert!(!err.trace.is_empty());
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run("def greet() { 'hi' }\ngreet(1)").unwrap_err();
        assert!(err.message.contains("expects 0 argument(s) but got 1"));
    }

    #[test]
    fn test_closures_capture_locals() {
        let result = run("def adder(n) { return { x -> x + n } }\ndef add2 = adder(2)\nadd2(40)").unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn test_loops() {
        let mut globals = IndexMap::new();
        run_with(
            "total = 0\nfor (x in [1, 2, 3, 4]) { if (x == 3) { continue }\n total += x }\ni = 0\nwhile (true) { i += 1\n if (i > 5) { break } }",
            &mut globals,
        )
        .unwrap();
        assert_eq!(globals.get("total"), Some(&Value::Int(7)));
        assert_eq!(globals.get("i"), Some(&Value::Int(6)));
    }

    #[test]
    fn test_nested_container_assignment() {
        let mut globals = IndexMap::new();
        run_with("m = [a: [1, 2]]\nm.a[1] = 5\nm['b'] = true", &mut globals).unwrap();
        assert_eq!(globals.get("m").unwrap().to_string(), "[a:[1, 5], b:true]");
    }

    #[test]
    fn test_copy_on_write() {
        let mut globals = IndexMap::new();
        run_with("a = [1]\nb = a\nb[0] = 2", &mut globals).unwrap();
        assert_eq!(globals.get("a").unwrap().to_string(), "[1]");
        assert_eq!(globals.get("b").unwrap().to_string(), "[2]");
    }

    #[test]
    fn test_property_spread_over_rows() {
        let result = run("rows = [[name: 'a'], [name: 'b']]\nrows.name").unwrap();
        assert_eq!(result.to_string(), "['a', 'b']");
    }

    #[test]
    fn test_unbound_reference() {
        let err = run("missing + 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unbound);
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn test_comparison_of_mixed_types_fails() {
        let err = run("1 < 'a'").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn test_error_trace_names_functions() {
        let err = run("def inner() { 1 / 0 }\ndef outer() { inner() }\nouter()").unwrap_err();
        assert_eq!(err.trace.len(), 2);
        assert!(err.trace[0].contains("inner()"));
        assert!(err.trace[1].contains("outer()"));
    }
}
