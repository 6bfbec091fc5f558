//! Tree-walking interpreter for compiled script bodies.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use hackshell_dsl::script::{
    AssignOp, BinaryOp, CallSite, Expr, Literal, LogicalOp, ScriptAst, Stmt, UnaryOp,
};
use hackshell_dsl::{BoundReference, Object, Value};

use crate::command::Context;
use crate::error::ShellError;
use crate::registry::Registry;

/// Longest array an index assignment may grow to.
const MAX_ARRAY_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    TypeError,
    ReferenceError,
    RangeError,
    Error,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::TypeError => "TypeError",
            FaultKind::ReferenceError => "ReferenceError",
            FaultKind::RangeError => "RangeError",
            FaultKind::Error => "Error",
        };
        f.write_str(name)
    }
}

/// A runtime fault raised by a script body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::TypeError,
            message: message.into(),
        }
    }

    fn reference_error(name: &str) -> Self {
        Self {
            kind: FaultKind::ReferenceError,
            message: format!("{name} is not defined"),
        }
    }

    fn range_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::RangeError,
            message: message.into(),
        }
    }

    fn stack_overflow() -> Self {
        Self::range_error("Maximum call stack size exceeded")
    }
}

impl From<Fault> for ShellError {
    fn from(fault: Fault) -> Self {
        ShellError::RuntimeFault {
            kind: fault.kind.to_string(),
            message: fault.message,
        }
    }
}

type Exec<T> = Result<T, Fault>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

enum Step {
    Field(String),
    Index(Value),
}

impl Step {
    fn key(&self) -> String {
        match self {
            Step::Field(name) => name.clone(),
            Step::Index(value) => value.to_string(),
        }
    }
}

/// Runs `ast` with its parameters bound to `context` and `args`.
pub(crate) fn run(
    registry: &Registry,
    ast: &ScriptAst,
    context: &Context,
    args: Option<&Value>,
) -> Exec<Value> {
    let mut globals = HashMap::new();
    let mut params = ast.params.iter();
    if let Some(name) = params.next() {
        globals.insert(name.clone(), context.to_value());
    }
    if let Some(name) = params.next() {
        globals.insert(name.clone(), args.cloned().unwrap_or_default());
    }

    let mut interpreter = Interpreter {
        registry,
        scopes: vec![globals],
    };
    match interpreter.exec_stmts(&ast.body)? {
        Flow::Return(value) => Ok(value),
        Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Null),
    }
}

struct Interpreter<'r> {
    registry: &'r Registry,
    scopes: Vec<HashMap<String, Value>>,
}

impl Interpreter<'_> {
    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_stmts(&mut self, body: &[Stmt]) -> Exec<Flow> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, body: &[Stmt], binding: Option<(&str, Value)>) -> Exec<Flow> {
        let mut scope = HashMap::new();
        if let Some((name, value)) = binding {
            scope.insert(name.to_string(), value);
        }
        self.scopes.push(scope);
        let flow = self.exec_stmts(body);
        self.scopes.pop();
        flow
    }

    fn exec(&mut self, stmt: &Stmt) -> Exec<Flow> {
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
            }
            Stmt::Assign { target, op, value } => {
                let mut value = self.eval(value)?;
                match op {
                    AssignOp::Set => {}
                    AssignOp::Add => value = add(self.eval(target)?, value)?,
                    AssignOp::Sub => {
                        value = arithmetic(BinaryOp::Sub, self.eval(target)?, value)?
                    }
                }
                *self.place_mut(target)? = value;
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                let branch = if self.eval(test)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                return self.exec_block(branch, None);
            }
            Stmt::While { test, body } => {
                while self.eval(test)?.is_truthy() {
                    match self.exec_block(body, None)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::ForOf {
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    Value::Array(items) => items,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    other => {
                        return Err(Fault::type_error(format!(
                            "{} is not iterable",
                            describe_value(&other)
                        )))
                    }
                };
                for item in items {
                    match self.exec_block(body, Some((binding.as_str(), item)))? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::Block(body) => return self.exec_block(body, None),
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ========================================================================
    // Places
    // ========================================================================

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    fn place_path(&mut self, target: &Expr) -> Exec<(String, Vec<Step>)> {
        match target {
            Expr::Ident(name) => Ok((name.clone(), Vec::new())),
            Expr::Member { object, property } => {
                let (root, mut steps) = self.place_path(object)?;
                steps.push(Step::Field(property.clone()));
                Ok((root, steps))
            }
            Expr::Index { object, index } => {
                let (root, mut steps) = self.place_path(object)?;
                let index = self.eval(index)?;
                steps.push(Step::Index(index));
                Ok((root, steps))
            }
            _ => Err(Fault {
                kind: FaultKind::Error,
                message: "Invalid left-hand side in assignment".to_string(),
            }),
        }
    }

    fn place_mut(&mut self, target: &Expr) -> Exec<&mut Value> {
        let (root, steps) = self.place_path(target)?;
        let mut slot = self
            .lookup_mut(&root)
            .ok_or_else(|| Fault::reference_error(&root))?;
        for step in steps {
            slot = step_mut(slot, step)?;
        }
        Ok(slot)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval_all(&mut self, exprs: &[Expr]) -> Exec<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expr::Array(items) => Ok(Value::Array(self.eval_all(items)?)),
            Expr::Object(fields) => {
                let mut map = Object::new();
                for (key, value) in fields {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Ident(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| Fault::reference_error(name)),
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                member(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                element(&object, &index)
            }
            Expr::MethodCall {
                object,
                method,
                args,
            } => self.method_call(object, method, args),
            Expr::Call { callee, .. } => Err(Fault::type_error(format!(
                "{} is not a function",
                describe(callee)
            ))),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::CallSite { site, argument } => {
                let argument = match argument {
                    Some(expr) => Some(self.eval(expr)?).filter(|v| !v.is_null()),
                    None => None,
                };
                self.call_site(site, argument.as_ref())
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Exec<Value> {
        if op == UnaryOp::TypeOf {
            if let Expr::Ident(name) = operand {
                if self.lookup(name).is_none() {
                    return Ok(Value::from("undefined"));
                }
            }
        }
        let value = self.eval(operand)?;
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(Fault::type_error(format!(
                    "Cannot negate {}",
                    describe_value(&other)
                ))),
            },
            UnaryOp::TypeOf => Ok(Value::from(type_of(&value))),
        }
    }

    fn call_site(&mut self, site: &CallSite, args: Option<&Value>) -> Exec<Value> {
        let _guard = self
            .registry
            .enter_call()
            .ok_or_else(Fault::stack_overflow)?;
        Ok(self.registry.execute_command(
            site.domain.as_deref(),
            &site.command,
            args,
            Some(&site.caller),
        ))
    }

    fn call_reference(&mut self, reference: &BoundReference, args: Option<&Value>) -> Exec<Value> {
        let _guard = self
            .registry
            .enter_call()
            .ok_or_else(Fault::stack_overflow)?;
        Ok(self.registry.call_reference(reference, args))
    }

    fn method_call(&mut self, object: &Expr, method: &str, args: &[Expr]) -> Exec<Value> {
        let args = self.eval_all(args)?;

        if method == "push" && object.is_place() {
            let target = describe(object);
            return match self.place_mut(object)? {
                Value::Array(items) => {
                    items.extend(args);
                    Ok(Value::from(items.len()))
                }
                _ => Err(Fault::type_error(format!("{target}.push is not a function"))),
            };
        }

        let receiver = self.eval(object)?;
        let first = args.first();
        let number_arg = |i: usize| args.get(i).and_then(Value::as_f64);

        match (&receiver, method) {
            (Value::Reference(reference), "call") => {
                let argument = first.filter(|v| !v.is_null());
                self.call_reference(reference, argument)
            }

            (Value::Array(items), "includes") => {
                Ok(Value::Bool(first.is_some_and(|v| items.contains(v))))
            }
            (Value::Array(items), "indexOf") => Ok(Value::Number(
                first
                    .and_then(|v| items.iter().position(|item| item == v))
                    .map_or(-1.0, |i| i as f64),
            )),
            (Value::Array(items), "join") => {
                let sep = first.map_or_else(|| ",".to_string(), Value::to_string);
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect();
                Ok(Value::String(parts.join(&sep)))
            }
            (Value::Array(items), "slice") => {
                let (start, end) = slice_bounds(items.len(), number_arg(0), number_arg(1));
                Ok(Value::Array(items[start..end].to_vec()))
            }
            (Value::Array(items), "push") => Ok(Value::from(items.len() + args.len())),

            (Value::String(s), "includes" | "startsWith" | "endsWith" | "indexOf" | "split") => {
                let needle = first.map(Value::to_string).unwrap_or_default();
                Ok(match method {
                    "includes" => Value::Bool(s.contains(needle.as_str())),
                    "startsWith" => Value::Bool(s.starts_with(needle.as_str())),
                    "endsWith" => Value::Bool(s.ends_with(needle.as_str())),
                    "indexOf" => Value::Number(
                        s.find(needle.as_str())
                            .map_or(-1.0, |b| s[..b].chars().count() as f64),
                    ),
                    _ if first.is_none() => Value::Array(vec![Value::String(s.clone())]),
                    _ if needle.is_empty() => {
                        Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect())
                    }
                    _ => Value::Array(s.split(needle.as_str()).map(Value::from).collect()),
                })
            }
            (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
            (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
            (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
            (Value::String(s), "slice") => {
                let chars: Vec<char> = s.chars().collect();
                let (start, end) = slice_bounds(chars.len(), number_arg(0), number_arg(1));
                Ok(Value::String(chars[start..end].iter().collect()))
            }

            (Value::Object(map), "keys") => Ok(Value::Array(
                map.keys().map(|k| Value::String(k.clone())).collect(),
            )),

            (Value::Null, _) => Err(Fault::type_error(format!(
                "Cannot read properties of null (reading '{method}')"
            ))),
            _ => Err(Fault::type_error(format!(
                "{}.{method} is not a function",
                describe(object)
            ))),
        }
    }
}

// ============================================================================
// Value helpers
// ============================================================================

fn step_mut(slot: &mut Value, step: Step) -> Exec<&mut Value> {
    match (slot, step) {
        (Value::Object(map), step) => Ok(map.entry(step.key()).or_insert(Value::Null)),
        (Value::Array(items), Step::Index(Value::Number(n))) => {
            if n < 0.0 || n.fract() != 0.0 || n as usize >= MAX_ARRAY_LEN {
                return Err(Fault::range_error("Invalid array length"));
            }
            let i = n as usize;
            if i >= items.len() {
                items.resize(i + 1, Value::Null);
            }
            Ok(&mut items[i])
        }
        (Value::Null, step) => Err(Fault::type_error(format!(
            "Cannot set properties of null (setting '{}')",
            step.key()
        ))),
        (other, step) => Err(Fault::type_error(format!(
            "Cannot create property '{}' on {}",
            step.key(),
            describe_value(other)
        ))),
    }
}

fn member(object: &Value, property: &str) -> Exec<Value> {
    Ok(match (object, property) {
        (Value::Null, _) => {
            return Err(Fault::type_error(format!(
                "Cannot read properties of null (reading '{property}')"
            )))
        }
        (Value::Object(map), _) => map.get(property).cloned().unwrap_or_default(),
        (Value::Array(items), "length") => Value::from(items.len()),
        (Value::String(s), "length") => Value::from(s.chars().count()),
        (Value::Reference(r), "name") => Value::String(r.name.clone()),
        _ => Value::Null,
    })
}

fn element(object: &Value, index: &Value) -> Exec<Value> {
    Ok(match (object, index) {
        (Value::Null, _) => {
            return Err(Fault::type_error(format!(
                "Cannot read properties of null (reading '{index}')"
            )))
        }
        (Value::Array(items), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
            items.get(*n as usize).cloned().unwrap_or_default()
        }
        (Value::String(s), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => s
            .chars()
            .nth(*n as usize)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        (Value::Object(map), key) => map.get(&key.to_string()).cloned().unwrap_or_default(),
        (other, Value::String(name)) => member(other, name)?,
        _ => Value::Null,
    })
}

fn add(left: Value, right: Value) -> Exec<Value> {
    match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::String(format!("{left}{right}")))
        }
        _ => Err(Fault::type_error(format!(
            "Cannot add {} and {}",
            describe_value(&left),
            describe_value(&right)
        ))),
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Exec<Value> {
    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        return Err(Fault::type_error(format!(
            "Cannot apply '{}' to {} and {}",
            symbol(op),
            describe_value(&left),
            describe_value(&right)
        )));
    };
    Ok(Value::Number(match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => a + b,
    }))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Exec<bool> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(Fault::type_error(format!(
                "Cannot compare {} and {} with '{}'",
                describe_value(left),
                describe_value(right),
                symbol(op)
            )))
        }
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Exec<Value> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, &left, &right).map(Value::Bool)
        }
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "===",
        BinaryOp::Ne => "!==",
    }
}

/// `slice(start, end)` bounds with negative offsets counted from the end.
fn slice_bounds(len: usize, start: Option<f64>, end: Option<f64>) -> (usize, usize) {
    let clamp = |n: f64| {
        let n = n.trunc();
        if n < 0.0 {
            (len as f64 + n).max(0.0) as usize
        } else {
            (n as usize).min(len)
        }
    };
    let start = start.map_or(0, clamp);
    let end = end.map_or(len, clamp);
    (start, end.max(start))
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Null | Value::Array(_) | Value::Object(_) | Value::Reference(_) => "object",
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        Value::Array(_) | Value::Object(_) => value.type_name().to_string(),
        other => other.to_string(),
    }
}

/// Source-ish rendering of an expression for fault messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::MethodCall { object, method, .. } => format!("{}.{method}(...)", describe(object)),
        Expr::CallSite { site, .. } => format!("#s.{}", site.qualified()),
        Expr::Literal(Literal::String(s)) => format!("{s:?}"),
        Expr::Literal(Literal::Number(n)) => Value::Number(*n).to_string(),
        Expr::Literal(Literal::Bool(b)) => b.to_string(),
        Expr::Literal(Literal::Null) => "null".to_string(),
        _ => "expression".to_string(),
    }
}
