//! Argument schemas and the validator families they compose.
//!
//! Validators are built once, either programmatically or from a declarative
//! spec value such as `["number", {"gte": 1, "ne": 5}]`. Every name is checked
//! at build time; validating an argument never fails for a reason other than
//! the value itself.

use std::fmt;
use std::rc::Rc;

use regex::Regex;

use hackshell_dsl::{Object, Value};

use crate::error::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Name(name) => f.write_str(name),
            ParamKey::Index(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgumentSchema {
    pub key: ParamKey,
    pub validators: Vec<Validator>,
    pub required: bool,
    pub invalid_response: Option<String>,
}

impl ArgumentSchema {
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_key(ParamKey::Name(name.into()))
    }

    pub fn positional(index: usize) -> Self {
        Self::with_key(ParamKey::Index(index))
    }

    fn with_key(key: ParamKey) -> Self {
        Self {
            key,
            validators: Vec::new(),
            required: false,
            invalid_response: None,
        }
    }

    /// Marks the parameter required; the required check always runs first.
    pub fn required(mut self) -> Self {
        if !self.required {
            self.required = true;
            self.validators.insert(0, Validator::Required);
        }
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Appends validators built from declarative specs. An array is a list of
    /// specs (`["string"]`, `[["number", {"gt": 0}]]`); anything else is a
    /// single spec.
    pub fn with_validators(mut self, specs: &Value) -> Result<Self, SchemaError> {
        match specs {
            Value::Array(items) => {
                for item in items {
                    self.validators.push(Validator::parse(item)?);
                }
            }
            single => self.validators.push(Validator::parse(single)?),
        }
        Ok(self)
    }

    pub fn invalid_response(mut self, text: impl Into<String>) -> Self {
        self.invalid_response = Some(text.into());
        self
    }

    /// The argument's value, treating `null` as absent.
    pub fn lookup<'a>(&self, args: &'a Value) -> Option<&'a Value> {
        let found = match (&self.key, args) {
            (ParamKey::Name(name), Value::Object(map)) => map.get(name),
            (ParamKey::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        };
        found.filter(|v| !v.is_null())
    }

    pub fn check(&self, value: &Value) -> bool {
        self.validators.iter().all(|v| v.test(value))
    }
}

// ============================================================================
// Conditions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Eq,
    Ne,
    Lt,
    Lte,
}

impl Comparison {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "gt" | ">" => Comparison::Gt,
            "gte" | ">=" => Comparison::Gte,
            "eq" | "=" | "==" | "===" | "is" => Comparison::Eq,
            "ne" | "!" | "!=" | "!==" | "not" => Comparison::Ne,
            "lt" | "<" => Comparison::Lt,
            "lte" | "<=" => Comparison::Lte,
            _ => return None,
        })
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Gte => left >= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Lt => left < right,
            Comparison::Lte => left <= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberCondition {
    pub op: Comparison,
    pub operand: f64,
}

impl NumberCondition {
    pub fn new(op: Comparison, operand: f64) -> Self {
        Self { op, operand }
    }

    fn holds(&self, n: f64) -> bool {
        self.op.holds(n, self.operand)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringCondition {
    Equals(String),
    NotEquals(String),
    Contains { needle: String, negated: bool },
    Length(Vec<NumberCondition>),
}

impl StringCondition {
    fn holds(&self, s: &str) -> bool {
        match self {
            StringCondition::Equals(other) => s == other,
            StringCondition::NotEquals(other) => s != other,
            StringCondition::Contains { needle, negated } => s.contains(needle.as_str()) != *negated,
            StringCondition::Length(conditions) => {
                let len = s.chars().count() as f64;
                conditions.iter().all(|c| c.holds(len))
            }
        }
    }
}

// ============================================================================
// Validators
// ============================================================================

#[derive(Clone)]
pub enum Validator {
    Required,
    Every(Vec<Validator>),
    Any(Vec<Validator>),
    Number(Vec<NumberCondition>),
    String(Vec<StringCondition>),
    Pattern(Regex),
    Custom(Rc<dyn Fn(&Value) -> bool>),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Required => f.write_str("Required"),
            Validator::Every(inner) => f.debug_tuple("Every").field(inner).finish(),
            Validator::Any(inner) => f.debug_tuple("Any").field(inner).finish(),
            Validator::Number(c) => f.debug_tuple("Number").field(c).finish(),
            Validator::String(c) => f.debug_tuple("String").field(c).finish(),
            Validator::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Validator {
    pub fn number() -> Self {
        Validator::Number(Vec::new())
    }

    pub fn string() -> Self {
        Validator::String(Vec::new())
    }

    pub fn pattern(pattern: &str) -> Result<Self, SchemaError> {
        Regex::new(pattern)
            .map(Validator::Pattern)
            .map_err(|e| SchemaError::Pattern(e.to_string()))
    }

    pub fn custom(test: impl Fn(&Value) -> bool + 'static) -> Self {
        Validator::Custom(Rc::new(test))
    }

    pub fn test(&self, value: &Value) -> bool {
        match self {
            Validator::Required => !value.is_null(),
            Validator::Every(inner) => inner.iter().all(|v| v.test(value)),
            Validator::Any(inner) => inner.is_empty() || inner.iter().any(|v| v.test(value)),
            Validator::Number(conditions) => match value {
                Value::Number(n) => conditions.iter().all(|c| c.holds(*n)),
                _ => false,
            },
            Validator::String(conditions) => match value {
                Value::String(s) => conditions.iter().all(|c| c.holds(s)),
                _ => false,
            },
            Validator::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Validator::Custom(test) => test(value),
        }
    }

    /// Builds a validator from a declarative spec:
    ///
    /// - `"required"`, `"number"`, `"string"`
    /// - `["number", {"gte": 1}]`, `["string", {"length": {"lt": 10}}]`
    /// - `["pattern", "^[a-z]+$"]`
    /// - `["every", [spec, ...]]`, `["any", [spec, ...]]`
    pub fn parse(spec: &Value) -> Result<Self, SchemaError> {
        match spec {
            Value::String(family) => Self::family(family, None),
            Value::Array(items) => match items.as_slice() {
                [Value::String(family)] => Self::family(family, None),
                [Value::String(family), param] => Self::family(family, Some(param)),
                _ => Err(SchemaError::InvalidSpec(spec.to_string())),
            },
            other => Err(SchemaError::InvalidSpec(other.to_string())),
        }
    }

    fn family(name: &str, param: Option<&Value>) -> Result<Self, SchemaError> {
        match name {
            "required" => Ok(Validator::Required),
            "every" | "any" => {
                let nested = match param {
                    None => Vec::new(),
                    Some(Value::Array(items)) => {
                        items.iter().map(Validator::parse).collect::<Result<_, _>>()?
                    }
                    Some(single) => vec![Validator::parse(single)?],
                };
                Ok(if name == "every" {
                    Validator::Every(nested)
                } else {
                    Validator::Any(nested)
                })
            }
            "number" => match param {
                None => Ok(Validator::number()),
                Some(Value::Object(conditions)) => {
                    Ok(Validator::Number(number_conditions("number", conditions)?))
                }
                Some(other) => Err(invalid("number", name, other, "expected an object")),
            },
            "string" => match param {
                None => Ok(Validator::string()),
                Some(Value::Object(conditions)) => {
                    Ok(Validator::String(string_conditions(conditions)?))
                }
                Some(other) => Err(invalid("string", name, other, "expected an object")),
            },
            "pattern" | "regex" => match param {
                Some(Value::String(p)) => Validator::pattern(p),
                Some(other) => Err(invalid("pattern", name, other, "expected a string")),
                None => Err(SchemaError::InvalidSpec(format!("{name} needs a pattern"))),
            },
            _ => Err(SchemaError::UnknownValidator(name.to_string())),
        }
    }
}

fn invalid(family: &'static str, name: &str, value: &Value, reason: &str) -> SchemaError {
    SchemaError::InvalidParameter {
        family,
        name: name.to_string(),
        reason: format!("{reason}, got {value}"),
    }
}

fn number_conditions(
    family: &'static str,
    conditions: &Object,
) -> Result<Vec<NumberCondition>, SchemaError> {
    conditions
        .iter()
        .map(|(name, operand)| {
            let op = Comparison::parse(name).ok_or_else(|| SchemaError::UnknownCondition {
                family,
                name: name.clone(),
            })?;
            let operand = operand
                .as_f64()
                .ok_or_else(|| invalid(family, name, operand, "expected a number"))?;
            Ok(NumberCondition::new(op, operand))
        })
        .collect()
}

fn string_conditions(conditions: &Object) -> Result<Vec<StringCondition>, SchemaError> {
    let mut out = Vec::with_capacity(conditions.len());
    for (raw_name, param) in conditions {
        let (negated, name) = match raw_name.as_str() {
            n if n.starts_with("not_") => (true, &n[4..]),
            n if n.starts_with('!') && n[1..].starts_with(|c: char| c.is_ascii_alphabetic()) => {
                (true, &n[1..])
            }
            n => (false, n),
        };

        let text = || {
            param
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("string", raw_name, param, "expected a string"))
        };

        let condition = match name {
            "contains" | "includes" | "has" => StringCondition::Contains {
                needle: text()?,
                negated,
            },
            "length" if !negated => match param {
                Value::Number(n) => {
                    StringCondition::Length(vec![NumberCondition::new(Comparison::Eq, *n)])
                }
                Value::Object(nested) => {
                    StringCondition::Length(number_conditions("length", nested)?)
                }
                other => return Err(invalid("string", raw_name, other, "expected a number")),
            },
            _ if !negated => match Comparison::parse(name) {
                Some(Comparison::Eq) => StringCondition::Equals(text()?),
                Some(Comparison::Ne) => StringCondition::NotEquals(text()?),
                _ => {
                    return Err(SchemaError::UnknownCondition {
                        family: "string",
                        name: raw_name.clone(),
                    })
                }
            },
            _ => {
                return Err(SchemaError::UnknownCondition {
                    family: "string",
                    name: raw_name.clone(),
                })
            }
        };
        out.push(condition);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: serde_json::Value) -> Value {
        Value::from_json(json)
    }

    #[test]
    fn numeric_conditions_are_independent() {
        let v = Validator::parse(&spec(serde_json::json!(["number", {"gte": 1, "ne": 5}]))).unwrap();
        assert!(v.test(&Value::from(2.0)));
        assert!(!v.test(&Value::from(5.0)));
        assert!(!v.test(&Value::from(0.0)));
        assert!(!v.test(&Value::from("2")));
    }

    #[test]
    fn symbolic_aliases() {
        let v = Validator::parse(&spec(serde_json::json!(["number", {">": 1, "<=": 3}]))).unwrap();
        assert!(v.test(&Value::from(3.0)));
        assert!(!v.test(&Value::from(1.0)));
    }

    #[test]
    fn string_conditions() {
        let v = Validator::parse(&spec(serde_json::json!([
            "string",
            {"includes": "ab", "!contains": "z", "length": {"lt": 5}}
        ])))
        .unwrap();
        assert!(v.test(&Value::from("xab")));
        assert!(!v.test(&Value::from("xabz")));
        assert!(!v.test(&Value::from("xxxab")));
        assert!(!v.test(&Value::from("xy")));

        let exact = Validator::parse(&spec(serde_json::json!(["string", {"is": "on"}]))).unwrap();
        assert!(exact.test(&Value::from("on")));
        assert!(!exact.test(&Value::from("off")));

        let other = Validator::parse(&spec(serde_json::json!(["string", {"!==": "off"}]))).unwrap();
        assert!(other.test(&Value::from("on")));
        assert!(!other.test(&Value::from("off")));

        let len = Validator::parse(&spec(serde_json::json!(["string", {"length": 2}]))).unwrap();
        assert!(len.test(&Value::from("ok")));
        assert!(!len.test(&Value::from("no!")));
    }

    #[test]
    fn any_and_every() {
        let any = Validator::parse(&spec(serde_json::json!(["any", ["number", "string"]]))).unwrap();
        assert!(any.test(&Value::from(1.0)));
        assert!(any.test(&Value::from("x")));
        assert!(!any.test(&Value::Bool(true)));

        let every = Validator::parse(&spec(serde_json::json!([
            "every",
            ["string", ["pattern", "^[0-9A-F]{4}$"]]
        ])))
        .unwrap();
        assert!(every.test(&Value::from("00FF")));
        assert!(!every.test(&Value::from("00fg")));
    }

    #[test]
    fn unknown_names_fail_at_build_time() {
        assert_eq!(
            Validator::parse(&Value::from("integer")).unwrap_err(),
            SchemaError::UnknownValidator("integer".into())
        );
        assert!(matches!(
            Validator::parse(&spec(serde_json::json!(["number", {"approx": 1}]))),
            Err(SchemaError::UnknownCondition { family: "number", .. })
        ));
        assert!(matches!(
            Validator::parse(&spec(serde_json::json!(["pattern", "("]))),
            Err(SchemaError::Pattern(_))
        ));
    }

    #[test]
    fn required_runs_first_and_null_is_absent() {
        let schema = ArgumentSchema::named("req")
            .with_validators(&Value::from("number"))
            .unwrap()
            .required();
        assert!(matches!(schema.validators[0], Validator::Required));

        let args = spec(serde_json::json!({"req": null}));
        assert!(schema.lookup(&args).is_none());
        let args = spec(serde_json::json!({"req": 3}));
        assert_eq!(schema.lookup(&args), Some(&Value::from(3.0)));
        assert!(schema.check(&Value::from(3.0)));
    }

    #[test]
    fn list_of_specs() {
        let schema = ArgumentSchema::named("x")
            .with_validators(&spec(serde_json::json!(["string", ["string", {"ne": "no"}]])))
            .unwrap();
        assert_eq!(schema.validators.len(), 2);
        assert!(!schema.check(&Value::from("no")));
    }
}
