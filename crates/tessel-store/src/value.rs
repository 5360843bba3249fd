//! Dynamic values
//!
//! Loosely follows the JavaScript value model templates are written
//! against: truthiness, string conversion and `typeof` behave the way
//! template authors expect.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tessel_dom::NodeId;

use crate::reactive::Handle;

/// Signature of native functions
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, CallError>;

/// Error raised by a native function
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("{0}")]
    Thrown(String),

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("type error: {0}")]
    Type(String),
}

impl CallError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Thrown(message.into())
    }
}

/// A named native closure `(this, args) -> value`
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    inner: Rc<NativeFn>,
}

impl Function {
    pub fn new(name: &str, f: impl Fn(&Value, &[Value]) -> Result<Value, CallError> + 'static) -> Self {
        Self { name: Rc::from(name), inner: Rc::new(f) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, CallError> {
        (self.inner)(this, args)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// Object with explicit accessors (component template contexts)
pub trait HostObject {
    fn get(&self, key: &str) -> Value;

    /// Assign a property, returns false if the write was rejected
    fn set(&self, key: &str, value: Value) -> bool;

    fn has(&self, key: &str) -> bool {
        !self.get(key).is_undefined()
    }

    fn keys(&self) -> Vec<String>;

    fn type_name(&self) -> &str {
        "Object"
    }

    fn as_any(&self) -> &dyn Any;
}

/// Dynamic template value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Handle),
    Object(Handle),
    Function(Function),
    /// DOM node reference (`$el`, `$refs.x`, `$event.target`)
    Node(NodeId),
    Host(Rc<dyn HostObject>),
}

impl Value {
    /// New empty object
    pub fn object() -> Self {
        Value::Object(Handle::new_object(IndexMap::new()))
    }

    pub fn object_from(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Object(Handle::new_object(entries.into_iter().collect()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Handle::new_array(items))
    }

    pub fn function(name: &str, f: impl Fn(&Value, &[Value]) -> Result<Value, CallError> + 'static) -> Self {
        Value::Function(Function::new(name, f))
    }

    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// null or undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Can be traversed by property paths
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Host(_))
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Array(h) | Value::Object(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `typeof`
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Node(_) | Value::Host(_) => "object",
        }
    }

    /// ToNumber
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(h) => match h.len() {
                0 => 0.0,
                1 => h.get("0").to_number(),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// ToString
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(h) => h
                .values_raw()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".into(),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            Value::Node(_) => "[object HTMLElement]".into(),
            Value::Host(h) => format!("[object {}]", h.type_name()),
        }
    }

    // ------------------------------------------------------------------
    // Property access
    // ------------------------------------------------------------------

    /// Read a property. Containers observe nested values lazily.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Array(h) | Value::Object(h) => h.get(key),
            Value::Host(h) => h.get(key),
            Value::String(s) => {
                if key == "length" {
                    return Value::Number(s.chars().count() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(Rc::from(c.to_string())))
                    .unwrap_or_default()
            }
            _ => Value::Undefined,
        }
    }

    /// Assign a property, returns false for non-containers and rejected writes
    pub fn set(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Array(h) | Value::Object(h) => h.set(key, value).is_ok(),
            Value::Host(h) => h.set(key, value),
            _ => false,
        }
    }

    /// Own keys (array indices for arrays)
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Array(h) | Value::Object(h) => h.keys(),
            Value::Host(h) => h.keys(),
            _ => Vec::new(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        match self {
            Value::Array(h) | Value::Object(h) => h.has(key),
            Value::Host(h) => h.has(key),
            _ => false,
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_) | Value::String(_) | Value::Bool(_), Value::Number(_) | Value::String(_) | Value::Bool(_)) => {
                match (self, other) {
                    (Value::String(a), Value::String(b)) => a == b,
                    _ => self.to_number() == other.to_number(),
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

/// Number formatting the way templates print numbers
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Node(id) => write!(f, "Node({id})"),
            Value::Host(h) => write!(f, "Host({})", h.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
