//! Tree-walking interpreter
//!
//! Evaluates an [`Ast`] against a [`Scope`]. Values follow the
//! `tessel_store::Value` model; member access goes through `Value::get`, so
//! reactive containers observe nested reads the same way direct access does.

use tessel_store::Value;

use crate::ast::{Ast, AstNodeKind, BinaryOp, LiteralValue, LogicalOp, MemberProperty, NodeId, UnaryOp};
use crate::safety::is_blocked_property;
use crate::ExprError;

/// Name resolution for an evaluation
pub trait Scope {
    /// Look up a free identifier. `None` means unbound.
    fn resolve(&self, name: &str) -> Option<Value>;

    /// Assign a free identifier, returns false if the write was rejected
    fn assign(&self, name: &str, value: Value) -> bool;

    /// Value of `this`
    fn this(&self) -> Value {
        Value::Undefined
    }
}

/// Any container value can serve as a scope
impl Scope for Value {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.has(name).then(|| self.get(name))
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        self.set(name, value)
    }

    fn this(&self) -> Value {
        self.clone()
    }
}

pub(crate) struct Interpreter<'a> {
    ast: &'a Ast,
    scope: &'a dyn Scope,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(ast: &'a Ast, scope: &'a dyn Scope) -> Self {
        Self { ast, scope }
    }

    pub(crate) fn run(&self) -> Result<Value, ExprError> {
        match self.ast.root() {
            Some(root) => self.eval(root),
            None => Ok(Value::Undefined),
        }
    }

    /// Evaluate to `(this, value)`, where `this` is the object a member
    /// chain was read from, or the scope's `this` for a bare identifier
    pub(crate) fn run_with_receiver(&self) -> Result<(Value, Value), ExprError> {
        let Some(root) = self.ast.root() else {
            return Ok((Value::Undefined, Value::Undefined));
        };
        match self.kind(root)? {
            AstNodeKind::MemberExpression { .. } | AstNodeKind::Identifier { .. } => Ok(self
                .eval_callee(root)?
                .map_or((Value::Undefined, Value::Undefined), |(this, value, _)| (this, value))),
            _ => Ok((Value::Undefined, self.eval(root)?)),
        }
    }

    fn kind(&self, id: NodeId) -> Result<&'a AstNodeKind, ExprError> {
        self.ast
            .get(id)
            .map(|n| &n.kind)
            .ok_or_else(|| ExprError::Type(format!("dangling node {}", id.0)))
    }

    pub(crate) fn eval(&self, id: NodeId) -> Result<Value, ExprError> {
        Ok(self.eval_chain(id)?.unwrap_or_default())
    }

    /// Evaluate, with `None` meaning an optional chain short-circuited
    fn eval_chain(&self, id: NodeId) -> Result<Option<Value>, ExprError> {
        let value = match self.kind(id)? {
            AstNodeKind::Identifier { name } => self.scope.resolve(name).unwrap_or_default(),
            AstNodeKind::Literal { value } => literal(value),
            AstNodeKind::ThisExpression => self.scope.this(),

            AstNodeKind::ArrayExpression { elements } => {
                let items = elements.iter().map(|e| self.eval(*e)).collect::<Result<Vec<_>, _>>()?;
                Value::array(items)
            }
            AstNodeKind::ObjectExpression { properties } => {
                let mut entries = Vec::with_capacity(properties.len());
                for (key, value) in properties {
                    if is_blocked_property(key) {
                        return Err(ExprError::Blocked(key.to_string()));
                    }
                    entries.push((key.to_string(), self.eval(*value)?));
                }
                Value::object_from(entries)
            }

            AstNodeKind::UnaryExpression { operator, argument } => {
                let value = self.eval(*argument)?;
                match operator {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::from(value.type_of()),
                }
            }
            AstNodeKind::BinaryExpression { operator, left, right } => {
                let l = self.eval(*left)?;
                let r = self.eval(*right)?;
                binary(*operator, &l, &r)
            }
            AstNodeKind::LogicalExpression { operator, left, right } => {
                let l = self.eval(*left)?;
                let take_left = match operator {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::NullishCoalescing => !l.is_nullish(),
                };
                if take_left { l } else { self.eval(*right)? }
            }
            AstNodeKind::ConditionalExpression { test, consequent, alternate } => {
                if self.eval(*test)?.truthy() {
                    self.eval(*consequent)?
                } else {
                    self.eval(*alternate)?
                }
            }
            AstNodeKind::AssignmentExpression { target, value } => {
                let value = self.eval(*value)?;
                self.assign_to(*target, value.clone())?;
                value
            }

            AstNodeKind::MemberExpression { object, property, optional } => {
                let Some(target) = self.eval_chain(*object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.property_key(property)?;
                read_property(&target, &key)?
            }

            AstNodeKind::CallExpression { callee, arguments, optional } => {
                let Some((this, callee_value, name)) = self.eval_callee(*callee)? else {
                    return Ok(None);
                };
                if *optional && callee_value.is_nullish() {
                    return Ok(None);
                }
                let args = arguments.iter().map(|a| self.eval(*a)).collect::<Result<Vec<_>, _>>()?;
                match &callee_value {
                    Value::Function(f) => f.call(&this, &args)?,
                    _ => match builtin_method(&this, &name, &args) {
                        Some(result) => result?,
                        None => return Err(ExprError::NotCallable(name)),
                    },
                }
            }
        };
        Ok(Some(value))
    }

    /// Resolve `callee` to `(this, function value, display name)`
    fn eval_callee(&self, callee: NodeId) -> Result<Option<(Value, Value, String)>, ExprError> {
        match self.kind(callee)? {
            AstNodeKind::MemberExpression { object, property, optional } => {
                let Some(target) = self.eval_chain(*object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.property_key(property)?;
                let value = read_property(&target, &key)?;
                Ok(Some((target, value, key)))
            }
            AstNodeKind::Identifier { name } => {
                let value = self.scope.resolve(name).unwrap_or_default();
                Ok(Some((self.scope.this(), value, name.to_string())))
            }
            _ => {
                let Some(value) = self.eval_chain(callee)? else {
                    return Ok(None);
                };
                Ok(Some((Value::Undefined, value, "expression".into())))
            }
        }
    }

    fn property_key(&self, property: &MemberProperty) -> Result<String, ExprError> {
        let key = match property {
            MemberProperty::Named(name) => name.to_string(),
            MemberProperty::Computed(expr) => self.eval(*expr)?.to_display_string(),
        };
        if is_blocked_property(&key) {
            return Err(ExprError::Blocked(key));
        }
        Ok(key)
    }

    pub(crate) fn assign_to(&self, target: NodeId, value: Value) -> Result<(), ExprError> {
        match self.kind(target)? {
            AstNodeKind::Identifier { name } => {
                self.scope.assign(name, value);
                Ok(())
            }
            AstNodeKind::MemberExpression { object, property, .. } => {
                let object = self.eval(*object)?;
                let key = self.property_key(property)?;
                if object.is_nullish() {
                    return Err(ExprError::Type(format!(
                        "cannot set properties of {} (setting '{key}')",
                        nullish_name(&object)
                    )));
                }
                object.set(&key, value);
                Ok(())
            }
            _ => Err(ExprError::Type("invalid assignment target".into())),
        }
    }
}

fn nullish_name(value: &Value) -> &'static str {
    if matches!(value, Value::Null) { "null" } else { "undefined" }
}

fn literal(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Undefined => Value::Undefined,
        LiteralValue::Null => Value::Null,
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::from(&**s),
    }
}

fn read_property(target: &Value, key: &str) -> Result<Value, ExprError> {
    if target.is_nullish() {
        return Err(ExprError::Type(format!(
            "cannot read properties of {} (reading '{key}')",
            nullish_name(target)
        )));
    }
    Ok(target.get(key))
}

/// `+` concatenates when either side is not a primitive number-like value
fn is_stringish(v: &Value) -> bool {
    !matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_))
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_stringish(l) || is_stringish(r) {
                Value::from(format!("{}{}", l.to_display_string(), r.to_display_string()))
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Mod => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::LessThan => compare(l, r, |o| o.is_lt()),
        BinaryOp::LessThanEq => compare(l, r, |o| o.is_le()),
        BinaryOp::GreaterThan => compare(l, r, |o| o.is_gt()),
        BinaryOp::GreaterThanEq => compare(l, r, |o| o.is_ge()),
        BinaryOp::Equal => Value::Bool(l.loose_equals(r)),
        BinaryOp::NotEqual => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEqual => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNotEqual => Value::Bool(!l.strict_equals(r)),
    }
}

fn compare(l: &Value, r: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => l.to_number().partial_cmp(&r.to_number()),
    };
    Value::Bool(ordering.is_some_and(test))
}

/// Resolve a possibly negative index against `len` the way `slice` does
fn relative_index(arg: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(arg) = arg.filter(|a| !a.is_undefined()) else {
        return default;
    };
    let n = arg.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn arg_string(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_display_string).unwrap_or_else(|| "undefined".into())
}

/// SameValueZero, used by `includes`
fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

/// Methods available on strings, arrays and numbers
fn builtin_method(this: &Value, name: &str, args: &[Value]) -> Option<Result<Value, ExprError>> {
    let result = match (this, name) {
        (_, "toString") => Value::from(this.to_display_string()),

        (Value::String(s), _) => string_method(s, name, args)?,

        (Value::Array(h), _) => {
            let items = h.values_raw();
            match name {
                "includes" => {
                    let needle = args.first().cloned().unwrap_or_default();
                    Value::Bool(items.iter().any(|v| same_value_zero(v, &needle)))
                }
                "indexOf" => {
                    let needle = args.first().cloned().unwrap_or_default();
                    let index = items.iter().position(|v| v.strict_equals(&needle));
                    Value::Number(index.map_or(-1.0, |i| i as f64))
                }
                "join" => {
                    let sep = match args.first() {
                        Some(v) if !v.is_undefined() => v.to_display_string(),
                        _ => ",".into(),
                    };
                    let parts: Vec<String> = items
                        .iter()
                        .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                        .collect();
                    Value::from(parts.join(&sep))
                }
                "slice" => {
                    let start = relative_index(args.first(), items.len(), 0);
                    let end = relative_index(args.get(1), items.len(), items.len());
                    let slice = if start < end { items[start..end].to_vec() } else { Vec::new() };
                    Value::array(slice)
                }
                // Mutators go through the handle so observers see the change.
                "push" => {
                    let mut len = items.len();
                    for arg in args {
                        len = match h.push(arg.clone()) {
                            Ok(len) => len,
                            Err(err) => return Some(Err(ExprError::Type(err.to_string()))),
                        };
                    }
                    Value::Number(len as f64)
                }
                "pop" => match h.pop() {
                    Ok(value) => value,
                    Err(err) => return Some(Err(ExprError::Type(err.to_string()))),
                },
                _ => return None,
            }
        }

        (Value::Number(n), "toFixed") => {
            let digits = args.first().map(|d| d.to_number()).filter(|d| d.is_finite()).unwrap_or(0.0);
            let digits = digits.clamp(0.0, 100.0) as usize;
            if n.is_finite() {
                Value::from(format!("{n:.digits$}"))
            } else {
                Value::from(this.to_display_string())
            }
        }

        _ => return None,
    };
    Some(Ok(result))
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Value> {
    let chars: Vec<char> = s.chars().collect();
    let value = match name {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "includes" => Value::Bool(s.contains(arg_string(args, 0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg_string(args, 0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg_string(args, 0).as_str())),
        "indexOf" => {
            let needle = arg_string(args, 0);
            let index = s.find(needle.as_str()).map(|byte| s[..byte].chars().count());
            Value::Number(index.map_or(-1.0, |i| i as f64))
        }
        "slice" => {
            let start = relative_index(args.first(), chars.len(), 0);
            let end = relative_index(args.get(1), chars.len(), chars.len());
            let out: String = if start < end { chars[start..end].iter().collect() } else { String::new() };
            Value::from(out)
        }
        "split" => match args.first() {
            None | Some(Value::Undefined) => Value::array(vec![Value::from(s)]),
            Some(sep) => {
                let sep = sep.to_display_string();
                let parts: Vec<Value> = if sep.is_empty() {
                    chars.iter().map(|c| Value::from(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(Value::from).collect()
                };
                Value::array(parts)
            }
        },
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Expression;

    fn eval(src: &str, scope: &Value) -> Value {
        Expression::compile(src).unwrap().evaluate(scope).unwrap()
    }

    fn scope() -> Value {
        let s = Value::object();
        s.set("name", "Ada".into());
        s.set("n", 4.into());
        s.set("items", Value::array(vec![1.into(), 2.into(), 3.into()]));
        s.set("user", Value::object());
        s
    }

    #[test]
    fn test_arithmetic_and_concat() {
        let s = scope();
        assert_eq!(eval("n * 2 + 1", &s).as_number(), Some(9.0));
        assert_eq!(eval("'x' + n", &s).as_str(), Some("x4"));
        assert_eq!(eval("n % 3", &s).as_number(), Some(1.0));
    }

    #[test]
    fn test_receiver_is_owning_object() {
        let s = scope();
        let user = s.get("user");
        let (this, value) = Expression::compile("user.name").unwrap().evaluate_with_receiver(&s).unwrap();
        assert!(this.as_handle().unwrap().ptr_eq(user.as_handle().unwrap()));
        assert!(value.is_undefined());

        let (this, value) = Expression::compile("name").unwrap().evaluate_with_receiver(&s).unwrap();
        assert!(this.as_handle().unwrap().ptr_eq(s.as_handle().unwrap()));
        assert_eq!(value.as_str(), Some("Ada"));

        let (this, value) = Expression::compile("n + 1").unwrap().evaluate_with_receiver(&s).unwrap();
        assert!(this.is_undefined());
        assert_eq!(value.as_number(), Some(5.0));
    }

    #[test]
    fn test_builtins() {
        let s = scope();
        assert_eq!(eval("name.toUpperCase()", &s).as_str(), Some("ADA"));
        assert_eq!(eval("items.join('-')", &s).as_str(), Some("1-2-3"));
        assert_eq!(eval("items.slice(-2).length", &s).as_number(), Some(2.0));
        assert_eq!(eval("(1.005).toFixed(1)", &s).as_str(), Some("1.0"));
        assert_eq!(eval("name.split('').length", &s).as_number(), Some(3.0));
        assert_eq!(eval("items.push(4, 5)", &s).as_number(), Some(5.0));
        assert_eq!(eval("items.pop()", &s).as_number(), Some(5.0));
        assert_eq!(eval("items.length", &s).as_number(), Some(4.0));
    }

    #[test]
    fn test_optional_chain_short_circuits() {
        let s = scope();
        assert!(eval("user.profile?.name.first", &s).is_undefined());
        assert!(eval("missing?.()", &s).is_undefined());
    }

    #[test]
    fn test_nullish_access_is_type_error() {
        let s = scope();
        let err = Expression::compile("user.profile.name").unwrap().evaluate(&s).unwrap_err();
        assert!(matches!(err, ExprError::Type(_)));
    }

    #[test]
    fn test_assignment_writes_through() {
        let s = scope();
        eval("user.age = n + 1", &s);
        assert_eq!(s.get("user").get("age").as_number(), Some(5.0));
        eval("name = 'Grace'", &s);
        assert_eq!(s.get("name").as_str(), Some("Grace"));
    }

    #[test]
    fn test_computed_blocked_member() {
        let s = scope();
        s.set("key", "__proto__".into());
        let err = Expression::compile("user[key]").unwrap().evaluate(&s).unwrap_err();
        assert!(matches!(err, ExprError::Blocked(_)));
    }
}
