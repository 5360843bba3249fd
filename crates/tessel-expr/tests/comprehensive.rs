//! Comprehensive tests for tessel-expr
//!
//! Evaluation against container scopes, custom scopes and native functions.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tessel_expr::{evaluate, split_filters, ExprError, Expression, Scope};
use tessel_store::{make_reactive, CallError, Change, ChangeHandler, Value};

fn data() -> Value {
    Value::from(json!({
        "user": {"name": "Ada", "age": 36, "tags": ["math", "poetry"]},
        "items": [{"done": true}, {"done": false}],
        "count": 2,
        "empty": null
    }))
}

fn eval(src: &str, scope: &Value) -> Value {
    evaluate(src, scope).unwrap()
}

// ============================================================================
// OPERATORS
// ============================================================================

#[test]
fn test_comparisons_and_logic() {
    let d = data();
    assert_eq!(eval("user.age >= 18 && user.name === 'Ada'", &d).as_bool(), Some(true));
    assert_eq!(eval("count > 5 || 'fallback'", &d).as_str(), Some("fallback"));
    assert_eq!(eval("empty ?? 'none'", &d).as_str(), Some("none"));
    assert_eq!(eval("0 ?? 'none'", &d).as_number(), Some(0.0));
    assert_eq!(eval("'b' > 'a'", &d).as_bool(), Some(true));
    assert_eq!(eval("'2' == 2", &d).as_bool(), Some(true));
    assert_eq!(eval("'2' === 2", &d).as_bool(), Some(false));
}

#[test]
fn test_conditional() {
    let d = data();
    assert_eq!(eval("count === 2 ? 'two' : 'other'", &d).as_str(), Some("two"));
    assert_eq!(eval("items[1].done ? 'yes' : 'no'", &d).as_str(), Some("no"));
}

#[test]
fn test_typeof() {
    let d = data();
    assert_eq!(eval("typeof user", &d).as_str(), Some("object"));
    assert_eq!(eval("typeof nothing", &d).as_str(), Some("undefined"));
    assert_eq!(eval("typeof count", &d).as_str(), Some("number"));
}

#[test]
fn test_literals() {
    let d = data();
    let arr = eval("[1, 'two', user.name]", &d);
    assert_eq!(arr.to_display_string(), "1,two,Ada");
    let obj = eval("{ active: count > 1, 'label': 'x' }", &d);
    assert_eq!(obj.get("active").as_bool(), Some(true));
    assert_eq!(obj.get("label").as_str(), Some("x"));
}

// ============================================================================
// BUILT-INS
// ============================================================================

#[test]
fn test_string_and_array_methods() {
    let d = data();
    assert_eq!(eval("user.tags.includes('math')", &d).as_bool(), Some(true));
    assert_eq!(eval("user.tags.indexOf('poetry')", &d).as_number(), Some(1.0));
    assert_eq!(eval("user.tags.join(' & ')", &d).as_str(), Some("math & poetry"));
    assert_eq!(eval("user.name.startsWith('A')", &d).as_bool(), Some(true));
    assert_eq!(eval("'  x '.trim()", &d).as_str(), Some("x"));
    assert_eq!(eval("'a,b'.split(',').length", &d).as_number(), Some(2.0));
    assert_eq!(eval("user.name.slice(1)", &d).as_str(), Some("da"));
    assert_eq!(eval("(2.456).toFixed(2)", &d).as_str(), Some("2.46"));
    assert_eq!(eval("items.length", &d).as_number(), Some(2.0));
}

#[test]
fn test_native_function_receives_this_and_args() {
    let d = data();
    d.set(
        "greet",
        Value::function("greet", |this, args| {
            let name = this.get("user").get("name").to_display_string();
            Ok(Value::from(format!("{}, {name}", args[0])))
        }),
    );
    assert_eq!(eval("greet('Hello')", &d).as_str(), Some("Hello, Ada"));
}

#[test]
fn test_native_function_error_propagates() {
    let d = data();
    d.set("fail", Value::function("fail", |_, _| Err(CallError::msg("boom"))));
    let err = evaluate("fail()", &d).unwrap_err();
    assert_eq!(err, ExprError::Call(CallError::msg("boom")));
}

#[test]
fn test_not_callable() {
    let d = data();
    assert!(matches!(evaluate("count()", &d), Err(ExprError::NotCallable(_))));
    assert!(matches!(evaluate("user.unknown()", &d), Err(ExprError::NotCallable(_))));
}

// ============================================================================
// SCOPES
// ============================================================================

struct Layered {
    locals: Value,
    base: Value,
}

impl Scope for Layered {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.locals.resolve(name).or_else(|| self.base.resolve(name))
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        if self.locals.has(name) {
            self.locals.set(name, value)
        } else {
            self.base.set(name, value)
        }
    }
}

#[test]
fn test_layered_scope_shadows() {
    let scope = Layered {
        locals: Value::from(json!({"item": {"title": "local"}, "count": 10})),
        base: data(),
    };
    assert_eq!(evaluate("item.title + count", &scope).unwrap().as_str(), Some("local10"));
    assert_eq!(evaluate("user.name", &scope).unwrap().as_str(), Some("Ada"));
    evaluate("total = count + 1", &scope).unwrap();
    assert_eq!(scope.base.get("total").as_number(), Some(11.0));
}

#[test]
fn test_assignment_through_reactive_data_notifies() {
    let log = Rc::new(RefCell::new(Vec::<String>::new()));
    let l = log.clone();
    let handler: ChangeHandler = Rc::new(move |c: &Change| l.borrow_mut().push(c.path.clone()));
    let d = make_reactive(data(), "data", handler);
    evaluate("user.name = 'Grace'", &d).unwrap();
    evaluate("count = count + 1", &d).unwrap();
    assert_eq!(*log.borrow(), vec!["user.name".to_string(), "count".to_string()]);
}

#[test]
fn test_expression_assign_for_model_paths() {
    let d = data();
    let expr = Expression::compile("items[0].done").unwrap();
    assert!(expr.is_assignable());
    expr.assign(&d, false.into()).unwrap();
    assert_eq!(eval("items[0].done", &d).as_bool(), Some(false));
    assert!(!Expression::compile("count + 1").unwrap().is_assignable());
}

#[test]
fn test_filters_leave_expression_compilable() {
    let chain = split_filters("user.name | uppercase | truncate:3");
    let value = evaluate(&chain.expression, &data()).unwrap();
    assert_eq!(value.as_str(), Some("Ada"));
    assert_eq!(chain.filters.len(), 2);
}
