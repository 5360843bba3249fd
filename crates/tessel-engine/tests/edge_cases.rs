//! Edge case tests for tessel-engine
//!
//! Error policy, sanitizing, guards and teardown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use tessel_engine::net::StaticTransport;
use tessel_engine::store::Value;
use tessel_engine::{ComponentDefinition, Config, Engine, EngineError, HookPoint, PropDef, PropType};

fn engine_with(config: Config) -> Engine {
    Engine::with_transport(config, Rc::new(StaticTransport::new()))
}

fn engine() -> Engine {
    engine_with(Config::default())
}

fn render(engine: &Engine, data: serde_json::Value, template: &str) {
    engine.apply_data(Value::from(data), Some(template)).unwrap();
}

// ============================================================================
// Expression failures
// ============================================================================

#[test]
fn test_failing_expression_renders_empty() {
    let engine = engine();
    render(&engine, json!({}), "<p>[{{ missing.deep }}]</p><p>{{ ok }}</p>");
    assert_eq!(engine.html(), "<p>[]</p><p></p>");
}

#[test]
fn test_strict_mode_reports_first_failure() {
    let engine = engine_with(Config::builder().strict_expressions(true).build());
    let result = engine.apply_data(Value::from(json!({})), Some("<p>{{ missing.deep }}</p>"));
    match result {
        Err(EngineError::Expression { expression, .. }) => assert_eq!(expression, "missing.deep"),
        other => panic!("expected expression error, got {other:?}"),
    }
    engine.data().set("missing", Value::from(json!({"deep": "ok"})));
    assert!(engine.render().is_ok());
    assert_eq!(engine.html(), "<p>ok</p>");
}

#[test]
fn test_blocked_expression_is_ignored() {
    let engine = engine();
    render(&engine, json!({"x": 1}), "<p>{{ eval(\"1\") }}|{{ x.constructor }}|{{ x }}</p>");
    assert_eq!(engine.html(), "<p>||1</p>");
}

#[test]
fn test_unknown_filter_passes_value_through() {
    let engine = engine();
    render(&engine, json!({"name": "ada"}), "<p>{{ name | shout | uppercase }}</p>");
    assert_eq!(engine.html(), "<p>ADA</p>");
}

#[test]
fn test_empty_placeholder_for_nullish() {
    let engine = engine_with(Config::builder().empty_placeholder("-").build());
    render(&engine, json!({"nothing": null}), "<p>{{ nothing }}/{{ absent }}/{{ 0 }}</p>");
    assert_eq!(engine.html(), "<p>-/-/0</p>");
}

#[test]
fn test_unterminated_marker_is_literal() {
    let engine = engine();
    render(&engine, json!({"a": 1}), "<p>{{ a }} and {{ b</p>");
    assert_eq!(engine.text_content(engine.find_by_tag("p").unwrap()), "1 and {{ b");
}

#[test]
fn test_non_ascii_template_text() {
    let engine = engine();
    engine.register_component(
        ComponentDefinition::new("greeting")
            .data(|_| Value::from(json!({"who": "Zoë"})))
            .template("<em>¿{{ who }}?</em>"),
    );
    render(&engine, json!({"name": "Ada"}), "<p>¡Hola {{ name }}!</p><greeting></greeting>");
    let p = engine.find_by_tag("p").unwrap();
    assert_eq!(engine.text_content(p), "¡Hola Ada!");
    assert_eq!(engine.text_content(engine.find_by_tag("em").unwrap()), "¿Zoë?");

    engine.data().set("name", "Ñandú".into());
    engine.run_until_idle();
    assert_eq!(engine.text_content(p), "¡Hola Ñandú!");
}

#[test]
fn test_failing_handler_leaves_data_untouched() {
    let engine = engine();
    render(
        &engine,
        json!({"count": 1}),
        "<button data-on:click=\"missing.call()\">a</button><i data-on:click=\"count = count + 1\">b</i>",
    );
    engine.click(engine.find_by_tag("button").unwrap());
    assert_eq!(engine.data().get("count").as_number(), Some(1.0));
    engine.click(engine.find_by_tag("i").unwrap());
    assert_eq!(engine.data().get("count").as_number(), Some(2.0));
}

#[test]
fn test_prevent_modifier() {
    let engine = engine();
    render(&engine, json!({"sent": false}), "<form data-on:submit.prevent=\"sent = true\"></form>");
    let form = engine.find_by_tag("form").unwrap();
    let mut event = tessel_engine::dom::Event::bubbling("submit");
    assert!(!engine.dispatch(form, &mut event));
    engine.run_until_idle();
    assert_eq!(engine.data().get("sent").as_bool(), Some(true));
}

// ============================================================================
// Markup safety
// ============================================================================

#[test]
fn test_raw_interpolation_needs_opt_in() {
    let engine = engine();
    render(&engine, json!({"html": "<b>x</b>"}), "<p>[{{{ html }}}]</p>");
    assert_eq!(engine.html(), "<p>[]</p>");
    assert!(engine.find_by_tag("b").is_none());
}

#[test]
fn test_data_html_is_sanitized_without_opt_in() {
    let engine = engine();
    render(
        &engine,
        json!({"content": "<script>alert(1)</script><b onclick=\"steal()\">ok</b><a href=\"javascript:x()\">l</a>"}),
        "<div data-html=\"content\"></div>",
    );
    let div = engine.find_by_tag("div").unwrap();
    assert_eq!(engine.inner_html(div), "<b>ok</b><a>l</a>");
    assert!(engine.find_by_tag("script").is_none());
}

#[test]
fn test_data_html_with_opt_in_and_safe_html() {
    let engine = engine_with(Config::builder().allow_raw_html(true).build());
    render(
        &engine,
        json!({"content": "<b onclick=\"x()\">ok</b>"}),
        "<div id=\"raw\" data-html=\"content\"></div><div id=\"safe\" data-safe-html=\"content\"></div>",
    );
    let raw = engine.find_by_id("raw").unwrap();
    let safe = engine.find_by_id("safe").unwrap();
    assert_eq!(engine.inner_html(raw), "<b onclick=\"x()\">ok</b>");
    assert_eq!(engine.inner_html(safe), "<b>ok</b>");
}

#[test]
fn test_data_text_escapes() {
    let engine = engine();
    render(&engine, json!({"html": "<i>no</i>"}), "<p data-text=\"html\">old</p>");
    let p = engine.find_by_tag("p").unwrap();
    assert_eq!(engine.inner_html(p), "&lt;i&gt;no&lt;/i&gt;");
    assert!(engine.find_by_tag("i").is_none());
}

// ============================================================================
// Conditionals and loops
// ============================================================================

#[test]
fn test_sibling_conditionals_swap() {
    let engine = engine();
    render(
        &engine,
        json!({"n": 1}),
        "<div><b data-if=\"n == 1\">one</b><i data-if=\"n != 1\">many</i></div>",
    );
    let div = engine.find_by_tag("div").unwrap();
    assert_eq!(engine.text_content(div), "one");

    engine.data().set("n", 5.into());
    engine.run_until_idle();
    assert_eq!(engine.text_content(div), "many");
    assert_eq!(engine.document().tree.child_ids(div).len(), 2);
}

#[test]
fn test_loop_over_nothing() {
    let engine = engine();
    render(
        &engine,
        json!({"items": null, "empty": []}),
        "<ul><li data-repeat=\"x in items\">{{ x }}</li><li data-repeat=\"y in empty\">{{ y }}</li></ul>",
    );
    assert_eq!(engine.html(), "<ul></ul>");

    engine.data().set("items", Value::from(json!([1])));
    engine.run_until_idle();
    assert_eq!(engine.html(), "<ul><li>1</li></ul>");
}

#[test]
fn test_numeric_loop_is_clamped() {
    let engine = engine_with(Config::builder().max_repeat_count(5).build());
    render(&engine, json!({"n": 1e18}), "<ul><li data-repeat=\"i in n\">{{ i }}</li></ul>");
    assert_eq!(engine.find_all_by_tag("li").len(), 5);

    engine.data().set("n", 2.into());
    engine.run_until_idle();
    assert_eq!(engine.html(), "<ul><li>1</li><li>2</li></ul>");
}

#[test]
fn test_loop_shrink_removes_listeners() {
    let engine = engine();
    render(
        &engine,
        json!({"items": [1, 2, 3], "last": 0}),
        "<div><button data-repeat=\"n in items\" data-on:click=\"last = n\">{{ n }}</button></div>",
    );
    assert_eq!(engine.document().tree.listeners().count(), 3);
    engine.click(engine.find_all_by_tag("button")[2]);
    assert_eq!(engine.data().get("last").as_number(), Some(3.0));

    engine.data().set("items", Value::from(json!([9])));
    engine.run_until_idle();
    assert_eq!(engine.document().tree.listeners().count(), 1);
    engine.click(engine.find_by_tag("button").unwrap());
    assert_eq!(engine.data().get("last").as_number(), Some(9.0));
}

#[test]
fn test_in_place_array_mutation_rerenders() {
    let engine = engine();
    render(&engine, json!({"items": ["a"]}), "<p><i data-repeat=\"x in items\">{{ x }}</i></p>");
    let items = engine.data().get("items");
    items.as_handle().unwrap().push("b".into()).unwrap();
    engine.run_until_idle();
    assert_eq!(engine.html(), "<p><i>a</i><i>b</i></p>");
}

// ============================================================================
// Components
// ============================================================================

#[test]
fn test_recursive_component_is_bounded() {
    let engine = engine_with(Config::builder().max_depth(12).build());
    engine.register_component(ComponentDefinition::new("x-loop").template("<div><x-loop></x-loop></div>"));
    render(&engine, json!({}), "<x-loop></x-loop>");
    let instances = engine.components_named("x-loop").len();
    assert!(instances >= 1);
    assert!(instances <= 12);
}

#[test]
fn test_props_are_read_only_inside_component() {
    let engine = engine();
    engine.register_component(
        ComponentDefinition::new("x-label")
            .prop("text", PropDef::new(PropType::String))
            .method("clobber", |this, _| Ok(Value::Bool(this.set("text", "changed".into()))))
            .template("<span>{{ text }}</span>"),
    );
    render(&engine, json!({}), "<x-label text=\"original\"></x-label>");
    let handle = engine.find_component("x-label").unwrap();
    assert_eq!(handle.call("clobber", &[]).unwrap().as_bool(), Some(false));
    assert!(!handle.set("text", "again"));
    assert_eq!(engine.text_content(engine.find_by_tag("span").unwrap()), "original");
}

#[test]
fn test_unknown_method_call_errors() {
    let engine = engine();
    engine.register_component(ComponentDefinition::new("x-empty").template("<p>e</p>"));
    render(&engine, json!({}), "<x-empty></x-empty>");
    let handle = engine.find_component("x-empty").unwrap();
    assert!(handle.call("nope", &[]).is_err());
}

#[test]
fn test_data_factory_must_return_object() {
    let engine = engine();
    engine.register_component(
        ComponentDefinition::new("x-odd").data(|_| Value::from(3)).template("<p>{{ $data }}</p>"),
    );
    render(&engine, json!({}), "<x-odd></x-odd>");
    let handle = engine.find_component("x-odd").unwrap();
    assert!(handle.data().is_object());
    assert!(handle.data().keys().is_empty());
}

#[test]
fn test_component_hidden_by_conditional_is_destroyed() {
    let engine = engine();
    let destroyed = Rc::new(Cell::new(0));
    let d = destroyed.clone();
    engine.register_component(
        ComponentDefinition::new("x-leaf")
            .on(HookPoint::Destroyed, move |_| {
                d.set(d.get() + 1);
                Ok(())
            })
            .template("<button data-on:click=\"$emit('hi')\">leaf</button>"),
    );
    render(&engine, json!({"show": true}), "<section><x-leaf data-if=\"show\"></x-leaf></section>");
    assert_eq!(engine.components_named("x-leaf").len(), 1);

    engine.data().set("show", false.into());
    engine.run_until_idle();
    assert_eq!(destroyed.get(), 1);
    assert!(engine.components_named("x-leaf").is_empty());
    assert_eq!(engine.document().tree.listeners().count(), 0);

    engine.data().set("show", true.into());
    engine.run_until_idle();
    assert_eq!(engine.components_named("x-leaf").len(), 1);
}

#[test]
fn test_components_inside_loop_keep_their_own_state() {
    let engine = engine();
    engine.register_component(
        ComponentDefinition::new("x-row")
            .prop("label", PropDef::new(PropType::String))
            .data(|_| Value::from(json!({"clicks": 0})))
            .template("<button data-on:click=\"clicks = clicks + 1\">{{ label }}{{ clicks }}</button>"),
    );
    render(
        &engine,
        json!({"rows": ["a", "b"]}),
        "<div><x-row data-repeat=\"r in rows\" data-bind:label=\"r\"></x-row></div>",
    );
    engine.click(engine.find_all_by_tag("button")[1]);
    let buttons = engine.find_all_by_tag("button");
    assert_eq!(engine.text_content(buttons[0]), "a0");
    assert_eq!(engine.text_content(buttons[1]), "b1");
}

#[test]
fn test_watcher_errors_are_contained() {
    let engine = engine();
    let calls = Rc::new(RefCell::new(0));
    let c = calls.clone();
    engine.register_component(
        ComponentDefinition::new("x-flaky")
            .data(|_| Value::from(json!({"n": 0})))
            .watch("n", |_, _, _| Err(tessel_engine::store::CallError::msg("watcher broke")))
            .watch("n", move |_, _, _| {
                *c.borrow_mut() += 1;
                Ok(())
            })
            .template("<p>{{ n }}</p>"),
    );
    render(&engine, json!({}), "<x-flaky></x-flaky>");
    let handle = engine.find_component("x-flaky").unwrap();
    handle.set("n", 1);
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(engine.text_content(engine.find_by_tag("p").unwrap()), "1");
}

#[test]
fn test_component_type_names_are_case_insensitive() {
    let engine = engine();
    engine.register_component(ComponentDefinition::new("My-Widget").template("<b>w</b>"));
    render(&engine, json!({}), "<my-widget></my-widget>");
    assert!(engine.find_component("my-widget").is_some());
    assert_eq!(engine.text_content(engine.find_by_tag("my-widget").unwrap()), "w");
}

// ============================================================================
// Hooks and teardown
// ============================================================================

#[test]
fn test_failing_hook_does_not_stop_render() {
    let engine = engine();
    engine.on_hook(HookPoint::BeforeRender, |_, _| Err(tessel_engine::store::CallError::msg("hook broke")));
    let after = Rc::new(Cell::new(false));
    let a = after.clone();
    engine.on_hook(HookPoint::AfterRender, move |_, _| {
        a.set(true);
        Ok(())
    });
    render(&engine, json!({"x": 1}), "<p>{{ x }}</p>");
    assert_eq!(engine.html(), "<p>1</p>");
    assert!(after.get());
}

#[test]
fn test_teardown_is_final_and_idempotent() {
    let engine = engine();
    let destroyed = Rc::new(Cell::new(0));
    let d = destroyed.clone();
    engine.register_component(
        ComponentDefinition::new("x-bye")
            .on(HookPoint::Destroyed, move |_| {
                d.set(d.get() + 1);
                Ok(())
            })
            .template("<button data-on:click=\"$emit('x')\">b</button>"),
    );
    render(&engine, json!({"x": 1}), "<p data-on:click=\"x = 2\">{{ x }}</p><x-bye></x-bye>");

    engine.teardown();
    engine.teardown();
    assert!(engine.is_torn_down());
    assert_eq!(destroyed.get(), 1);
    assert_eq!(engine.document().tree.listeners().count(), 0);
    assert_eq!(engine.html(), "");

    engine.data().set("x", 3.into());
    engine.run_until_idle();
    assert_eq!(engine.render_count(), 1);
    assert!(matches!(engine.render(), Err(EngineError::TornDown)));
    assert!(matches!(engine.apply_data(Value::object(), None), Err(EngineError::TornDown)));
}

#[test]
fn test_existing_mount_content_is_the_template() {
    let engine = engine();
    engine.apply_data(Value::from(json!({"a": 1})), Some("<p>{{ a }}</p>")).unwrap();
    engine.apply_data(Value::from(json!({"a": 2})), None).unwrap();
    assert_eq!(engine.html(), "<p>2</p>");
}

#[test]
fn test_config_from_json() {
    let config = Config::from_json(r#"{"strict_expressions": true, "max_depth": 8}"#).unwrap();
    assert!(config.strict_expressions);
    assert_eq!(config.max_depth, 8);
    assert!(!config.allow_raw_html);
    assert!(Config::from_json("not json").is_err());
}
