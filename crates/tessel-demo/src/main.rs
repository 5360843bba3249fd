//! Tessel Demo - Main Entry Point
//!
//! `tessel-demo [template.html] [data.json]` renders the template against the
//! data and prints the HTML. Without arguments a small todo page is rendered,
//! clicked through and printed after every step.

use std::rc::Rc;

use anyhow::{Context, Result};
use serde_json::json;
use tessel_engine::net::StaticTransport;
use tessel_engine::store::Value;
use tessel_engine::{ComponentDefinition, Config, Engine, PropDef, PropType};
use tracing::info;
use tracing_subscriber::EnvFilter;

const TODO_TEMPLATE: &str = r#"
<section>
  <h1>{{ title | uppercase }}</h1>
  <todo-item v-for="todo in todos" :todo="todo" @toggle="todo.done = !todo.done"></todo-item>
  <p data-fetch="/api/tips" data-fetch-as="tips">Tip: {{ tips.data.text }}</p>
  <button class="add" @click="todos.push({ text: draft, done: false })">add</button>
  <footer>{{ remaining }} left</footer>
</section>
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    match (args.next(), args.next()) {
        (Some(template), data) => render_files(&template, data.as_deref()),
        (None, _) => run_todo_demo(),
    }
}

/// Render a template file against an optional JSON data file
fn render_files(template_path: &str, data_path: Option<&str>) -> Result<()> {
    let template =
        std::fs::read_to_string(template_path).with_context(|| format!("reading template {template_path}"))?;
    let data = match data_path {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading data {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing data {path}"))?
        }
        None => json!({}),
    };

    let engine = Engine::new(Config::default());
    engine.apply_data(Value::from(data), Some(&template))?;
    engine.run_until_idle();
    println!("{}", engine.html());
    Ok(())
}

fn run_todo_demo() -> Result<()> {
    let transport = StaticTransport::new().json("/api/tips", json!({"text": "small steps"}));
    let engine = Engine::with_transport(Config::default(), Rc::new(transport));

    engine.register_component(
        ComponentDefinition::new("todo-item")
            .prop("todo", PropDef::new(PropType::Object))
            .template(r#"<label><input type="checkbox" :checked="todo.done" @change="$emit('toggle')"> {{ todo.text }}</label>"#),
    );
    engine.register_filter("count_open", |value, _| {
        let open = value.as_handle().map(|h| h.items().iter().filter(|t| !t.get("done").truthy()).count());
        Ok(Value::from(open.unwrap_or(0)))
    });

    let data = Value::from(json!({
        "title": "Today",
        "draft": "write docs",
        "todos": [
            {"text": "parse templates", "done": true},
            {"text": "track dependencies", "done": false}
        ],
        "remaining": 1
    }));
    engine.apply_data(data, Some(TODO_TEMPLATE))?;
    engine.run_until_idle();
    print_step(&engine, "initial render");

    let add = engine.find_all_by_class("add").into_iter().next().context("add button missing")?;
    engine.click(add);
    refresh_remaining(&engine);
    print_step(&engine, "after add");

    let first = engine.find_by_tag("input").context("todo checkbox missing")?;
    engine.set_checked(first, false);
    refresh_remaining(&engine);
    print_step(&engine, "after toggle");

    info!(renders = engine.render_count(), "demo finished");
    engine.teardown();
    Ok(())
}

fn refresh_remaining(engine: &Engine) {
    let remaining = engine.evaluate("todos | count_open");
    engine.data().set("remaining", remaining);
    engine.run_until_idle();
}

fn print_step(engine: &Engine, label: &str) {
    println!("<!-- {label} -->");
    println!("{}", engine.html().trim());
}
