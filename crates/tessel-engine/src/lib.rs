//! Tessel Engine
//!
//! A reactive template engine: application data plus an HTML template,
//! kept in sync with a live DOM tree.
//!
//! # Example
//! ```rust
//! use std::rc::Rc;
//! use tessel_engine::{Config, Engine};
//! use tessel_engine::net::StaticTransport;
//! use tessel_engine::store::Value;
//!
//! let engine = Engine::with_transport(Config::default(), Rc::new(StaticTransport::new()));
//! let data = Value::object_from([("name".to_string(), "Ada".into())]);
//! engine.apply_data(data, Some("<p>Hello, {{ name | uppercase }}</p>")).unwrap();
//! assert_eq!(engine.html(), "<p>Hello, ADA</p>");
//!
//! engine.data().set("name", "Grace".into());
//! engine.run_until_idle();
//! assert_eq!(engine.html(), "<p>Hello, GRACE</p>");
//! ```
//!
//! # Modules
//! - `compiler`: directive processing (`data-if`, `data-repeat`, ...)
//! - `component`: component definitions and live instances
//! - `fetch`: the `data-fetch` directive
//! - `scheduler`: root render batching and the local executor

mod compiler;
mod component;
mod config;
mod engine;
mod error;
mod fetch;
pub mod filters;
mod globals;
mod hooks;
mod interpolate;
mod registry;
mod runtime;
mod scheduler;
mod scope;
pub mod vocabulary;

pub use component::{
    ComponentDefinition, ComponentHandle, ComputedDef, DataFn, MethodFn, ModelDef, PropDef, PropDefault, PropType,
    RenderFn, Template, WatchFn,
};
pub use config::{Config, ConfigBuilder};
pub use engine::Engine;
pub use error::EngineError;
pub use filters::FilterFn;
pub use globals::{StateWatchFn, WatchId};
pub use hooks::{HookContext, HookFn, HookPoint, HookRegistry};
pub use registry::{ComponentRegistry, DirectiveArgs, DirectiveFn, DirectiveRegistry, FilterRegistry};

// Re-export sub-crates for advanced usage
pub use tessel_dom as dom;
pub use tessel_expr as expr;
pub use tessel_html as html;
pub use tessel_net as net;
pub use tessel_store as store;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
