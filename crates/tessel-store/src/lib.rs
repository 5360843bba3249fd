//! Tessel Store
//!
//! The value model shared by the expression language and the engine, and the
//! observable containers application data lives in.
//!
//! Objects and arrays are [`Handle`]s: shared, identity-carrying containers.
//! A container with an observer reports every effective mutation as a
//! [`Change`]; nested containers pick up their parent's observer the first
//! time they are read, so observing a root observes the whole graph lazily.

mod equality;
mod json;
mod path;
mod reactive;
mod value;

pub use equality::{deep_clone, deep_equal};
pub use path::{get_by_path, is_valid_path, set_by_path, split_path};
pub use reactive::{make_reactive, Change, ChangeHandler, Handle, WriteError, RESERVED_PREFIX};
pub use value::{CallError, Function, HostObject, NativeFn, Value};

/// Result of calling a native function
pub type CallResult = Result<Value, CallError>;
