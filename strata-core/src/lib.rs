//! Strata Core
//!
//! This crate provides the engine behind the Strata reactive state library.
//! It implements:
//!
//! - Reactive primitives (observables, computed observables, watchers)
//! - Recursive observation of object and array trees
//! - A per-thread reactivity mode with a deferred mutation queue
//! - Path-based watcher registration
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, dependency tracking and the runtime
//! - `state`: The dynamic value model and the interceptors that make it reactive
//! - `error`: The error taxonomy shared by every operation
//! - `config`: Serializable runtime settings
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::{observe, set_mode, Mode, Object, Outcome, Value};
//!
//! let state = observe(Value::from(
//!     Object::new()
//!         .with("price", 10)
//!         .with("qty", 2)
//!         .with("total", Value::computed(|this| {
//!             let price = this.get("price").as_f64().unwrap_or(0.0);
//!             let qty = this.get("qty").as_f64().unwrap_or(0.0);
//!             Ok(Value::from(price * qty))
//!         })),
//! ))?;
//!
//! state.set("price", 5)?;
//! assert_eq!(state.get("total"), Value::from(10));
//!
//! // Queue writes instead of applying them
//! set_mode(Mode::Lazy);
//! assert_eq!(state.set("qty", 3)?, Outcome::Deferred);
//! strata_core::drain_queue()?;
//! assert_eq!(state.get("total"), Value::from(15));
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod state;

pub use config::RuntimeConfig;
pub use error::{BoxError, ReactiveError, Result};
pub use reactive::{
    run_mutation, with_mode, Mode, ModeGuard, Observable, QueueItem, Runtime, Watcher,
};
pub use state::{
    add_watcher, observe, remove_watcher, resolve_path, Accessor, Array, Computation, Object,
    Outcome, Value,
};

/// Switch the current thread's reactivity mode. Returns the previous mode.
pub fn set_mode(mode: Mode) -> Mode {
    Runtime::set_mode(mode)
}

/// The current thread's reactivity mode.
pub fn mode() -> Mode {
    Runtime::mode()
}

/// Replay every deferred mutation. See [`Runtime::drain_queue`].
pub fn drain_queue() -> Result<usize> {
    Runtime::drain_queue()
}

/// Discard every deferred mutation. Returns how many were dropped.
pub fn purge_queue() -> usize {
    Runtime::purge_queue()
}

/// Number of deferred mutations waiting to be replayed.
pub fn queue_len() -> usize {
    Runtime::queue_len()
}
