//! Reactive Primitives
//!
//! This module implements the core reactive system: observables, computed
//! observables, watchers, and the runtime that gates mutation.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An Observable is a box around a value. When it is read while a computed
//! is evaluating, that computed is registered as a dependent. When it is
//! updated, its watchers run and its dependents recompute.
//!
//! ## Computed Observables
//!
//! A computed observable derives its value from a function bound to a
//! receiver object. It re-evaluates whenever one of the observables it read
//! on its last run is updated.
//!
//! ## Watchers
//!
//! A Watcher is an external callback invoked with `(new, old)` after an
//! update. Watcher failures are logged and contained.
//!
//! ## Modes
//!
//! The runtime holds a per-thread [`Mode`]. Writes apply immediately under
//! `Enabled`, fail under `Disabled`, and are queued under `Lazy` until
//! [`Runtime::drain_queue`] replays them.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local context stack to detect
//! dependencies automatically. When an observable is read, we check if there
//! is an active evaluation and, if so, register the dependency.

mod computed;
mod context;
mod observable;
mod runtime;
mod watcher;

pub use context::ReactiveContext;
pub use observable::{Observable, ObservableId};
pub(crate) use observable::ObservableInner;
pub use runtime::{run_mutation, with_mode, DeferredFn, Mode, ModeGuard, QueueItem, Runtime};
pub use watcher::{Watcher, WatcherId};
