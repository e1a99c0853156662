//! Watcher types for the reactive system.
//!
//! A Watcher is an external callback invoked with `(new_value, old_value)`
//! whenever the observable it is attached to is updated.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BoxError;
use crate::state::Value;

/// Unique identifier for a watcher.
///
/// Closures have no usable identity of their own, so each watcher gets an ID
/// when created. Clones of a watcher share the ID, which is what makes
/// `watch`/`unwatch` idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

type WatchFn = dyn Fn(&Value, &Value) -> Result<(), BoxError>;

/// A callback notified with `(new_value, old_value)` on change.
#[derive(Clone)]
pub struct Watcher {
    id: WatcherId,
    notify: Rc<WatchFn>,
}

impl Watcher {
    /// Create a watcher from a fallible callback.
    ///
    /// An error returned from the callback is logged by the notifying
    /// observable and does not interrupt the notification cascade.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), BoxError> + 'static,
    {
        Self {
            id: WatcherId::new(),
            notify: Rc::new(notify),
        }
    }

    /// Create a watcher from a callback that cannot fail.
    pub fn infallible<F>(notify: F) -> Self
    where
        F: Fn(&Value, &Value) + 'static,
    {
        Self::new(move |new, old| {
            notify(new, old);
            Ok(())
        })
    }

    /// Get the watcher's unique ID.
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Invoke the callback, containing both returned errors and panics.
    pub fn notify(&self, new: &Value, old: &Value) -> Result<(), String> {
        isolate(|| (self.notify)(new, old))
    }
}

impl PartialEq for Watcher {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Watcher {}

impl Hash for Watcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Watcher").field(&self.id.0).finish()
    }
}

/// Run a user callback, turning an error or a panic into a message.
pub(crate) fn isolate<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
