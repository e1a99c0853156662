//! Observable Implementation
//!
//! An Observable is the unit of change notification. It boxes a value and
//! keeps two ordered sets:
//!
//! - **watchers**: external callbacks invoked with `(new, old)` on update;
//! - **observers**: computed observables that depend on this one and must
//!   recompute when it changes.
//!
//! # How Observables Work
//!
//! 1. When an observable is read with [`Observable::get`] while a computed is
//!    evaluating, the computed is registered as an observer.
//!
//! 2. [`Observable::update`] stores the new value, notifies every watcher in
//!    insertion order, then recomputes every observer, which in turn
//!    notifies its own watchers and observers. The whole cascade runs
//!    synchronously before `update` returns.
//!
//! 3. A failing or panicking watcher is logged and skipped. It never stops
//!    the rest of the cascade.
//!
//! # Memory Layout
//!
//! Observers are held weakly, so a computed that nothing else references is
//! dropped normally. Dead entries are pruned the next time the observable
//! notifies.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use super::computed::ComputedState;
use super::context::ReactiveContext;
use super::watcher::Watcher;
use crate::state::Value;

/// Unique identifier for an observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique observable ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

/// A boxed value with watcher and dependent-computed lists.
///
/// Cloning an `Observable` clones the handle. Both clones share the value
/// and the subscriber lists.
///
/// # Example
///
/// ```rust,ignore
/// let price = Observable::new(Value::from(10));
/// price.watch(Watcher::infallible(|new, old| println!("{old:?} -> {new:?}")));
///
/// price.update(Value::from(7)); // prints "10 -> 7"
/// ```
#[derive(Clone)]
pub struct Observable {
    pub(crate) inner: Rc<ObservableInner>,
}

pub(crate) struct ObservableInner {
    /// Unique identifier for this observable.
    id: ObservableId,

    /// The current value.
    value: RefCell<Value>,

    /// External callbacks, notified in insertion order.
    watchers: RefCell<IndexSet<Watcher>>,

    /// Computed observables that read this one during their last evaluation.
    observers: RefCell<IndexSet<ObserverRef>>,

    /// Present when this observable derives its value from a function.
    pub(crate) computed: Option<ComputedState>,
}

/// Weak reference to a dependent computed, compared by address.
#[derive(Clone)]
pub(crate) struct ObserverRef(Weak<ObservableInner>);

impl ObserverRef {
    fn upgrade(&self) -> Option<Observable> {
        self.0.upgrade().map(|inner| Observable { inner })
    }

    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for ObserverRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ObserverRef {}

impl Hash for ObserverRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Weak::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl Observable {
    /// Create a new observable holding `value`.
    pub fn new(value: Value) -> Self {
        Self::with_parts(value, None)
    }

    pub(crate) fn with_parts(value: Value, computed: Option<ComputedState>) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                id: ObservableId::new(),
                value: RefCell::new(value),
                watchers: RefCell::new(IndexSet::new()),
                observers: RefCell::new(IndexSet::new()),
                computed,
            }),
        }
    }

    /// Get the observable's unique ID.
    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called while a computed is evaluating, this also registers that
    /// computed as a dependent.
    pub fn get(&self) -> Value {
        if let Some(observer) = ReactiveContext::track(self) {
            self.inner
                .observers
                .borrow_mut()
                .insert(ObserverRef(observer));
        }

        self.peek()
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Replace the value without notifying anyone.
    pub(crate) fn store(&self, value: Value) {
        *self.inner.value.borrow_mut() = value;
    }

    /// Store a new value, then notify watchers and recompute dependents.
    ///
    /// This always notifies, even when `new_value` equals the stored value.
    /// Callers that want change detection compare before calling.
    pub fn update(&self, new_value: Value) {
        let old_value = self.inner.value.replace(new_value.clone());
        tracing::trace!(observable = self.id().raw(), "observable updated");

        self.notify_watchers(&new_value, &old_value);
        self.notify_observers();
    }

    /// Invoke every watcher with `(new, old)`, isolating failures.
    fn notify_watchers(&self, new_value: &Value, old_value: &Value) {
        // Snapshot first: watchers may add or remove watchers while running.
        let watchers: Vec<Watcher> = self.inner.watchers.borrow().iter().cloned().collect();

        for watcher in watchers {
            if let Err(error) = watcher.notify(new_value, old_value) {
                tracing::error!(
                    observable = self.id().raw(),
                    watcher = ?watcher.id(),
                    %error,
                    "watcher failed"
                );
            }
        }
    }

    /// Recompute every live dependent computed.
    fn notify_observers(&self) {
        let observers: Vec<Observable> = {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(ObserverRef::is_alive);
            observers.iter().filter_map(ObserverRef::upgrade).collect()
        };

        for observer in observers {
            observer.recompute();
        }
    }

    /// Register `computed` as a dependent. Returns `false` if it already was.
    pub fn observe(&self, computed: &Observable) -> bool {
        self.inner
            .observers
            .borrow_mut()
            .insert(ObserverRef(computed.downgrade()))
    }

    /// Remove `computed` from the dependents. Returns `false` if it was absent.
    pub fn unobserve(&self, computed: &Observable) -> bool {
        self.inner
            .observers
            .borrow_mut()
            .shift_remove(&ObserverRef(computed.downgrade()))
    }

    /// Add a watcher. Returns `false` if it was already registered.
    pub fn watch(&self, watcher: Watcher) -> bool {
        self.inner.watchers.borrow_mut().insert(watcher)
    }

    /// Remove a watcher. Returns `false` if it was not registered.
    pub fn unwatch(&self, watcher: &Watcher) -> bool {
        self.inner.watchers.borrow_mut().shift_remove(watcher)
    }

    /// Check whether `watcher` is registered.
    pub fn is_watched_by(&self, watcher: &Watcher) -> bool {
        self.inner.watchers.borrow().contains(watcher)
    }

    /// Get the number of watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    /// Get the number of live dependents.
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .iter()
            .filter(|observer| observer.is_alive())
            .count()
    }

    /// Check whether `computed` is a registered dependent.
    pub fn is_observed_by(&self, computed: &Observable) -> bool {
        self.inner
            .observers
            .borrow()
            .contains(&ObserverRef(computed.downgrade()))
    }

    /// Check whether two handles point to the same observable.
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ObservableInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_weak(weak: &Weak<ObservableInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Observable { inner })
    }
}

impl Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id().raw())
            .field("value", &self.peek())
            .field("computed", &self.is_computed())
            .field("watcher_count", &self.watcher_count())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
