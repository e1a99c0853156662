//! Computed Observable Implementation
//!
//! A computed observable is an [`Observable`] whose value is produced by a
//! zero-argument function bound to a receiver object.
//!
//! # How Computed Observables Work
//!
//! 1. On construction, the function is evaluated immediately and the result
//!    becomes the initial value.
//!
//! 2. Each evaluation runs inside a [`ReactiveContext`]. Every observable
//!    read during the evaluation registers this computed as a dependent.
//!
//! 3. When a dependency updates, it calls back into [`Observable::recompute`],
//!    which evaluates again and pushes the result through
//!    [`Observable::update`]. The computed's own watchers and dependents are
//!    notified the same way as for a plain observable.
//!
//! 4. A recompute requested while the computed is already publishing (a
//!    watcher writing back into a dependency, or a genuine cycle) is not
//!    nested. It marks the computed pending, and the outer recompute runs
//!    another pass once its update returns. After [`MAX_PASSES`] passes the
//!    remaining request is dropped as a dependency cycle.
//!
//! # Purity
//!
//! The function runs with the reactivity mode forced to `Disabled`, so any
//! write it attempts fails with `MutationDisabled`. A failing function (an
//! error or a panic) is logged and leaves the previous value in place.
//!
//! # Dynamic Dependencies
//!
//! Dependencies are discovered, not declared. After each successful
//! evaluation the computed unregisters itself from observables it no longer
//! read, so the dependency set always matches the branches taken by the most
//! recent run. Branches that have never executed contribute nothing.

use std::cell::{Cell, RefCell};

use super::context::{Dependencies, ReactiveContext};
use super::observable::Observable;
use super::runtime::{Mode, ModeGuard};
use super::watcher::isolate;
use crate::state::{Computation, Object, Value, WeakObject};

/// Upper bound on evaluate-and-publish passes per recompute.
pub(crate) const MAX_PASSES: usize = 100;

/// Evaluation state carried by computed observables.
pub(crate) struct ComputedState {
    /// The derivation function.
    func: Computation,

    /// Object passed to the function as its receiver.
    receiver: WeakObject,

    /// Observables read during the last evaluation.
    dependencies: RefCell<Dependencies>,

    /// Set while this computed is recomputing.
    recomputing: Cell<bool>,

    /// A dependency changed again during the current recompute.
    pending: Cell<bool>,
}

/// Clears the recomputing flag when dropped.
struct RecomputeGuard<'a>(&'a Cell<bool>);

impl Drop for RecomputeGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Observable {
    /// Create a computed observable bound to `receiver`.
    ///
    /// The function is evaluated immediately. If that first evaluation fails,
    /// the computed starts out `Undefined`.
    pub fn computed(receiver: &Object, func: Computation) -> Self {
        let state = ComputedState {
            func,
            receiver: receiver.downgrade(),
            dependencies: RefCell::new(Dependencies::new()),
            recomputing: Cell::new(false),
            pending: Cell::new(false),
        };

        let observable = Observable::with_parts(Default::default(), Some(state));
        if let Some(value) = observable.evaluate() {
            // Initial value is stored silently: nothing can be watching yet.
            observable.store(value);
        }

        tracing::trace!(observable = observable.id().raw(), "computed created");
        observable
    }

    /// Check if this observable derives its value from a function.
    pub fn is_computed(&self) -> bool {
        self.inner.computed.is_some()
    }

    /// Run the derivation function and return its result.
    ///
    /// Returns `None` for plain observables, when the receiver has been
    /// dropped, or when the function fails. Failures are logged, never
    /// propagated.
    pub fn evaluate(&self) -> Option<Value> {
        let state = self.inner.computed.as_ref()?;
        let Some(receiver) = state.receiver.upgrade() else {
            tracing::trace!(observable = self.id().raw(), "computed receiver dropped");
            return None;
        };

        let _mode = ModeGuard::enter(Mode::Disabled);
        let ctx = ReactiveContext::enter(self.id(), self.downgrade());
        let result = isolate(|| state.func.call(&receiver));
        let dependencies = ctx.take_dependencies();
        drop(ctx);

        match result {
            Ok(value) => {
                self.replace_dependencies(state, dependencies);
                Some(value)
            }
            Err(error) => {
                tracing::error!(observable = self.id().raw(), %error, "computed evaluation failed");
                self.merge_dependencies(state, dependencies);
                None
            }
        }
    }

    /// Re-evaluate and publish the result to watchers and dependents.
    ///
    /// Called by an observable this computed depends on. A request arriving
    /// while this computed is already recomputing further up the stack is
    /// recorded and served by another pass of the outer call. A cycle that
    /// is still pending after [`MAX_PASSES`] passes is logged and dropped.
    pub(crate) fn recompute(&self) {
        let Some(state) = self.inner.computed.as_ref() else {
            return;
        };

        if state.recomputing.replace(true) {
            state.pending.set(true);
            return;
        }
        let _guard = RecomputeGuard(&state.recomputing);

        for _ in 0..MAX_PASSES {
            state.pending.set(false);
            if let Some(value) = self.evaluate() {
                self.update(value);
            }
            if !state.pending.get() {
                return;
            }
        }

        state.pending.set(false);
        tracing::warn!(
            observable = self.id().raw(),
            passes = MAX_PASSES,
            "dependency cycle detected, giving up recomputation"
        );
    }

    /// Get the number of observables read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .computed
            .as_ref()
            .map(|state| state.dependencies.borrow().len())
            .unwrap_or(0)
    }

    /// Install `next` as the dependency set, dropping edges to stale ones.
    fn replace_dependencies(&self, state: &ComputedState, next: Dependencies) {
        let previous = state.dependencies.replace(next);
        let current = state.dependencies.borrow();

        for stale in previous
            .iter()
            .filter(|prev| !current.iter().any(|dep| dep.ptr_eq(prev)))
        {
            stale.unobserve(self);
        }
    }

    /// Keep every known dependency after a failed evaluation.
    fn merge_dependencies(&self, state: &ComputedState, next: Dependencies) {
        let mut dependencies = state.dependencies.borrow_mut();
        for dep in next {
            if !dependencies.iter().any(|known| known.ptr_eq(&dep)) {
                dependencies.push(dep);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
