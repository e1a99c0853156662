//! Reactive Context
//!
//! The reactive context tracks which computed observable is currently
//! evaluating. This enables automatic dependency tracking: when an observable
//! is read, the innermost evaluating computed is registered as its dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack rather than a single "currently evaluating"
//! slot. Entering an evaluation pushes an entry, and dropping the returned
//! guard pops it. A computed constructed while another one is evaluating
//! therefore pushes on top of the outer entry instead of overwriting it, and
//! the outer evaluation keeps tracking its own reads once the inner one is
//! done.
//!
//! Each entry also collects the observables read while it is on top, so the
//! computed can drop edges to dependencies it no longer reads.

use std::cell::RefCell;
use std::rc::Weak;

use smallvec::SmallVec;

use super::observable::{Observable, ObservableId, ObservableInner};

/// Observables read during one evaluation.
pub(crate) type Dependencies = SmallVec<[Observable; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// Identifier of the evaluating computed.
    id: ObservableId,
    /// The evaluating computed, registered as dependent on every read.
    observer: Weak<ObservableInner>,
    /// Observables read during this evaluation, without duplicates.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    id: ObservableId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computed observable.
    pub(crate) fn enter(id: ObservableId, observer: Weak<ObservableInner>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                id,
                observer,
                dependencies: SmallVec::new(),
            });
        });

        Self { id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Identifier of the innermost evaluating computed, if any.
    pub fn current() -> Option<ObservableId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.id))
    }

    /// Nesting depth of active evaluations.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Record a read of `observable` in the innermost context.
    ///
    /// Returns the evaluating computed that should be registered as a
    /// dependent of `observable`, or `None` outside of any evaluation. A
    /// computed never becomes a dependent of itself.
    pub(crate) fn track(observable: &Observable) -> Option<Weak<ObservableInner>> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;

            if entry.id == observable.id() {
                return None;
            }

            if !entry.dependencies.iter().any(|d| d.ptr_eq(observable)) {
                entry.dependencies.push(observable.clone());
            }

            Some(entry.observer.clone())
        })
    }

    /// Take the dependencies collected so far in this context.
    pub(crate) fn take_dependencies(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .filter(|entry| entry.id == self.id)
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id, self.id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.id, entry.id
                );
            }
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Value;

    fn computed_stub() -> Observable {
        Observable::new(Value::Undefined)
    }

    #[test]
    fn context_tracks_current_computed() {
        let computed = computed_stub();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());

        {
            let _ctx = ReactiveContext::enter(computed.id(), computed.downgrade());

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current(), Some(computed.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());
    }

    #[test]
    fn context_collects_unique_dependencies() {
        let computed = computed_stub();
        let a = Observable::new(Value::from(1));
        let b = Observable::new(Value::from(2));

        let ctx = ReactiveContext::enter(computed.id(), computed.downgrade());
        assert!(ReactiveContext::track(&a).is_some());
        assert!(ReactiveContext::track(&b).is_some());
        assert!(ReactiveContext::track(&a).is_some());

        let deps = ctx.take_dependencies();
        assert_eq!(deps.len(), 2);
        assert!(deps[0].ptr_eq(&a));
        assert!(deps[1].ptr_eq(&b));
    }

    #[test]
    fn self_reads_are_not_tracked() {
        let computed = computed_stub();

        let ctx = ReactiveContext::enter(computed.id(), computed.downgrade());
        assert!(ReactiveContext::track(&computed).is_none());
        assert!(ctx.take_dependencies().is_empty());
    }

    #[test]
    fn nested_contexts_restore_outer() {
        let outer = computed_stub();
        let inner = computed_stub();
        let a = Observable::new(Value::from(1));
        let b = Observable::new(Value::from(2));

        let outer_ctx = ReactiveContext::enter(outer.id(), outer.downgrade());
        ReactiveContext::track(&a);

        {
            let inner_ctx = ReactiveContext::enter(inner.id(), inner.downgrade());
            assert_eq!(ReactiveContext::depth(), 2);
            ReactiveContext::track(&b);

            let inner_deps = inner_ctx.take_dependencies();
            assert_eq!(inner_deps.len(), 1);
            assert!(inner_deps[0].ptr_eq(&b));
        }

        // After inner context drops, outer should be current again
        assert_eq!(ReactiveContext::current(), Some(outer.id()));
        let outer_deps = outer_ctx.take_dependencies();
        assert_eq!(outer_deps.len(), 1);
        assert!(outer_deps[0].ptr_eq(&a));
    }
}
