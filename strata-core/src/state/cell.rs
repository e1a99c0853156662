//! Reactive Cells
//!
//! Observation replaces every field of an object and every element of an
//! array with a [`ReactiveCell`]: an accessor pair bound to exactly one
//! [`Observable`] for the lifetime of the slot.
//!
//! Reads go through the observable, so an evaluating computed picks up the
//! dependency. Writes are dispatched on the current reactivity mode:
//!
//! | Mode | Write behavior |
//! |---|---|
//! | `Enabled` | apply, then notify if the value changed |
//! | `Disabled` | fail with `MutationDisabled` |
//! | `Lazy` | queue the write for `drain_queue` |

use std::fmt;
use std::rc::Rc;

use super::object::Object;
use super::observe::observe_value;
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::{DeferredFn, Mode, Observable, QueueItem, Runtime};

/// Result of a write or structural operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The operation ran; carries its native result.
    Applied(T),
    /// The runtime is in `Lazy` mode; the operation was queued.
    Deferred,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Deferred)
    }

    /// The native result, if the operation ran.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Deferred => None,
        }
    }
}

/// User-defined getter, called with the owning object.
pub type Getter = Rc<dyn Fn(&Object) -> Value>;

/// User-defined setter, called with the owning object and the written value.
pub type Setter = Rc<dyn Fn(&Object, Value)>;

/// A user-defined accessor pair.
///
/// Accessors are defined on plain objects with
/// [`Object::define_accessor`]. Observation keeps them: reads defer to the
/// getter, and writes run the setter before change detection.
#[derive(Clone, Default)]
pub struct Accessor {
    get: Option<Getter>,
    set: Option<Setter>,
}

impl Accessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn getter<F>(mut self, get: F) -> Self
    where
        F: Fn(&Object) -> Value + 'static,
    {
        self.get = Some(Rc::new(get));
        self
    }

    pub fn setter<F>(mut self, set: F) -> Self
    where
        F: Fn(&Object, Value) + 'static,
    {
        self.set = Some(Rc::new(set));
        self
    }

    /// Read through the getter, `Undefined` without one.
    pub(crate) fn read(&self, this: &Object) -> Value {
        self.get.as_ref().map(|get| get(this)).unwrap_or_default()
    }

    pub(crate) fn write(&self, this: &Object, value: Value) {
        if let Some(set) = &self.set {
            set(this, value);
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// An intercepted field or element.
pub(crate) struct ReactiveCell {
    observable: Observable,
    accessor: Option<Accessor>,
}

impl ReactiveCell {
    /// Wrap `value` in a fresh observable and make its subtree reactive.
    ///
    /// Nested objects and arrays are observed before the cell exists, and
    /// arrays are attached to the new observable.
    pub(crate) fn new(value: Value) -> Rc<Self> {
        Self::with_accessor(value, None)
    }

    pub(crate) fn with_accessor(value: Value, accessor: Option<Accessor>) -> Rc<Self> {
        let observable = Observable::new(value.clone());
        observe_value(&value, &observable);
        Rc::new(Self {
            observable,
            accessor,
        })
    }

    /// Cell backed by a computed observable.
    pub(crate) fn computed(observable: Observable) -> Rc<Self> {
        Rc::new(Self {
            observable,
            accessor: None,
        })
    }

    /// The backing observable (the raw escape hatch).
    pub(crate) fn observable(&self) -> &Observable {
        &self.observable
    }

    /// Tracked read.
    pub(crate) fn read(&self, this: Option<&Object>) -> Value {
        let stored = self.observable.get();
        self.through_getter(this).unwrap_or(stored)
    }

    /// Untracked read.
    pub(crate) fn peek(&self, this: Option<&Object>) -> Value {
        self.through_getter(this)
            .unwrap_or_else(|| self.observable.peek())
    }

    fn through_getter(&self, this: Option<&Object>) -> Option<Value> {
        let accessor = self.accessor.as_ref()?;
        accessor.get.as_ref()?;
        this.map(|this| accessor.read(this))
    }

    /// Write `value`, dispatched on the current reactivity mode.
    ///
    /// `target` names the field or element in errors and logs.
    pub(crate) fn write(
        self: &Rc<Self>,
        this: Option<&Object>,
        target: &str,
        value: Value,
    ) -> Result<Outcome<()>> {
        if self.observable.is_computed() {
            return Err(ReactiveError::ReadOnly {
                key: target.to_string(),
            });
        }

        match Runtime::mode() {
            Mode::Enabled => {
                self.apply(this, value);
                Ok(Outcome::Applied(()))
            }
            Mode::Disabled => Err(ReactiveError::disabled(target)),
            Mode::Lazy => {
                let cell = Rc::clone(self);
                let receiver = this.cloned();
                let target = target.to_string();
                let func: DeferredFn = Rc::new(move |_: Option<&Value>, args: &[Value]| {
                    let value = args.first().cloned().unwrap_or_default();
                    cell.write(receiver.as_ref(), &target, value).map(drop)
                });
                Runtime::enqueue(QueueItem::new(func, [value], None));
                Ok(Outcome::Deferred)
            }
        }
    }

    /// The `Enabled` write path.
    fn apply(&self, this: Option<&Object>, value: Value) {
        if let (Some(accessor), Some(this)) = (&self.accessor, this) {
            accessor.write(this, value.clone());
        }

        let effective = self.through_getter(this).unwrap_or(value);
        let previous = self.observable.peek();
        if effective == previous {
            return;
        }

        if let Value::Array(replaced) = &previous {
            replaced.detach(&self.observable);
        }
        observe_value(&effective, &self.observable);
        self.observable.update(effective);
    }
}

impl fmt::Debug for ReactiveCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("observable", &self.observable.id().raw())
            .field("accessor", &self.accessor)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
