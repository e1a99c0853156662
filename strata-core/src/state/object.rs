//! Object Handles
//!
//! An [`Object`] is an ordered, string-keyed record. Before observation it is
//! a plain container. [`observe`](super::observe) turns every field into a
//! reactive cell and seals the key set.
//!
//! # Slots
//!
//! | Slot | Read | Write |
//! |---|---|---|
//! | plain data | stored value | replaced in place |
//! | plain accessor | getter | setter |
//! | reactive cell | tracked, through the cell | mode-dispatched, through the cell |
//!
//! Borrows of the field table are never held while user code (getters,
//! setters, watchers, computed functions) runs: slots are cloned out first.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::cell::{Accessor, Outcome, ReactiveCell};
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::Observable;

/// One field of an object.
#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor(Accessor),
    Reactive(Rc<ReactiveCell>),
}

/// A reference-counted record of named fields.
///
/// Cloning an `Object` clones the handle; `==` on [`Value::Object`] compares
/// identity.
#[derive(Clone, Default)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

#[derive(Default)]
pub(crate) struct ObjectInner {
    fields: RefCell<IndexMap<String, Slot>>,
    sealed: Cell<bool>,
    observed: Cell<bool>,
}

/// Non-owning handle to an [`Object`], held by computed observables.
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(|inner| Object { inner })
    }
}

impl Object {
    /// Create an empty, unobserved object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for plain objects.
    ///
    /// Ignored (with a warning) on a sealed object.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if self.is_sealed() {
            tracing::warn!(key = %key, "ignoring insert into sealed object");
            return self;
        }
        self.inner
            .fields
            .borrow_mut()
            .insert(key, Slot::Data(value.into()));
        self
    }

    fn slot(&self, key: &str) -> Option<Slot> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// Read a field. Tracked when the field is reactive.
    ///
    /// Missing fields read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self.slot(key) {
            None => Value::Undefined,
            Some(Slot::Data(value)) => value,
            Some(Slot::Accessor(accessor)) => accessor.read(self),
            Some(Slot::Reactive(cell)) => cell.read(Some(self)),
        }
    }

    /// Read a field without registering a dependency.
    pub fn peek(&self, key: &str) -> Value {
        match self.slot(key) {
            None => Value::Undefined,
            Some(Slot::Data(value)) => value,
            Some(Slot::Accessor(accessor)) => accessor.read(self),
            Some(Slot::Reactive(cell)) => cell.peek(Some(self)),
        }
    }

    /// Write a field.
    ///
    /// Reactive fields follow the current mode and may return
    /// [`Outcome::Deferred`]. Unknown keys are inserted unless the object is
    /// sealed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<Outcome<()>> {
        let value = value.into();
        match self.slot(key) {
            Some(Slot::Reactive(cell)) => cell.write(Some(self), key, value),
            Some(Slot::Accessor(accessor)) => {
                accessor.write(self, value);
                Ok(Outcome::Applied(()))
            }
            Some(Slot::Data(_)) => {
                self.install(key, Slot::Data(value));
                Ok(Outcome::Applied(()))
            }
            None if self.is_sealed() => Err(ReactiveError::Sealed {
                key: key.to_string(),
            }),
            None => {
                self.install(key, Slot::Data(value));
                Ok(Outcome::Applied(()))
            }
        }
    }

    /// Remove a field, returning its last value.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        if self.is_sealed() {
            return Err(ReactiveError::Sealed {
                key: key.to_string(),
            });
        }

        let removed = self.inner.fields.borrow_mut().shift_remove(key);
        Ok(removed.map(|slot| match slot {
            Slot::Data(value) => value,
            Slot::Accessor(accessor) => accessor.read(self),
            Slot::Reactive(cell) => cell.peek(Some(self)),
        }))
    }

    /// Define (or redefine) a field backed by a getter/setter pair.
    pub fn define_accessor(&self, key: &str, accessor: Accessor) -> Result<()> {
        if self.is_sealed() {
            return Err(ReactiveError::Sealed {
                key: key.to_string(),
            });
        }
        self.install(key, Slot::Accessor(accessor));
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    /// Freeze the key set. Existing fields stay writable.
    pub fn seal(&self) {
        self.inner.sealed.set(true);
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.get()
    }

    /// Check whether the object has been through `observe`.
    pub fn is_observed(&self) -> bool {
        self.inner.observed.get()
    }

    /// The observable backing `key`, if the field is reactive.
    ///
    /// This bypasses dependency tracking and is what path-based watcher
    /// registration uses.
    pub fn observable(&self, key: &str) -> Option<Observable> {
        match self.slot(key)? {
            Slot::Reactive(cell) => Some(cell.observable().clone()),
            Slot::Data(_) | Slot::Accessor(_) => None,
        }
    }

    /// Check whether `key` holds a computed property.
    pub fn is_computed(&self, key: &str) -> bool {
        self.observable(key)
            .map(|observable| observable.is_computed())
            .unwrap_or(false)
    }

    /// Check whether two handles point to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.inner))
    }

    /// Mark as observed. Returns `false` if it already was.
    pub(crate) fn mark_observed(&self) -> bool {
        !self.inner.observed.replace(true)
    }

    /// Snapshot of every field, in key order.
    pub(crate) fn slots(&self) -> Vec<(String, Slot)> {
        self.inner
            .fields
            .borrow()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect()
    }

    /// Replace or insert a slot, keeping the key's position.
    pub(crate) fn install(&self, key: &str, slot: Slot) {
        let mut fields = self.inner.fields.borrow_mut();
        match fields.get_mut(key) {
            Some(existing) => *existing = slot,
            None => {
                fields.insert(key.to_string(), slot);
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter
            .into_iter()
            .map(|(key, value)| (key.into(), Slot::Data(value.into())))
            .collect();

        Self {
            inner: Rc::new(ObjectInner {
                fields: RefCell::new(fields),
                ..Default::default()
            }),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in self.keys() {
            map.entry(&key, &self.peek(&key));
        }
        map.finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
