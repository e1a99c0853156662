//! Array Handles
//!
//! An [`Array`] is an ordered sequence of values. Once observed, each element
//! sits in its own reactive cell and the structural operations are
//! intercepted:
//!
//! | Operation | Native result | New elements |
//! |---|---|---|
//! | `push` | new length | last N |
//! | `pop` | removed value | none |
//! | `shift` | removed value | none |
//! | `unshift` | new length | first N |
//! | `splice` | removed values | `items.len()` at `start` |
//! | `sort` / `sort_by` | the array | none |
//! | `reverse` | the array | none |
//!
//! Under `Enabled` the operation runs natively, the new elements become
//! reactive, and the observable the array is attached to is updated once
//! with the array itself. The reference does not change, so this is the only
//! signal a structural change produces.
//!
//! Under `Disabled` the operation fails, and under `Lazy` it is queued with
//! its original arguments and the array as context.
//!
//! Unobserved arrays are plain containers: no gating, no notification.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::cell::{Outcome, ReactiveCell};
use super::value::{natural_order, Value};
use crate::error::{ReactiveError, Result};
use crate::reactive::{DeferredFn, Mode, Observable, ObservableInner, QueueItem, Runtime};

/// Comparator used by [`Array::sort_by`].
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> Ordering>;

type Args = SmallVec<[Value; 2]>;

#[derive(Clone)]
enum Element {
    Plain(Value),
    Reactive(Rc<ReactiveCell>),
}

impl Element {
    fn read(&self) -> Value {
        match self {
            Element::Plain(value) => value.clone(),
            Element::Reactive(cell) => cell.read(None),
        }
    }

    fn peek(&self) -> Value {
        match self {
            Element::Plain(value) => value.clone(),
            Element::Reactive(cell) => cell.peek(None),
        }
    }
}

/// A reference-counted sequence of values.
#[derive(Clone, Default)]
pub struct Array {
    inner: Rc<ArrayInner>,
}

#[derive(Default)]
struct ArrayInner {
    items: RefCell<Vec<Element>>,
    /// Observable of the cell holding this array.
    attached: RefCell<Weak<ObservableInner>>,
    observed: Cell<bool>,
}

impl Array {
    /// Create an empty, unobserved array.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    fn element(&self, index: usize) -> Option<Element> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Read an element. Tracked when the array is observed.
    ///
    /// Out-of-range reads return `Undefined`.
    pub fn get(&self, index: usize) -> Value {
        self.element(index)
            .map(|element| element.read())
            .unwrap_or_default()
    }

    /// Read an element without registering a dependency.
    pub fn peek(&self, index: usize) -> Value {
        self.element(index)
            .map(|element| element.peek())
            .unwrap_or_default()
    }

    /// Write an existing element.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Outcome<()>> {
        let value = value.into();
        match self.element(index) {
            Some(Element::Reactive(cell)) => cell.write(None, &format!("[{index}]"), value),
            Some(Element::Plain(_)) => {
                if let Some(slot) = self.inner.items.borrow_mut().get_mut(index) {
                    *slot = Element::Plain(value);
                }
                Ok(Outcome::Applied(()))
            }
            None => Err(ReactiveError::IndexOutOfBounds {
                index,
                len: self.len(),
            }),
        }
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        let items = self.inner.items.borrow().clone();
        items.iter().map(Element::peek).collect()
    }

    /// The observable backing element `index`, if the array is observed.
    pub fn observable_at(&self, index: usize) -> Option<Observable> {
        match self.element(index)? {
            Element::Reactive(cell) => Some(cell.observable().clone()),
            Element::Plain(_) => None,
        }
    }

    /// The observable that carries structural notifications.
    pub fn observable(&self) -> Option<Observable> {
        Observable::from_weak(&self.inner.attached.borrow())
    }

    pub fn is_observed(&self) -> bool {
        self.inner.observed.get()
    }

    /// Check whether two handles point to the same array.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Structural operations
    // ------------------------------------------------------------------------

    /// Append `values`. Returns the new length.
    pub fn push(&self, values: impl IntoIterator<Item = Value>) -> Result<Outcome<usize>> {
        let args: Args = values.into_iter().collect();
        let replay = replay(|array, args| array.push(args.iter().cloned()).map(drop));

        self.structural("push", args.clone(), replay, || {
            self.with_items(|items| {
                let start = items.len();
                items.extend(args.into_iter().map(Element::Plain));
                (items.len(), start..items.len())
            })
        })
    }

    /// Remove the last element. Returns it, or `Undefined` if empty.
    pub fn pop(&self) -> Result<Outcome<Value>> {
        let replay = replay(|array, _| array.pop().map(drop));

        self.structural("pop", Args::new(), replay, || {
            let removed = self.with_items(Vec::pop).map(|element| element.peek());
            (removed.unwrap_or_default(), 0..0)
        })
    }

    /// Remove the first element. Returns it, or `Undefined` if empty.
    pub fn shift(&self) -> Result<Outcome<Value>> {
        let replay = replay(|array, _| array.shift().map(drop));

        self.structural("shift", Args::new(), replay, || {
            let removed = self.with_items(|items| (!items.is_empty()).then(|| items.remove(0)));
            (removed.map(|element| element.peek()).unwrap_or_default(), 0..0)
        })
    }

    /// Insert `values` at the front, keeping their order. Returns the new length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> Result<Outcome<usize>> {
        let args: Args = values.into_iter().collect();
        let replay = replay(|array, args| array.unshift(args.iter().cloned()).map(drop));

        self.structural("unshift", args.clone(), replay, || {
            self.with_items(|items| {
                let count = args.len();
                items.splice(0..0, args.into_iter().map(Element::Plain));
                (items.len(), 0..count)
            })
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// `start` is clamped to the length and `delete_count` to what remains.
    /// Returns the removed values.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Outcome<Vec<Value>>> {
        let inserted: Args = items.into_iter().collect();
        let mut args: Args = Args::new();
        args.push(Value::from(start));
        args.push(Value::from(delete_count));
        args.extend(inserted.iter().cloned());

        let replay = replay(|array, args| {
            let index = |i: usize| args.get(i).and_then(Value::as_f64).unwrap_or(0.0) as usize;
            let rest = args.iter().skip(2).cloned();
            array.splice(index(0), index(1), rest).map(drop)
        });

        self.structural("splice", args, replay, || {
            let (removed, fresh) = self.with_items(|elements| {
                let start = start.min(elements.len());
                let end = start + delete_count.min(elements.len() - start);
                let count = inserted.len();
                let removed: Vec<Element> = elements
                    .splice(start..end, inserted.into_iter().map(Element::Plain))
                    .collect();
                (removed, start..start + count)
            });
            (removed.iter().map(Element::peek).collect(), fresh)
        })
    }

    /// Sort in natural order. Returns the array.
    pub fn sort(&self) -> Result<Outcome<Array>> {
        self.sort_by(natural_order)
    }

    /// Stable sort with a comparator. Returns the array.
    ///
    /// Element cells move with their values. The comparator sorts a snapshot
    /// and the array is untouched until it has finished, so it may read the
    /// array, and a comparator that panics leaves the order unchanged.
    pub fn sort_by<F>(&self, compare: F) -> Result<Outcome<Array>>
    where
        F: Fn(&Value, &Value) -> Ordering + 'static,
    {
        self.sort_with(Rc::new(compare))
    }

    fn sort_with(&self, compare: Comparator) -> Result<Outcome<Array>> {
        let replay: DeferredFn = {
            let compare = Rc::clone(&compare);
            Rc::new(move |context: Option<&Value>, _: &[Value]| {
                match context.and_then(Value::as_array) {
                    Some(array) => array.sort_with(Rc::clone(&compare)).map(drop),
                    None => Ok(()),
                }
            })
        };

        self.structural("sort", Args::new(), replay, || {
            let snapshot = self.inner.items.borrow().clone();
            let mut keyed: Vec<(Value, Element)> = snapshot
                .into_iter()
                .map(|element| (element.peek(), element))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| compare(a, b));
            *self.inner.items.borrow_mut() =
                keyed.into_iter().map(|(_, element)| element).collect();
            (self.clone(), 0..0)
        })
    }

    /// Reverse in place. Returns the array.
    pub fn reverse(&self) -> Result<Outcome<Array>> {
        let replay = replay(|array, _| array.reverse().map(drop));

        self.structural("reverse", Args::new(), replay, || {
            self.with_items(|items| items.reverse());
            (self.clone(), 0..0)
        })
    }

    /// Gate, run and publish a structural operation.
    ///
    /// `native` performs the change and returns the operation's result and
    /// the positions of newly introduced elements.
    fn structural<T>(
        &self,
        op: &'static str,
        args: Args,
        replay: DeferredFn,
        native: impl FnOnce() -> (T, Range<usize>),
    ) -> Result<Outcome<T>> {
        if self.is_observed() {
            match Runtime::mode() {
                Mode::Enabled => {}
                Mode::Disabled => return Err(ReactiveError::disabled(format!("array.{op}"))),
                Mode::Lazy => {
                    let context = Value::Array(self.clone());
                    Runtime::enqueue(QueueItem::new(replay, args, Some(context)));
                    return Ok(Outcome::Deferred);
                }
            }
        }

        let (result, fresh) = native();

        if self.is_observed() {
            self.make_reactive(fresh);
            tracing::trace!(op, len = self.len(), "array mutated");
            if let Some(owner) = self.observable() {
                owner.update(Value::Array(self.clone()));
            }
        }

        Ok(Outcome::Applied(result))
    }

    /// Mutate the element vector. `f` must not call user code.
    fn with_items<R>(&self, f: impl FnOnce(&mut Vec<Element>) -> R) -> R {
        f(&mut *self.inner.items.borrow_mut())
    }

    // ------------------------------------------------------------------------
    // Observation hooks
    // ------------------------------------------------------------------------

    /// Mark as observed. Returns `false` if it already was.
    pub(crate) fn mark_observed(&self) -> bool {
        !self.inner.observed.replace(true)
    }

    /// Replace plain elements in `range` with reactive cells.
    pub(crate) fn make_reactive(&self, range: Range<usize>) {
        for index in range {
            let plain = match self.element(index) {
                Some(Element::Plain(value)) => value,
                _ => continue,
            };
            let cell = ReactiveCell::new(plain);
            if let Some(slot) = self.inner.items.borrow_mut().get_mut(index) {
                *slot = Element::Reactive(cell);
            }
        }
    }

    /// Route structural notifications through `owner`.
    pub(crate) fn attach(&self, owner: &Observable) {
        *self.inner.attached.borrow_mut() = owner.downgrade();
    }

    /// Stop routing through `owner`. No-op if the array has since been
    /// attached elsewhere.
    pub(crate) fn detach(&self, owner: &Observable) {
        let mut attached = self.inner.attached.borrow_mut();
        if attached.ptr_eq(&owner.downgrade()) {
            *attached = Weak::new();
        }
    }
}

/// Deferred replay of an operation against the array captured as context.
fn replay(op: fn(&Array, &[Value]) -> Result<()>) -> DeferredFn {
    Rc::new(move |context: Option<&Value>, args: &[Value]| {
        match context.and_then(Value::as_array) {
            Some(array) => op(array, args),
            None => Ok(()),
        }
    })
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let items = iter
            .into_iter()
            .map(|value| Element::Plain(value.into()))
            .collect();

        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(items),
                ..Default::default()
            }),
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{with_mode, Watcher};
    use crate::state::{observe, Object};

    fn numbers(values: &[i32]) -> Array {
        values.iter().copied().collect()
    }

    /// Observed `{ items: [...] }` plus a structural-notification counter.
    fn observed(values: &[i32]) -> (Object, Array, Rc<Cell<usize>>) {
        let array = numbers(values);
        let state = observe(Value::from(Object::new().with("items", array.clone()))).unwrap();

        let calls = Rc::new(Cell::new(0));
        let sink = calls.clone();
        state
            .observable("items")
            .unwrap()
            .watch(Watcher::infallible(move |_, _| sink.set(sink.get() + 1)));

        (state, array, calls)
    }

    #[test]
    fn plain_arrays_are_not_gated() {
        let array = numbers(&[1, 2]);
        let _guard = crate::reactive::ModeGuard::enter(Mode::Disabled);

        assert_eq!(array.push([Value::from(3)]), Ok(Outcome::Applied(3)));
        assert_eq!(array.shift(), Ok(Outcome::Applied(Value::from(1))));
        assert_eq!(array.to_vec(), vec![Value::from(2), Value::from(3)]);
        assert!(array.observable_at(0).is_none());
    }

    #[test]
    fn push_notifies_once_and_wraps_new_elements() {
        let (_state, array, calls) = observed(&[1]);

        let pushed = array.push([Value::from(2), Value::from(3)]);
        assert_eq!(pushed, Ok(Outcome::Applied(3)));
        assert_eq!(calls.get(), 1);
        assert!(array.observable_at(1).is_some());
        assert!(array.observable_at(2).is_some());
    }

    #[test]
    fn pop_and_shift_return_removed_values() {
        let (_state, array, calls) = observed(&[1, 2, 3]);

        assert_eq!(array.pop(), Ok(Outcome::Applied(Value::from(3))));
        assert_eq!(array.shift(), Ok(Outcome::Applied(Value::from(1))));
        assert_eq!(array.to_vec(), vec![Value::from(2)]);
        assert_eq!(calls.get(), 2);

        array.pop().unwrap();
        assert_eq!(array.pop(), Ok(Outcome::Applied(Value::Undefined)));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn unshift_keeps_argument_order() {
        let (_state, array, _) = observed(&[3]);

        assert_eq!(
            array.unshift([Value::from(1), Value::from(2)]),
            Ok(Outcome::Applied(3))
        );
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert!(array.observable_at(0).is_some());
    }

    #[test]
    fn splice_clamps_and_returns_removed() {
        let (_state, array, calls) = observed(&[1, 2, 3, 4]);

        let removed = array.splice(1, 2, [Value::from(9)]);
        assert_eq!(
            removed,
            Ok(Outcome::Applied(vec![Value::from(2), Value::from(3)]))
        );
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(9), Value::from(4)]);
        assert!(array.observable_at(1).is_some());

        let removed = array.splice(10, 5, [Value::from(5)]);
        assert_eq!(removed, Ok(Outcome::Applied(vec![])));
        assert_eq!(array.peek(3), Value::from(5));

        let removed = array.splice(2, 100, []);
        assert_eq!(
            removed,
            Ok(Outcome::Applied(vec![Value::from(4), Value::from(5)]))
        );
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn sort_moves_cells_with_values() {
        let (_state, array, calls) = observed(&[3, 1, 2]);
        let cell_of_one = array.observable_at(1).unwrap();

        let sorted = array.sort().unwrap().applied().unwrap();
        assert!(sorted.ptr_eq(&array));
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert!(array.observable_at(0).unwrap().ptr_eq(&cell_of_one));

        array.sort_by(|a, b| natural_order(b, a)).unwrap();
        assert_eq!(array.to_vec(), vec![Value::from(3), Value::from(2), Value::from(1)]);

        array.reverse().unwrap();
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn comparator_sees_the_whole_array() {
        let (_state, array, calls) = observed(&[3, 1, 2]);
        let lengths = Rc::new(RefCell::new(Vec::new()));

        let (this, sink) = (array.clone(), lengths.clone());
        array
            .sort_by(move |a, b| {
                sink.borrow_mut().push(this.len());
                natural_order(a, b)
            })
            .unwrap();

        assert!(!lengths.borrow().is_empty());
        assert!(lengths.borrow().iter().all(|&len| len == 3));
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn panicking_comparator_leaves_array_intact() {
        let (_state, array, calls) = observed(&[3, 1, 2]);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            array.sort_by(|_, _| panic!("comparator failed"))
        }));

        assert!(result.is_err());
        assert_eq!(array.to_vec(), vec![Value::from(3), Value::from(1), Value::from(2)]);
        assert!(array.observable_at(0).is_some());
        assert_eq!(calls.get(), 0);

        array.sort().unwrap();
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn structural_ops_follow_mode() {
        let (_state, array, calls) = observed(&[1]);

        let err = with_mode(Mode::Disabled, || array.push([Value::from(2)]));
        assert_eq!(
            err,
            Err(ReactiveError::MutationDisabled {
                target: "array.push".into()
            })
        );

        let deferred = with_mode(Mode::Lazy, || {
            (array.push([Value::from(2)]), array.splice(0, 1, []))
        });
        assert_eq!(deferred, (Ok(Outcome::Deferred), Ok(Outcome::Deferred)));
        assert_eq!(array.len(), 1);
        assert_eq!(Runtime::queue_len(), 2);

        assert_eq!(Runtime::drain_queue(), Ok(2));
        assert_eq!(array.to_vec(), vec![Value::from(2)]);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn replaced_array_stops_notifying_its_old_field() {
        let (state, old, calls) = observed(&[1, 2]);
        let fresh = numbers(&[9]);

        state.set("items", fresh.clone()).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(old.observable().is_none());
        assert!(old.is_observed());

        old.push([Value::from(3)]).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(old.len(), 3);

        fresh.push([Value::from(10)]).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn shared_array_keeps_its_latest_field() {
        let list = numbers(&[1]);
        let state = observe(Value::from(
            Object::new().with("a", list.clone()).with("b", Value::Null),
        ))
        .unwrap();

        state.set("b", list.clone()).unwrap();
        state.set("a", Value::Null).unwrap();
        assert!(list
            .observable()
            .unwrap()
            .ptr_eq(&state.observable("b").unwrap()));
    }

    #[test]
    fn element_writes() {
        let (_state, array, calls) = observed(&[1, 2]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        array
            .observable_at(0)
            .unwrap()
            .watch(Watcher::infallible(move |new, old| {
                sink.borrow_mut().push((new.clone(), old.clone()));
            }));

        assert_eq!(array.set(0, 5), Ok(Outcome::Applied(())));
        assert_eq!(array.set(0, 5), Ok(Outcome::Applied(())));
        assert_eq!(*seen.borrow(), vec![(Value::from(5), Value::from(1))]);
        // Element writes are not structural
        assert_eq!(calls.get(), 0);

        assert_eq!(
            array.set(7, 1),
            Err(ReactiveError::IndexOutOfBounds { index: 7, len: 2 })
        );
    }
}
