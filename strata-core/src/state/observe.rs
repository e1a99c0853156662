//! Recursive Observation
//!
//! [`observe`] walks a plain object tree in place and installs a reactive
//! cell on every field and array element. The handles keep their identity:
//! code that held the plain object before now holds the reactive one.
//!
//! # Order of Processing
//!
//! 1. The object is marked observed first, so shared or cyclic references
//!    are visited once.
//! 2. Data and accessor fields become cells. Nested objects and arrays are
//!    observed before the parent field's cell exists.
//! 3. Function fields become computed properties. They run after every data
//!    field is reactive, so a computed can read any sibling.
//! 4. The key set is sealed.

use super::array::Array;
use super::cell::ReactiveCell;
use super::object::{Object, Slot};
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::Observable;

/// Make `data` reactive in place and return the same object handle.
///
/// Observing an object twice is a no-op the second time.
pub fn observe(data: Value) -> Result<Object> {
    match data {
        Value::Object(object) => {
            observe_object(&object);
            Ok(object)
        }
        other => Err(ReactiveError::InvalidInput {
            found: other.type_name(),
        }),
    }
}

pub(crate) fn observe_object(object: &Object) {
    if !object.mark_observed() {
        return;
    }

    let slots = object.slots();
    let mut computed = Vec::new();

    for (key, slot) in slots {
        let cell = match slot {
            Slot::Data(Value::Function(func)) => {
                computed.push((key, func));
                continue;
            }
            Slot::Data(value) => ReactiveCell::new(value),
            Slot::Accessor(accessor) => {
                let value = accessor.read(object);
                ReactiveCell::with_accessor(value, Some(accessor))
            }
            Slot::Reactive(_) => continue,
        };
        object.install(&key, Slot::Reactive(cell));
    }

    for (key, func) in computed {
        let observable = Observable::computed(object, func);
        object.install(&key, Slot::Reactive(ReactiveCell::computed(observable)));
    }

    object.seal();
    tracing::debug!(fields = object.len(), "object observed");
}

pub(crate) fn observe_array(array: &Array) {
    if array.mark_observed() {
        array.make_reactive(0..array.len());
        tracing::debug!(len = array.len(), "array observed");
    }
}

/// Observe the subtree of a value about to be stored in `owner`.
///
/// Arrays are attached to `owner`, which then carries their structural
/// notifications.
pub(crate) fn observe_value(value: &Value, owner: &Observable) {
    match value {
        Value::Object(object) => observe_object(object),
        Value::Array(array) => {
            observe_array(array);
            array.attach(owner);
        }
        _ => {}
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Accessor, Outcome};
    use serde_json::json;

    #[test]
    fn observe_rejects_non_objects() {
        assert!(matches!(
            observe(Value::from(3)),
            Err(ReactiveError::InvalidInput { found: "number" })
        ));
        assert!(observe(Value::from(Array::new())).is_err());
        assert!(observe(Value::Null).is_err());
    }

    #[test]
    fn observe_preserves_identity_and_seals() {
        let plain = Object::new().with("a", 1).with("b", "x");
        let reactive = observe(Value::from(plain.clone())).unwrap();

        assert!(reactive.ptr_eq(&plain));
        assert!(plain.is_observed());
        assert!(plain.is_sealed());
        assert!(plain.observable("a").is_some());
        assert!(plain.observable("b").is_some());
        assert_eq!(plain.get("a"), Value::from(1));
    }

    #[test]
    fn nested_structures_become_reactive() {
        let state = observe(Value::from(json!({
            "user": { "name": "ada" },
            "items": [{ "id": 1 }, { "id": 2 }],
        })))
        .unwrap();

        let user = state.peek("user");
        let user = user.as_object().unwrap();
        assert!(user.is_observed());
        assert!(user.observable("name").is_some());

        let items = state.peek("items");
        let items = items.as_array().unwrap();
        assert!(items.is_observed());
        assert!(items.observable_at(1).is_some());
        assert!(items.observable().unwrap().ptr_eq(&state.observable("items").unwrap()));

        let first = items.peek(0);
        assert!(first.as_object().unwrap().observable("id").is_some());
    }

    #[test]
    fn observing_twice_is_a_noop() {
        let state = observe(Value::from(Object::new().with("a", 1))).unwrap();
        let before = state.observable("a").unwrap();

        let again = observe(Value::from(state.clone())).unwrap();
        assert!(again.observable("a").unwrap().ptr_eq(&before));
    }

    #[test]
    fn computed_fields_see_later_siblings() {
        let plain = Object::new()
            .with(
                "label",
                Value::computed(|this| {
                    let name = this.get("name");
                    Ok(Value::from(format!("hello {}", name.as_str().unwrap_or("?"))))
                }),
            )
            .with("name", "ada");

        let state = observe(Value::from(plain)).unwrap();
        assert_eq!(state.get("label"), Value::from("hello ada"));
        assert!(state.is_computed("label"));

        state.set("name", "grace").unwrap();
        assert_eq!(state.get("label"), Value::from("hello grace"));
    }

    #[test]
    fn accessor_fields_keep_their_accessor() {
        let plain = Object::new().with("raw", 2);
        plain
            .define_accessor(
                "double",
                Accessor::new()
                    .getter(|this| Value::from(this.peek("raw").as_f64().unwrap_or(0.0) * 2.0))
                    .setter(|this, value| {
                        let half = value.as_f64().unwrap_or(0.0) / 2.0;
                        let _ = this.set("raw", half);
                    }),
            )
            .unwrap();

        let state = observe(Value::from(plain)).unwrap();
        assert!(state.observable("double").is_some());
        assert_eq!(state.get("double"), Value::from(4));

        assert_eq!(state.set("double", 10), Ok(Outcome::Applied(())));
        assert_eq!(state.get("raw"), Value::from(5));
        assert_eq!(state.get("double"), Value::from(10));
        assert_eq!(state.observable("double").unwrap().peek(), Value::from(10));
    }

    #[test]
    fn cyclic_references_terminate() {
        let a = Object::new();
        let b = Object::new().with("back", a.clone());
        a.set("forward", b.clone()).unwrap();

        let state = observe(Value::from(a.clone())).unwrap();
        assert!(state.ptr_eq(&a));
        assert!(b.is_observed());
        assert!(b.observable("back").is_some());
    }
}
