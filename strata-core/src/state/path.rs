//! Path Resolution and Watcher Registry
//!
//! Watchers are attached by dot-delimited path (`"user.address.city"`,
//! `"items.0.name"`). Resolution walks the tree without tracking and hands
//! the terminal container and key to a callback. The watcher registry uses
//! that to reach the raw observable behind a field.

use super::value::Value;
use super::Object;
use crate::error::{ReactiveError, Result};
use crate::reactive::{Observable, Watcher};

/// Walk `path` from `root` and call `callback(parent, last_segment)`.
///
/// Every segment must name an existing field (or, on arrays, an in-range
/// index). Fails with `PathNotFound` naming the full path otherwise.
pub fn resolve_path<R>(
    root: &Object,
    path: &str,
    callback: impl FnOnce(&Value, &str) -> R,
) -> Result<R> {
    let not_found = || ReactiveError::PathNotFound {
        path: path.to_string(),
    };

    if path.is_empty() {
        return Err(not_found());
    }

    let mut segments = path.split('.').peekable();
    let mut current = Value::Object(root.clone());

    while let Some(segment) = segments.next() {
        if !owns(&current, segment) {
            return Err(not_found());
        }
        if segments.peek().is_none() {
            return Ok(callback(&current, segment));
        }
        current = child(&current, segment);
    }

    Err(not_found())
}

/// Check whether `container` directly holds `segment`.
fn owns(container: &Value, segment: &str) -> bool {
    match container {
        Value::Object(object) => object.contains_key(segment),
        Value::Array(array) => index(segment).is_some_and(|i| i < array.len()),
        _ => false,
    }
}

fn child(container: &Value, segment: &str) -> Value {
    match container {
        Value::Object(object) => object.peek(segment),
        Value::Array(array) => index(segment).map(|i| array.peek(i)).unwrap_or_default(),
        _ => Value::Undefined,
    }
}

/// Parse an array index segment. Only canonical decimal is accepted: no
/// sign, no leading zero.
fn index(segment: &str) -> Option<usize> {
    let canonical = segment == "0"
        || (!segment.is_empty()
            && !segment.starts_with('0')
            && segment.bytes().all(|b| b.is_ascii_digit()));
    canonical.then(|| segment.parse().ok()).flatten()
}

/// The observable behind `container[segment]`, bypassing tracking.
fn raw_observable(container: &Value, segment: &str) -> Option<Observable> {
    match container {
        Value::Object(object) => object.observable(segment),
        Value::Array(array) => index(segment).and_then(|i| array.observable_at(i)),
        _ => None,
    }
}

fn observable_at_path(root: &Object, path: &str) -> Result<Observable> {
    resolve_path(root, path, raw_observable)?.ok_or_else(|| ReactiveError::NotObservable {
        path: path.to_string(),
    })
}

/// Register `watcher` on the field at `path`. Returns the watcher.
///
/// Adding the same watcher twice leaves one registration.
pub fn add_watcher(root: &Object, path: &str, watcher: Watcher) -> Result<Watcher> {
    let observable = observable_at_path(root, path)?;
    if observable.watch(watcher.clone()) {
        tracing::debug!(path, watcher = ?watcher.id(), "watcher added");
    }
    Ok(watcher)
}

/// Unregister `watcher` from the field at `path`.
pub fn remove_watcher(root: &Object, path: &str, watcher: &Watcher) -> Result<()> {
    let observable = observable_at_path(root, path)?;
    if observable.unwatch(watcher) {
        tracing::debug!(path, watcher = ?watcher.id(), "watcher removed");
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::observe;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn state() -> Object {
        observe(Value::from(json!({
            "user": { "address": { "city": "Paris" } },
            "items": [{ "name": "a" }, { "name": "b" }],
            "empty": null,
        })))
        .unwrap()
    }

    #[test]
    fn resolves_nested_fields_and_indices() {
        let state = state();

        let city = resolve_path(&state, "user.address.city", |parent, key| {
            parent.as_object().unwrap().peek(key)
        });
        assert_eq!(city, Ok(Value::from("Paris")));

        let name = resolve_path(&state, "items.1.name", |parent, key| {
            parent.as_object().unwrap().peek(key)
        });
        assert_eq!(name, Ok(Value::from("b")));

        let key = resolve_path(&state, "items.0", |_, key| key.to_string());
        assert_eq!(key, Ok("0".to_string()));
    }

    #[test]
    fn missing_segments_name_the_full_path() {
        let state = state();
        let paths = [
            "nested.missing",
            "user.missing",
            "items.5.name",
            "items.01.name",
            "items.+1.name",
            "items. 1.name",
            "empty.x",
            "",
            "user.",
        ];
        for path in paths {
            assert_eq!(
                resolve_path(&state, path, |_, _| ()),
                Err(ReactiveError::PathNotFound {
                    path: path.to_string()
                })
            );
        }
    }

    #[test]
    fn add_and_remove_watcher_by_path() {
        let state = state();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let watcher = Watcher::infallible(move |new, old| {
            sink.borrow_mut().push((new.clone(), old.clone()));
        });

        let added = add_watcher(&state, "user.address.city", watcher.clone()).unwrap();
        assert_eq!(added, watcher);
        add_watcher(&state, "user.address.city", watcher.clone()).unwrap();

        let address = state.peek("user").as_object().unwrap().peek("address");
        let address = address.as_object().unwrap().clone();
        address.set("city", "Lyon").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![(Value::from("Lyon"), Value::from("Paris"))]
        );

        remove_watcher(&state, "user.address.city", &watcher).unwrap();
        address.set("city", "Nice").unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn plain_containers_are_not_observable() {
        let plain = Object::new().with("inner", Object::new().with("x", 1));
        let watcher = Watcher::infallible(|_, _| {});

        assert_eq!(
            add_watcher(&plain, "inner.x", watcher.clone()),
            Err(ReactiveError::NotObservable {
                path: "inner.x".into()
            })
        );
        assert!(remove_watcher(&plain, "inner.x", &watcher).is_err());
    }
}
