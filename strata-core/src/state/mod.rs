//! Reactive State Trees
//!
//! This module turns plain data into reactive data. It sits on top of the
//! primitives in [`crate::reactive`]:
//!
//! - [`Value`], [`Object`] and [`Array`] form the dynamic data model.
//! - [`observe`] installs a reactive cell on every field and element of a
//!   tree, turning function fields into computed properties.
//! - [`resolve_path`], [`add_watcher`] and [`remove_watcher`] address fields
//!   by dot-delimited path.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::state::{observe, add_watcher, Object, Value};
//! use strata_core::reactive::Watcher;
//!
//! let state = observe(Value::from(
//!     Object::new()
//!         .with("price", 10)
//!         .with("qty", 2)
//!         .with("total", Value::computed(|this| {
//!             let price = this.get("price").as_f64().unwrap_or(0.0);
//!             let qty = this.get("qty").as_f64().unwrap_or(0.0);
//!             Ok(Value::from(price * qty))
//!         })),
//! ))?;
//!
//! add_watcher(&state, "total", Watcher::infallible(|new, old| {
//!     println!("total: {old:?} -> {new:?}");
//! }))?;
//!
//! state.set("price", 5)?; // prints "total: 20 -> 10"
//! ```

mod array;
mod cell;
mod object;
mod observe;
mod path;
mod value;

pub use array::{Array, Comparator};
pub use cell::{Accessor, Getter, Outcome, Setter};
pub use object::{Object, WeakObject};
pub use observe::observe;
pub use path::{add_watcher, remove_watcher, resolve_path};
pub use value::{natural_order, Computation, Value};
