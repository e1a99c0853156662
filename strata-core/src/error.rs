//! Error Types
//!
//! Every failure the engine detects is reported synchronously to the caller
//! of the operation that detected it. Failures raised by user callbacks
//! (watchers and computed functions) are not represented here: those are
//! logged and contained where they happen.

/// Boxed error returned by user-supplied watchers and computed functions.
///
/// Any `ReactiveError` converts into it, so `?` works inside a computed
/// function that reads or (illegally) writes state.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors raised by the reactive engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// `observe` was handed something other than a plain object.
    #[error("observe expects a plain object, got {found}")]
    InvalidInput { found: &'static str },

    /// A write or structural operation was attempted while mutations are disabled.
    #[error("state mutation is disabled: cannot modify `{target}`")]
    MutationDisabled { target: String },

    /// The resolved property has no backing observable.
    #[error("property at `{path}` is not observable")]
    NotObservable { path: String },

    /// A segment of a dot-delimited path does not exist.
    #[error("path `{path}` not found")]
    PathNotFound { path: String },

    /// A key was added to, removed from, or redefined on a sealed object.
    #[error("object is sealed: cannot add, remove or redefine `{key}`")]
    Sealed { key: String },

    /// A computed property was assigned directly.
    #[error("`{key}` is a computed property and cannot be assigned")]
    ReadOnly { key: String },

    /// An element write targeted an index past the end of an array.
    #[error("index {index} is out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A mode name could not be parsed.
    #[error("unknown reactivity mode `{name}`")]
    InvalidMode { name: String },

    /// Runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(String),
}

impl ReactiveError {
    pub(crate) fn disabled(target: impl Into<String>) -> Self {
        Self::MutationDisabled {
            target: target.into(),
        }
    }
}
