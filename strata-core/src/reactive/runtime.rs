//! Reactive Runtime
//!
//! The runtime owns the two pieces of global state that gate every mutation
//! in the engine:
//!
//! 1. The reactivity [`Mode`]. `Enabled` applies writes immediately,
//!    `Disabled` rejects them, and `Lazy` captures them in the deferred queue.
//!
//! 2. The deferred queue, a FIFO of [`QueueItem`]s replayed by
//!    [`Runtime::drain_queue`].
//!
//! # Save / Restore Discipline
//!
//! Every operation that changes the mode for a bounded region (computed
//! evaluation, queue draining, mutation bracketing) does so through a
//! [`ModeGuard`], which restores the previous mode when dropped. The previous
//! mode is therefore restored on the error path and during unwinding too.
//!
//! # Threading
//!
//! State is thread-local. Reactive handles are `Rc`-based and cannot leave
//! the thread that created them, so each thread behaves as one independent
//! engine instance.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::state::Value;

/// Process-wide (per-thread) switch controlling what happens to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Writes fail with `MutationDisabled`.
    Disabled,
    /// Writes are queued and replayed by `drain_queue`.
    Lazy,
    /// Writes apply immediately and notify dependents.
    #[default]
    Enabled,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Disabled => "disabled",
            Mode::Lazy => "lazy",
            Mode::Enabled => "enabled",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disabled" => Ok(Mode::Disabled),
            "lazy" => Ok(Mode::Lazy),
            "enabled" => Ok(Mode::Enabled),
            other => Err(ReactiveError::InvalidMode {
                name: other.to_string(),
            }),
        }
    }
}

/// Function replayed for a deferred call: `(context, args)`.
pub type DeferredFn = Rc<dyn Fn(Option<&Value>, &[Value]) -> Result<()>>;

/// A mutation call captured while the runtime was in `Lazy` mode.
///
/// The call is stored verbatim: the function, its arguments in their
/// original order, and the receiver it should run against.
pub struct QueueItem {
    func: DeferredFn,
    args: SmallVec<[Value; 2]>,
    context: Option<Value>,
}

impl QueueItem {
    pub fn new(
        func: DeferredFn,
        args: impl IntoIterator<Item = Value>,
        context: Option<Value>,
    ) -> Self {
        Self {
            func,
            args: args.into_iter().collect(),
            context,
        }
    }

    /// Arguments captured with the call.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Receiver captured with the call, if any.
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Replay the captured call.
    pub fn invoke(&self) -> Result<()> {
        (self.func)(self.context.as_ref(), &self.args)
    }
}

impl fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("args", &self.args)
            .field("context", &self.context)
            .finish()
    }
}

thread_local! {
    static MODE: Cell<Mode> = const { Cell::new(Mode::Enabled) };
    static QUEUE: RefCell<VecDeque<QueueItem>> = RefCell::new(VecDeque::new());
}

/// The reactive runtime.
///
/// A zero-sized handle over the thread-local mode and deferred queue.
pub struct Runtime;

impl Runtime {
    /// Current reactivity mode.
    pub fn mode() -> Mode {
        MODE.with(|mode| mode.get())
    }

    /// Switch to `mode`, returning the previous mode.
    ///
    /// Setting the mode that is already active is a no-op.
    pub fn set_mode(mode: Mode) -> Mode {
        MODE.with(|current| {
            let previous = current.get();
            if previous != mode {
                tracing::debug!(from = %previous, to = %mode, "reactivity mode changed");
                current.set(mode);
            }
            previous
        })
    }

    /// Switch to the mode called `name`.
    ///
    /// Unrecognized names are ignored and leave the mode untouched.
    pub fn set_mode_named(name: &str) -> Mode {
        match name.parse::<Mode>() {
            Ok(mode) => Self::set_mode(mode),
            Err(_) => {
                tracing::debug!(name, "ignoring unknown reactivity mode");
                Self::mode()
            }
        }
    }

    /// Apply a runtime configuration to the current thread.
    pub fn configure(config: &RuntimeConfig) {
        Self::set_mode(config.mode);
    }

    /// Append a deferred call to the tail of the queue.
    pub fn enqueue(item: QueueItem) {
        tracing::trace!(args = item.args.len(), "mutation deferred");
        QUEUE.with(|queue| queue.borrow_mut().push_back(item));
    }

    /// Number of deferred calls waiting to be replayed.
    pub fn queue_len() -> usize {
        QUEUE.with(|queue| queue.borrow().len())
    }

    /// Replay every deferred call in FIFO order.
    ///
    /// The mode is forced to `Enabled` while draining, so mutations performed
    /// by a replayed call apply immediately instead of being queued again.
    /// The previous mode is restored afterwards. If a call fails, draining
    /// stops, the error is returned, and the remaining calls stay queued.
    ///
    /// Returns the number of calls replayed.
    pub fn drain_queue() -> Result<usize> {
        let _mode = ModeGuard::enter(Mode::Enabled);
        let mut replayed = 0;

        // Pop before invoking: replayed calls may touch the queue themselves.
        while let Some(item) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
            item.invoke()?;
            replayed += 1;
        }

        tracing::debug!(replayed, "deferred queue drained");
        Ok(replayed)
    }

    /// Discard every deferred call without invoking it.
    ///
    /// Returns the number of calls discarded.
    pub fn purge_queue() -> usize {
        let purged = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            let purged = queue.len();
            queue.clear();
            purged
        });
        tracing::debug!(purged, "deferred queue purged");
        purged
    }
}

/// Guard that restores the previous mode when dropped.
///
/// ```rust,ignore
/// let _guard = ModeGuard::enter(Mode::Disabled);
/// // writes fail here
/// // previous mode is back once `_guard` goes out of scope
/// ```
#[must_use = "the previous mode is restored as soon as the guard is dropped"]
pub struct ModeGuard {
    previous: Mode,
}

impl ModeGuard {
    pub fn enter(mode: Mode) -> Self {
        Self {
            previous: Runtime::set_mode(mode),
        }
    }

    /// Mode that will be restored on drop.
    pub fn previous(&self) -> Mode {
        self.previous
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        Runtime::set_mode(self.previous);
    }
}

/// Run `f` under `mode`, restoring the previous mode afterwards.
pub fn with_mode<R>(mode: Mode, f: impl FnOnce() -> R) -> R {
    let _guard = ModeGuard::enter(mode);
    f()
}

/// Run a mutation function with writes enabled.
///
/// This is the bracketing a store facade puts around its "mutation"
/// functions. Code outside the bracket keeps whatever mode the host chose
/// (typically `Disabled`, so "actions" cannot write state directly).
pub fn run_mutation<R>(f: impl FnOnce() -> R) -> R {
    with_mode(Mode::Enabled, f)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
