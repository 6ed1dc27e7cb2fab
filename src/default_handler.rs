//! Process-wide last-resort error recipient.
//!
//! The error-bubbling walk (see `node.rs`) consults this only when no
//! in-tree `or_if_error` handler exists anywhere below the failing node. A
//! node's error type `E` is generic and varies per Deferred instantiation,
//! so the registered handler is necessarily type-erased (`&dyn Any`) — this
//! is the one spot in the crate where that's unavoidable, since the handler
//! is genuinely process-wide rather than scoped to a single `Deferred<T, E>`.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

type HandlerSlot = Mutex<Option<Box<dyn Fn(&dyn Any) + Send + Sync>>>;

static DEFAULT_HANDLER: Lazy<HandlerSlot> = Lazy::new(|| Mutex::new(None));

/// Register the process-wide fallback error handler.
///
/// Set-once is recommended for production use; a later call replaces the
/// previous handler (there is no "already registered" error — the source
/// treats this as a simple assignable slot).
pub fn register_default_error_handler<F>(handler: F)
where
    F: Fn(&dyn Any) + Send + Sync + 'static,
{
    *DEFAULT_HANDLER.lock() = Some(Box::new(handler));
}

/// Clear the process-wide fallback handler. Test-only: production code
/// should not need to un-register a handler once set.
#[doc(hidden)]
pub fn reset_default_error_handler() {
    *DEFAULT_HANDLER.lock() = None;
}

/// Invoke the default handler with a type-erased error, if one is
/// registered. Returns `true` iff a handler ran to completion without
/// panicking (i.e. the error counts as "handled" for diagnostic purposes).
pub(crate) fn invoke_default_handler(err: &dyn Any) -> bool {
    let guard = DEFAULT_HANDLER.lock();
    let Some(handler) = guard.as_ref() else {
        return false;
    };
    match catch_unwind(AssertUnwindSafe(|| handler(err))) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!("default error handler panicked; treating error as unhandled");
            false
        }
    }
}

#[cfg(test)]
pub(crate) fn has_default_handler() -> bool {
    DEFAULT_HANDLER.lock().is_some()
}
