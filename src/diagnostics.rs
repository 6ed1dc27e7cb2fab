//! Shared panic-guarding for registered listeners.
//!
//! Only *listeners* (errback, abort, progress, partial-result, finally) are
//! wrapped this way — a plain `then` mapping closure is application code,
//! not a registered handler, and is allowed to unwind normally (see
//! SPEC_FULL.md §4.2). A listener panicking must not corrupt the bubbling
//! walk or abort cascade for its siblings, so its panic is caught, logged,
//! and the walk continues as if the listener had declined to handle
//! anything.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `f`, catching (and logging) any panic. `index` and `what` identify
/// the listener for the diagnostic, matching §6's "faulty callback
/// identity if known".
pub(crate) fn invoke_guarded<F: FnOnce()>(index: usize, what: &'static str, f: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        tracing::error!(
            index,
            what,
            message = %panic_message(&payload),
            "listener panicked; treating as unhandled"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
