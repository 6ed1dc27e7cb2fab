//! Misuse errors for the Deferred API itself.
//!
//! These are distinct from the crate's generic `E` type parameter, which
//! carries the user's own failure payload through the chain tree. A
//! `DeferredError` only ever surfaces when the *API contract* is violated
//! (double-resolve races aside, which are reported via `tracing::warn!`
//! and otherwise silently ignored per the source's "no-op with a warning"
//! behavior).

use thiserror::Error;

/// Misuse of the Deferred API surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeferredError {
    /// `at_last`/`finally` was registered twice on the same node.
    #[error("finally hook already registered on this Deferred")]
    FinallyAlreadySet,

    /// A registered handler (errback, abort, progress, partial-result, or
    /// finally listener) panicked while running.
    #[error("handler at registration index {index} panicked: {message}")]
    HandlerPanicked { index: usize, message: String },
}
