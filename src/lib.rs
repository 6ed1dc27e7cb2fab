//! A single-threaded, single-resolution async primitive with a chain tree.
//!
//! A [`Deferred<T, E>`] starts `Pending` and settles at most once, into one
//! of three terminal states: `Callbacked(T)`, `Errbacked(E)`, or `Aborted`.
//! Chaining (`then`, `then_chain`) builds a tree of these nodes rather than
//! a flat list, which is what makes scoped cancellation possible:
//! [`Deferred::abort_branch`] cancels only the maximal run of single-child
//! nodes the call was made from, while [`Deferred::abort_all`] walks to the
//! tree's root and cancels everything hanging off it.
//!
//! Propagation never runs synchronously out of `succeed`/`fail`/`abort` — it
//! is posted onto a [`Scheduler`] (see the `scheduler` module) and runs on a
//! later tick, so a producer that resolves a `Deferred` and hands it back
//! still gives the caller a chance to attach `then`/`or_if_error` first.
//!
//! The [`combinators`] module builds [`all_of`]/[`join2`]/[`join3`]/
//! [`join4`]/[`first_of`] on top of the same primitives, rather than as
//! special cases baked into `node.rs`.
//!
//! Unhandled errors that reach every leaf of their subtree fall through to
//! the process-wide handler registered via [`register_default_error_handler`];
//! see the `default_handler` module.

mod abort_reason;
mod combinators;
mod default_handler;
mod diagnostics;
mod error;
mod node;
mod scheduler;
mod state;

pub use abort_reason::AbortReason;
pub use combinators::{all_of, first_of, join2, join3, join4};
pub use default_handler::{register_default_error_handler, reset_default_error_handler};
pub use error::DeferredError;
pub use node::Deferred;
pub use scheduler::{default_scheduler, LocalScheduler, Scheduler};

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn linear_chain_maps_in_order() {
        let sched = LocalScheduler::new();
        let d: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));
        let log = Rc::new(RefCell::new(Vec::new()));

        let log2 = log.clone();
        let doubled = d.then(move |v| Ok(v * 2));
        doubled.then(move |v| {
            log2.borrow_mut().push(v);
            Ok(v)
        });

        d.succeed(21);
        sched.run_until_idle();

        assert_eq!(*log.borrow(), vec![42]);
    }

    #[test]
    fn finally_registered_twice_is_rejected() {
        let d: Deferred<i32, String> = Deferred::new();
        assert!(d.at_last(|| {}).is_ok());
        assert!(matches!(
            d.at_last(|| {}),
            Err(DeferredError::FinallyAlreadySet)
        ));
    }
}
