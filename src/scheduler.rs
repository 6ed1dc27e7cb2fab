//! The "yield to the next tick of the host event loop" contract.
//!
//! A Deferred never propagates synchronously from `succeed`/`fail`/`abort`
//! or from a late `then`/`or_if_error` registration — it posts the
//! propagation step onto a [`Scheduler`] and returns immediately, so that a
//! producer which resolves a Deferred and returns it still gives the
//! consumer a chance to attach `then`/`or_if_error`/`on_abort` before
//! anything runs (§5 of the design notes).
//!
//! This crate does not own a real event loop — there is no host to borrow
//! one from in a standalone library — so it ships a minimal FIFO microtask
//! queue, [`LocalScheduler`], as the default. A host embedding this crate
//! inside its own loop (a GUI event loop, an async runtime's task queue,
//! whatever) can implement [`Scheduler`] itself and post into that loop
//! instead; nothing else in this crate depends on the concrete scheduler.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Posts a closure to run after the current call stack unwinds.
///
/// Implementations are not required to be thread-safe — Deferred trees are
/// single-threaded by construction (they are built on `Rc`/`RefCell`), so a
/// `Scheduler` only ever needs to serve the thread it was created on.
pub trait Scheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>);
}

/// Default [`Scheduler`]: a thread-local FIFO queue of pending microtasks.
///
/// Call [`LocalScheduler::run_until_idle`] to drain it — this is the stand-in
/// for "the host event loop runs a tick". Tests drive it directly; a real
/// host would call it once per loop iteration (or drive it via its own
/// `Scheduler` impl instead of using `LocalScheduler` at all).
#[derive(Clone, Default)]
pub struct LocalScheduler {
    queue: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every currently-queued task, plus any tasks those tasks
    /// themselves enqueue, until the queue is empty.
    pub fn run_until_idle(&self) {
        loop {
            let task = self.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Run a single queued task, if any. Returns `false` if the queue was
    /// empty. Useful for tests that want to assert on ordering step by step.
    pub fn run_one(&self) -> bool {
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Scheduler for LocalScheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back(task);
    }
}

thread_local! {
    static DEFAULT_SCHEDULER: LocalScheduler = LocalScheduler::new();
}

/// The process-wide (thread-local, really) default scheduler used by
/// [`crate::Deferred`] when no explicit scheduler is threaded through.
///
/// Exposed so tests and hosts can call [`LocalScheduler::run_until_idle`] on
/// the same queue that `Deferred` posts to.
pub fn default_scheduler() -> LocalScheduler {
    DEFAULT_SCHEDULER.with(|s| s.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_until_idle_drains_nested_tasks() {
        let sched = LocalScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log2 = log.clone();
        let sched2 = sched.clone();
        sched.schedule(Box::new(move || {
            log2.borrow_mut().push(1);
            let log3 = log2.clone();
            sched2.schedule(Box::new(move || log3.borrow_mut().push(2)));
        }));

        assert!(!sched.is_idle());
        sched.run_until_idle();
        assert!(sched.is_idle());
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn run_one_steps_through_queue() {
        let sched = LocalScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            sched.schedule(Box::new(move || log.borrow_mut().push(i)));
        }

        assert_eq!(sched.pending_count(), 3);
        assert!(sched.run_one());
        assert_eq!(*log.borrow(), vec![0]);
        assert!(sched.run_one());
        assert!(sched.run_one());
        assert!(!sched.run_one());
    }
}
