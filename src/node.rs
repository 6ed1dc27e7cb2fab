//! The `Deferred<T, E>` state machine and its chain-tree operations.
//!
//! Mirrors the hook-registry shape of the teacher's `hooks/mod.rs` (a
//! `Vec` of boxed listeners per event kind, drained and re-populated rather
//! than indexed in place) and the single-flag cancellation of its
//! `infra/abort_signal.rs`, adapted to a tree instead of one flat signal.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::abort_reason::AbortReason;
use crate::default_handler::invoke_default_handler;
use crate::diagnostics::invoke_guarded;
use crate::error::DeferredError;
use crate::scheduler::{default_scheduler, Scheduler};
use crate::state::{rearrange_branch_from, AbortTarget, LateEvent, Link, State};

pub(crate) struct Inner<T, E> {
    state: State<T, E>,
    links: Vec<Rc<dyn Link<T, E>>>,
    errback_fns: Vec<Box<dyn FnMut(&E)>>,
    abort_fns: Vec<Box<dyn FnMut(&AbortReason)>>,
    progress_fns: Vec<Box<dyn FnMut(u64, u64)>>,
    partial_fns: Vec<Box<dyn FnMut(&T)>>,
    finally_fn: Option<Box<dyn FnOnce()>>,
    finally_registered: bool,
    root: Option<Weak<dyn AbortTarget>>,
    branch: Option<Weak<dyn AbortTarget>>,
    progress_state: Option<(u64, u64)>,
    scheduler: Rc<dyn Scheduler>,
}

/// A single-resolution async value with a chain tree hanging off it.
///
/// Cheap to clone (an `Rc` bump) — every clone refers to the same node.
/// Not `Send`/`Sync`: the whole tree lives on one thread and is driven by
/// one [`crate::Scheduler`] (see `scheduler.rs`).
pub struct Deferred<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Deferred {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> AbortTarget for RefCell<Inner<T, E>> {
    fn abort_dyn(&self) {
        do_abort_on_cell(self, AbortReason::empty(), true);
    }

    fn child_count(&self) -> usize {
        self.borrow().links.len()
    }

    fn set_branch(&self, branch: Weak<dyn AbortTarget>) {
        self.borrow_mut().branch = Some(branch);
    }

    fn first_child_target(&self) -> Option<Weak<dyn AbortTarget>> {
        self.borrow().links.first().map(|l| l.child_abort_target())
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// Create a new pending Deferred driven by the thread-local default
    /// scheduler.
    pub fn new() -> Self {
        Self::new_pending(Rc::new(default_scheduler()))
    }

    /// Create a new pending Deferred driven by a specific scheduler — for
    /// hosts embedding this crate inside their own event loop.
    pub fn new_with_scheduler(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::new_pending(scheduler)
    }

    pub(crate) fn new_pending(scheduler: Rc<dyn Scheduler>) -> Self {
        let inner = Rc::new(RefCell::new(Inner {
            state: State::Pending,
            links: Vec::new(),
            errback_fns: Vec::new(),
            abort_fns: Vec::new(),
            progress_fns: Vec::new(),
            partial_fns: Vec::new(),
            finally_fn: None,
            finally_registered: false,
            root: None,
            branch: None,
            progress_state: None,
            scheduler,
        }));
        let d = Deferred { inner };
        let root_weak = d.self_abort_weak();
        let branch_weak = d.self_abort_weak();
        {
            let mut inner = d.inner.borrow_mut();
            inner.root = Some(root_weak);
            inner.branch = Some(branch_weak);
        }
        d
    }

    fn erased(&self) -> Rc<dyn AbortTarget> {
        self.inner.clone()
    }

    fn self_abort_weak(&self) -> Weak<dyn AbortTarget> {
        Rc::downgrade(&self.erased())
    }

    pub(crate) fn scheduler_handle(&self) -> Rc<dyn Scheduler> {
        self.inner.borrow().scheduler.clone()
    }

    fn set_root(&self, root: Weak<dyn AbortTarget>) {
        self.inner.borrow_mut().root = Some(root);
    }

    fn set_branch(&self, branch: Weak<dyn AbortTarget>) {
        self.inner.borrow_mut().branch = Some(branch);
    }

    // ---- resolution ----------------------------------------------------

    /// Resolve with a success value. No-op (silent) if already `Aborted`;
    /// no-op with a `tracing::warn!` if already settled any other way.
    pub fn succeed(&self, value: T) {
        let proceed = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_pending() {
                inner.state = State::Callbacked(value.clone());
                inner.root = None;
                inner.branch = None;
                true
            } else {
                if !inner.state.is_aborted() {
                    tracing::warn!("succeed() called on an already-resolved Deferred; ignoring");
                }
                false
            }
        };
        if proceed {
            self.run_callback_walk(value);
        }
    }

    /// Same entry point under the name the distilled source uses.
    pub fn callback(&self, value: T) {
        self.succeed(value);
    }

    /// Resolve with a failure value. No-op (silent) if already `Aborted`;
    /// no-op with a `tracing::warn!` if already settled any other way.
    pub fn fail(&self, err: E) {
        let proceed = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_pending() {
                inner.state = State::Errbacked(err.clone());
                inner.root = None;
                inner.branch = None;
                true
            } else {
                if !inner.state.is_aborted() {
                    tracing::warn!("fail() called on an already-resolved Deferred; ignoring");
                }
                false
            }
        };
        if proceed {
            self.spawn_errback_walk(err);
        }
    }

    pub fn errback(&self, err: E) {
        self.fail(err);
    }

    /// Used by tree propagation (not direct producer calls): silently no-op
    /// on any already-settled node, since skipping an aborted or otherwise
    /// resolved child mid-propagation is routine, not misuse.
    pub(crate) fn drive_success(&self, value: T) {
        let proceed = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_pending() {
                inner.state = State::Callbacked(value.clone());
                inner.root = None;
                inner.branch = None;
                true
            } else {
                false
            }
        };
        if proceed {
            self.run_callback_walk(value);
        }
    }

    pub(crate) fn drive_error(&self, err: E) -> Option<bool> {
        let proceed = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_pending() {
                inner.state = State::Errbacked(err.clone());
                inner.root = None;
                inner.branch = None;
                true
            } else {
                false
            }
        };
        if proceed {
            Some(self.errback_handled_walk(err))
        } else {
            None
        }
    }

    fn run_callback_walk(&self, value: T) {
        let this = self.clone();
        self.scheduler_handle().schedule(Box::new(move || {
            let snapshot_len = { this.inner.borrow().links.len() };
            for i in 0..snapshot_len {
                let link = { this.inner.borrow().links.get(i).cloned() };
                if let Some(link) = link {
                    if !link.is_aborted() {
                        link.run_callback(value.clone());
                    }
                }
            }
            this.fire_finally_if_set();
        }));
    }

    fn spawn_errback_walk(&self, err: E) {
        let this = self.clone();
        self.scheduler_handle().schedule(Box::new(move || {
            let handled = this.errback_handled_walk(err.clone());
            if !handled && !invoke_default_handler(&err as &dyn std::any::Any) {
                tracing::error!(
                    "error reached every leaf of its subtree with no handler and no \
                     process-wide default handler registered"
                );
            }
        }));
    }

    /// Local-then-children bubbling walk (steps 1-2 of the algorithm). Does
    /// not consult the default handler — that only happens once, at the
    /// node where `fail()` (or an unhandled callback panic, for
    /// combinators) originated, after this walk concludes.
    fn errback_handled_walk(&self, err: E) -> bool {
        let local_fns = { std::mem::take(&mut self.inner.borrow_mut().errback_fns) };
        let mut local_handled = false;
        for (i, mut f) in local_fns.into_iter().enumerate() {
            local_handled = true;
            let err_ref = err.clone();
            invoke_guarded(i, "or_if_error", move || f(&err_ref));
        }

        let handled = if local_handled {
            true
        } else {
            let snapshot_len = { self.inner.borrow().links.len() };
            let mut any_child = false;
            let mut all_handled = true;
            for i in 0..snapshot_len {
                let link = { self.inner.borrow().links.get(i).cloned() };
                if let Some(link) = link {
                    if let Some(child_handled) = link.run_errback(err.clone()) {
                        any_child = true;
                        if !child_handled {
                            all_handled = false;
                        }
                    }
                }
            }
            any_child && all_handled
        };

        self.fire_finally_if_set();
        handled
    }

    fn fire_finally_if_set(&self) {
        let f = { std::mem::take(&mut self.inner.borrow_mut().finally_fn) };
        if let Some(f) = f {
            invoke_guarded(0, "at_last", f);
        }
    }

    // ---- abort -----------------------------------------------------------

    /// Abort this node directly. No-op with a `tracing::warn!` if already
    /// settled (in any of the three ways).
    pub fn abort(&self, reason: AbortReason) {
        do_abort_on_cell(&self.inner, reason, true);
    }

    pub(crate) fn drive_abort(&self, reason: AbortReason) {
        do_abort_on_cell(&self.inner, reason, false);
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.borrow().state.is_aborted()
    }

    /// Abort the maximal single-successor chain this node belongs to,
    /// rather than the whole tree.
    pub fn abort_branch(&self) {
        let branch = { self.inner.borrow().branch.clone() };
        match branch.and_then(|w| w.upgrade()) {
            Some(target) => target.abort_dyn(),
            None => self.abort(AbortReason::empty()),
        }
    }

    /// Abort the whole tree from its root.
    pub fn abort_all(&self) {
        let root = { self.inner.borrow().root.clone() };
        match root.and_then(|w| w.upgrade()) {
            Some(target) => target.abort_dyn(),
            None => self.abort(AbortReason::empty()),
        }
    }

    // ---- listeners ---------------------------------------------------

    /// Register an error handler. Invoked (after a yield-to-loop step) with
    /// the recorded error if this node is already `Errbacked`; refused with
    /// a `tracing::warn!` if already `Aborted`; harmlessly dropped if
    /// already `Callbacked` (it will simply never fire).
    pub fn or_if_error<F: FnMut(&E) + 'static>(&self, f: F) {
        enum Action<E> {
            Store,
            Invoke(E),
            Drop,
        }
        let action = {
            let inner = self.inner.borrow();
            match &inner.state {
                State::Pending => Action::Store,
                State::Errbacked(e) => Action::Invoke(e.clone()),
                State::Aborted(_) => {
                    tracing::warn!("or_if_error() registered on an Aborted Deferred; refused");
                    Action::Drop
                }
                State::Callbacked(_) => Action::Drop,
            }
        };
        match action {
            Action::Store => self.inner.borrow_mut().errback_fns.push(Box::new(f)),
            Action::Invoke(err) => {
                let mut f = f;
                let scheduler = self.scheduler_handle();
                scheduler.schedule(Box::new(move || {
                    invoke_guarded(0, "or_if_error", move || f(&err));
                }));
            }
            Action::Drop => {}
        }
    }

    /// Register an abort listener. Invoked immediately (no yield) with the
    /// recorded reason if this node is already `Aborted`.
    pub fn on_abort<F: FnMut(&AbortReason) + 'static>(&self, f: F) {
        enum Action {
            Store,
            Invoke(AbortReason),
        }
        let action = {
            let inner = self.inner.borrow();
            match &inner.state {
                State::Aborted(r) => Action::Invoke(r.clone()),
                _ => Action::Store,
            }
        };
        match action {
            Action::Store => self.inner.borrow_mut().abort_fns.push(Box::new(f)),
            Action::Invoke(r) => {
                let mut f = f;
                invoke_guarded(0, "on_abort", move || f(&r));
            }
        }
    }

    /// Register a progress listener. If a prior `progress()` tuple exists
    /// it is replayed immediately (no yield); the listener also stays
    /// registered for future broadcasts. Refused with a `tracing::warn!` if
    /// already `Aborted`.
    pub fn on_progress<F: FnMut(u64, u64) + 'static>(&self, f: F) {
        if self.inner.borrow().state.is_aborted() {
            tracing::warn!("on_progress() registered on an Aborted Deferred; refused");
            return;
        }
        let existing = { self.inner.borrow().progress_state };
        let idx = {
            let mut inner = self.inner.borrow_mut();
            inner.progress_fns.push(Box::new(f));
            inner.progress_fns.len() - 1
        };
        if let Some((done, out_of)) = existing {
            let inner_rc = self.inner.clone();
            invoke_guarded(idx, "on_progress", move || {
                let mut inner = inner_rc.borrow_mut();
                if let Some(cb) = inner.progress_fns.get_mut(idx) {
                    cb(done, out_of);
                }
            });
        }
    }

    /// Broadcast a progress tuple to every registered listener. Refused
    /// with a `tracing::warn!` if already `Aborted`.
    pub fn progress(&self, done: u64, out_of: u64) {
        let can = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_aborted() {
                false
            } else {
                inner.progress_state = Some((done, out_of));
                true
            }
        };
        if !can {
            tracing::warn!("progress() called on an Aborted Deferred; ignoring");
            return;
        }
        let inner_rc = self.inner.clone();
        let len = { inner_rc.borrow().progress_fns.len() };
        for i in 0..len {
            let inner_rc = inner_rc.clone();
            invoke_guarded(i, "progress", move || {
                let mut inner = inner_rc.borrow_mut();
                if let Some(cb) = inner.progress_fns.get_mut(i) {
                    cb(done, out_of);
                }
            });
        }
    }

    /// Register a partial-result listener. Partial values are a one-shot
    /// broadcast, not remembered, so there is no immediate replay here.
    /// Refused with a `tracing::warn!` if already `Aborted`.
    pub fn on_partial_result<F: FnMut(&T) + 'static>(&self, f: F) {
        if self.inner.borrow().state.is_aborted() {
            tracing::warn!("on_partial_result() registered on an Aborted Deferred; refused");
            return;
        }
        self.inner.borrow_mut().partial_fns.push(Box::new(f));
    }

    /// Broadcast a partial value to every registered listener. Refused with
    /// a `tracing::warn!` if already `Aborted`.
    pub fn partial_result(&self, value: T) {
        if self.inner.borrow().state.is_aborted() {
            tracing::warn!("partial_result() called on an Aborted Deferred; ignoring");
            return;
        }
        let inner_rc = self.inner.clone();
        let len = { inner_rc.borrow().partial_fns.len() };
        for i in 0..len {
            let value = value.clone();
            let inner_rc = inner_rc.clone();
            invoke_guarded(i, "partial_result", move || {
                let mut inner = inner_rc.borrow_mut();
                if let Some(cb) = inner.partial_fns.get_mut(i) {
                    cb(&value);
                }
            });
        }
    }

    /// Register the single finally hook. Fires exactly once, on
    /// `Callbacked` or `Errbacked` — never on `Aborted`. A second
    /// registration (at any time, including after the node has already
    /// settled) is rejected with [`DeferredError::FinallyAlreadySet`].
    pub fn at_last<F: FnOnce() + 'static>(&self, f: F) -> Result<(), DeferredError> {
        let mut inner = self.inner.borrow_mut();
        if inner.finally_registered {
            return Err(DeferredError::FinallyAlreadySet);
        }
        inner.finally_registered = true;
        match &inner.state {
            State::Pending => {
                inner.finally_fn = Some(Box::new(f));
                Ok(())
            }
            State::Callbacked(_) | State::Errbacked(_) => {
                drop(inner);
                invoke_guarded(0, "at_last", f);
                Ok(())
            }
            // Never fires; the registration is still accepted and consumes
            // the one-shot slot, matching finally's documented scope.
            State::Aborted(_) => Ok(()),
        }
    }

    pub fn finally<F: FnOnce() + 'static>(&self, f: F) -> Result<(), DeferredError> {
        self.at_last(f)
    }

    // ---- chain tree ----------------------------------------------------

    /// Register a success continuation whose callback returns a plain
    /// value, or fails the next link with `E` in place of returning one.
    /// Returns a new child `Deferred<U, E>`.
    ///
    /// A callback that fails synchronously transitions its child straight
    /// to Errbacked, exactly as if the child's own `fail` had been called
    /// (see SPEC_FULL.md §4.2 — a success callback's failure is a first-class
    /// user error, not a Rust panic, since there is no general way to
    /// recover a typed `E` from an arbitrary unwind payload).
    pub fn then<U, F>(&self, f: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnMut(T) -> Result<U, E> + 'static,
    {
        let child = Deferred::new_pending(self.scheduler_handle());
        let link: Rc<dyn Link<T, E>> = Rc::new(MapLink {
            f: RefCell::new(f),
            child: child.clone(),
            _marker: std::marker::PhantomData,
        });
        self.add_link(link, &child);
        child
    }

    /// The splicing form: the callback returns another `Deferred<U, E>`,
    /// which is wired into the returned child instead of being treated as
    /// an ordinary value (see `SpliceLink`) — or fails the next link with
    /// `E` directly, same as `then`.
    pub fn then_chain<U, F>(&self, f: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnMut(T) -> Result<Deferred<U, E>, E> + 'static,
    {
        let child = Deferred::new_pending(self.scheduler_handle());
        let link: Rc<dyn Link<T, E>> = Rc::new(ChainLink {
            f: RefCell::new(f),
            child: child.clone(),
            _marker: std::marker::PhantomData,
        });
        self.add_link(link, &child);
        child
    }

    /// Push `link` onto this node's children, running branch rearrangement
    /// if it just became a branch point and scheduling late attachment if
    /// this node has already settled. Returns the root/branch this node
    /// would hand to a *new* downstream child of `link` — `None` for
    /// branch means "start a fresh branch of your own", which is what
    /// `then`/`then_chain` do; the splice path (`add_link_for_splice`)
    /// ignores both, since its downstream child already has root/branch
    /// from the original chain it was created on (see `ChainLink`).
    fn attach_link(
        &self,
        link: Rc<dyn Link<T, E>>,
    ) -> (Option<Weak<dyn AbortTarget>>, Option<Weak<dyn AbortTarget>>) {
        let (root_weak, branch_for_child, became_branch_point, late_event) = {
            let mut inner = self.inner.borrow_mut();
            let was_first = inner.links.is_empty();
            inner.links.push(link.clone());
            let became_branch_point = inner.links.len() == 2;
            let root_weak = inner.root.clone();
            let branch_for_child = if was_first { inner.branch.clone() } else { None };
            let late_event = match &inner.state {
                State::Pending => None,
                State::Callbacked(v) => Some(LateEvent::Success(v.clone())),
                State::Errbacked(e) => Some(LateEvent::Error(e.clone())),
                State::Aborted(r) => Some(LateEvent::Abort(r.clone())),
            };
            (root_weak, branch_for_child, became_branch_point, late_event)
        };

        if became_branch_point {
            let first_link = { self.inner.borrow().links.first().cloned() };
            if let Some(first_link) = first_link {
                if let Some(first_target) = first_link.child_abort_target().upgrade() {
                    rearrange_branch_from(first_target);
                }
            }
        }

        if let Some(event) = late_event {
            let scheduler = self.scheduler_handle();
            scheduler.schedule(Box::new(move || match event {
                LateEvent::Success(v) => link.run_callback(v),
                LateEvent::Error(e) => {
                    link.run_errback(e);
                }
                LateEvent::Abort(r) => link.propagate_abort(r),
            }));
        }

        (root_weak, branch_for_child)
    }

    fn add_link<U: Clone + 'static>(&self, link: Rc<dyn Link<T, E>>, child: &Deferred<U, E>) {
        let (root, branch) = self.attach_link(link);
        if let Some(root) = root {
            child.set_root(root);
        }
        match branch {
            Some(branch) => child.set_branch(branch),
            None => child.set_branch(child.self_abort_weak()),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

fn do_abort_on_cell<T: Clone + 'static, E: Clone + 'static>(
    cell: &RefCell<Inner<T, E>>,
    reason: AbortReason,
    warn_on_terminal: bool,
) {
    let proceed = {
        let mut inner = cell.borrow_mut();
        if inner.state.is_pending() {
            inner.state = State::Aborted(reason.clone());
            inner.root = None;
            inner.branch = None;
            true
        } else {
            if warn_on_terminal {
                tracing::warn!("abort() called on an already-settled Deferred; ignoring");
            }
            false
        }
    };
    if !proceed {
        return;
    }

    // Abort listeners and the cascade into children both run synchronously
    // within abort() — unlike succeed/fail, abort has no mandatory yield
    // point (see SPEC_FULL.md §5).
    let fns = { std::mem::take(&mut cell.borrow_mut().abort_fns) };
    for (i, mut f) in fns.into_iter().enumerate() {
        let r = reason.clone();
        invoke_guarded(i, "on_abort", move || f(&r));
    }

    let snapshot_len = { cell.borrow().links.len() };
    for i in 0..snapshot_len {
        let link = { cell.borrow().links.get(i).cloned() };
        if let Some(link) = link {
            link.propagate_abort(reason.clone());
        }
    }
}

// ---- Link implementations ----------------------------------------------

struct MapLink<T, U, E, F> {
    f: RefCell<F>,
    child: Deferred<U, E>,
    #[allow(clippy::type_complexity)]
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T, U, E, F> Link<T, E> for MapLink<T, U, E, F>
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
    F: FnMut(T) -> Result<U, E>,
{
    fn run_callback(&self, value: T) {
        match (self.f.borrow_mut())(value) {
            Ok(out) => self.child.drive_success(out),
            Err(err) => self.child.fail(err),
        }
    }

    fn run_errback(&self, err: E) -> Option<bool> {
        self.child.drive_error(err)
    }

    fn propagate_abort(&self, reason: AbortReason) {
        self.child.drive_abort(reason);
    }

    fn is_aborted(&self) -> bool {
        self.child.is_aborted()
    }

    fn child_abort_target(&self) -> Weak<dyn AbortTarget> {
        self.child.self_abort_weak()
    }
}

struct ChainLink<T, U, E, F> {
    f: RefCell<F>,
    child: Deferred<U, E>,
    #[allow(clippy::type_complexity)]
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T, U, E, F> Link<T, E> for ChainLink<T, U, E, F>
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
    F: FnMut(T) -> Result<Deferred<U, E>, E>,
{
    fn run_callback(&self, value: T) {
        match (self.f.borrow_mut())(value) {
            Ok(inner) => {
                // Splice: register the child as a genuine child-link of
                // `inner` so the ordinary error-bubbling walk decides
                // whether `inner`'s error (if any) reaches `child` — if
                // `inner` has its own local handler, that handler absorbs
                // the error and the splice link is simply never invoked,
                // with no bespoke logic required here.
                let splice: Rc<dyn Link<U, E>> = Rc::new(SpliceLink {
                    child: self.child.clone(),
                });
                inner.add_link_for_splice(splice);
            }
            Err(err) => self.child.fail(err),
        }
    }

    fn run_errback(&self, err: E) -> Option<bool> {
        self.child.drive_error(err)
    }

    fn propagate_abort(&self, reason: AbortReason) {
        self.child.drive_abort(reason);
    }

    fn is_aborted(&self) -> bool {
        self.child.is_aborted()
    }

    fn child_abort_target(&self) -> Weak<dyn AbortTarget> {
        self.child.self_abort_weak()
    }
}

struct SpliceLink<U, E> {
    child: Deferred<U, E>,
}

impl<U: Clone + 'static, E: Clone + 'static> Link<U, E> for SpliceLink<U, E> {
    fn run_callback(&self, value: U) {
        self.child.drive_success(value);
    }

    fn run_errback(&self, err: E) -> Option<bool> {
        self.child.drive_error(err)
    }

    fn propagate_abort(&self, reason: AbortReason) {
        self.child.drive_abort(reason);
    }

    fn is_aborted(&self) -> bool {
        self.child.is_aborted()
    }

    fn child_abort_target(&self) -> Weak<dyn AbortTarget> {
        self.child.self_abort_weak()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// Internal: attach an already-built link as a genuine child of `self`,
    /// going through the same branch-rearrangement/late-attachment path as
    /// `then`/`then_chain`, but without touching the downstream child's
    /// root/branch — it already has them from the original chain it was
    /// created on, and splicing only grafts value/error propagation onto
    /// it, not abort scoping.
    fn add_link_for_splice(&self, link: Rc<dyn Link<T, E>>) {
        let _ = self.attach_link(link);
    }
}
