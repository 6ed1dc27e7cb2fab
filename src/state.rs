//! Tree-shaped plumbing shared by every `Deferred<T, E>` instantiation.
//!
//! Two type-erasure seams make the chain tree possible in a statically typed
//! language: [`Link`] hides a child's own success type from its parent (a
//! node's children can all have different `U`), and [`AbortTarget`] hides a
//! node's entire `T`/`E` pair behind `root`/`branch` back-pointers, since
//! `abort_branch`/`abort_all` must be able to reach an ancestor whose types
//! have nothing to do with the node the call was made on.

use std::rc::{Rc, Weak};

use crate::abort_reason::AbortReason;

/// One terminal outcome, recorded at most once per node.
pub(crate) enum State<T, E> {
    Pending,
    Callbacked(T),
    Errbacked(E),
    Aborted(AbortReason),
}

impl<T, E> State<T, E> {
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        matches!(self, State::Aborted(_))
    }
}

/// An edge from a parent node to one of its children, with the child's own
/// success type `U` erased.
///
/// Implementations (`MapLink`, `ChainLink`, `SpliceLink` in `node.rs`) each
/// close over a concrete child `Deferred<U, E>` and drive it; the parent
/// only ever sees this trait object, so a node's `links: Vec<Rc<dyn
/// Link<T, E>>>` can hold children of unrelated `U`.
pub(crate) trait Link<T, E> {
    /// Deliver a success value down this edge. Must not be called if
    /// `is_aborted()` — the caller is expected to check first, since the
    /// callback itself (not just its result) must be skipped for an
    /// already-aborted child.
    fn run_callback(&self, value: T);

    /// Deliver an error down this edge. Returns `None` if the child was not
    /// `Pending` (already terminal, most commonly already `Aborted`) — such
    /// children are excluded entirely from the parent's handled-by-all-
    /// children computation rather than counted as unhandled. Returns
    /// `Some(handled)` otherwise.
    fn run_errback(&self, err: E) -> Option<bool>;

    /// Cascade an abort down this edge.
    fn propagate_abort(&self, reason: AbortReason);

    fn is_aborted(&self) -> bool;

    /// Type-erased handle to the child this link targets, used only for
    /// branch rearrangement (see [`rearrange_branch_from`]).
    fn child_abort_target(&self) -> Weak<dyn AbortTarget>;
}

/// Type-erased handle to a node's root/branch back-pointer target.
///
/// `abort_branch()`/`abort_all()` resolve a `Weak<dyn AbortTarget>` and call
/// `abort_dyn()` on whatever they find, without ever needing to know that
/// ancestor's `T`/`E`. The other three methods exist only to support branch
/// rearrangement, which is likewise type-erased since the first child of a
/// newly-created branch point may have a completely different `U` than the
/// child just being added.
pub(crate) trait AbortTarget {
    fn abort_dyn(&self);
    fn child_count(&self) -> usize;
    fn set_branch(&self, branch: Weak<dyn AbortTarget>);
    fn first_child_target(&self) -> Option<Weak<dyn AbortTarget>>;
}

/// What to do with a listener attached to a node that has already settled.
pub(crate) enum LateEvent<T, E> {
    Success(T),
    Error(E),
    Abort(AbortReason),
}

/// Restore the "every maximal single-successor chain hangs its branch
/// pointer off its own head" invariant after a node gains a second child.
///
/// Walks from `first` (the pre-existing first child of the node that just
/// became a branch point) down through each single-child descendant,
/// pointing every visited node's `branch` at `first` itself — the head of
/// the chain, not the visited node — since `abort_branch()` called from
/// anywhere in the chain must reach and abort the whole chain from its
/// head down. Stops — without recursing further, though the node it stops
/// on is still updated — as soon as it reaches a node with zero or more
/// than one child, since that node is either a leaf or already its own
/// branch point.
pub(crate) fn rearrange_branch_from(first: Rc<dyn AbortTarget>) {
    let head = Rc::downgrade(&first);
    let mut current = first;
    loop {
        current.set_branch(head.clone());
        if current.child_count() != 1 {
            break;
        }
        match current.first_child_target().and_then(|w| w.upgrade()) {
            Some(next) => current = next,
            None => break,
        }
    }
}
