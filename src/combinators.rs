//! All-join and first-wins combinators over multiple `Deferred`s.
//!
//! `all_of` follows the same "register a success/error pair per input,
//! fold into shared state behind an `Rc<RefCell<_>>`" shape the tuple-join
//! helper in the `eventual` reference crate uses for its heterogeneous
//! `join((f1, f2))`; here the homogeneous case takes a `Vec` and the fixed
//! arities (`join2`/`join3`/`join4`) are the heterogeneous counterpart.

use std::cell::RefCell;
use std::rc::Rc;

use crate::node::Deferred;
use crate::scheduler::{default_scheduler, Scheduler};

struct AllJoinState<T> {
    slots: Vec<Option<T>>,
    completed: usize,
    failed: bool,
}

/// Wait for every input to succeed, collecting values in input order.
///
/// Resolves with `Vec<T>` once every input has succeeded; fails with the
/// first input's error (subsequent failures are suppressed) — other
/// inputs are **not** aborted on failure, since a failing sibling does not
/// imply the others are no longer wanted (compare `first_of`, which does
/// abort losers, but only on a *success*).
///
/// Broadcasts `progress(k, N)` after the k-th input settles successfully,
/// and a `partial_result` preview after each success containing every
/// value completed so far, in input order (gaps for still-pending inputs
/// are simply omitted rather than positionally padded, since the partial
/// channel shares `Vec<T>`'s own element type rather than `Vec<Option<T>>`).
///
/// An empty input vector resolves immediately with an empty vector.
pub fn all_of<T, E>(inputs: Vec<Deferred<T, E>>) -> Deferred<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let n = inputs.len();
    let scheduler = pick_scheduler(inputs.first().map(|d| d.scheduler_handle()));
    let joined: Deferred<Vec<T>, E> = Deferred::new_with_scheduler(scheduler);

    if n == 0 {
        joined.succeed(Vec::new());
        return joined;
    }

    let state = Rc::new(RefCell::new(AllJoinState::<T> {
        slots: vec![None; n],
        completed: 0,
        failed: false,
    }));

    for (i, input) in inputs.into_iter().enumerate() {
        let state_ok = state.clone();
        let joined_ok = joined.clone();
        let total = n;
        let _ = input.then(move |value: T| -> Result<(), E> {
            let mut st = state_ok.borrow_mut();
            if st.failed {
                return Ok(());
            }
            st.slots[i] = Some(value);
            st.completed += 1;
            let completed = st.completed;
            let preview: Vec<T> = st.slots.iter().cloned().flatten().collect();
            if completed == total {
                let finished: Vec<T> = st.slots.iter().cloned().map(|v| {
                    v.expect("all slots are Some once completed == total")
                }).collect();
                drop(st);
                joined_ok.partial_result(preview);
                joined_ok.progress(completed as u64, total as u64);
                joined_ok.succeed(finished);
            } else {
                drop(st);
                joined_ok.partial_result(preview);
                joined_ok.progress(completed as u64, total as u64);
            }
            Ok(())
        });

        let state_err = state.clone();
        let joined_err = joined.clone();
        input.or_if_error(move |err: &E| {
            let mut st = state_err.borrow_mut();
            if st.failed {
                return;
            }
            st.failed = true;
            drop(st);
            joined_err.fail(err.clone());
        });
    }

    joined
}

/// Wait for two inputs of possibly different types, resolving with both
/// values as a tuple once both succeed.
pub fn join2<T1, T2, E>(a: Deferred<T1, E>, b: Deferred<T2, E>) -> Deferred<(T1, T2), E>
where
    T1: Clone + 'static,
    T2: Clone + 'static,
    E: Clone + 'static,
{
    let scheduler = pick_scheduler(Some(a.scheduler_handle()));
    let joined: Deferred<(T1, T2), E> = Deferred::new_with_scheduler(scheduler);
    let slots = Rc::new(RefCell::new((None::<T1>, None::<T2>, false)));

    macro_rules! wire {
        ($input:expr, $idx:tt) => {{
            let slots_ok = slots.clone();
            let joined_ok = joined.clone();
            let _ = $input.then(move |value| -> Result<(), E> {
                let mut st = slots_ok.borrow_mut();
                if st.2 {
                    return Ok(());
                }
                st.$idx = Some(value);
                if let (Some(x), Some(y)) = (st.0.clone(), st.1.clone()) {
                    st.2 = true;
                    drop(st);
                    joined_ok.succeed((x, y));
                }
                Ok(())
            });
            let slots_err = slots.clone();
            let joined_err = joined.clone();
            $input.or_if_error(move |err: &E| {
                let mut st = slots_err.borrow_mut();
                if st.2 {
                    return;
                }
                st.2 = true;
                drop(st);
                joined_err.fail(err.clone());
            });
        }};
    }

    wire!(a, 0);
    wire!(b, 1);

    joined
}

/// Wait for three inputs of possibly different types.
pub fn join3<T1, T2, T3, E>(
    a: Deferred<T1, E>,
    b: Deferred<T2, E>,
    c: Deferred<T3, E>,
) -> Deferred<(T1, T2, T3), E>
where
    T1: Clone + 'static,
    T2: Clone + 'static,
    T3: Clone + 'static,
    E: Clone + 'static,
{
    let scheduler = pick_scheduler(Some(a.scheduler_handle()));
    let joined: Deferred<(T1, T2, T3), E> = Deferred::new_with_scheduler(scheduler);
    let slots = Rc::new(RefCell::new((None::<T1>, None::<T2>, None::<T3>, false)));

    macro_rules! wire {
        ($input:expr, $idx:tt) => {{
            let slots_ok = slots.clone();
            let joined_ok = joined.clone();
            let _ = $input.then(move |value| -> Result<(), E> {
                let mut st = slots_ok.borrow_mut();
                if st.3 {
                    return Ok(());
                }
                st.$idx = Some(value);
                if let (Some(x), Some(y), Some(z)) = (st.0.clone(), st.1.clone(), st.2.clone()) {
                    st.3 = true;
                    drop(st);
                    joined_ok.succeed((x, y, z));
                }
                Ok(())
            });
            let slots_err = slots.clone();
            let joined_err = joined.clone();
            $input.or_if_error(move |err: &E| {
                let mut st = slots_err.borrow_mut();
                if st.3 {
                    return;
                }
                st.3 = true;
                drop(st);
                joined_err.fail(err.clone());
            });
        }};
    }

    wire!(a, 0);
    wire!(b, 1);
    wire!(c, 2);

    joined
}

/// Wait for four inputs of possibly different types.
pub fn join4<T1, T2, T3, T4, E>(
    a: Deferred<T1, E>,
    b: Deferred<T2, E>,
    c: Deferred<T3, E>,
    d: Deferred<T4, E>,
) -> Deferred<(T1, T2, T3, T4), E>
where
    T1: Clone + 'static,
    T2: Clone + 'static,
    T3: Clone + 'static,
    T4: Clone + 'static,
    E: Clone + 'static,
{
    let scheduler = pick_scheduler(Some(a.scheduler_handle()));
    let joined: Deferred<(T1, T2, T3, T4), E> = Deferred::new_with_scheduler(scheduler);
    let slots = Rc::new(RefCell::new((
        None::<T1>,
        None::<T2>,
        None::<T3>,
        None::<T4>,
        false,
    )));

    macro_rules! wire {
        ($input:expr, $idx:tt) => {{
            let slots_ok = slots.clone();
            let joined_ok = joined.clone();
            let _ = $input.then(move |value| -> Result<(), E> {
                let mut st = slots_ok.borrow_mut();
                if st.4 {
                    return Ok(());
                }
                st.$idx = Some(value);
                if let (Some(w), Some(x), Some(y), Some(z)) =
                    (st.0.clone(), st.1.clone(), st.2.clone(), st.3.clone())
                {
                    st.4 = true;
                    drop(st);
                    joined_ok.succeed((w, x, y, z));
                }
                Ok(())
            });
            let slots_err = slots.clone();
            let joined_err = joined.clone();
            $input.or_if_error(move |err: &E| {
                let mut st = slots_err.borrow_mut();
                if st.4 {
                    return;
                }
                st.4 = true;
                drop(st);
                joined_err.fail(err.clone());
            });
        }};
    }

    wire!(a, 0);
    wire!(b, 1);
    wire!(c, 2);
    wire!(d, 3);

    joined
}

/// Resolve with whichever input settles first.
///
/// On the first success, aborts every other input and resolves with that
/// value. On the first failure (provided no success has happened yet),
/// resolves with that failure; subsequent settlements of either kind are
/// suppressed. Every input gets an `or_if_error` registered as part of the
/// race itself, so a loser that fails on its own before being aborted
/// never reports an unhandled error.
///
/// An empty input vector never resolves — there is no "first" of nothing.
pub fn first_of<T, E>(inputs: Vec<Deferred<T, E>>) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let scheduler = pick_scheduler(inputs.first().map(|d| d.scheduler_handle()));
    let winner: Deferred<T, E> = Deferred::new_with_scheduler(scheduler);
    let settled = Rc::new(RefCell::new(false));

    let all_inputs = inputs;
    for (i, input) in all_inputs.iter().enumerate() {
        let settled_ok = settled.clone();
        let winner_ok = winner.clone();
        let siblings: Vec<Deferred<T, E>> = all_inputs
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, d)| d.clone())
            .collect();
        let _ = input.then(move |value: T| -> Result<(), E> {
            let mut s = settled_ok.borrow_mut();
            if *s {
                return Ok(());
            }
            *s = true;
            drop(s);
            for sibling in &siblings {
                sibling.abort(crate::abort_reason::AbortReason::empty());
            }
            winner_ok.succeed(value);
            Ok(())
        });

        let settled_err = settled.clone();
        let winner_err = winner.clone();
        input.or_if_error(move |err: &E| {
            let mut s = settled_err.borrow_mut();
            if *s {
                return;
            }
            *s = true;
            drop(s);
            winner_err.fail(err.clone());
        });
    }

    winner
}

fn pick_scheduler(existing: Option<Rc<dyn Scheduler>>) -> Rc<dyn Scheduler> {
    existing.unwrap_or_else(|| Rc::new(default_scheduler()))
}
