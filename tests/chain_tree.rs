//! Integration tests for the chain-tree scenarios.
//!
//! Each test drives a `LocalScheduler` directly rather than depending on any
//! async runtime — there is no `async fn` surface in this crate to exercise.

use std::cell::RefCell;
use std::rc::Rc;

use deferred_tree::{
    all_of, first_of, join2, register_default_error_handler, reset_default_error_handler,
    AbortReason, Deferred, LocalScheduler,
};

fn new_pair<T: Clone + 'static, E: Clone + 'static>() -> (Deferred<T, E>, LocalScheduler) {
    let sched = LocalScheduler::new();
    let d = Deferred::new_with_scheduler(Rc::new(sched.clone()));
    (d, sched)
}

#[test]
fn linear_chain_succeeds_with_final_value() {
    let (d, sched): (Deferred<i32, String>, _) = new_pair();
    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();

    d.then(|x| Ok(x + 1)).then(move |x| {
        *result2.borrow_mut() = Some(x * 2);
        Ok(x)
    });

    d.succeed(3);
    sched.run_until_idle();

    assert_eq!(*result.borrow(), Some(8));
}

#[test]
fn unhandled_branch_falls_through_to_the_default_handler() {
    let (d, sched): (Deferred<i32, String>, _) = new_pair();

    let unhandled_branch: Deferred<i32, String> = d.then(|x| Ok(x));

    let default_seen = Rc::new(RefCell::new(None));
    let default_seen2 = default_seen.clone();
    register_default_error_handler(move |err| {
        if let Some(e) = err.downcast_ref::<String>() {
            *default_seen2.borrow_mut() = Some(e.clone());
        }
    });

    unhandled_branch.fail("e1".to_string());
    sched.run_until_idle();

    assert_eq!(*default_seen.borrow(), Some("e1".to_string()));

    reset_default_error_handler();
}

#[test]
fn or_if_error_on_a_sibling_branch_absorbs_its_own_failure() {
    let (d, sched): (Deferred<i32, String>, _) = new_pair();

    let seen = Rc::new(RefCell::new(None));
    let seen2 = seen.clone();
    let branch_b: Deferred<i32, String> = d.then(|x| Ok(x));
    branch_b.or_if_error(move |e: &String| {
        *seen2.borrow_mut() = Some(e.clone());
    });

    d.succeed(1);
    sched.run_until_idle();
    branch_b.fail("e2".to_string());
    sched.run_until_idle();

    assert_eq!(*seen.borrow(), Some("e2".to_string()));
}

#[test]
fn splice_with_inner_failure_absorbed_by_inner_own_handler() {
    let (d, sched): (Deferred<(), String>, _) = new_pair();
    let inner: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));
    inner.or_if_error(|_: &String| {});

    let child_ran = Rc::new(RefCell::new(false));
    let child_ran2 = child_ran.clone();
    let inner_for_chain = inner.clone();
    let chained = d.then_chain(move |_| Ok(inner_for_chain.clone()));
    chained.then(move |v| {
        *child_ran2.borrow_mut() = true;
        Ok(v)
    });

    inner.fail("boom".to_string());
    d.succeed(());
    sched.run_until_idle();

    assert!(!*child_ran.borrow());
    assert!(!chained.is_aborted());
}

#[test]
fn splice_identity_forwards_inner_success() {
    let (d, sched): (Deferred<(), String>, _) = new_pair();
    let inner: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));

    let observed = Rc::new(RefCell::new(None));
    let observed2 = observed.clone();
    let inner_for_chain = inner.clone();
    d.then_chain(move |_| Ok(inner_for_chain.clone()))
        .then(move |v| {
            *observed2.borrow_mut() = Some(v);
            Ok(v)
        });

    inner.succeed(99);
    d.succeed(());
    sched.run_until_idle();

    assert_eq!(*observed.borrow(), Some(99));
}

#[test]
fn all_of_aggregates_in_order_with_progress_and_partial_result() {
    let sched = LocalScheduler::new();
    let a: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));
    let b: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));

    let joined = all_of(vec![a.clone(), b.clone()]);
    let progress_log = Rc::new(RefCell::new(Vec::new()));
    let progress_log2 = progress_log.clone();
    joined.on_progress(move |done, out_of| {
        progress_log2.borrow_mut().push((done, out_of));
    });
    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    joined.then(move |values| {
        *result2.borrow_mut() = Some(values.clone());
        Ok(values)
    });

    a.succeed(1);
    sched.run_until_idle();
    b.succeed(2);
    sched.run_until_idle();

    assert_eq!(*result.borrow(), Some(vec![1, 2]));
    assert_eq!(*progress_log.borrow(), vec![(1, 2), (2, 2)]);
}

#[test]
fn all_of_fails_with_first_input_error() {
    let sched = LocalScheduler::new();
    let a: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));
    let b: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));

    let joined = all_of(vec![a.clone(), b.clone()]);
    let err = Rc::new(RefCell::new(None));
    let err2 = err.clone();
    joined.or_if_error(move |e: &String| {
        *err2.borrow_mut() = Some(e.clone());
    });

    a.fail("nope".to_string());
    sched.run_until_idle();
    b.succeed(2);
    sched.run_until_idle();

    assert_eq!(*err.borrow(), Some("nope".to_string()));
}

#[test]
fn first_of_resolves_with_the_winner_and_aborts_the_loser() {
    let sched = LocalScheduler::new();
    let slow: Deferred<&'static str, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));
    let fast: Deferred<&'static str, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));

    let slow_aborted = Rc::new(RefCell::new(false));
    let slow_aborted2 = slow_aborted.clone();
    slow.on_abort(move |_reason: &AbortReason| {
        *slow_aborted2.borrow_mut() = true;
    });

    let winner = first_of(vec![slow.clone(), fast.clone()]);
    let observed = Rc::new(RefCell::new(None));
    let observed2 = observed.clone();
    winner.then(move |v| {
        *observed2.borrow_mut() = Some(v);
        Ok(v)
    });

    fast.succeed("ok");
    sched.run_until_idle();

    assert_eq!(*observed.borrow(), Some("ok"));
    assert!(slow.is_aborted());
    assert!(*slow_aborted.borrow());
}

#[test]
fn join2_waits_for_both_heterogeneous_inputs() {
    let sched = LocalScheduler::new();
    let name: Deferred<String, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));
    let age: Deferred<i32, String> = Deferred::new_with_scheduler(Rc::new(sched.clone()));

    let joined = join2(name.clone(), age.clone());
    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    joined.then(move |pair| {
        *result2.borrow_mut() = Some(pair.clone());
        Ok(pair)
    });

    age.succeed(7);
    sched.run_until_idle();
    assert_eq!(*result.borrow(), None);

    name.succeed("amy".to_string());
    sched.run_until_idle();

    assert_eq!(*result.borrow(), Some(("amy".to_string(), 7)));
}

#[test]
fn abort_before_resolve_skips_callback_and_notifies_abort_listener() {
    let (d, sched): (Deferred<i32, String>, _) = new_pair();

    let called = Rc::new(RefCell::new(false));
    let called2 = called.clone();
    let child = d.then(move |x| {
        *called2.borrow_mut() = true;
        Ok(x)
    });

    let reason_seen = Rc::new(RefCell::new(false));
    let reason_seen2 = reason_seen.clone();
    child.on_abort(move |_reason: &AbortReason| {
        *reason_seen2.borrow_mut() = true;
    });

    d.abort(AbortReason::new("shutdown".to_string()));
    sched.run_until_idle();

    assert!(!*called.borrow());
    assert!(*reason_seen.borrow());
    assert!(child.is_aborted());
}

#[test]
fn abort_branch_from_deep_in_a_chain_aborts_the_whole_chain() {
    let (d, sched): (Deferred<i32, String>, _) = new_pair();

    // Build the single-successor chain off `d` first, while `d` still has
    // only one child — this is the case that matters, since the branch
    // pointer rearrangement below has to walk all the way down to `c3`.
    let c1 = d.then(|x| Ok(x));
    let c2 = c1.then(|x| Ok(x));
    let c3 = c2.then(|x| Ok(x));

    // Giving `d` a second child turns it into a branch point, which
    // triggers the rearrangement that points `c1`/`c2`/`c3`'s `branch`
    // pointers at `c1` itself.
    let sibling = d.then(|x| Ok(x));

    c3.abort_branch();
    sched.run_until_idle();

    assert!(c1.is_aborted());
    assert!(c2.is_aborted());
    assert!(c3.is_aborted());
    assert!(!d.is_aborted());
    assert!(!sibling.is_aborted());
}
