//! End-to-end scenarios exercising the pull/push interplay across node
//! kinds, rather than any single node's unit behavior.

use std::cell::Cell as StdCell;
use std::rc::Rc;

use reactive_graph::{Cell, Formula, Subscription};

fn counter() -> (Rc<StdCell<u32>>, impl Fn()) {
    let count = Rc::new(StdCell::new(0));
    let count_clone = count.clone();
    (count, move || count_clone.set(count_clone.get() + 1))
}

#[test]
fn diamond_shaped_dependency_evaluates_the_shared_node_once_per_read() {
    let (x_evals, bump_x) = counter();
    let source = Cell::new(1);

    let source_for_x = source.clone();
    let x: Rc<Formula<i32, String>> = Formula::new(move || {
        bump_x();
        Ok(source_for_x.read_inside_formula().unwrap())
    });

    let x_for_b = x.clone();
    let b: Rc<Formula<i32, String>> =
        Formula::new(move || Ok(x_for_b.read_inside_formula().unwrap() + 10));

    let x_for_c = x.clone();
    let c: Rc<Formula<i32, String>> =
        Formula::new(move || Ok(x_for_c.read_inside_formula().unwrap() + 100));

    let b_for_d = b.clone();
    let c_for_d = c.clone();
    let d: Rc<Formula<i32, String>> = Formula::new(move || {
        Ok(b_for_d.read_inside_formula().unwrap() + c_for_d.read_inside_formula().unwrap())
    });

    assert_eq!(d.read_without_listening(), Ok(112));
    assert_eq!(x_evals.get(), 1, "x must be validated once despite two paths reaching it");

    source.set(2).unwrap();
    assert_eq!(d.read_without_listening(), Ok(114));
    assert_eq!(x_evals.get(), 2, "a genuine upstream change still re-evaluates x exactly once");
}

#[test]
fn branching_dependency_set_drops_the_unused_branch() {
    let take_left = Cell::new(true);
    let left = Cell::new(1);
    let right = Cell::new(100);

    let take_left_for_formula = take_left.clone();
    let left_for_formula = left.clone();
    let right_for_formula = right.clone();
    let formula: Rc<Formula<i32, String>> = Formula::new(move || {
        if take_left_for_formula.read_inside_formula().unwrap() {
            Ok(left_for_formula.read_inside_formula().unwrap())
        } else {
            Ok(right_for_formula.read_inside_formula().unwrap())
        }
    });

    assert_eq!(formula.read_without_listening(), Ok(1));

    take_left.set(false).unwrap();
    assert_eq!(formula.read_without_listening(), Ok(100));

    // `left` is no longer in the dependency set: changing it must not be
    // observable through `formula` until (if ever) the branch flips back.
    left.set(999).unwrap();
    assert_eq!(formula.read_without_listening(), Ok(100));

    take_left.set(true).unwrap();
    assert_eq!(formula.read_without_listening(), Ok(999));
}

#[test]
fn skip_on_equal_cascades_through_a_formula_chain() {
    let (evals, bump) = counter();
    let source = Cell::new(10);

    let source_for_parity = source.clone();
    let parity: Rc<Formula<&'static str, String>> = Formula::new(move || {
        bump();
        Ok(if source_for_parity.read_inside_formula().unwrap() % 2 == 0 {
            "even"
        } else {
            "odd"
        })
    });

    let parity_for_label = parity.clone();
    let label: Rc<Formula<String, String>> =
        Formula::new(move || Ok(format!("it's {}", parity_for_label.read_inside_formula().unwrap())));

    assert_eq!(label.read_without_listening().unwrap(), "it's even");
    assert_eq!(evals.get(), 1);

    // 12 is still even: `parity`'s completion is unchanged, so `label` is
    // never even asked to recompute.
    source.set(12).unwrap();
    assert_eq!(label.read_without_listening().unwrap(), "it's even");
    assert_eq!(evals.get(), 2, "parity itself still re-evaluates to check the outcome");

    source.set(13).unwrap();
    assert_eq!(label.read_without_listening().unwrap(), "it's odd");
    assert_eq!(evals.get(), 3);
}

#[test]
fn unlistened_subscription_polls_but_listened_subscription_relies_on_push() {
    let (polls, bump_polls) = counter();
    let value = Rc::new(StdCell::new(1));
    let upstream_listener: Rc<std::cell::RefCell<Option<Rc<dyn Fn()>>>> =
        Rc::new(std::cell::RefCell::new(None));

    let value_for_get = value.clone();
    let listener_for_add = upstream_listener.clone();
    let listener_for_remove = upstream_listener.clone();
    let subscription: Rc<Subscription<i32, String>> = Subscription::new(
        move || {
            bump_polls();
            Ok(value_for_get.get())
        },
        move |callback| *listener_for_add.borrow_mut() = Some(callback),
        move || *listener_for_remove.borrow_mut() = None,
    );

    let formula_subscription = subscription.clone();
    let formula: Rc<Formula<i32, String>> =
        Formula::new(move || formula_subscription.read_inside_formula().map_err(|_| "err".to_string()));

    assert_eq!(formula.read_without_listening(), Ok(1));
    assert_eq!(formula.read_without_listening(), Ok(1));
    assert_eq!(polls.get(), 2, "with nobody listening, every read of the formula polls again");

    let (formula_notifications, bump_formula_notification) = counter();
    let handle = formula.add_listener(bump_formula_notification);
    assert!(upstream_listener.borrow().is_some(), "gaining a listener attaches upstream");

    let polls_before_listening = polls.get();
    value.set(2);
    (upstream_listener.borrow().as_ref().unwrap())();
    assert_eq!(
        formula_notifications.get(),
        1,
        "the upstream callback must itself drive the formula's listener, not just leave it \
         to be picked up by the next read"
    );
    assert_eq!(
        formula.read_without_listening(),
        Ok(2),
        "push notification, not polling, drives the new value through"
    );
    assert_eq!(
        polls.get(),
        polls_before_listening + 1,
        "exactly one poll happens, triggered by the invalidation, not by the read"
    );
    assert_eq!(
        formula_notifications.get(),
        1,
        "the subsequent read must not cause a second listener notification"
    );

    formula.remove_listener(handle);
    assert!(upstream_listener.borrow().is_none(), "losing the last listener detaches upstream");
}
