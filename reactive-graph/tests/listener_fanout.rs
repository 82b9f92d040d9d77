//! Exercises the listener-fanout guarantee directly: a diamond-shaped graph
//! must invoke each listener exactly once per write, never once per path.

use std::rc::Rc;

use reactive_graph::{Cell, Formula};

use _validator::Validator;

#[test]
fn diamond_listener_fires_once_per_write_not_once_per_path() {
    let source = Cell::new(1);

    let source_for_left = source.clone();
    let left: Rc<Formula<i32, String>> =
        Formula::new(move || Ok(source_for_left.read_inside_formula().unwrap() + 1));

    let source_for_right = source.clone();
    let right: Rc<Formula<i32, String>> =
        Formula::new(move || Ok(source_for_right.read_inside_formula().unwrap() + 2));

    let left_for_sum = left.clone();
    let right_for_sum = right.clone();
    let sum: Rc<Formula<i32, String>> = Formula::new(move || {
        Ok(left_for_sum.read_inside_formula().unwrap() + right_for_sum.read_inside_formula().unwrap())
    });

    assert_eq!(sum.read_without_listening(), Ok(5));

    let log: Rc<Validator<&'static str>> = Rc::new(Validator::new());
    let log_for_listener = log.clone();
    let _handle = sum.add_listener(move || log_for_listener.push("sum-notified"));

    source.set(2).unwrap();
    log.expect(["sum-notified"]);
    assert_eq!(sum.read_without_listening(), Ok(7));

    // A second, unrelated write produces a second, single notification —
    // the first pass's de-duplication must not suppress future writes.
    source.set(3).unwrap();
    log.expect(["sum-notified"]);
    assert_eq!(sum.read_without_listening(), Ok(9));
}

#[test]
fn equal_write_never_reaches_any_listener_in_the_graph() {
    let source = Cell::new(1);

    let source_for_formula = source.clone();
    let formula: Rc<Formula<i32, String>> =
        Formula::new(move || Ok(source_for_formula.read_inside_formula().unwrap() * 10));

    assert_eq!(formula.read_without_listening(), Ok(10));

    let cell_log: Rc<Validator<&'static str>> = Rc::new(Validator::new());
    let cell_log_for_listener = cell_log.clone();
    source.add_listener(move || cell_log_for_listener.push("cell-notified"));

    let formula_log: Rc<Validator<&'static str>> = Rc::new(Validator::new());
    let formula_log_for_listener = formula_log.clone();
    let _handle = formula.add_listener(move || formula_log_for_listener.push("formula-notified"));

    source.set(1).unwrap();
    cell_log.expect([]);
    formula_log.expect([]);
}
