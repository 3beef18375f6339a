//! End-to-end scheduling scenarios.
//!
//! Each test builds a graph through the harness, evaluates it, and checks
//! published values together with the order units ran in.

use std::thread;

use deferred_runtime::ops::{Abs, Add, Matrix};
use deferred_runtime::{
    BackendKind, BackendSelection, Cpu, DeferredValue, Error, Gpu, Scheduler, SchedulerConfig, evaluate,
};
use deferred_tests::Harness;

#[test]
fn test_dependent_unit_runs_after_its_operand() {
    let mut harness = Harness::<Cpu>::new(BackendKind::Trivial);
    let o0 = harness.constant("u0", 2);
    let o1 = harness.sum("u1", &[&o0]);

    let stats = harness.eval().unwrap();

    assert_eq!(*o0.value().unwrap(), 2);
    assert_eq!(*o1.value().unwrap(), 2);
    assert!(harness.trace().position("u0") < harness.trace().position("u1"));
    assert_eq!(stats.depths_drained, 2);
}

#[test]
fn test_diamond_levels_by_longest_path() {
    let mut harness = Harness::<Cpu>::new(BackendKind::Trivial);
    let a = harness.constant("a", 1);
    let b = harness.sum("b", &[&a]);
    let c = harness.sum("c", &[&b]);
    // d reads a directly and through the b -> c chain
    let d = harness.sum("d", &[&a, &c]);

    harness.eval().unwrap();

    assert_eq!(*d.value().unwrap(), 2);
    assert_eq!(harness.trace().entries(), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_work_discovered_during_eval_completes() {
    let mut harness = Harness::<Cpu>::new(BackendKind::Trivial);
    let (parent, child) = harness.spawner("parent", 5, "child");
    let sibling = harness.sum("sibling", &[&parent]);

    let stats = harness.eval().unwrap();

    assert_eq!(*child.value().unwrap(), 5);
    assert_eq!(*sibling.value().unwrap(), 5);
    // discovered work finishes before the next depth of the outer layer
    assert_eq!(harness.trace().entries(), vec!["parent", "child", "sibling"]);
    assert_eq!(stats.max_nesting, 1);
}

#[test]
fn test_duplicate_registration_runs_once() {
    let mut harness = Harness::<Cpu>::new(BackendKind::Trivial);
    let source = harness.constant("source", 3);
    let shared = DeferredValue::new();

    assert!(harness.register_raw("shared", &shared, &[&source]));
    assert!(!harness.register_raw("shared", &shared, &[&source]));

    let stats = harness.eval().unwrap();
    assert_eq!(stats.units_run, 2);
    assert_eq!(harness.trace().count("shared"), 1);
}

#[test]
fn test_backend_switch_between_evals() {
    let mut harness = Harness::<Cpu>::new(BackendKind::Trivial);
    harness.constant("first", 1);
    assert_eq!(harness.eval().unwrap().backend, BackendKind::Trivial);

    harness.selection().select(BackendKind::Queued);
    let a = harness.constant("second", 1);
    let b = harness.sum("third", &[&a]);
    let stats = harness.eval().unwrap();

    assert_eq!(stats.backend, BackendKind::Queued);
    assert_eq!(*b.value().unwrap(), 1);
    assert_eq!(harness.trace().entries(), vec!["first", "second", "third"]);
}

#[test]
fn test_queued_backend_handles_nested_discovery() {
    let mut harness = Harness::<Cpu>::new(BackendKind::Queued);
    let (parent, child) = harness.spawner("parent", 7, "child");
    let after = harness.sum("after", &[&parent]);

    harness.eval().unwrap();

    assert_eq!(*child.value().unwrap(), 7);
    assert_eq!(*after.value().unwrap(), 7);
    assert_eq!(harness.trace().entries(), vec!["parent", "child", "after"]);
}

#[test]
fn test_gpu_rejects_queued_backend() {
    let mut harness = Harness::<Gpu>::new(BackendKind::Queued);
    let out = harness.constant("only", 1);

    let err = harness.eval().unwrap_err();
    assert!(matches!(err, Error::BackendUnavailable { device: "gpu", .. }));
    assert!(!out.is_evaluated());
    assert_eq!(harness.scheduler().pending_units(), 1);

    harness.selection().select(BackendKind::Trivial);
    harness.eval().unwrap();
    assert!(out.is_evaluated());
}

#[test]
fn test_nesting_limit_aborts_and_resets() {
    let config = SchedulerConfig::default().with_max_nesting(0);
    let mut harness = Harness::<Cpu>::with_config(BackendKind::Trivial, config);
    let (_parent, child) = harness.spawner("parent", 1, "child");

    let err = harness.eval().unwrap_err();
    assert!(matches!(err, Error::NestingTooDeep { limit: 0 }));
    assert!(!child.is_evaluated());
    assert_eq!(harness.scheduler().pending_units(), 0);

    // the scheduler is usable again after the failure
    let next = harness.constant("next", 4);
    harness.eval().unwrap();
    assert_eq!(*next.value().unwrap(), 4);
}

#[test]
fn test_matrix_expression_end_to_end() {
    deferred_tests::init_logging();
    let a = Matrix::<Cpu>::from_fn(2, 2, |r, c| (r * 2 + c) as f64);
    let b = Matrix::<Cpu>::new(2, 2, vec![-3.0; 4]).unwrap();
    let sum = Add::new(a, b);
    let expr = Add::new(Abs::new(sum.clone()), sum);

    let mut scheduler =
        Scheduler::<Cpu>::with_selection(BackendSelection::default(), SchedulerConfig::default());
    let result = evaluate(&mut scheduler, &expr).unwrap();

    // sum = [-3, -2, -1, 0]; |sum| + sum = [0, 0, 0, 0]
    assert_eq!(result.value().unwrap().as_slice(), &[0.0; 4]);
}

#[test]
fn test_schedulers_on_many_threads() {
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            thread::spawn(move || {
                let mut harness = Harness::<Cpu>::new(BackendKind::Queued);
                let mut previous = harness.constant("root", worker);
                for step in 0..20 {
                    previous = harness.sum(&format!("step{step}"), &[&previous]);
                }
                let stats = harness.eval().unwrap();
                (worker, *previous.value().unwrap(), stats.depths_drained)
            })
        })
        .collect();

    for handle in workers {
        let (worker, value, depths) = handle.join().unwrap();
        assert_eq!(value, worker);
        assert_eq!(depths, 21);
    }
}
