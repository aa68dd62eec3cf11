//! End-to-end workload properties: capacity safety, residency
//! uniqueness, and stage ordering under concurrent churn.

use std::collections::HashMap;
use std::time::Duration;

use depot::{ComponentId, DepotConfig, DeviceId};
use depot_scenarios::{
    verify_accounting, verify_stage_order, verify_unique_residency, Op, ScenarioRunner,
};

fn config(capacities: &[(u32, usize)], placement: &[(u32, u32)]) -> DepotConfig {
    DepotConfig::new(
        capacities
            .iter()
            .map(|&(d, c)| (DeviceId(d), c))
            .collect::<HashMap<_, _>>(),
        placement
            .iter()
            .map(|&(comp, d)| (ComponentId(comp), DeviceId(d)))
            .collect::<HashMap<_, _>>(),
    )
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn concurrent_adds_fill_a_device_exactly() {
    init_logging();
    let runner = ScenarioRunner::new(config(&[(1, 4)], &[])).expect("runner");
    let ops: Vec<Op> = (1..=4).map(|c| Op::add(c, 1)).collect();

    let report = runner.run(&ops, Duration::ZERO);

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    verify_stage_order(&report.events).expect("stage order");
    verify_accounting(runner.scheduler()).expect("accounting");
    let snap = runner
        .scheduler()
        .device_snapshot(DeviceId(1))
        .expect("dev-1");
    assert_eq!(snap.free_slots, 0);
    assert_eq!(snap.resident.len(), 4);
}

fn churn_ops() -> Vec<Op> {
    vec![
        Op::mv(1, 1, 3),
        Op::mv(3, 2, 3),
        Op::add(5, 1),
        Op::delete(4, 2),
        Op::mv(2, 1, 2),
    ]
}

fn verify_churn_layout(runner: &ScenarioRunner) {
    let sys = runner.scheduler();
    assert!(sys.holds(DeviceId(1), ComponentId(5)));
    assert!(sys.holds(DeviceId(2), ComponentId(2)));
    assert!(sys.holds(DeviceId(3), ComponentId(1)));
    assert!(sys.holds(DeviceId(3), ComponentId(3)));
    assert!(!sys.holds(DeviceId(2), ComponentId(4)));
    verify_accounting(sys).expect("accounting");
    verify_unique_residency(sys).expect("unique residency");
}

#[test]
fn mixed_churn_reaches_expected_layout() {
    init_logging();
    let runner = ScenarioRunner::new(config(
        &[(1, 2), (2, 2), (3, 2)],
        &[(1, 1), (2, 1), (3, 2), (4, 2)],
    ))
    .expect("runner");

    let report = runner.run(&churn_ops(), Duration::from_millis(10));

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    verify_stage_order(&report.events).expect("stage order");
    verify_churn_layout(&runner);
}

#[test]
fn mixed_churn_is_stable_across_interleavings() {
    init_logging();
    // No stagger: launch everything at once, repeatedly, and require
    // the same safe outcome from whatever interleaving we get.
    for round in 0..25 {
        let runner = ScenarioRunner::new(config(
            &[(1, 2), (2, 2), (3, 2)],
            &[(1, 1), (2, 1), (3, 2), (4, 2)],
        ))
        .expect("runner");

        let report = runner.run(&churn_ops(), Duration::ZERO);

        assert!(report.failures.is_empty(), "round {round}: {:?}", report.failures);
        verify_stage_order(&report.events).expect("stage order");
        verify_churn_layout(&runner);
    }
}
