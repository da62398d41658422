//! Tests for the throttle guard.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

const T0: i64 = 1_771_243_200;

#[tokio::test]
async fn first_run_is_open() {
    let guard = ThrottleGuard::new();
    guard.register("r1", Duration::from_secs(60));
    assert!(guard.should_fire("r1", T0).await);
    assert!(matches!(guard.acquire("r1", T0).await, ThrottleDecision::Open(_)));
}

#[tokio::test]
async fn recorded_fire_suppresses_until_cooldown_elapses() {
    let guard = ThrottleGuard::new();
    guard.register("r1", Duration::from_secs(60));

    match guard.acquire("r1", T0).await {
        ThrottleDecision::Open(permit) => permit.record_fired(T0),
        other => panic!("expected open gate, got {other:?}"),
    }

    match guard.acquire("r1", T0 + 10).await {
        ThrottleDecision::Suppressed { remaining_secs } => assert_eq!(remaining_secs, 50),
        other => panic!("expected suppression, got {other:?}"),
    }

    // Exactly at the boundary the window is open again.
    assert!(guard.should_fire("r1", T0 + 60).await);
    assert!(guard.should_fire("r1", T0 + 61).await);
}

#[tokio::test]
async fn dropped_permit_does_not_start_window() {
    let guard = ThrottleGuard::new();
    guard.register("r1", Duration::from_secs(60));

    match guard.acquire("r1", T0).await {
        ThrottleDecision::Open(permit) => drop(permit),
        other => panic!("expected open gate, got {other:?}"),
    }

    assert!(guard.should_fire("r1", T0 + 1).await);
    assert_eq!(guard.state("r1").await.unwrap().last_fired, None);
}

#[tokio::test]
async fn zero_cooldown_always_fires() {
    let guard = ThrottleGuard::new();
    guard.register("r1", Duration::ZERO);
    guard.record_fired("r1", T0).await;
    assert!(guard.should_fire("r1", T0).await);
}

#[tokio::test]
async fn register_resets_state() {
    let guard = ThrottleGuard::new();
    guard.register("r1", Duration::from_secs(60));
    guard.record_fired("r1", T0).await;
    guard.register("r1", Duration::from_secs(60));
    assert_eq!(guard.state("r1").await.unwrap().last_fired, None);
}

#[tokio::test]
async fn unknown_rule_has_no_cooldown() {
    let guard = ThrottleGuard::new();
    assert!(guard.state("ghost").await.is_none());
    assert!(guard.should_fire("ghost", T0).await);
    assert_eq!(guard.len(), 1);
}

#[tokio::test]
async fn rules_are_independent() {
    let guard = ThrottleGuard::new();
    guard.register("a", Duration::from_secs(60));
    guard.register("b", Duration::from_secs(60));

    // Holding a's permit must not block b.
    let permit_a = match guard.acquire("a", T0).await {
        ThrottleDecision::Open(permit) => permit,
        other => panic!("expected open gate, got {other:?}"),
    };
    let b = tokio::time::timeout(Duration::from_secs(1), guard.acquire("b", T0)).await;
    assert!(matches!(b, Ok(ThrottleDecision::Open(_))));
    permit_a.record_fired(T0);

    assert!(!guard.should_fire("a", T0 + 1).await);
    assert!(guard.should_fire("b", T0 + 1).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_runs_pass_gate_once() {
    let guard = Arc::new(ThrottleGuard::new());
    guard.register("r1", Duration::from_secs(60));
    let dispatched = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..8 {
        let guard = Arc::clone(&guard);
        let dispatched = Arc::clone(&dispatched);
        handles.push(tokio::spawn(async move {
            let now = T0 + i;
            if let ThrottleDecision::Open(permit) = guard.acquire("r1", now).await {
                // Simulate a connector call while holding the permit.
                tokio::time::sleep(Duration::from_millis(20)).await;
                dispatched.fetch_add(1, Ordering::SeqCst);
                permit.record_fired(now);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(dispatched.load(Ordering::SeqCst), 1);
}
