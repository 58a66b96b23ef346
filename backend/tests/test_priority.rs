//! Tests for effective priority and queue ordering

use chrono::{DateTime, Duration, TimeZone, Utc};
use ed_flow_core::priority::{RANK_MAX, RANK_MIN};
use ed_flow_core::{Patient, PriorityEngine, Severity};
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()
}

fn waited(id: &str, severity: Severity, minutes: i64) -> Patient {
    Patient::new(id, "Test", id, severity, now() - Duration::minutes(minutes))
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Critical),
        Just(Severity::Urgent),
        Just(Severity::Minor),
        Just(Severity::NonUrgent),
    ]
}

#[test]
fn test_long_waiting_minor_outranks_fresh_urgent() {
    let engine = PriorityEngine::default();
    let urgent = waited("U", Severity::Urgent, 0);
    let minor = waited("M", Severity::Minor, 400);

    let next = engine.select_next([&urgent, &minor], now()).unwrap();
    assert_eq!(next.id(), "M");
}

#[test]
fn test_critical_still_beats_long_waiting_minor() {
    let engine = PriorityEngine::default();
    let minor = waited("M", Severity::Minor, 1000);
    let critical = waited("C", Severity::Critical, 0);

    let order: Vec<&str> = engine
        .order_queue([&minor, &critical], now())
        .into_iter()
        .map(Patient::id)
        .collect();
    assert_eq!(order, vec!["C", "M"]);
}

#[test]
fn test_boundary_at_exactly_threshold() {
    let engine = PriorityEngine::default();
    assert_eq!(engine.effective_priority(&waited("M", Severity::Minor, 360), now()), 4);
    assert_eq!(engine.effective_priority(&waited("M", Severity::Minor, 361), now()), 2);
}

#[test]
fn test_non_urgent_never_lifted() {
    let engine = PriorityEngine::default();
    assert_eq!(
        engine.effective_priority(&waited("N", Severity::NonUrgent, 10_000), now()),
        5
    );
}

#[test]
fn test_empty_queue_selects_nothing() {
    let engine = PriorityEngine::default();
    let none: Vec<&Patient> = Vec::new();
    assert!(engine.select_next(none, now()).is_none());
}

#[test]
fn test_queue_view_reports_exception() {
    let engine = PriorityEngine::default();
    let patients = [
        waited("U", Severity::Urgent, 10),
        waited("M", Severity::Minor, 420),
    ];

    let view = engine.queue_view(patients.iter(), now());
    assert_eq!(view.len(), 2);
    assert_eq!(view[0].patient_id, "M");
    assert_eq!(view[0].effective_priority, 2);
    assert!(view[0].minor_exception);
    assert_eq!(view[0].wait_minutes, 420);
    assert_eq!(view[1].patient_id, "U");
    assert!(!view[1].minor_exception);
}

#[test]
fn test_same_rank_orders_by_arrival() {
    let engine = PriorityEngine::default();
    let later = waited("A", Severity::Urgent, 5);
    let earlier = waited("Z", Severity::Urgent, 50);

    let order: Vec<&str> = engine
        .order_queue([&later, &earlier], now())
        .into_iter()
        .map(Patient::id)
        .collect();
    assert_eq!(order, vec!["Z", "A"]);
}

proptest! {
    #[test]
    fn prop_rank_in_range(severity in severity_strategy(), minutes in 0i64..2000) {
        let engine = PriorityEngine::default();
        let rank = engine.effective_priority(&waited("P", severity, minutes), now());
        prop_assert!((RANK_MIN..=RANK_MAX).contains(&rank));
    }

    #[test]
    fn prop_critical_always_first(minutes in 0i64..2000, threshold in 0i64..720) {
        let engine = PriorityEngine::new(threshold);
        prop_assert_eq!(
            engine.effective_priority(&waited("C", Severity::Critical, minutes), now()),
            1
        );
    }

    #[test]
    fn prop_queue_is_sorted_and_complete(
        entries in prop::collection::vec((severity_strategy(), 0i64..800), 0..20)
    ) {
        let engine = PriorityEngine::default();
        let patients: Vec<Patient> = entries
            .iter()
            .enumerate()
            .map(|(i, (severity, minutes))| waited(&format!("P{:02}", i), *severity, *minutes))
            .collect();

        let ordered = engine.order_queue(patients.iter(), now());
        prop_assert_eq!(ordered.len(), patients.len());

        for pair in ordered.windows(2) {
            let key = |p: &Patient| (engine.effective_priority(p, now()), p.arrived_at(), p.id().to_string());
            prop_assert!(key(pair[0]) <= key(pair[1]));
        }
    }

    #[test]
    fn prop_ordering_ignores_input_order(
        entries in prop::collection::vec((severity_strategy(), 0i64..800), 1..12)
    ) {
        let engine = PriorityEngine::default();
        let patients: Vec<Patient> = entries
            .iter()
            .enumerate()
            .map(|(i, (severity, minutes))| waited(&format!("P{:02}", i), *severity, *minutes))
            .collect();

        let forward: Vec<&str> = engine.order_queue(patients.iter(), now()).into_iter().map(Patient::id).collect();
        let backward: Vec<&str> = engine
            .order_queue(patients.iter().rev(), now())
            .into_iter()
            .map(Patient::id)
            .collect();
        prop_assert_eq!(forward, backward);
    }
}
