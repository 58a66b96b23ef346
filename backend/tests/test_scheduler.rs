//! Tests for the tick state machine
//!
//! Each test drives a small department through explicit `now` values and
//! checks the returned actions and the resulting entity state.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ed_flow_core::models::event::Event;
use ed_flow_core::rules::{RulesConfig, StaffRecord};
use ed_flow_core::{
    Department, DepartmentError, EventLog, Patient, PatientStatus, Severity, StaffKind, StaffRole,
    TickAction, TransferPriority,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

const DURATIONS: &str = r#"
    "priority_rules": { "levels": [
        { "severity": "CRITICAL", "consultation_minutes": 30 },
        { "severity": "URGENT", "consultation_minutes": 20 },
        { "severity": "MINOR", "consultation_minutes": 10 },
        { "severity": "NONURGENT", "consultation_minutes": 5 }
    ] }
"#;

fn department(staff: &str, units: &str) -> Department {
    let json = format!(
        r#"{{
            "infrastructure": {{ "waiting_rooms": [ {{ "id": 1, "capacity": 5 }}, {{ "id": 2, "capacity": 5 }} ] }},
            "staff": {},
            "transfer_units": {},
            {}
        }}"#,
        staff, units, DURATIONS
    );
    let rules = RulesConfig::from_json_str(&json).unwrap();
    Department::new(&rules, t0(), Box::new(EventLog::new())).unwrap()
}

fn patient(id: &str, severity: Severity, arrived_at: DateTime<Utc>, conditions: &[&str]) -> Patient {
    Patient::new(id, "Test", id, severity, arrived_at).with_conditions(conditions.iter().copied())
}

fn status(dept: &Department, id: &str) -> PatientStatus {
    dept.state().get_patient(id).unwrap().status()
}

// ============================================================================
// Consultations
// ============================================================================

#[test]
fn test_tick_is_idempotent_for_same_now() {
    let mut dept = department(
        r#"{ "doctors": [ { "name": "D" } ], "nurses": [ { "name": "N" } ], "aides": [ { "name": "A" } ] }"#,
        "[]",
    );
    dept.admit(patient("P1", Severity::Urgent, t0(), &[]), t0()).unwrap();

    let first = dept.tick(t0());
    assert_eq!(first.actions.len(), 1);
    assert!(dept.tick(t0()).is_empty());

    let first = dept.tick(at(15));
    assert!(!first.is_empty());
    assert!(dept.tick(at(15)).is_empty());

    let first = dept.tick(at(20));
    assert!(!first.is_empty());
    assert!(dept.tick(at(20)).is_empty());
}

#[test]
fn test_long_waiting_minor_consulted_before_fresh_urgent() {
    let mut dept = department(r#"{ "doctors": [ { "name": "D" } ] }"#, "[]");
    dept.admit(patient("URGENT", Severity::Urgent, t0(), &[]), t0()).unwrap();
    dept.admit(patient("MINOR", Severity::Minor, at(-400), &[]), t0()).unwrap();

    let result = dept.tick(t0());
    assert_eq!(
        result.actions,
        vec![TickAction::ConsultationStarted {
            patient_id: "MINOR".to_string(),
            doctor_id: "doctor_1".to_string(),
            severity: Severity::Minor,
            until: at(10),
        }]
    );
    assert_eq!(status(&dept, "MINOR"), PatientStatus::InConsult);
    assert_eq!(status(&dept, "URGENT"), PatientStatus::Waiting);
    assert_eq!(dept.state().waiting_ids(), ["URGENT"]);
}

#[test]
fn test_doctors_take_patients_in_configured_order() {
    let mut dept = department(r#"{ "doctors": [ { "name": "A" }, { "name": "B" } ] }"#, "[]");
    dept.admit(patient("P1", Severity::Minor, t0(), &[]), t0()).unwrap();
    dept.admit(patient("P2", Severity::Critical, t0(), &[]), t0()).unwrap();
    dept.admit(patient("P3", Severity::Urgent, t0(), &[]), t0()).unwrap();

    let started: Vec<(String, String)> = dept
        .tick(t0())
        .actions
        .into_iter()
        .filter_map(|a| match a {
            TickAction::ConsultationStarted {
                patient_id,
                doctor_id,
                ..
            } => Some((doctor_id, patient_id)),
            _ => None,
        })
        .collect();

    assert_eq!(
        started,
        vec![
            ("doctor_1".to_string(), "P2".to_string()),
            ("doctor_2".to_string(), "P3".to_string()),
        ]
    );
    assert_eq!(dept.state().waiting_ids(), ["P1"]);
}

#[test]
fn test_consultation_length_follows_severity() {
    let mut dept = department(r#"{ "doctors": [ { "name": "D" } ] }"#, "[]");
    dept.admit(patient("P1", Severity::Critical, t0(), &[]), t0()).unwrap();
    dept.tick(t0());

    let doctor = dept.state().staff_member("doctor_1").unwrap();
    assert_eq!(doctor.patient_in_charge(), Some("P1"));
    assert_eq!(doctor.busy_until(), Some(at(30)));

    assert!(dept.tick(at(29)).is_empty());
}

// ============================================================================
// Hand-off
// ============================================================================

#[test]
fn test_aide_takes_patient_after_consultation() {
    let mut dept = department(
        r#"{ "doctors": [ { "name": "D" } ], "aides": [ { "name": "A" } ] }"#,
        r#"[ { "name": "CARDIOLOGIE", "capacity": 2, "specialties": ["cardiaque"] } ]"#,
    );
    dept.admit(patient("P1", Severity::Critical, t0(), &["cardiaque"]), t0()).unwrap();
    dept.tick(t0());

    let result = dept.tick(at(30));
    assert_eq!(
        result.actions,
        vec![
            TickAction::TransportStarted {
                patient_id: "P1".to_string(),
                doctor_id: Some("doctor_1".to_string()),
                aide_id: "aide_1".to_string(),
                destination: "CARDIOLOGIE".to_string(),
                priority: TransferPriority::Immediate,
            },
            TickAction::UnitCommitted {
                patient_id: "P1".to_string(),
                unit: "CARDIOLOGIE".to_string(),
            },
        ]
    );

    let p1 = dept.state().get_patient("P1").unwrap();
    assert_eq!(p1.status(), PatientStatus::Transferred);
    assert_eq!(p1.room(), None);
    assert_eq!(p1.committed_unit(), Some("CARDIOLOGIE"));
    assert_eq!(dept.state().unit("CARDIOLOGIE").unwrap().occupancy(), 1);
    assert!(dept.state().archived_ids().contains(&"P1".to_string()));

    let aide = dept.state().staff_member("aide_1").unwrap();
    assert_eq!(aide.busy_until(), Some(at(45)));
    assert!(dept.state().staff_member("doctor_1").unwrap().is_available());

    let result = dept.tick(at(45));
    assert_eq!(
        result.actions,
        vec![TickAction::StaffReleased {
            staff_id: "aide_1".to_string(),
            role: StaffRole::Aide,
        }]
    );
}

#[test]
fn test_full_unit_saturates_without_commitment() {
    let mut dept = department(
        r#"{ "doctors": [ { "name": "D" } ], "aides": [ { "name": "A" }, { "name": "B" } ] }"#,
        r#"[ { "name": "CARDIOLOGIE", "capacity": 1, "specialties": ["cardiaque"] } ]"#,
    );
    dept.admit(patient("P1", Severity::Critical, t0(), &["cardiaque"]), t0()).unwrap();
    dept.admit(patient("P2", Severity::Critical, t0(), &["cardiaque"]), t0()).unwrap();

    dept.tick(t0());
    dept.tick(at(30));
    let result = dept.tick(at(60));

    assert!(result.actions.contains(&TickAction::UnitSaturated {
        patient_id: "P2".to_string(),
        unit: "CARDIOLOGIE".to_string(),
    }));
    let p2 = dept.state().get_patient("P2").unwrap();
    assert_eq!(p2.status(), PatientStatus::Transferred);
    assert_eq!(p2.committed_unit(), None);
    assert_eq!(dept.state().unit("CARDIOLOGIE").unwrap().occupancy(), 1);

    let transfers: Vec<Event> = dept
        .events()
        .records()
        .into_iter()
        .filter(|r| r.event_type() == "PATIENT_TRANSFERRED")
        .map(|r| r.event)
        .collect();
    assert_eq!(transfers.len(), 2);
    assert!(matches!(
        &transfers[1],
        Event::PatientTransferred { patient_id, committed: false, .. } if patient_id == "P2"
    ));
}

#[test]
fn test_non_urgent_goes_home() {
    let mut dept = department(
        r#"{ "doctors": [ { "name": "D" } ], "aides": [ { "name": "A" } ] }"#,
        r#"[ { "name": "CARDIOLOGIE", "capacity": 2, "specialties": ["cardiaque"] } ]"#,
    );
    dept.admit(patient("P1", Severity::NonUrgent, t0(), &["cardiaque"]), t0()).unwrap();
    dept.tick(t0());

    let result = dept.tick(at(5));
    assert_eq!(result.actions.len(), 1);
    assert!(matches!(
        &result.actions[0],
        TickAction::TransportStarted { destination, priority: TransferPriority::Normal, .. }
            if destination == "HOME"
    ));
    assert_eq!(dept.state().unit("CARDIOLOGIE").unwrap().occupancy(), 0);
    assert_eq!(dept.metrics(at(5)).transferred, 1);
}

// ============================================================================
// Stranded patients
// ============================================================================

#[test]
fn test_no_aide_leaves_patient_awaiting_transport() {
    let mut dept = department(r#"{ "doctors": [ { "name": "D" } ] }"#, "[]");
    dept.admit(patient("P1", Severity::Urgent, t0(), &[]), t0()).unwrap();
    dept.admit(patient("P2", Severity::Minor, t0(), &[]), t0()).unwrap();
    dept.tick(t0());

    let result = dept.tick(at(20));
    assert_eq!(result.actions[0].to_string(), "Patient P1 awaiting transport (no aide available)");
    assert!(matches!(
        &result.actions[1],
        TickAction::ConsultationStarted { patient_id, .. } if patient_id == "P2"
    ));

    let p1 = dept.state().get_patient("P1").unwrap();
    assert_eq!(p1.status(), PatientStatus::InConsult);
    assert_eq!(p1.room(), Some(1));
    let stranded: Vec<&str> = dept.awaiting_transport().iter().map(|p| p.id()).collect();
    assert_eq!(stranded, vec!["P1"]);

    // Later ticks do not retry P1; only P2's own hand-off fails
    let result = dept.tick(at(30));
    let unavailable: Vec<&str> = result
        .actions
        .iter()
        .filter_map(|a| match a {
            TickAction::TransportUnavailable { patient_id, .. } => Some(patient_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unavailable, vec!["P2"]);
    assert_eq!(dept.awaiting_transport().len(), 2);
}

#[test]
fn test_dispatch_transport_moves_stranded_patient() {
    let mut dept = department(r#"{ "doctors": [ { "name": "D" } ] }"#, "[]");
    dept.admit(patient("P1", Severity::Urgent, t0(), &[]), t0()).unwrap();
    dept.tick(t0());
    dept.tick(at(20));

    let actions = dept.dispatch_transport("P1", at(21)).unwrap();
    assert!(matches!(
        actions.as_slice(),
        [TickAction::TransportUnavailable { doctor_id: None, .. }]
    ));
    assert_eq!(status(&dept, "P1"), PatientStatus::InConsult);

    let aide = dept.add_staff(StaffRole::Aide, StaffRecord::new("Marc", StaffKind::Mobile), at(22));
    assert_eq!(aide, "aide_1");

    let actions = dept.dispatch_transport("P1", at(23)).unwrap();
    assert_eq!(
        actions,
        vec![TickAction::TransportStarted {
            patient_id: "P1".to_string(),
            doctor_id: None,
            aide_id: "aide_1".to_string(),
            destination: "ORTHOPEDIE".to_string(),
            priority: TransferPriority::Normal,
        }]
    );
    assert_eq!(status(&dept, "P1"), PatientStatus::Transferred);
    assert!(dept.awaiting_transport().is_empty());

    let err = dept.dispatch_transport("P1", at(24)).unwrap_err();
    assert!(matches!(err, DepartmentError::PatientNotActive { .. }));
    let err = dept.dispatch_transport("GHOST", at(24)).unwrap_err();
    assert_eq!(err, DepartmentError::PatientNotFound("GHOST".to_string()));
}

// ============================================================================
// Surveillance
// ============================================================================

#[test]
fn test_nurses_inspect_stale_rooms() {
    let mut dept = department(r#"{ "doctors": [], "nurses": [ { "name": "N" } ] }"#, "[]");

    assert!(dept.tick(at(14)).is_empty());

    let result = dept.tick(at(15));
    assert_eq!(
        result.actions,
        vec![TickAction::RoomInspected {
            room: 1,
            nurse_id: "nurse_1".to_string(),
        }]
    );
    assert_eq!(dept.state().room(1).unwrap().last_inspection(), at(15));
    assert_eq!(dept.state().room(2).unwrap().last_inspection(), t0());

    let result = dept.tick(at(20));
    assert_eq!(
        result.actions,
        vec![
            TickAction::StaffReleased {
                staff_id: "nurse_1".to_string(),
                role: StaffRole::Nurse,
            },
            TickAction::RoomInspected {
                room: 2,
                nurse_id: "nurse_1".to_string(),
            },
        ]
    );
}

#[test]
fn test_check_constraints_reports_unsupervised_rooms() {
    let mut dept = department(r#"{ "doctors": [] }"#, "[]");
    dept.admit(patient("P1", Severity::Minor, t0(), &[]), t0()).unwrap();

    assert!(dept.check_constraints(at(15)).is_empty());

    let violations = dept.check_constraints(at(16));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].room, 1);
    assert_eq!(violations[0].occupancy, 1);
    assert_eq!(violations[0].minutes_unsupervised, 16.0);

    let logged = dept
        .events()
        .records()
        .iter()
        .filter(|r| r.event_type() == "SURVEILLANCE_VIOLATION")
        .count();
    assert_eq!(logged, 1);
}

#[test]
fn test_status_board_snapshot() {
    let mut dept = department(r#"{ "doctors": [ { "name": "D" } ] }"#, "[]");
    dept.admit(patient("P1", Severity::Urgent, t0(), &[]), t0()).unwrap();
    dept.admit(patient("P2", Severity::Minor, t0(), &[]), t0()).unwrap();
    dept.tick(t0());

    let board = dept.status_board(at(5));
    assert_eq!(board.rooms.len(), 2);
    assert_eq!(board.rooms[0].occupancy, 2);
    assert_eq!(board.queue.len(), 1);
    assert_eq!(board.queue[0].patient_id, "P2");
    assert_eq!(board.metrics.in_consult, 1);
    assert!(board.awaiting_transport.is_empty());
}
