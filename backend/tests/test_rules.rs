//! Tests for rule loading and defaults

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use ed_flow_core::rules::{
    RuleProvider, RulesConfig, RulesError, DEFAULT_CONSULTATION_MINUTES, MAX_RULE_MINUTES,
};
use ed_flow_core::{Department, DepartmentError, EventLog, Severity, StaffKind};

fn sample_rules_path() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../rules/department.json"))
}

#[test]
fn test_sample_rules_file_resolves() {
    let rules = RulesConfig::from_file(sample_rules_path()).unwrap();
    let resolved = rules.resolve().unwrap();

    assert_eq!(resolved.rooms.len(), 3);
    assert_eq!(resolved.staff.doctors.len(), 1);
    assert_eq!(resolved.staff.nurses.len(), 2);
    assert_eq!(resolved.staff.aides[1].kind, StaffKind::Mobile);
    assert_eq!(resolved.transfer_units.len(), 5);
    assert_eq!(resolved.priority_rules.consultation_minutes(Severity::Critical), 30);
    assert_eq!(resolved.special_rules.home().destination, "HOME");
    assert_eq!(resolved.default_unit, "ORTHOPEDIE");
}

#[test]
fn test_from_dir_merges_sections_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("01_infrastructure.json"),
        r#"{ "infrastructure": { "waiting_rooms": [ { "id": 1, "capacity": 6 } ] } }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("02_staff.json"),
        r#"{ "personnel": { "infirmieres": [ { "nom": "Claire" } ] },
             "infrastructure": { "waiting_rooms": [ { "id": 9, "capacity": 1 } ] } }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("03_units.json"),
        r#"{ "transfer_units": [ { "name": "CARDIOLOGIE", "capacity": 4, "specialties": ["cardiaque"] } ] }"#,
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a rules file").unwrap();

    let rules = RulesConfig::from_dir(dir.path()).unwrap();

    // First file defining a section wins
    assert_eq!(rules.rooms().len(), 1);
    assert_eq!(rules.rooms()[0].capacity, 6);
    assert_eq!(rules.staff().nurses[0].name, "Claire");
    assert_eq!(rules.transfer_units()[0].name, "CARDIOLOGIE");
    assert_eq!(rules.default_unit(), "ORTHOPEDIE");
}

#[test]
fn test_from_dir_without_json_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("README"), "empty").unwrap();

    let err = RulesConfig::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, RulesError::NoRuleFiles(_)));
}

#[test]
fn test_from_dir_reports_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), "{ \"staff\": ").unwrap();

    let err = RulesConfig::from_dir(dir.path()).unwrap_err();
    match err {
        RulesError::Parse { path: Some(path), .. } => assert!(path.ends_with("broken.json")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RulesConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, RulesError::Io { .. }));
}

#[test]
fn test_missing_sections_use_defaults() {
    let rules = RulesConfig::from_json_str(
        r#"{ "infrastructure": { "waiting_rooms": [ { "id": 1, "capacity": 2 } ] } }"#,
    )
    .unwrap();

    assert_eq!(rules.staff().doctors.len(), 1);
    assert!(rules.staff().aides.is_empty());
    assert!(rules.transfer_units().is_empty());
    assert_eq!(rules.priority_rules().minor_exception_minutes, 360);
    assert_eq!(
        rules.priority_rules().consultation_minutes(Severity::Urgent),
        DEFAULT_CONSULTATION_MINUTES
    );
    assert_eq!(rules.special_rules().critical_care().destination, "SOINS_CRITIQUES");
}

fn with_urgent_duration(minutes: i64) -> RulesConfig {
    RulesConfig::from_json_str(&format!(
        r#"{{ "priority_rules": {{ "levels": [ {{ "severity": "URGENT", "consultation_minutes": {} }} ] }} }}"#,
        minutes
    ))
    .unwrap()
}

fn with_minor_threshold(minutes: i64) -> RulesConfig {
    RulesConfig::from_json_str(&format!(
        r#"{{ "priority_rules": {{ "minor_exception_minutes": {} }} }}"#,
        minutes
    ))
    .unwrap()
}

#[test]
fn test_negative_duration_rejected() {
    assert!(matches!(with_urgent_duration(-5).resolve(), Err(RulesError::Invalid(_))));
}

#[test]
fn test_zero_duration_rejected() {
    // A zero-length consultation would be due again within the same tick
    assert!(matches!(with_urgent_duration(0).resolve(), Err(RulesError::Invalid(_))));
}

#[test]
fn test_duration_upper_bound() {
    assert!(with_urgent_duration(MAX_RULE_MINUTES).resolve().is_ok());
    assert!(matches!(
        with_urgent_duration(MAX_RULE_MINUTES + 1).resolve(),
        Err(RulesError::Invalid(_))
    ));
    assert!(matches!(
        with_urgent_duration(9_000_000_000_000_000).resolve(),
        Err(RulesError::Invalid(_))
    ));
}

#[test]
fn test_minor_threshold_bounds() {
    assert!(with_minor_threshold(0).resolve().is_ok());
    assert!(with_minor_threshold(MAX_RULE_MINUTES).resolve().is_ok());
    assert!(matches!(with_minor_threshold(-1).resolve(), Err(RulesError::Invalid(_))));
    assert!(matches!(
        with_minor_threshold(9_000_000_000_000_000_000).resolve(),
        Err(RulesError::Invalid(_))
    ));
}

#[test]
fn test_department_refuses_out_of_range_rules() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    for rules in [
        with_urgent_duration(9_000_000_000_000_000),
        with_minor_threshold(9_000_000_000_000_000_000),
    ] {
        let err = Department::new(&rules, t0, Box::new(EventLog::new())).unwrap_err();
        assert!(matches!(err, DepartmentError::InvalidConfig(_)));
    }
}

// ============================================================================
// Legacy rule files
// ============================================================================

#[test]
fn test_legacy_rule_file_loads() {
    let rules = RulesConfig::from_json_str(
        r#"{
            "infrastructure": { "salles_attente": [
                { "numero": 1, "capacite": 5 }, { "numero": 2, "capacite": 4 }
            ] },
            "personnel": {
                "docteur": { "disponibilite": "24h/24" },
                "infirmieres": [ { "nom": "Claire", "type": "FIXE" }, { "nom": "Nadia", "type": "MOBILE" } ],
                "aides_soignants": [ { "nom": "Marc", "type": "FIXE" } ]
            },
            "unites_transfert": { "unites": [
                { "nom": "CARDIOLOGIE", "capacite_initiale": 8, "specialites": ["cardiaque"] },
                { "nom": "NEUROLOGIE", "specialites": ["AVC"] }
            ] },
            "regles_priorite": { "niveaux": [
                { "gravite": "ROUGE", "temps_consultation_max": 30 },
                { "gravite": "JAUNE", "temps_consultation_max": 20 }
            ] },
            "regles_speciales": {
                "gris": { "transfert": "MAISON", "description": "Retour domicile" },
                "rouge": { "transfert_prioritaire": "REANIMATION", "description": "Soins critiques" }
            }
        }"#,
    )
    .unwrap();
    let resolved = rules.resolve().unwrap();

    assert_eq!(resolved.rooms.len(), 2);
    assert_eq!(resolved.staff.doctors.len(), 1);
    assert_eq!(resolved.staff.nurses[1].kind, StaffKind::Mobile);
    assert_eq!(resolved.staff.aides[0].name, "Marc");

    assert_eq!(resolved.transfer_units.len(), 2);
    assert_eq!(resolved.transfer_units[0].name, "CARDIOLOGIE");
    assert_eq!(resolved.transfer_units[0].capacity, 8);
    assert_eq!(resolved.transfer_units[1].capacity, 10);

    assert_eq!(resolved.priority_rules.consultation_minutes(Severity::Urgent), 20);
    assert_eq!(resolved.special_rules.home().destination, "MAISON");
    assert_eq!(resolved.special_rules.critical_care().destination, "REANIMATION");
}

#[test]
fn test_doctor_roster_shapes() {
    let one = RulesConfig::from_json_str(r#"{ "personnel": { "docteur": { "nom": "Dr. House" } } }"#)
        .unwrap();
    assert_eq!(one.staff().doctors[0].name, "Dr. House");

    let list = RulesConfig::from_json_str(
        r#"{ "staff": { "doctors": [ { "name": "A" }, { "name": "B", "kind": "MOBILE" } ] } }"#,
    )
    .unwrap();
    assert_eq!(list.staff().doctors.len(), 2);
    assert_eq!(list.staff().doctors[1].kind, StaffKind::Mobile);
}

#[test]
fn test_legacy_sections_merge_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("regles_orchestration.json"),
        r#"{ "regles_speciales": { "gris": { "transfert": "MAISON" } },
             "unites_transfert": { "unites": [ { "nom": "PNEUMOLOGIE", "capacite": 6 } ] } }"#,
    )
    .unwrap();

    let rules = RulesConfig::from_dir(dir.path()).unwrap();
    assert_eq!(rules.transfer_units()[0].name, "PNEUMOLOGIE");
    assert_eq!(rules.special_rules().home().destination, "MAISON");
}

#[test]
fn test_unknown_special_rule_key_rejected() {
    let err = RulesConfig::from_json_str(r#"{ "regles_speciales": { "bleu": { "transfert": "X" } } }"#)
        .unwrap_err();
    assert!(matches!(err, RulesError::Parse { .. }));
}

// ============================================================================
// Fallback warnings
// ============================================================================

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn logs_while(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = captured.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_missing_default_unit_is_logged() {
    let rules = RulesConfig::from_json_str("{}").unwrap();
    let logs = logs_while(|| assert_eq!(rules.default_unit(), "ORTHOPEDIE"));
    assert!(logs.contains("default_unit"), "no fallback warning in: {logs}");

    let configured = RulesConfig::from_json_str(r#"{ "default_unit": "CARDIOLOGIE" }"#).unwrap();
    let logs = logs_while(|| assert_eq!(configured.default_unit(), "CARDIOLOGIE"));
    assert!(!logs.contains("default_unit"));
}
