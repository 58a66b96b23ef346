//! Patient model
//!
//! A patient enters through triage with a severity class and a set of
//! condition tags, waits in a room, is seen by a doctor and then leaves the
//! department for a transfer unit (or home).
//!
//! Priority is deliberately absent from this struct: it depends on how long
//! the patient has waited and is recomputed by `PriorityEngine` on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::time::minutes_between;

/// Patient identifier (caller-supplied, unique per department)
pub type PatientId = String;

/// Room identifier (the room number from the rules)
pub type RoomId = u32;

/// Triage class
///
/// Serialized as `CRITICAL|URGENT|MINOR|NONURGENT`; the triage colour codes
/// used on paper forms are accepted as aliases when reading rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[serde(alias = "ROUGE", alias = "RED")]
    Critical,
    #[serde(alias = "JAUNE", alias = "YELLOW")]
    Urgent,
    #[serde(alias = "VERT", alias = "GREEN")]
    Minor,
    #[serde(alias = "GRIS", alias = "GREY", alias = "GRAY")]
    NonUrgent,
}

impl Severity {
    /// All severities, most severe first
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Urgent,
        Severity::Minor,
        Severity::NonUrgent,
    ];

    /// Upper-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Urgent => "URGENT",
            Severity::Minor => "MINOR",
            Severity::NonUrgent => "NONURGENT",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the patient is in the department flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientStatus {
    /// Sitting in a room, ranked in the consultation queue
    Waiting,
    /// With a doctor (or stranded after consultation, see `Department::awaiting_transport`)
    InConsult,
    /// Handed to transport towards a destination
    Transferred,
    /// Left without being seen
    Departed,
}

impl PatientStatus {
    /// Whether the patient still occupies a room
    pub fn holds_room(&self) -> bool {
        matches!(self, PatientStatus::Waiting | PatientStatus::InConsult)
    }
}

/// A patient in the department
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use ed_flow_core::{Patient, PatientStatus, Severity};
///
/// let arrival = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
/// let patient = Patient::new("P001", "Marie", "Dupont", Severity::Critical, arrival)
///     .with_conditions(["cardiaque"]);
///
/// assert_eq!(patient.display_name(), "Marie Dupont");
/// assert_eq!(patient.status(), PatientStatus::Waiting);
/// assert!(patient.room().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    id: PatientId,
    first_name: String,
    last_name: String,
    severity: Severity,
    conditions: Vec<String>,
    arrived_at: DateTime<Utc>,
    status: PatientStatus,
    room: Option<RoomId>,
    /// Transfer unit whose occupancy was incremented for this patient
    committed_unit: Option<String>,
}

impl Patient {
    /// Create a waiting patient with no room yet
    pub fn new(
        id: impl Into<PatientId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        severity: Severity,
        arrived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            severity,
            conditions: Vec::new(),
            arrived_at,
            status: PatientStatus::Waiting,
            room: None,
            committed_unit: None,
        }
    }

    /// Attach condition tags; duplicates are dropped, first occurrence kept
    pub fn with_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for condition in conditions {
            let condition = condition.into();
            if !self.conditions.contains(&condition) {
                self.conditions.push(condition);
            }
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// "first last"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn arrived_at(&self) -> DateTime<Utc> {
        self.arrived_at
    }

    pub fn status(&self) -> PatientStatus {
        self.status
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    pub fn committed_unit(&self) -> Option<&str> {
        self.committed_unit.as_deref()
    }

    /// Minutes since arrival at `now` (zero if `now` precedes arrival)
    pub fn wait_minutes(&self, now: DateTime<Utc>) -> f64 {
        minutes_between(self.arrived_at, now)
    }

    pub(crate) fn set_status(&mut self, status: PatientStatus) {
        self.status = status;
    }

    pub(crate) fn set_room(&mut self, room: Option<RoomId>) {
        self.room = room;
    }

    pub(crate) fn set_committed_unit(&mut self, unit: Option<String>) {
        self.committed_unit = unit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn arrival() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_conditions_are_deduplicated() {
        let p = Patient::new("P1", "A", "B", Severity::Urgent, arrival())
            .with_conditions(["fracture", "entorse", "fracture"]);
        assert_eq!(p.conditions(), &["fracture".to_string(), "entorse".to_string()]);
    }

    #[test]
    fn test_wait_minutes() {
        let p = Patient::new("P1", "A", "B", Severity::Minor, arrival());
        assert_eq!(p.wait_minutes(arrival() + Duration::minutes(42)), 42.0);
        assert_eq!(p.wait_minutes(arrival() - Duration::minutes(5)), 0.0);
    }

    #[test]
    fn test_severity_aliases() {
        let s: Severity = serde_json::from_str("\"ROUGE\"").unwrap();
        assert_eq!(s, Severity::Critical);
        let s: Severity = serde_json::from_str("\"GRIS\"").unwrap();
        assert_eq!(s, Severity::NonUrgent);
        assert_eq!(serde_json::to_string(&Severity::NonUrgent).unwrap(), "\"NONURGENT\"");
    }

    #[test]
    fn test_holds_room() {
        assert!(PatientStatus::Waiting.holds_room());
        assert!(PatientStatus::InConsult.holds_room());
        assert!(!PatientStatus::Transferred.holds_room());
        assert!(!PatientStatus::Departed.holds_room());
    }
}
