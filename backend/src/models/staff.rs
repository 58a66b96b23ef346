//! Staff model
//!
//! Every role shares one state machine:
//!
//! ```text
//! Available ──assign(patient, until)──▶ Busy { patient, until }
//!     ▲                                        │
//!     └──────────── release (now ≥ until) ─────┘
//! ```
//!
//! What "busy" means depends on the role: a doctor is consulting, a nurse is
//! inspecting a room, an aide is transporting a patient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::patient::PatientId;

/// Staff identifier (`doctor_1`, `nurse_2`, ...)
pub type StaffId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StaffRole {
    Doctor,
    Nurse,
    Aide,
}

impl StaffRole {
    /// Prefix used when generating ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            StaffRole::Doctor => "doctor",
            StaffRole::Nurse => "nurse",
            StaffRole::Aide => "aide",
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaffRole::Doctor => "DOCTOR",
            StaffRole::Nurse => "NURSE",
            StaffRole::Aide => "AIDE",
        })
    }
}

/// Fixed staff are posted to the department; mobile staff float in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StaffKind {
    #[default]
    #[serde(alias = "FIXE")]
    Fixed,
    Mobile,
}

/// Availability; the patient and end time only exist while busy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[default]
    Available,
    Busy {
        patient: Option<PatientId>,
        until: DateTime<Utc>,
    },
}

/// A doctor, nurse or aide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    id: StaffId,
    name: String,
    role: StaffRole,
    kind: StaffKind,
    availability: Availability,
}

impl StaffMember {
    pub fn new(
        id: impl Into<StaffId>,
        name: impl Into<String>,
        role: StaffRole,
        kind: StaffKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            kind,
            availability: Availability::Available,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> StaffRole {
        self.role
    }

    pub fn kind(&self) -> StaffKind {
        self.kind
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Available)
    }

    /// Patient in charge, if busy with one
    pub fn patient_in_charge(&self) -> Option<&str> {
        match &self.availability {
            Availability::Busy { patient, .. } => patient.as_deref(),
            Availability::Available => None,
        }
    }

    /// End of the current activity, if busy
    pub fn busy_until(&self) -> Option<DateTime<Utc>> {
        match &self.availability {
            Availability::Busy { until, .. } => Some(*until),
            Availability::Available => None,
        }
    }

    /// Busy and the activity has ended at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.busy_until().is_some_and(|until| until <= now)
    }

    pub(crate) fn assign(&mut self, patient: Option<PatientId>, until: DateTime<Utc>) {
        self.availability = Availability::Busy { patient, until };
    }

    pub(crate) fn release(&mut self) {
        self.availability = Availability::Available;
    }
}
