//! Department engine
//!
//! The explicit context object for one emergency department session. It owns
//! the entity store, applies the priority and routing rules, runs the staff
//! state machine one tick at a time and reports every state change to an
//! [`EventSink`].
//!
//! # Tick
//!
//! Time never advances on its own: the caller supplies `now` to every
//! operation. Each [`Department::tick`] applies, in this order:
//!
//! ```text
//! 1. Release nurses and aides whose activity ended (until <= now)
//! 2. For each doctor whose consultation ended (configured order):
//!      aide free  -> doctor freed, patient detached + Transferred + archived,
//!                    unit bed committed when the destination is a unit with
//!                    space, aide busy 15 min with the patient
//!      no aide    -> doctor freed, patient stays InConsult (stranded)
//! 3. For each room inspected 15+ min ago: first free nurse busy 5 min,
//!    last_inspection = now
//! 4. For each free doctor: next patient by effective priority,
//!    doctor busy for the severity's consultation length
//! ```
//!
//! Two behaviors are deliberate and visible in the action list:
//!
//! - the unit bed is taken when the aide picks the patient up, not when
//!   transport ends;
//! - a stranded patient is not retried by later ticks. It shows up in
//!   [`Department::awaiting_transport`] until [`Department::dispatch_transport`]
//!   (or [`Department::transfer`]) moves it.
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use ed_flow_core::rules::RulesConfig;
//! use ed_flow_core::{Department, EventLog, Patient, Severity};
//!
//! let rules = RulesConfig::from_json_str(r#"{
//!     "infrastructure": { "waiting_rooms": [ { "id": 1, "capacity": 5 } ] },
//!     "staff": { "doctors": [ { "name": "Dr. House" } ], "aides": [ { "name": "Marc" } ] }
//! }"#).unwrap();
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
//! let mut dept = Department::new(&rules, t0, Box::new(EventLog::new())).unwrap();
//!
//! dept.admit(Patient::new("P1", "Jean", "Martin", Severity::Urgent, t0), t0).unwrap();
//! let result = dept.tick(t0);
//! assert_eq!(result.actions.len(), 1);
//!
//! // Default consultation is 5 minutes; the aide takes over afterwards
//! let result = dept.tick(t0 + Duration::minutes(5));
//! assert!(!result.is_empty());
//! assert!(dept.state().waiting_ids().is_empty());
//! ```

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::minutes_between;
use crate::metrics::InstantMetrics;
use crate::models::event::{Event, EventRecord, EventSink};
use crate::models::patient::{Patient, PatientId, PatientStatus, RoomId, Severity};
use crate::models::room::Room;
use crate::models::staff::{StaffId, StaffMember, StaffRole};
use crate::models::state::{DepartmentState, StoreError};
use crate::models::transfer_unit::TransferUnit;
use crate::orchestrator::checkpoint::compute_config_hash;
use crate::priority::{PriorityEngine, QueueEntry};
use crate::rules::{ResolvedRules, RuleProvider, RulesError, StaffRecord};
use crate::transfer::{TransferAdvisor, TransferPriority};

/// Nurse busy time per room inspection
pub const NURSE_INSPECTION_MINUTES: i64 = 5;

/// A room is due for inspection once this old
pub const INSPECTION_INTERVAL_MINUTES: i64 = 15;

/// Aide busy time per post-consultation transport
pub const AIDE_TRANSPORT_MINUTES: i64 = 15;

// ============================================================================
// Errors
// ============================================================================

/// Failure families callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Room or unit full; recoverable by retrying later or rerouting
    CapacityExceeded,
    /// Unknown patient, room or unit id
    NotFound,
    /// Request inconsistent with current state or configuration
    InvalidRequest,
}

/// Department operation errors
///
/// Every failing operation leaves the department unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DepartmentError {
    #[error("No room available for patient {patient_id} ({occupied}/{capacity} places taken)")]
    RoomFull {
        patient_id: PatientId,
        capacity: usize,
        occupied: usize,
    },

    #[error("Transfer unit {0} is full")]
    UnitFull(String),

    #[error("Room {room} holds {occupancy} patients, cannot shrink to {requested}")]
    CapacityBelowOccupancy {
        room: RoomId,
        occupancy: usize,
        requested: usize,
    },

    #[error("Patient {0} not found")]
    PatientNotFound(PatientId),

    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("Transfer unit {0} not found")]
    UnitNotFound(String),

    #[error("Patient {0} is already registered")]
    DuplicatePatient(PatientId),

    #[error("Patient {patient_id} cannot be moved while {status:?}")]
    PatientNotActive {
        patient_id: PatientId,
        status: PatientStatus,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl DepartmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DepartmentError::RoomFull { .. }
            | DepartmentError::UnitFull(_)
            | DepartmentError::CapacityBelowOccupancy { .. } => ErrorKind::CapacityExceeded,
            DepartmentError::PatientNotFound(_)
            | DepartmentError::RoomNotFound(_)
            | DepartmentError::UnitNotFound(_) => ErrorKind::NotFound,
            DepartmentError::DuplicatePatient(_)
            | DepartmentError::PatientNotActive { .. }
            | DepartmentError::InvalidConfig(_)
            | DepartmentError::Checkpoint(_) => ErrorKind::InvalidRequest,
        }
    }
}

impl From<StoreError> for DepartmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomFull {
                patient_id,
                capacity,
                occupied,
            } => DepartmentError::RoomFull {
                patient_id,
                capacity,
                occupied,
            },
            StoreError::DuplicatePatient(id) => DepartmentError::DuplicatePatient(id),
            StoreError::PatientNotFound(id) => DepartmentError::PatientNotFound(id),
            StoreError::RoomNotFound(id) => DepartmentError::RoomNotFound(id),
            StoreError::UnitNotFound(name) => DepartmentError::UnitNotFound(name),
            StoreError::UnitFull(name) => DepartmentError::UnitFull(name),
            StoreError::CapacityBelowOccupancy {
                room,
                occupancy,
                requested,
            } => DepartmentError::CapacityBelowOccupancy {
                room,
                occupancy,
                requested,
            },
        }
    }
}

impl From<RulesError> for DepartmentError {
    fn from(err: RulesError) -> Self {
        DepartmentError::InvalidConfig(err.to_string())
    }
}

// ============================================================================
// Tick output
// ============================================================================

/// One state change made by the scheduler
///
/// Observability only: nothing in the engine reads actions back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickAction {
    /// Nurse or aide back to available
    StaffReleased { staff_id: StaffId, role: StaffRole },

    /// Aide took a patient whose consultation ended
    TransportStarted {
        patient_id: PatientId,
        doctor_id: Option<StaffId>,
        aide_id: StaffId,
        destination: String,
        priority: TransferPriority,
    },

    /// Destination unit bed taken
    UnitCommitted { patient_id: PatientId, unit: String },

    /// Destination unit had no bed; the patient left without a commitment
    UnitSaturated { patient_id: PatientId, unit: String },

    /// Consultation ended with every aide busy
    TransportUnavailable {
        patient_id: PatientId,
        doctor_id: Option<StaffId>,
    },

    RoomInspected { room: RoomId, nurse_id: StaffId },

    ConsultationStarted {
        patient_id: PatientId,
        doctor_id: StaffId,
        severity: Severity,
        until: DateTime<Utc>,
    },
}

impl fmt::Display for TickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickAction::StaffReleased { staff_id, role } => {
                write!(f, "{} {} available", role, staff_id)
            }
            TickAction::TransportStarted {
                patient_id,
                aide_id,
                destination,
                priority,
                ..
            } => write!(
                f,
                "Aide {} transporting {} to {} ({})",
                aide_id, patient_id, destination, priority
            ),
            TickAction::UnitCommitted { patient_id, unit } => {
                write!(f, "Bed committed in {} for {}", unit, patient_id)
            }
            TickAction::UnitSaturated { patient_id, unit } => {
                write!(f, "{} saturated, no bed committed for {}", unit, patient_id)
            }
            TickAction::TransportUnavailable { patient_id, .. } => {
                write!(f, "Patient {} awaiting transport (no aide available)", patient_id)
            }
            TickAction::RoomInspected { room, nurse_id } => {
                write!(f, "Nurse {} inspecting room {}", nurse_id, room)
            }
            TickAction::ConsultationStarted {
                patient_id,
                doctor_id,
                severity,
                until,
            } => write!(
                f,
                "Doctor {} consulting {} ({}) until {}",
                doctor_id,
                patient_id,
                severity,
                until.format("%H:%M")
            ),
        }
    }
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    /// Instant the tick was evaluated at
    pub now: DateTime<Utc>,

    /// State changes in the order they were applied
    pub actions: Vec<TickAction>,
}

impl TickResult {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Human-readable descriptors, one per action
    pub fn descriptions(&self) -> Vec<String> {
        self.actions.iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// Read views
// ============================================================================

/// Occupied room left uninspected too long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveillanceViolation {
    pub room: RoomId,
    pub occupancy: usize,
    pub minutes_unsupervised: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: RoomId,
    pub capacity: usize,
    pub occupancy: usize,
    pub patients: Vec<PatientId>,
    pub last_inspection: DateTime<Utc>,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id(),
            capacity: room.capacity(),
            occupancy: room.occupancy(),
            patients: room.patients().to_vec(),
            last_inspection: room.last_inspection(),
        }
    }
}

/// Everything a front end shows at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBoard {
    pub now: DateTime<Utc>,
    pub rooms: Vec<RoomView>,
    pub staff: Vec<StaffMember>,
    pub queue: Vec<QueueEntry>,
    pub awaiting_transport: Vec<PatientId>,
    pub units: Vec<TransferUnit>,
    pub metrics: InstantMetrics,
}

// ============================================================================
// Department
// ============================================================================

/// One emergency department session
///
/// Owns every entity; the event sink is the only thing it shares with the
/// outside world. `Department` is `Send` but not `Sync`: wrap it in
/// [`crate::orchestrator::SharedDepartment`] for several callers.
pub struct Department {
    /// Patients, rooms, staff, units
    state: DepartmentState,

    /// Queue ordering
    priority: PriorityEngine,

    /// Post-consultation routing
    advisor: TransferAdvisor,

    /// Rules the department was opened with, defaults applied
    rules: ResolvedRules,

    /// SHA-256 of `rules`, stamped into checkpoints
    config_hash: String,

    /// Stamped on every event record
    session_id: Uuid,

    /// Append-only event destination
    events: Box<dyn EventSink>,
}

impl fmt::Debug for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Department")
            .field("session_id", &self.session_id)
            .field("config_hash", &self.config_hash)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Department {
    /// Open a department from a rule provider
    ///
    /// Missing rule sections fall back to their defaults; inconsistent
    /// rules (duplicate rooms or units, negative durations) are rejected.
    /// Every room starts as inspected at `opened_at`.
    pub fn new(
        provider: &dyn RuleProvider,
        opened_at: DateTime<Utc>,
        events: Box<dyn EventSink>,
    ) -> Result<Self, DepartmentError> {
        let rules = ResolvedRules::from_provider(provider);
        rules.validate()?;

        let rooms = rules
            .rooms
            .iter()
            .map(|r| Room::new(r.id, r.capacity, opened_at))
            .collect();

        let mut staff = Vec::new();
        for (role, records) in [
            (StaffRole::Doctor, &rules.staff.doctors),
            (StaffRole::Nurse, &rules.staff.nurses),
            (StaffRole::Aide, &rules.staff.aides),
        ] {
            for (i, record) in records.iter().enumerate() {
                staff.push(StaffMember::new(
                    format!("{}_{}", role.id_prefix(), i + 1),
                    record.name.clone(),
                    role,
                    record.kind,
                ));
            }
        }

        let units = rules
            .transfer_units
            .iter()
            .map(|u| TransferUnit::new(u.name.clone(), u.capacity, u.specialties.iter()))
            .collect();

        let state = DepartmentState::new(rooms, staff, units);
        let session_id = Uuid::new_v4();

        tracing::info!(
            %session_id,
            rooms = state.rooms().len(),
            capacity = state.total_room_capacity(),
            staff = state.staff().len(),
            units = state.units().len(),
            "department opened"
        );

        Self::assemble(rules, state, session_id, events)
    }

    /// Wire engines around an existing state
    pub(crate) fn assemble(
        rules: ResolvedRules,
        state: DepartmentState,
        session_id: Uuid,
        events: Box<dyn EventSink>,
    ) -> Result<Self, DepartmentError> {
        let config_hash = compute_config_hash(&rules)?;
        Ok(Self {
            state,
            priority: PriorityEngine::from_rules(&rules.priority_rules),
            advisor: TransferAdvisor::new(rules.special_rules.clone(), rules.default_unit.clone()),
            rules,
            config_hash,
            session_id,
            events,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> &DepartmentState {
        &self.state
    }

    pub fn rules(&self) -> &ResolvedRules {
        &self.rules
    }

    pub fn priority_engine(&self) -> &PriorityEngine {
        &self.priority
    }

    pub fn advisor(&self) -> &TransferAdvisor {
        &self.advisor
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Place a patient in the first room with space
    ///
    /// On `RoomFull` the patient is not stored: resubmitting later is up to
    /// the caller.
    pub fn admit(&mut self, patient: Patient, now: DateTime<Utc>) -> Result<RoomId, DepartmentError> {
        let patient_id = patient.id().to_string();
        let name = patient.display_name();
        let severity = patient.severity();

        match self.state.admit(patient) {
            Ok(room) => {
                tracing::info!(patient_id = %patient_id, %severity, room, "patient admitted");
                self.log_event(
                    now,
                    Event::PatientAdmitted {
                        patient_id,
                        name,
                        severity,
                        room,
                    },
                );
                Ok(room)
            }
            Err(err @ StoreError::RoomFull { .. }) => {
                tracing::warn!(patient_id = %patient_id, %severity, "admission refused, rooms full");
                self.log_event(now, Event::RoomFull { patient_id, severity });
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the staff state machine to `now`
    ///
    /// Calling it twice with the same `now` yields no actions the second
    /// time: every transition of the first call pushes its subject's next
    /// deadline past `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickResult {
        let mut actions = Vec::new();

        self.release_due_support_staff(now, &mut actions);
        self.complete_consultations(now, &mut actions);
        self.inspect_rooms(now, &mut actions);
        self.start_consultations(now, &mut actions);

        tracing::debug!(%now, actions = actions.len(), "tick");
        TickResult { now, actions }
    }

    /// Step 1: nurses and aides whose activity ended become available
    fn release_due_support_staff(&mut self, now: DateTime<Utc>, actions: &mut Vec<TickAction>) {
        for member in self.state.staff_mut() {
            if member.role() != StaffRole::Doctor && member.is_due(now) {
                member.release();
                actions.push(TickAction::StaffReleased {
                    staff_id: member.id().to_string(),
                    role: member.role(),
                });
            }
        }
    }

    /// Step 2: doctors whose consultation ended hand their patient over
    fn complete_consultations(&mut self, now: DateTime<Utc>, actions: &mut Vec<TickAction>) {
        let finished: Vec<(StaffId, Option<PatientId>)> = self
            .state
            .staff_with_role(StaffRole::Doctor)
            .filter(|d| d.is_due(now))
            .map(|d| (d.id().to_string(), d.patient_in_charge().map(str::to_string)))
            .collect();

        for (doctor_id, patient_id) in finished {
            if let Some(doctor) = self.state.staff_member_mut(&doctor_id) {
                doctor.release();
            }
            if let Some(patient_id) = patient_id {
                self.hand_off(&patient_id, Some(doctor_id), now, actions);
            }
        }
    }

    /// Give a post-consultation patient to the first available aide
    ///
    /// Without an aide the patient is left InConsult in its room.
    fn hand_off(
        &mut self,
        patient_id: &str,
        doctor_id: Option<StaffId>,
        now: DateTime<Utc>,
        actions: &mut Vec<TickAction>,
    ) {
        let Some(aide_id) = self
            .state
            .first_available(StaffRole::Aide)
            .map(|a| a.id().to_string())
        else {
            tracing::warn!(patient_id, "no aide available, patient awaiting transport");
            actions.push(TickAction::TransportUnavailable {
                patient_id: patient_id.to_string(),
                doctor_id,
            });
            self.log_event(
                now,
                Event::TransportUnavailable {
                    patient_id: patient_id.to_string(),
                },
            );
            return;
        };

        let Some(patient) = self.state.get_patient(patient_id) else {
            tracing::warn!(patient_id, "consultation ended for unknown patient");
            return;
        };
        let severity = patient.severity();
        let suggestion = self.advisor.suggest(patient, self.state.units());
        let destination = suggestion.destination.clone();

        if let Some(doctor_id) = &doctor_id {
            self.log_event(
                now,
                Event::ConsultationCompleted {
                    patient_id: patient_id.to_string(),
                    doctor_id: doctor_id.clone(),
                    suggested_unit: destination.clone(),
                },
            );
        }

        self.leave_department(patient_id, PatientStatus::Transferred);

        if let Some(aide) = self.state.staff_member_mut(&aide_id) {
            aide.assign(
                Some(patient_id.to_string()),
                now + Duration::minutes(AIDE_TRANSPORT_MINUTES),
            );
        }
        actions.push(TickAction::TransportStarted {
            patient_id: patient_id.to_string(),
            doctor_id,
            aide_id: aide_id.clone(),
            destination: destination.clone(),
            priority: suggestion.priority,
        });
        self.log_event(
            now,
            Event::TransportStarted {
                patient_id: patient_id.to_string(),
                aide_id,
                destination: destination.clone(),
                priority: suggestion.priority,
            },
        );

        let committed = if self.state.unit(&destination).is_some() {
            match self.state.commit_unit_transfer(&destination) {
                Ok(()) => {
                    if let Some(patient) = self.state.get_patient_mut(patient_id) {
                        patient.set_committed_unit(Some(destination.clone()));
                    }
                    actions.push(TickAction::UnitCommitted {
                        patient_id: patient_id.to_string(),
                        unit: destination.clone(),
                    });
                    true
                }
                Err(err) => {
                    tracing::warn!(patient_id, unit = %destination, error = %err, "unit saturated");
                    actions.push(TickAction::UnitSaturated {
                        patient_id: patient_id.to_string(),
                        unit: destination.clone(),
                    });
                    self.log_event(
                        now,
                        Event::UnitSaturated {
                            unit: destination.clone(),
                            patient_id: patient_id.to_string(),
                        },
                    );
                    false
                }
            }
        } else {
            false
        };

        tracing::info!(patient_id, destination = %destination, committed, "patient transferred");
        self.log_event(
            now,
            Event::PatientTransferred {
                patient_id: patient_id.to_string(),
                destination,
                severity,
                committed,
            },
        );
    }

    /// Step 3: stale rooms get the next free nurse
    fn inspect_rooms(&mut self, now: DateTime<Utc>, actions: &mut Vec<TickAction>) {
        let due: Vec<RoomId> = self
            .state
            .rooms()
            .iter()
            .filter(|r| now - r.last_inspection() >= Duration::minutes(INSPECTION_INTERVAL_MINUTES))
            .map(Room::id)
            .collect();

        for room_id in due {
            let Some(nurse_id) = self
                .state
                .first_available(StaffRole::Nurse)
                .map(|n| n.id().to_string())
            else {
                break;
            };

            if let Some(nurse) = self.state.staff_member_mut(&nurse_id) {
                nurse.assign(None, now + Duration::minutes(NURSE_INSPECTION_MINUTES));
            }
            if let Some(room) = self.state.rooms_mut().iter_mut().find(|r| r.id() == room_id) {
                room.mark_inspected(now);
            }

            actions.push(TickAction::RoomInspected {
                room: room_id,
                nurse_id: nurse_id.clone(),
            });
            self.log_event(
                now,
                Event::RoomInspected {
                    room: room_id,
                    nurse_id,
                },
            );
        }
    }

    /// Step 4: free doctors take the head of the queue
    fn start_consultations(&mut self, now: DateTime<Utc>, actions: &mut Vec<TickAction>) {
        let doctors: Vec<StaffId> = self
            .state
            .staff_with_role(StaffRole::Doctor)
            .filter(|d| d.is_available())
            .map(|d| d.id().to_string())
            .collect();

        for doctor_id in doctors {
            let Some((patient_id, severity)) = self
                .priority
                .select_next(self.state.waiting_patients(), now)
                .map(|p| (p.id().to_string(), p.severity()))
            else {
                break;
            };

            let duration_minutes = self.rules.priority_rules.consultation_minutes(severity);
            let until = now + Duration::minutes(duration_minutes);

            self.state.remove_from_waiting(&patient_id);
            if let Some(patient) = self.state.get_patient_mut(&patient_id) {
                patient.set_status(PatientStatus::InConsult);
            }
            if let Some(doctor) = self.state.staff_member_mut(&doctor_id) {
                doctor.assign(Some(patient_id.clone()), until);
            }

            tracing::info!(patient_id = %patient_id, doctor_id = %doctor_id, %severity, %until, "consultation started");
            actions.push(TickAction::ConsultationStarted {
                patient_id: patient_id.clone(),
                doctor_id: doctor_id.clone(),
                severity,
                until,
            });
            self.log_event(
                now,
                Event::ConsultationStarted {
                    patient_id,
                    severity,
                    doctor_id,
                    duration_minutes,
                },
            );
        }
    }

    // ========================================================================
    // Queue & metrics
    // ========================================================================

    /// Waiting patients in consultation order
    pub fn priority_queue(&self, now: DateTime<Utc>) -> Vec<QueueEntry> {
        self.priority.queue_view(self.state.waiting_patients(), now)
    }

    pub fn metrics(&self, now: DateTime<Utc>) -> InstantMetrics {
        InstantMetrics::compute(&self.state, now)
    }

    // ========================================================================
    // Explicit moves
    // ========================================================================

    /// Commit a bed in `unit_name` and move the patient there
    ///
    /// Allowed for Waiting and InConsult patients, and for Transferred ones
    /// that left without a committed bed. A doctor still holding the patient
    /// is released.
    pub fn transfer(
        &mut self,
        patient_id: &str,
        unit_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DepartmentError> {
        let unit = self
            .state
            .unit(unit_name)
            .ok_or_else(|| DepartmentError::UnitNotFound(unit_name.to_string()))?;
        let patient = self
            .state
            .get_patient(patient_id)
            .ok_or_else(|| DepartmentError::PatientNotFound(patient_id.to_string()))?;

        let eligible = match patient.status() {
            PatientStatus::Waiting | PatientStatus::InConsult => true,
            PatientStatus::Transferred => patient.committed_unit().is_none(),
            PatientStatus::Departed => false,
        };
        if !eligible {
            return Err(DepartmentError::PatientNotActive {
                patient_id: patient_id.to_string(),
                status: patient.status(),
            });
        }
        if !unit.has_space() {
            tracing::warn!(patient_id, unit = unit_name, "transfer refused, unit full");
            return Err(DepartmentError::UnitFull(unit_name.to_string()));
        }
        let severity = patient.severity();

        self.state.commit_unit_transfer(unit_name)?;

        let doctor_id = self
            .state
            .staff_with_role(StaffRole::Doctor)
            .find(|d| d.patient_in_charge() == Some(patient_id))
            .map(|d| d.id().to_string());
        if let Some(doctor) = doctor_id.and_then(|id| self.state.staff_member_mut(&id)) {
            doctor.release();
        }

        self.leave_department(patient_id, PatientStatus::Transferred);
        if let Some(patient) = self.state.get_patient_mut(patient_id) {
            patient.set_committed_unit(Some(unit_name.to_string()));
        }

        tracing::info!(patient_id, unit = unit_name, "patient transferred");
        self.log_event(
            now,
            Event::PatientTransferred {
                patient_id: patient_id.to_string(),
                destination: unit_name.to_string(),
                severity,
                committed: true,
            },
        );
        Ok(())
    }

    /// A waiting patient leaves without being seen
    pub fn record_departure(&mut self, patient_id: &str, now: DateTime<Utc>) -> Result<(), DepartmentError> {
        let patient = self
            .state
            .get_patient(patient_id)
            .ok_or_else(|| DepartmentError::PatientNotFound(patient_id.to_string()))?;
        if patient.status() != PatientStatus::Waiting {
            return Err(DepartmentError::PatientNotActive {
                patient_id: patient_id.to_string(),
                status: patient.status(),
            });
        }

        self.leave_department(patient_id, PatientStatus::Departed);

        tracing::info!(patient_id, "patient left without being seen");
        self.log_event(
            now,
            Event::PatientDeparted {
                patient_id: patient_id.to_string(),
            },
        );
        Ok(())
    }

    /// Detach from queue and room, set the final status, archive
    fn leave_department(&mut self, patient_id: &str, status: PatientStatus) {
        self.state.remove_from_waiting(patient_id);
        if let Err(err) = self.state.discharge_from_room(patient_id) {
            tracing::warn!(patient_id, error = %err, "discharge failed");
        }
        if let Some(patient) = self.state.get_patient_mut(patient_id) {
            patient.set_status(status);
        }
        self.state.archive(patient_id);
    }

    /// Patients whose consultation ended while no aide was free
    ///
    /// InConsult with no doctor holding them; ordered by id.
    pub fn awaiting_transport(&self) -> Vec<&Patient> {
        self.state
            .patients()
            .values()
            .filter(|p| p.status() == PatientStatus::InConsult)
            .filter(|p| {
                !self
                    .state
                    .staff_with_role(StaffRole::Doctor)
                    .any(|d| d.patient_in_charge() == Some(p.id()))
            })
            .collect()
    }

    /// Retry the aide hand-off for one stranded patient
    ///
    /// Returns the resulting actions; a `TransportUnavailable` action means
    /// every aide is still busy.
    pub fn dispatch_transport(
        &mut self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<TickAction>, DepartmentError> {
        if !self.awaiting_transport().iter().any(|p| p.id() == patient_id) {
            let patient = self
                .state
                .get_patient(patient_id)
                .ok_or_else(|| DepartmentError::PatientNotFound(patient_id.to_string()))?;
            return Err(DepartmentError::PatientNotActive {
                patient_id: patient_id.to_string(),
                status: patient.status(),
            });
        }

        let mut actions = Vec::new();
        self.hand_off(patient_id, None, now, &mut actions);
        Ok(actions)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Change a room's capacity; returns the previous one
    pub fn set_room_capacity(
        &mut self,
        room_id: RoomId,
        capacity: usize,
        now: DateTime<Utc>,
    ) -> Result<usize, DepartmentError> {
        let previous = self.state.set_room_capacity(room_id, capacity)?;
        tracing::info!(room = room_id, previous, capacity, "room capacity changed");
        self.log_event(
            now,
            Event::CapacityChanged {
                room: room_id,
                previous,
                capacity,
            },
        );
        Ok(previous)
    }

    /// Add a staff member, available immediately
    pub fn add_staff(&mut self, role: StaffRole, record: StaffRecord, now: DateTime<Utc>) -> StaffId {
        let id = self.state.next_staff_id(role);
        self.state
            .add_staff(StaffMember::new(id.clone(), record.name.clone(), role, record.kind));

        tracing::info!(staff_id = %id, %role, name = %record.name, "staff added");
        self.log_event(
            now,
            Event::StaffAdded {
                staff_id: id.clone(),
                name: record.name,
                role,
            },
        );
        id
    }

    /// Occupied rooms left uninspected for more than the inspection interval
    ///
    /// Each violation is also logged.
    pub fn check_constraints(&mut self, now: DateTime<Utc>) -> Vec<SurveillanceViolation> {
        let violations: Vec<SurveillanceViolation> = self
            .state
            .rooms()
            .iter()
            .filter(|r| r.occupancy() > 0)
            .filter_map(|r| {
                let minutes = minutes_between(r.last_inspection(), now);
                (minutes > INSPECTION_INTERVAL_MINUTES as f64).then(|| SurveillanceViolation {
                    room: r.id(),
                    occupancy: r.occupancy(),
                    minutes_unsupervised: minutes,
                })
            })
            .collect();

        for v in &violations {
            tracing::warn!(room = v.room, minutes = v.minutes_unsupervised, "room unsupervised");
            self.log_event(
                now,
                Event::SurveillanceViolation {
                    room: v.room,
                    minutes_unsupervised: v.minutes_unsupervised,
                },
            );
        }
        violations
    }

    pub fn status_board(&self, now: DateTime<Utc>) -> StatusBoard {
        StatusBoard {
            now,
            rooms: self.state.rooms().iter().map(RoomView::from).collect(),
            staff: self.state.staff().to_vec(),
            queue: self.priority_queue(now),
            awaiting_transport: self
                .awaiting_transport()
                .iter()
                .map(|p| p.id().to_string())
                .collect(),
            units: self.state.units().to_vec(),
            metrics: self.metrics(now),
        }
    }

    // ========================================================================
    // Event logging
    // ========================================================================

    fn log_event(&mut self, now: DateTime<Utc>, event: Event) {
        let metrics = InstantMetrics::compute(&self.state, now);
        tracing::trace!(event_type = event.event_type(), "event");
        self.events
            .append(EventRecord::new(self.session_id, now, event, metrics));
    }
}
