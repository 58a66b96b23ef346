//! Department entity store
//!
//! Owns every patient, room, staff member and transfer unit of one
//! department session. Relationships are id-based: a patient names its room,
//! a staff member names the patient in charge, and both are resolved through
//! this store. Nothing here owns anything else, so archiving a patient can
//! never leave a dangling reference.
//!
//! # Critical Invariants
//!
//! 1. **Room bound**: every room holds at most `capacity` patients
//! 2. **Room link**: a patient names a room iff it is Waiting or InConsult,
//!    and that room lists it
//! 3. **Queue membership**: `waiting` holds exactly the Waiting patients
//! 4. **No deletion**: patients leaving the flow move to `archived`
//! 5. **Unit bound**: unit occupancy never exceeds unit capacity

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::patient::{Patient, PatientId, PatientStatus, RoomId};
use super::room::Room;
use super::staff::{StaffMember, StaffRole};
use super::transfer_unit::TransferUnit;

/// Failures of store-level mutations; none of them leaves a partial change
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("No room available for patient {patient_id} ({occupied}/{capacity} places taken)")]
    RoomFull {
        patient_id: PatientId,
        capacity: usize,
        occupied: usize,
    },

    #[error("Patient {0} is already registered")]
    DuplicatePatient(PatientId),

    #[error("Patient {0} not found")]
    PatientNotFound(PatientId),

    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("Transfer unit {0} not found")]
    UnitNotFound(String),

    #[error("Transfer unit {0} is full")]
    UnitFull(String),

    #[error("Room {room} holds {occupancy} patients, cannot shrink to {requested}")]
    CapacityBelowOccupancy {
        room: RoomId,
        occupancy: usize,
        requested: usize,
    },
}

/// Complete department state
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use ed_flow_core::{DepartmentState, Patient, Room, Severity};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
/// let mut state = DepartmentState::new(vec![Room::new(1, 1, t0)], vec![], vec![]);
///
/// let room = state.admit(Patient::new("P1", "Jean", "Martin", Severity::Minor, t0)).unwrap();
/// assert_eq!(room, 1);
/// assert!(state.admit(Patient::new("P2", "Lucie", "Simon", Severity::Minor, t0)).is_err());
/// assert_eq!(state.waiting_ids().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentState {
    /// Every patient ever admitted, by id
    patients: BTreeMap<PatientId, Patient>,

    /// Waiting patients in admission order
    waiting: Vec<PatientId>,

    /// Patients that left the department, in leaving order
    archived: Vec<PatientId>,

    /// Rooms in configured order (admission scans this order)
    rooms: Vec<Room>,

    /// Staff in configured order (assignment picks the first available)
    staff: Vec<StaffMember>,

    /// Transfer units in configured order (suggestion scans this order)
    units: Vec<TransferUnit>,
}

impl DepartmentState {
    pub fn new(rooms: Vec<Room>, staff: Vec<StaffMember>, units: Vec<TransferUnit>) -> Self {
        Self {
            patients: BTreeMap::new(),
            waiting: Vec::new(),
            archived: Vec::new(),
            rooms,
            staff,
            units,
        }
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Place a patient in the first room with spare capacity
    ///
    /// The patient becomes Waiting and joins the queue. On `RoomFull` the
    /// patient is dropped: the caller decides whether to resubmit later.
    pub fn admit(&mut self, mut patient: Patient) -> Result<RoomId, StoreError> {
        if self.patients.contains_key(patient.id()) {
            return Err(StoreError::DuplicatePatient(patient.id().to_string()));
        }

        let capacity = self.total_room_capacity();
        let occupied = self.occupied_room_places();

        let Some(room) = self.rooms.iter_mut().find(|room| room.has_space()) else {
            return Err(StoreError::RoomFull {
                patient_id: patient.id().to_string(),
                capacity,
                occupied,
            });
        };

        room.add_patient(patient.id());
        let room_id = room.id();

        patient.set_room(Some(room_id));
        patient.set_status(PatientStatus::Waiting);

        let id = patient.id().to_string();
        self.waiting.push(id.clone());
        self.patients.insert(id, patient);

        Ok(room_id)
    }

    /// Detach a patient from its room without touching its status
    ///
    /// Returns the room it was in, `None` if it had none.
    pub fn discharge_from_room(&mut self, patient_id: &str) -> Result<Option<RoomId>, StoreError> {
        let patient = self
            .patients
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::PatientNotFound(patient_id.to_string()))?;

        let Some(room_id) = patient.room() else {
            return Ok(None);
        };
        patient.set_room(None);

        if let Some(room) = self.rooms.iter_mut().find(|r| r.id() == room_id) {
            room.remove_patient(patient_id);
        }
        Ok(Some(room_id))
    }

    /// Drop a patient from the consultation queue
    pub(crate) fn remove_from_waiting(&mut self, patient_id: &str) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|id| id != patient_id);
        self.waiting.len() != before
    }

    /// Move a patient to the archive (idempotent)
    pub(crate) fn archive(&mut self, patient_id: &str) {
        if !self.archived.iter().any(|id| id == patient_id) {
            self.archived.push(patient_id.to_string());
        }
    }

    // ========================================================================
    // Patients
    // ========================================================================

    pub fn get_patient(&self, id: &str) -> Option<&Patient> {
        self.patients.get(id)
    }

    pub(crate) fn get_patient_mut(&mut self, id: &str) -> Option<&mut Patient> {
        self.patients.get_mut(id)
    }

    pub fn patients(&self) -> &BTreeMap<PatientId, Patient> {
        &self.patients
    }

    pub fn waiting_ids(&self) -> &[PatientId] {
        &self.waiting
    }

    /// Waiting patients in admission order
    pub fn waiting_patients(&self) -> Vec<&Patient> {
        self.waiting
            .iter()
            .filter_map(|id| self.patients.get(id))
            .collect()
    }

    pub fn archived_ids(&self) -> &[PatientId] {
        &self.archived
    }

    pub fn count_by_status(&self, status: PatientStatus) -> usize {
        self.patients
            .values()
            .filter(|p| p.status() == status)
            .count()
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id() == id)
    }

    pub(crate) fn rooms_mut(&mut self) -> &mut [Room] {
        &mut self.rooms
    }

    pub fn total_room_capacity(&self) -> usize {
        self.rooms.iter().map(Room::capacity).sum()
    }

    pub fn occupied_room_places(&self) -> usize {
        self.rooms.iter().map(Room::occupancy).sum()
    }

    /// Change a room's capacity, refusing to go below current occupancy
    ///
    /// Returns the previous capacity.
    pub fn set_room_capacity(&mut self, id: RoomId, capacity: usize) -> Result<usize, StoreError> {
        let room = self
            .rooms
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(StoreError::RoomNotFound(id))?;

        if capacity < room.occupancy() {
            return Err(StoreError::CapacityBelowOccupancy {
                room: id,
                occupancy: room.occupancy(),
                requested: capacity,
            });
        }

        let previous = room.capacity();
        room.set_capacity(capacity);
        Ok(previous)
    }

    // ========================================================================
    // Staff
    // ========================================================================

    pub fn staff(&self) -> &[StaffMember] {
        &self.staff
    }

    pub fn staff_with_role(&self, role: StaffRole) -> impl Iterator<Item = &StaffMember> {
        self.staff.iter().filter(move |s| s.role() == role)
    }

    pub fn staff_member(&self, id: &str) -> Option<&StaffMember> {
        self.staff.iter().find(|s| s.id() == id)
    }

    pub(crate) fn staff_member_mut(&mut self, id: &str) -> Option<&mut StaffMember> {
        self.staff.iter_mut().find(|s| s.id() == id)
    }

    pub(crate) fn staff_mut(&mut self) -> &mut [StaffMember] {
        &mut self.staff
    }

    /// First available member of `role`, in configured order
    pub fn first_available(&self, role: StaffRole) -> Option<&StaffMember> {
        self.staff_with_role(role).find(|s| s.is_available())
    }

    /// Next free id for `role`: `nurse_1`, `nurse_2`, ...
    pub fn next_staff_id(&self, role: StaffRole) -> String {
        let mut n = self.staff_with_role(role).count() + 1;
        loop {
            let candidate = format!("{}_{}", role.id_prefix(), n);
            if self.staff_member(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn add_staff(&mut self, member: StaffMember) {
        self.staff.push(member);
    }

    // ========================================================================
    // Transfer units
    // ========================================================================

    pub fn units(&self) -> &[TransferUnit] {
        &self.units
    }

    pub fn unit(&self, name: &str) -> Option<&TransferUnit> {
        self.units.iter().find(|u| u.name() == name)
    }

    /// Take one bed in `unit_name`
    pub fn commit_unit_transfer(&mut self, unit_name: &str) -> Result<(), StoreError> {
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.name() == unit_name)
            .ok_or_else(|| StoreError::UnitNotFound(unit_name.to_string()))?;

        if unit.accept() {
            Ok(())
        } else {
            Err(StoreError::UnitFull(unit_name.to_string()))
        }
    }
}
