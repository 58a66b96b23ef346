//! Waiting room model
//!
//! Rooms are configured once from the rules; only their capacity (an
//! administrative edit) and their occupants change during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patient::{PatientId, RoomId};

/// A capacity-bounded waiting room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    capacity: usize,
    /// Occupants in placement order
    patients: Vec<PatientId>,
    last_inspection: DateTime<Utc>,
}

impl Room {
    /// Create an empty room, last inspected at `opened_at`
    pub fn new(id: RoomId, capacity: usize, opened_at: DateTime<Utc>) -> Self {
        Self {
            id,
            capacity,
            patients: Vec::new(),
            last_inspection: opened_at,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn patients(&self) -> &[PatientId] {
        &self.patients
    }

    pub fn occupancy(&self) -> usize {
        self.patients.len()
    }

    pub fn has_space(&self) -> bool {
        self.patients.len() < self.capacity
    }

    pub fn is_full(&self) -> bool {
        !self.has_space()
    }

    pub fn last_inspection(&self) -> DateTime<Utc> {
        self.last_inspection
    }

    /// Occupancy as a percentage of capacity (0 for a zero-capacity room)
    pub fn occupancy_pct(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.patients.len() as f64 / self.capacity as f64 * 100.0
    }

    /// Place a patient; returns false when full or already present
    pub(crate) fn add_patient(&mut self, patient_id: &str) -> bool {
        if self.is_full() || self.contains(patient_id) {
            return false;
        }
        self.patients.push(patient_id.to_string());
        true
    }

    /// Remove a patient; returns false if it was not here
    pub(crate) fn remove_patient(&mut self, patient_id: &str) -> bool {
        let before = self.patients.len();
        self.patients.retain(|id| id != patient_id);
        self.patients.len() != before
    }

    pub fn contains(&self, patient_id: &str) -> bool {
        self.patients.iter().any(|id| id == patient_id)
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub(crate) fn mark_inspected(&mut self, at: DateTime<Utc>) {
        self.last_inspection = at;
    }
}
