//! Multi-caller access to one department
//!
//! Capacity counts and queue membership are not safe under concurrent
//! mutation, so every operation runs under a single lock per department.
//! Reads go through the same lock and see a consistent snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::metrics::InstantMetrics;
use crate::models::patient::{Patient, RoomId};
use crate::models::staff::{StaffId, StaffRole};
use crate::orchestrator::engine::{Department, DepartmentError, StatusBoard, TickResult};
use crate::priority::QueueEntry;
use crate::rules::StaffRecord;

/// Cloneable handle; clones share the same department
#[derive(Debug, Clone)]
pub struct SharedDepartment {
    inner: Arc<Mutex<Department>>,
}

impl SharedDepartment {
    pub fn new(department: Department) -> Self {
        Self {
            inner: Arc::new(Mutex::new(department)),
        }
    }

    /// A panic in another caller does not corrupt state between operations,
    /// so a poisoned lock is taken over.
    fn lock(&self) -> MutexGuard<'_, Department> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access
    pub fn with<R>(&self, f: impl FnOnce(&mut Department) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn admit(&self, patient: Patient, now: DateTime<Utc>) -> Result<RoomId, DepartmentError> {
        self.lock().admit(patient, now)
    }

    pub fn tick(&self, now: DateTime<Utc>) -> TickResult {
        self.lock().tick(now)
    }

    pub fn transfer(
        &self,
        patient_id: &str,
        unit_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DepartmentError> {
        self.lock().transfer(patient_id, unit_name, now)
    }

    pub fn set_room_capacity(
        &self,
        room_id: RoomId,
        capacity: usize,
        now: DateTime<Utc>,
    ) -> Result<usize, DepartmentError> {
        self.lock().set_room_capacity(room_id, capacity, now)
    }

    pub fn add_staff(&self, role: StaffRole, record: StaffRecord, now: DateTime<Utc>) -> StaffId {
        self.lock().add_staff(role, record, now)
    }

    pub fn record_departure(&self, patient_id: &str, now: DateTime<Utc>) -> Result<(), DepartmentError> {
        self.lock().record_departure(patient_id, now)
    }

    pub fn priority_queue(&self, now: DateTime<Utc>) -> Vec<QueueEntry> {
        self.lock().priority_queue(now)
    }

    pub fn snapshot_metrics(&self, now: DateTime<Utc>) -> InstantMetrics {
        self.lock().metrics(now)
    }

    pub fn status_board(&self, now: DateTime<Utc>) -> StatusBoard {
        self.lock().status_board(now)
    }
}
