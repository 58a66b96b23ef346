//! Checkpoint - Save/Load Department State
//!
//! Serializes a whole department session to JSON so it can be resumed
//! later, possibly in another process.
//!
//! # Critical Invariants
//!
//! - **Config Matching**: a snapshot only loads under the rules it was taken with
//! - **Room Integrity**: occupancy within capacity, room links consistent both ways
//! - **Queue Integrity**: the waiting queue holds exactly the Waiting patients
//! - **Unit Integrity**: unit occupancy within capacity

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::event::EventSink;
use crate::models::patient::PatientStatus;
use crate::models::state::DepartmentState;
use crate::orchestrator::engine::{Department, DepartmentError};
use crate::rules::{ResolvedRules, RuleProvider};

// ============================================================================
// Snapshot Structure
// ============================================================================

/// Complete department state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentSnapshot {
    /// Session the snapshot was taken from; the restored department keeps it
    pub session_id: Uuid,

    /// SHA256 hash of the resolved rules (for validation)
    pub config_hash: String,

    /// Patients, rooms, staff and units
    pub state: DepartmentState,
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so that map
/// iteration order never changes the hash.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, DepartmentError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        DepartmentError::Checkpoint(format!("Config serialization failed: {}", e))
    })?;

    // Recursively sort all object keys for canonical representation
    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        DepartmentError::Checkpoint(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

fn invalid(msg: String) -> DepartmentError {
    DepartmentError::Checkpoint(msg)
}

/// Validate a restored state before anything runs on it
pub fn validate_snapshot(state: &DepartmentState) -> Result<(), DepartmentError> {
    // 1. Room bound and room -> patient links
    for room in state.rooms() {
        if room.occupancy() > room.capacity() {
            return Err(invalid(format!(
                "Room {} holds {} patients over capacity {}",
                room.id(),
                room.occupancy(),
                room.capacity()
            )));
        }
        for patient_id in room.patients() {
            let linked = state
                .get_patient(patient_id)
                .is_some_and(|p| p.room() == Some(room.id()) && p.status().holds_room());
            if !linked {
                return Err(invalid(format!(
                    "Room {} lists {} which is not placed there",
                    room.id(),
                    patient_id
                )));
            }
        }
    }

    // 2. Patient -> room links
    for patient in state.patients().values() {
        match patient.room() {
            Some(room_id) => {
                if !state.room(room_id).is_some_and(|r| r.contains(patient.id())) {
                    return Err(invalid(format!(
                        "Patient {} names room {} which does not list it",
                        patient.id(),
                        room_id
                    )));
                }
            }
            None if patient.status().holds_room() => {
                return Err(invalid(format!(
                    "Patient {} is {:?} without a room",
                    patient.id(),
                    patient.status()
                )));
            }
            None => {}
        }
    }

    // 3. Queue membership, no duplicates
    let mut seen = HashSet::new();
    for id in state.waiting_ids() {
        if !seen.insert(id.as_str()) {
            return Err(invalid(format!("Patient {} queued twice", id)));
        }
        if state.get_patient(id).map(|p| p.status()) != Some(PatientStatus::Waiting) {
            return Err(invalid(format!("Queued patient {} is not waiting", id)));
        }
    }
    if seen.len() != state.count_by_status(PatientStatus::Waiting) {
        return Err(invalid("Waiting patients missing from the queue".to_string()));
    }

    // 4. Unit bound
    for unit in state.units() {
        if unit.occupancy() > unit.capacity() {
            return Err(invalid(format!(
                "Unit {} occupancy {} over capacity {}",
                unit.name(),
                unit.occupancy(),
                unit.capacity()
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Save / Load
// ============================================================================

impl Department {
    /// Serialize the whole session to JSON
    pub fn save_state(&self) -> Result<String, DepartmentError> {
        let snapshot = DepartmentSnapshot {
            session_id: self.session_id(),
            config_hash: self.config_hash().to_string(),
            state: self.state().clone(),
        };
        serde_json::to_string(&snapshot)
            .map_err(|e| DepartmentError::Checkpoint(format!("Snapshot serialization failed: {}", e)))
    }

    /// Restore a session saved with [`Department::save_state`]
    ///
    /// `provider` must resolve to the same rules the snapshot was taken
    /// with; the event sink is supplied fresh.
    pub fn load_state(
        provider: &dyn RuleProvider,
        json: &str,
        events: Box<dyn EventSink>,
    ) -> Result<Department, DepartmentError> {
        let snapshot: DepartmentSnapshot = serde_json::from_str(json)
            .map_err(|e| DepartmentError::Checkpoint(format!("Invalid snapshot JSON: {}", e)))?;

        let rules = ResolvedRules::from_provider(provider);
        rules.validate()?;
        let config_hash = compute_config_hash(&rules)?;
        if config_hash != snapshot.config_hash {
            return Err(DepartmentError::Checkpoint(format!(
                "Config hash mismatch: snapshot {}, rules {}",
                snapshot.config_hash, config_hash
            )));
        }

        validate_snapshot(&snapshot.state)?;

        tracing::info!(
            session_id = %snapshot.session_id,
            patients = snapshot.state.patients().len(),
            "department restored"
        );
        Department::assemble(rules, snapshot.state, snapshot.session_id, events)
    }
}
