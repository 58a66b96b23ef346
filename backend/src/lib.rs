//! ED Flow Core - Rust Engine
//!
//! Patient-flow engine for a single emergency department with deterministic,
//! caller-driven execution.
//!
//! # Architecture
//!
//! - **core**: Simulation clock
//! - **models**: Domain types (Patient, Room, StaffMember, TransferUnit, State, Events)
//! - **rules**: Rule provider contract and JSON rules files
//! - **priority**: Effective priority and queue ordering
//! - **transfer**: Post-consultation routing
//! - **orchestrator**: Department session and tick state machine
//! - **metrics**: Instant metrics and event-log analytics
//! - **arrivals**: Seeded demo patients and scenarios
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Time is always supplied by the caller, never read from a wall clock
//! 2. Room occupancy never exceeds capacity
//! 3. Priority is recomputed at every read, never stored
//! 4. Patients are archived, never deleted

// Module declarations
pub mod arrivals;
pub mod core;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod priority;
pub mod rng;
pub mod rules;
pub mod transfer;

// Re-exports for convenience
pub use arrivals::{ArrivalConfig, PatientGenerator, SeverityDistribution};
pub use core::time::SimulationClock;
pub use metrics::InstantMetrics;
pub use models::{
    event::{Event, EventLog, EventRecord, EventSink, JsonLinesSink},
    patient::{Patient, PatientId, PatientStatus, RoomId, Severity},
    room::Room,
    staff::{Availability, StaffKind, StaffMember, StaffRole},
    state::{DepartmentState, StoreError},
    transfer_unit::TransferUnit,
};
pub use orchestrator::{
    Department, DepartmentError, ErrorKind, SharedDepartment, StatusBoard, TickAction, TickResult,
};
pub use priority::{PriorityEngine, QueueEntry};
pub use rng::RngManager;
pub use rules::{RuleProvider, RulesConfig, RulesError};
pub use transfer::{TransferAdvisor, TransferPriority, TransferSuggestion};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn ed_flow_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::department::PyDepartment>()?;
    Ok(())
}
