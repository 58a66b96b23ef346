//! Orchestrator - the department session
//!
//! See `engine.rs` for the tick state machine, `checkpoint.rs` for
//! save/restore and `shared.rs` for multi-caller access.

pub mod checkpoint;
pub mod engine;
pub mod shared;

// Re-export main types for convenience
pub use engine::{
    Department, DepartmentError, ErrorKind, RoomView, StatusBoard, SurveillanceViolation,
    TickAction, TickResult, AIDE_TRANSPORT_MINUTES, INSPECTION_INTERVAL_MINUTES,
    NURSE_INSPECTION_MINUTES,
};
pub use shared::SharedDepartment;

// Re-export checkpoint types
pub use checkpoint::{compute_config_hash, validate_snapshot, DepartmentSnapshot};
