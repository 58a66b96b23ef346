//! Domain models for the emergency department

pub mod event;
pub mod patient;
pub mod room;
pub mod staff;
pub mod state;
pub mod transfer_unit;

// Re-exports
pub use event::{Event, EventLog, EventRecord, EventSink, JsonLinesSink};
pub use patient::{Patient, PatientId, PatientStatus, RoomId, Severity};
pub use room::Room;
pub use staff::{Availability, StaffId, StaffKind, StaffMember, StaffRole};
pub use state::{DepartmentState, StoreError};
pub use transfer_unit::TransferUnit;
