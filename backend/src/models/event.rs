//! Event logging for auditing and time-bucketed metrics.
//!
//! Every state change of the department is appended to an [`EventSink`] as an
//! [`EventRecord`]: the event itself, the simulated instant it happened at and
//! a metrics snapshot taken right after the change. The hourly series in
//! `crate::metrics` are computed from these records alone.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use ed_flow_core::models::event::{Event, EventLog, EventRecord, EventSink};
//! use ed_flow_core::metrics::InstantMetrics;
//! use ed_flow_core::Severity;
//!
//! let mut log = EventLog::new();
//! log.append(EventRecord::new(
//!     uuid::Uuid::nil(),
//!     Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
//!     Event::RoomFull { patient_id: "P9".to_string(), severity: Severity::Minor },
//!     InstantMetrics::default(),
//! ));
//! assert_eq!(log.records_of_type("ROOM_FULL").len(), 1);
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::InstantMetrics;
use crate::models::patient::{RoomId, Severity};
use crate::models::staff::StaffRole;
use crate::transfer::TransferPriority;

/// Department event capturing a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// Patient placed in a room
    PatientAdmitted {
        patient_id: String,
        name: String,
        severity: Severity,
        room: RoomId,
    },

    /// Admission refused, every room at capacity
    RoomFull {
        patient_id: String,
        severity: Severity,
    },

    ConsultationStarted {
        patient_id: String,
        severity: Severity,
        doctor_id: String,
        duration_minutes: i64,
    },

    ConsultationCompleted {
        patient_id: String,
        doctor_id: String,
        suggested_unit: String,
    },

    /// Aide took charge of a patient leaving consultation
    TransportStarted {
        patient_id: String,
        aide_id: String,
        destination: String,
        priority: TransferPriority,
    },

    /// Consultation ended while every aide was busy
    TransportUnavailable { patient_id: String },

    /// Patient left the department towards `destination`
    ///
    /// `committed` is true when a transfer-unit bed was taken for it.
    PatientTransferred {
        patient_id: String,
        destination: String,
        severity: Severity,
        committed: bool,
    },

    /// Transfer refused, unit at capacity
    UnitSaturated { unit: String, patient_id: String },

    RoomInspected { room: RoomId, nurse_id: String },

    /// Occupied room left uninspected past the inspection interval
    SurveillanceViolation { room: RoomId, minutes_unsupervised: f64 },

    CapacityChanged {
        room: RoomId,
        previous: usize,
        capacity: usize,
    },

    StaffAdded {
        staff_id: String,
        name: String,
        role: StaffRole,
    },

    /// Waiting patient left without being seen
    PatientDeparted { patient_id: String },
}

impl Event {
    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PatientAdmitted { .. } => "PATIENT_ADMITTED",
            Event::RoomFull { .. } => "ROOM_FULL",
            Event::ConsultationStarted { .. } => "CONSULTATION_STARTED",
            Event::ConsultationCompleted { .. } => "CONSULTATION_COMPLETED",
            Event::TransportStarted { .. } => "TRANSPORT_STARTED",
            Event::TransportUnavailable { .. } => "TRANSPORT_UNAVAILABLE",
            Event::PatientTransferred { .. } => "PATIENT_TRANSFERRED",
            Event::UnitSaturated { .. } => "UNIT_SATURATED",
            Event::RoomInspected { .. } => "ROOM_INSPECTED",
            Event::SurveillanceViolation { .. } => "SURVEILLANCE_VIOLATION",
            Event::CapacityChanged { .. } => "CAPACITY_CHANGED",
            Event::StaffAdded { .. } => "STAFF_ADDED",
            Event::PatientDeparted { .. } => "PATIENT_DEPARTED",
        }
    }

    /// Patient this event concerns, if any
    pub fn patient_id(&self) -> Option<&str> {
        match self {
            Event::PatientAdmitted { patient_id, .. }
            | Event::RoomFull { patient_id, .. }
            | Event::ConsultationStarted { patient_id, .. }
            | Event::ConsultationCompleted { patient_id, .. }
            | Event::TransportStarted { patient_id, .. }
            | Event::TransportUnavailable { patient_id }
            | Event::PatientTransferred { patient_id, .. }
            | Event::UnitSaturated { patient_id, .. }
            | Event::PatientDeparted { patient_id } => Some(patient_id),
            Event::RoomInspected { .. }
            | Event::SurveillanceViolation { .. }
            | Event::CapacityChanged { .. }
            | Event::StaffAdded { .. } => None,
        }
    }
}

/// One appended log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Department session that produced the record
    pub session_id: Uuid,
    /// Simulated instant of the change
    pub timestamp: DateTime<Utc>,
    pub event: Event,
    /// Metrics right after the change
    pub metrics: InstantMetrics,
}

impl EventRecord {
    pub fn new(
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        event: Event,
        metrics: InstantMetrics,
    ) -> Self {
        Self {
            session_id,
            timestamp,
            event,
            metrics,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

/// Append-only event destination
///
/// `append` must never block on the department or fail the caller: sinks
/// that can fail (files) log the problem and carry on.
pub trait EventSink: Send {
    /// Append one record
    fn append(&mut self, record: EventRecord);

    /// Every record, in append order
    fn records(&self) -> Vec<EventRecord>;

    /// Records with `from <= timestamp < to`, in append order
    fn records_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<EventRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.timestamp >= from && r.timestamp < to)
            .collect()
    }
}

/// In-memory event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrowing view of every record
    pub fn entries(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn records_of_type(&self, event_type: &str) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event_type() == event_type)
            .collect()
    }

    pub fn records_for_patient(&self, patient_id: &str) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.patient_id() == Some(patient_id))
            .collect()
    }

    /// Most recent `limit` records
    pub fn tail(&self, limit: usize) -> &[EventRecord] {
        let start = self.records.len().saturating_sub(limit);
        &self.records[start..]
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl EventSink for EventLog {
    fn append(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    fn records(&self) -> Vec<EventRecord> {
        self.records.clone()
    }
}

/// File sink writing one JSON object per line
///
/// Write failures are reported through `tracing` and otherwise ignored.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn append(&mut self, record: EventRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, event_type = record.event_type(), "event not serializable");
                return;
            }
        };
        if let Err(err) = writeln!(self.file, "{}", line) {
            tracing::warn!(error = %err, path = %self.path.display(), "event log write failed");
        }
    }

    fn records(&self) -> Vec<EventRecord> {
        match load_records(&self.path) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "event log read failed");
                Vec::new()
            }
        }
    }
}

/// Read a JSON-lines event log; malformed lines are skipped with a warning
pub fn load_records(path: impl AsRef<Path>) -> std::io::Result<Vec<EventRecord>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(line = line_no + 1, error = %err, "skipping malformed event"),
        }
    }
    Ok(records)
}
