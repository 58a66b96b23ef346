//! Department metrics
//!
//! Two families:
//!
//! - [`InstantMetrics`]: a pure read of the current state (saturation, status
//!   counts, waits). Attached to every event record.
//! - Log analytics ([`hourly_series`], [`flow_summary`], [`event_counts`]):
//!   computed from event records alone, so they work the same on an in-memory
//!   log and on a JSON-lines file read back with `load_records`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::EventRecord;
use crate::models::patient::PatientStatus;
use crate::models::state::DepartmentState;

/// Round to two decimals
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

// ============================================================================
// Instant metrics
// ============================================================================

/// Snapshot of the department at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstantMetrics {
    /// Occupied room places over total room capacity, in percent
    pub saturation_pct: f64,
    pub waiting: usize,
    pub in_consult: usize,
    pub transferred: usize,
    pub departed: usize,
    /// Over Waiting patients only
    pub avg_wait_minutes: f64,
    /// Over Waiting patients only
    pub max_wait_minutes: f64,
}

impl InstantMetrics {
    /// Compute from state; never mutates
    ///
    /// # Example
    ///
    /// ```rust
    /// use chrono::{Duration, TimeZone, Utc};
    /// use ed_flow_core::metrics::InstantMetrics;
    /// use ed_flow_core::{DepartmentState, Patient, Room, Severity};
    ///
    /// let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    /// let mut state = DepartmentState::new(vec![Room::new(1, 4, t0)], vec![], vec![]);
    /// state.admit(Patient::new("P1", "Jean", "Martin", Severity::Minor, t0)).unwrap();
    ///
    /// let m = InstantMetrics::compute(&state, t0 + Duration::minutes(30));
    /// assert_eq!(m.saturation_pct, 25.0);
    /// assert_eq!(m.avg_wait_minutes, 30.0);
    /// ```
    pub fn compute(state: &DepartmentState, now: DateTime<Utc>) -> Self {
        let capacity = state.total_room_capacity();
        let saturation_pct = if capacity == 0 {
            0.0
        } else {
            state.occupied_room_places() as f64 / capacity as f64 * 100.0
        };

        let waits: Vec<f64> = state
            .patients()
            .values()
            .filter(|p| p.status() == PatientStatus::Waiting)
            .map(|p| p.wait_minutes(now))
            .collect();
        let max_wait = waits.iter().copied().fold(0.0, f64::max);

        Self {
            saturation_pct: round2(saturation_pct),
            waiting: waits.len(),
            in_consult: state.count_by_status(PatientStatus::InConsult),
            transferred: state.count_by_status(PatientStatus::Transferred),
            departed: state.count_by_status(PatientStatus::Departed),
            avg_wait_minutes: round2(mean(waits.iter().copied())),
            max_wait_minutes: round2(max_wait),
        }
    }
}

// ============================================================================
// Log analytics
// ============================================================================

/// Event type counted as an arrival
pub const ARRIVAL_EVENT: &str = "PATIENT_ADMITTED";
/// Event type counted as a departure
pub const DEPARTURE_EVENT: &str = "PATIENT_TRANSFERRED";

/// One hour of activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// Start of the hour
    pub hour: DateTime<Utc>,
    pub records: usize,
    pub mean_saturation_pct: f64,
    pub arrivals: usize,
    pub departures: usize,
    pub mean_wait_minutes: f64,
}

fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

/// Group records by hour (truncated), hours in chronological order
pub fn hourly_series(records: &[EventRecord]) -> Vec<HourlyBucket> {
    let mut by_hour: BTreeMap<DateTime<Utc>, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        by_hour
            .entry(truncate_to_hour(record.timestamp))
            .or_default()
            .push(record);
    }

    by_hour
        .into_iter()
        .map(|(hour, group)| HourlyBucket {
            hour,
            records: group.len(),
            mean_saturation_pct: round2(mean(group.iter().map(|r| r.metrics.saturation_pct))),
            arrivals: group.iter().filter(|r| r.event_type() == ARRIVAL_EVENT).count(),
            departures: group.iter().filter(|r| r.event_type() == DEPARTURE_EVENT).count(),
            mean_wait_minutes: round2(mean(group.iter().map(|r| r.metrics.avg_wait_minutes))),
        })
        .collect()
}

/// Whole-log summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub records: usize,
    pub mean_saturation_pct: f64,
    pub max_saturation_pct: f64,
    pub min_saturation_pct: f64,
    pub total_arrivals: usize,
    pub total_departures: usize,
    pub peak_hourly_arrivals: usize,
    pub peak_hourly_departures: usize,
}

pub fn flow_summary(records: &[EventRecord]) -> FlowSummary {
    if records.is_empty() {
        return FlowSummary::default();
    }

    let saturations = records.iter().map(|r| r.metrics.saturation_pct);
    let hourly = hourly_series(records);

    FlowSummary {
        records: records.len(),
        mean_saturation_pct: round2(mean(saturations.clone())),
        max_saturation_pct: saturations.clone().fold(f64::MIN, f64::max),
        min_saturation_pct: saturations.fold(f64::MAX, f64::min),
        total_arrivals: hourly.iter().map(|b| b.arrivals).sum(),
        total_departures: hourly.iter().map(|b| b.departures).sum(),
        peak_hourly_arrivals: hourly.iter().map(|b| b.arrivals).max().unwrap_or(0),
        peak_hourly_departures: hourly.iter().map(|b| b.departures).max().unwrap_or(0),
    }
}

/// Records per event type
pub fn event_counts(records: &[EventRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.event_type().to_string()).or_insert(0) += 1;
    }
    counts
}
