//! Consultation priority
//!
//! Ranks waiting patients from severity and current wait. The rank is never
//! stored: it is recomputed at every read from the caller-supplied `now`, so
//! a long-waiting MINOR patient climbs the queue without anyone updating it.
//!
//! | Severity | Wait | Rank |
//! |---|---|---|
//! | CRITICAL | any | 1 |
//! | MINOR | > threshold (360 min) | 2 |
//! | URGENT | any | 3 |
//! | MINOR | ≤ threshold | 4 |
//! | NONURGENT | any | 5 |
//!
//! The threshold comparison is strict and made at second precision: exactly
//! 360 minutes is still rank 4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::patient::{Patient, PatientId, Severity};
use crate::rules::{PriorityRules, DEFAULT_MINOR_EXCEPTION_MINUTES};

/// Highest rank
pub const RANK_MIN: u8 = 1;
/// Lowest rank
pub const RANK_MAX: u8 = 5;

/// Computes effective priority and queue order
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, TimeZone, Utc};
/// use ed_flow_core::{Patient, PriorityEngine, Severity};
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
/// let engine = PriorityEngine::default();
///
/// let urgent = Patient::new("U", "Jean", "Martin", Severity::Urgent, now);
/// let minor = Patient::new("M", "Lucie", "Simon", Severity::Minor, now - Duration::minutes(400));
///
/// assert_eq!(engine.effective_priority(&minor, now), 2);
/// let next = engine.select_next([&urgent, &minor], now).unwrap();
/// assert_eq!(next.id(), "M");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityEngine {
    minor_exception_minutes: i64,
}

impl Default for PriorityEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MINOR_EXCEPTION_MINUTES)
    }
}

impl PriorityEngine {
    pub fn new(minor_exception_minutes: i64) -> Self {
        Self {
            minor_exception_minutes,
        }
    }

    pub fn from_rules(rules: &PriorityRules) -> Self {
        Self::new(rules.minor_exception_minutes)
    }

    pub fn minor_exception_minutes(&self) -> i64 {
        self.minor_exception_minutes
    }

    /// Whether a MINOR patient has waited strictly longer than the threshold
    pub fn minor_exception_applies(&self, patient: &Patient, now: DateTime<Utc>) -> bool {
        // A threshold too large to express in seconds is never reached
        patient.severity() == Severity::Minor
            && self
                .minor_exception_minutes
                .checked_mul(60)
                .is_some_and(|limit| (now - patient.arrived_at()).num_seconds() > limit)
    }

    /// Rank in `1..=5`, 1 being seen first
    pub fn effective_priority(&self, patient: &Patient, now: DateTime<Utc>) -> u8 {
        match patient.severity() {
            Severity::Critical => 1,
            Severity::Minor if self.minor_exception_applies(patient, now) => 2,
            Severity::Urgent => 3,
            Severity::Minor => 4,
            Severity::NonUrgent => 5,
        }
    }

    /// Sort by (rank, arrival, id); stable, so input order breaks nothing
    pub fn order_queue<'a, I>(&self, patients: I, now: DateTime<Utc>) -> Vec<&'a Patient>
    where
        I: IntoIterator<Item = &'a Patient>,
    {
        let mut ranked: Vec<(u8, &Patient)> = patients
            .into_iter()
            .map(|p| (self.effective_priority(p, now), p))
            .collect();
        ranked.sort_by(|(rank_a, a), (rank_b, b)| {
            rank_a
                .cmp(rank_b)
                .then_with(|| a.arrived_at().cmp(&b.arrived_at()))
                .then_with(|| a.id().cmp(b.id()))
        });
        ranked.into_iter().map(|(_, p)| p).collect()
    }

    /// Head of the ordered queue
    pub fn select_next<'a, I>(&self, patients: I, now: DateTime<Utc>) -> Option<&'a Patient>
    where
        I: IntoIterator<Item = &'a Patient>,
    {
        self.order_queue(patients, now).into_iter().next()
    }

    /// Read-only queue view for front ends
    pub fn queue_view<'a, I>(&self, patients: I, now: DateTime<Utc>) -> Vec<QueueEntry>
    where
        I: IntoIterator<Item = &'a Patient>,
    {
        self.order_queue(patients, now)
            .into_iter()
            .map(|p| QueueEntry {
                patient_id: p.id().to_string(),
                name: p.display_name(),
                severity: p.severity(),
                effective_priority: self.effective_priority(p, now),
                wait_minutes: p.wait_minutes(now).floor() as i64,
                minor_exception: self.minor_exception_applies(p, now),
                arrived_at: p.arrived_at(),
            })
            .collect()
    }
}

/// One line of the consultation queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub patient_id: PatientId,
    pub name: String,
    pub severity: Severity,
    pub effective_priority: u8,
    /// Whole minutes waited
    pub wait_minutes: i64,
    /// The 360-minute exception is lifting this patient
    pub minor_exception: bool,
    pub arrived_at: DateTime<Utc>,
}
