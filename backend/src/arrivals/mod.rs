//! Demo patient generation
//!
//! Seeded patient streams and canned scenarios for demos and load runs. This
//! module lives entirely outside the scheduler: it only builds [`Patient`]
//! values and submits them through [`Department::admit`] like any other
//! caller.
//!
//! # Key Principles
//!
//! 1. **Determinism**: same seed, same distribution → same patients
//! 2. **Explicit seed**: there is no default seed and no wall clock
//! 3. **Poisson Arrivals**: patient count per tick follows a Poisson distribution
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use ed_flow_core::arrivals::{ArrivalConfig, PatientGenerator};
//!
//! let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
//! let config = ArrivalConfig::default();
//!
//! let mut a = PatientGenerator::new(42);
//! let mut b = PatientGenerator::new(42);
//! assert_eq!(a.arrivals_for_tick(&config, now), b.arrivals_for_tick(&config, now));
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::patient::{Patient, PatientId, Severity};
use crate::orchestrator::Department;
use crate::rng::RngManager;

const FIRST_NAMES: [&str; 8] = [
    "Marie", "Jean", "Sophie", "Pierre", "Lucie", "Thomas", "Emma", "Lucas",
];

const LAST_NAMES: [&str; 8] = [
    "Dupont", "Martin", "Bernard", "Dubois", "Moreau", "Laurent", "Simon", "Michel",
];

/// Typical presenting conditions per severity
fn conditions_for(severity: Severity) -> &'static [&'static str] {
    match severity {
        Severity::Critical => &["cardiaque", "respiratoire", "neurologique", "AVC"],
        Severity::Urgent => &["fracture", "entorse", "douleur thoracique"],
        Severity::Minor => &["entorse", "coupure", "fievre"],
        Severity::NonUrgent => &["rhume", "fatigue"],
    }
}

/// Probability of each severity among generated patients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityDistribution {
    pub critical: f64,
    pub urgent: f64,
    pub minor: f64,
    pub non_urgent: f64,
}

impl Default for SeverityDistribution {
    fn default() -> Self {
        Self {
            critical: 0.10,
            urgent: 0.25,
            minor: 0.50,
            non_urgent: 0.15,
        }
    }
}

impl SeverityDistribution {
    /// Cumulative draw; weights that do not sum to 1 leave the rest to MINOR
    pub fn sample(&self, rng: &mut RngManager) -> Severity {
        let draw = rng.next_f64();
        let mut cumulative = 0.0;
        for (severity, weight) in [
            (Severity::Critical, self.critical),
            (Severity::Urgent, self.urgent),
            (Severity::Minor, self.minor),
            (Severity::NonUrgent, self.non_urgent),
        ] {
            cumulative += weight;
            if draw < cumulative {
                return severity;
            }
        }
        Severity::Minor
    }
}

/// Arrival stream parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalConfig {
    /// Expected arrivals per tick (Poisson λ parameter)
    pub rate_per_tick: f64,

    pub severity: SeverityDistribution,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            rate_per_tick: 0.5,
            severity: SeverityDistribution::default(),
        }
    }
}

/// Seeded patient factory
#[derive(Debug, Clone)]
pub struct PatientGenerator {
    rng: RngManager,
    prefix: String,
    next_id: usize,
}

impl PatientGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RngManager::new(seed),
            prefix: "P".to_string(),
            next_id: 1,
        }
    }

    /// Id prefix for generated patients (`P0001`, `P0002`, ...)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.get_state()
    }

    fn next_patient_id(&mut self) -> PatientId {
        let id = format!("{}{:04}", self.prefix, self.next_id);
        self.next_id += 1;
        id
    }

    /// One patient of the given severity with a typical condition
    pub fn generate(&mut self, severity: Severity, arrived_at: DateTime<Utc>) -> Patient {
        let id = self.next_patient_id();
        let first = self.rng.choose(&FIRST_NAMES).copied().unwrap_or("Patient");
        let last = self.rng.choose(&LAST_NAMES).copied().unwrap_or("Inconnu");
        let condition = self.rng.choose(conditions_for(severity)).copied();

        Patient::new(id, first, last, severity, arrived_at).with_conditions(condition)
    }

    /// One patient with severity drawn from `distribution`
    pub fn generate_random(
        &mut self,
        distribution: &SeverityDistribution,
        arrived_at: DateTime<Utc>,
    ) -> Patient {
        let severity = distribution.sample(&mut self.rng);
        self.generate(severity, arrived_at)
    }

    /// Patients arriving during one tick
    pub fn arrivals_for_tick(&mut self, config: &ArrivalConfig, now: DateTime<Utc>) -> Vec<Patient> {
        let count = self.rng.poisson(config.rate_per_tick);
        (0..count)
            .map(|_| self.generate_random(&config.severity, now))
            .collect()
    }
}

// ============================================================================
// Batch admission
// ============================================================================

/// Outcome of submitting several patients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub admitted: Vec<PatientId>,
    pub refused: Vec<PatientId>,
    /// Saturation after the last submission
    pub saturation_pct: f64,
}

/// Admit every patient in order; refusals are collected, not retried
pub fn admit_batch(
    department: &mut Department,
    patients: impl IntoIterator<Item = Patient>,
    now: DateTime<Utc>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for patient in patients {
        let id = patient.id().to_string();
        match department.admit(patient, now) {
            Ok(_) => outcome.admitted.push(id),
            Err(_) => outcome.refused.push(id),
        }
    }
    outcome.saturation_pct = department.metrics(now).saturation_pct;
    outcome
}

// ============================================================================
// Scenarios
// ============================================================================

/// Road accident: 3 critical, 5 urgent, 2 minor arriving at once
pub fn mass_influx(now: DateTime<Utc>) -> Vec<Patient> {
    let victims: [(Severity, &str); 10] = [
        (Severity::Critical, "traumatisme"),
        (Severity::Critical, "fracture"),
        (Severity::Critical, "neurologique"),
        (Severity::Urgent, "fracture"),
        (Severity::Urgent, "fracture"),
        (Severity::Urgent, "entorse"),
        (Severity::Urgent, "coupure"),
        (Severity::Urgent, "douleur"),
        (Severity::Minor, "coupure"),
        (Severity::Minor, "contusion"),
    ];

    victims
        .iter()
        .enumerate()
        .map(|(i, (severity, condition))| {
            Patient::new(
                format!("INFLUX{:02}", i + 1),
                "Victim",
                (i + 1).to_string(),
                *severity,
                now,
            )
            .with_conditions([*condition])
        })
        .collect()
}

/// A minor patient waiting 7 hours and an urgent one just arrived
///
/// The minor patient is past the 360-minute threshold and goes first.
pub fn long_wait_minor(now: DateTime<Utc>) -> Vec<Patient> {
    vec![
        Patient::new("MINOR_7H", "Patient", "Long Wait", Severity::Minor, now - Duration::hours(7))
            .with_conditions(["entorse"]),
        Patient::new("URGENT_NOW", "Patient", "Recent", Severity::Urgent, now)
            .with_conditions(["fracture"]),
    ]
}

/// Fill every free room place and submit five more
pub fn saturation(
    department: &mut Department,
    generator: &mut PatientGenerator,
    now: DateTime<Utc>,
) -> BatchOutcome {
    let state = department.state();
    let free = state.total_room_capacity() - state.occupied_room_places();
    let distribution = SeverityDistribution::default();
    let patients: Vec<Patient> = (0..free + 5)
        .map(|_| generator.generate_random(&distribution, now))
        .collect();

    let outcome = admit_batch(department, patients, now);
    tracing::info!(
        admitted = outcome.admitted.len(),
        refused = outcome.refused.len(),
        saturation = outcome.saturation_pct,
        "saturation scenario"
    );
    outcome
}
