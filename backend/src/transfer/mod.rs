//! Post-consultation routing
//!
//! Suggests where a patient goes once the doctor is done. Rules are applied
//! in order and the first match wins:
//!
//! 1. NONURGENT → the home destination from the special rules
//! 2. CRITICAL → first unit (configured order) whose specialty matches a
//!    condition tag, else the critical-care destination; both IMMEDIATE
//! 3. URGENT / MINOR → first matching unit, NORMAL
//! 4. otherwise → the default unit, NORMAL
//!
//! Suggestions ignore unit capacity. Capacity is enforced when a transfer is
//! committed, so a suggestion can name a unit that turns out to be full.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::patient::{Patient, Severity};
use crate::models::transfer_unit::TransferUnit;
use crate::rules::SpecialRules;

/// Urgency of the move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferPriority {
    Immediate,
    Normal,
}

impl fmt::Display for TransferPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferPriority::Immediate => "IMMEDIATE",
            TransferPriority::Normal => "NORMAL",
        })
    }
}

/// Suggested destination for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSuggestion {
    pub destination: String,
    pub justification: String,
    pub priority: TransferPriority,
    /// Free beds in the destination when it is a matched unit
    pub places_available: Option<usize>,
}

/// Routing rules for patients leaving consultation
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use ed_flow_core::rules::SpecialRules;
/// use ed_flow_core::{Patient, Severity, TransferAdvisor, TransferPriority, TransferUnit};
///
/// let advisor = TransferAdvisor::new(SpecialRules::default(), "ORTHOPEDIE");
/// let units = vec![TransferUnit::new("CARDIOLOGIE", 8, ["cardiaque"])];
/// let patient = Patient::new("P1", "Marie", "Dupont", Severity::Critical, Utc::now())
///     .with_conditions(["Cardiaque"]);
///
/// let suggestion = advisor.suggest(&patient, &units);
/// assert_eq!(suggestion.destination, "CARDIOLOGIE");
/// assert_eq!(suggestion.priority, TransferPriority::Immediate);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TransferAdvisor {
    special_rules: SpecialRules,
    default_unit: String,
}

impl TransferAdvisor {
    pub fn new(special_rules: SpecialRules, default_unit: impl Into<String>) -> Self {
        Self {
            special_rules,
            default_unit: default_unit.into(),
        }
    }

    pub fn default_unit(&self) -> &str {
        &self.default_unit
    }

    /// Home destination name for non-urgent patients
    pub fn home_destination(&self) -> String {
        self.special_rules.home().destination
    }

    /// Suggest a destination; `units` is scanned in the given order
    pub fn suggest(&self, patient: &Patient, units: &[TransferUnit]) -> TransferSuggestion {
        match patient.severity() {
            Severity::NonUrgent => {
                let home = self.special_rules.home();
                TransferSuggestion {
                    destination: home.destination,
                    justification: home.description,
                    priority: TransferPriority::Normal,
                    places_available: None,
                }
            }
            Severity::Critical => match specialty_match(patient, units) {
                Some((unit, condition)) => TransferSuggestion {
                    destination: unit.name().to_string(),
                    justification: format!("Specialty {} → {}", condition, unit.name()),
                    priority: TransferPriority::Immediate,
                    places_available: Some(unit.places_available()),
                },
                None => {
                    let critical = self.special_rules.critical_care();
                    TransferSuggestion {
                        destination: critical.destination,
                        justification: critical.description,
                        priority: TransferPriority::Immediate,
                        places_available: None,
                    }
                }
            },
            Severity::Urgent | Severity::Minor => match specialty_match(patient, units) {
                Some((unit, condition)) => TransferSuggestion {
                    destination: unit.name().to_string(),
                    justification: format!("Condition {} matches {}", condition, unit.name()),
                    priority: TransferPriority::Normal,
                    places_available: Some(unit.places_available()),
                },
                None => self.fallback(),
            },
        }
    }

    fn fallback(&self) -> TransferSuggestion {
        TransferSuggestion {
            destination: self.default_unit.clone(),
            justification: "Default unit".to_string(),
            priority: TransferPriority::Normal,
            places_available: None,
        }
    }
}

/// First unit, in configured order, treating any of the patient's conditions
fn specialty_match<'a>(
    patient: &'a Patient,
    units: &'a [TransferUnit],
) -> Option<(&'a TransferUnit, &'a str)> {
    units.iter().find_map(|unit| {
        patient
            .conditions()
            .iter()
            .find(|condition| unit.treats(condition))
            .map(|condition| (unit, condition.as_str()))
    })
}
