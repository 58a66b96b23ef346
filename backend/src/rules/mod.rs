//! Department rules
//!
//! Static configuration read once when a department opens: rooms, staff
//! roster, transfer-unit catalog, consultation durations, the long-wait
//! threshold and special routing rules.
//!
//! The engine only sees the [`RuleProvider`] trait. [`RulesConfig`] is the
//! JSON-backed implementation. Every section is optional; a missing section
//! resolves to the documented default below and logs a warning instead of
//! failing:
//!
//! | Section | Default |
//! |---|---|
//! | `infrastructure` | no rooms |
//! | `staff` | one fixed doctor, no nurses, no aides |
//! | `transfer_units` | none |
//! | `priority_rules` | 5-minute consultations, 360-minute exception |
//! | `special_rules` | home → `HOME`, critical care → `SOINS_CRITIQUES` |
//! | `default_unit` | `ORTHOPEDIE` |
//!
//! Older rule files use French section names (`personnel`,
//! `unites_transfert: { unites: [...] }`, `regles_priorite`,
//! `regles_speciales` keyed by lowercase colour codes); those shapes load
//! unchanged.
//!
//! # Example
//!
//! ```rust
//! use ed_flow_core::rules::{RuleProvider, RulesConfig};
//! use ed_flow_core::Severity;
//!
//! let rules = RulesConfig::from_json_str(r#"{
//!     "infrastructure": { "waiting_rooms": [ { "id": 1, "capacity": 4 } ] },
//!     "priority_rules": { "levels": [ { "severity": "CRITICAL", "consultation_minutes": 30 } ] }
//! }"#).unwrap();
//!
//! assert_eq!(rules.rooms().len(), 1);
//! assert_eq!(rules.priority_rules().consultation_minutes(Severity::Critical), 30);
//! assert_eq!(rules.priority_rules().consultation_minutes(Severity::Minor), 5);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::de::value::StringDeserializer;
use serde::de::{IgnoredAny, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::models::patient::{RoomId, Severity};
use crate::models::staff::StaffKind;

/// Consultation length when a severity has no configured duration
pub const DEFAULT_CONSULTATION_MINUTES: i64 = 5;

/// Wait after which a MINOR patient outranks URGENT ones
pub const DEFAULT_MINOR_EXCEPTION_MINUTES: i64 = 360;

/// Upper bound for every configured duration (one week)
pub const MAX_RULE_MINUTES: i64 = 7 * 24 * 60;

pub const DEFAULT_HOME_DESTINATION: &str = "HOME";
pub const DEFAULT_CRITICAL_CARE_DESTINATION: &str = "SOINS_CRITIQUES";
pub const DEFAULT_UNIT: &str = "ORTHOPEDIE";

/// Errors reading or validating rule files
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Cannot read rules from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rules JSON: {source}")]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_json::Error,
    },

    #[error("No rule files (*.json) found in {0}")]
    NoRuleFiles(PathBuf),

    #[error("Invalid rules: {0}")]
    Invalid(String),
}

// ============================================================================
// Rule sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRule {
    #[serde(alias = "numero")]
    pub id: RoomId,
    #[serde(alias = "capacite")]
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InfrastructureRules {
    #[serde(default, alias = "salles_attente")]
    pub waiting_rooms: Vec<RoomRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRecord {
    #[serde(alias = "nom")]
    pub name: String,
    #[serde(default, alias = "type")]
    pub kind: StaffKind,
}

impl StaffRecord {
    pub fn new(name: impl Into<String>, kind: StaffKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Staff roster by role, each list in configured order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRoster {
    #[serde(default = "default_doctors", alias = "docteur", deserialize_with = "doctors_section")]
    pub doctors: Vec<StaffRecord>,
    #[serde(default, alias = "infirmieres")]
    pub nurses: Vec<StaffRecord>,
    #[serde(default, alias = "aides_soignants")]
    pub aides: Vec<StaffRecord>,
}

fn default_doctors() -> Vec<StaffRecord> {
    vec![StaffRecord::new("Dr. Urgences", StaffKind::Fixed)]
}

/// Doctors as a list, a single record, or a bare presence marker
#[derive(Deserialize)]
#[serde(untagged)]
enum DoctorsSection {
    List(Vec<StaffRecord>),
    One(StaffRecord),
    Marker(IgnoredAny),
}

fn doctors_section<'de, D>(deserializer: D) -> Result<Vec<StaffRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match DoctorsSection::deserialize(deserializer)? {
        DoctorsSection::List(doctors) => doctors,
        DoctorsSection::One(doctor) => vec![doctor],
        DoctorsSection::Marker(IgnoredAny) => default_doctors(),
    })
}

impl Default for StaffRoster {
    fn default() -> Self {
        Self {
            doctors: default_doctors(),
            nurses: Vec::new(),
            aides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRule {
    #[serde(alias = "nom")]
    pub name: String,
    #[serde(default = "default_unit_capacity", alias = "capacite", alias = "capacite_initiale")]
    pub capacity: usize,
    #[serde(default, alias = "specialites")]
    pub specialties: Vec<String>,
}

fn default_unit_capacity() -> usize {
    10
}

/// Unit catalog, either a bare list or wrapped as `{ "units": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum UnitsSection {
    List(Vec<UnitRule>),
    Wrapped {
        #[serde(alias = "unites")]
        units: Vec<UnitRule>,
    },
}

fn units_section<'de, D>(deserializer: D) -> Result<Option<Vec<UnitRule>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(match UnitsSection::deserialize(deserializer)? {
        UnitsSection::List(units) => units,
        UnitsSection::Wrapped { units } => units,
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityLevel {
    #[serde(alias = "gravite")]
    pub severity: Severity,
    #[serde(alias = "temps_consultation_max")]
    pub consultation_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRules {
    #[serde(default, alias = "niveaux")]
    pub levels: Vec<SeverityLevel>,
    #[serde(default = "default_minor_exception")]
    pub minor_exception_minutes: i64,
}

fn default_minor_exception() -> i64 {
    DEFAULT_MINOR_EXCEPTION_MINUTES
}

impl Default for PriorityRules {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            minor_exception_minutes: DEFAULT_MINOR_EXCEPTION_MINUTES,
        }
    }
}

impl PriorityRules {
    /// Configured consultation length for `severity`, first matching level wins
    pub fn consultation_minutes(&self, severity: Severity) -> i64 {
        self.levels
            .iter()
            .find(|level| level.severity == severity)
            .map(|level| level.consultation_minutes)
            .unwrap_or(DEFAULT_CONSULTATION_MINUTES)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialRule {
    #[serde(alias = "transfert", alias = "transfert_prioritaire")]
    pub destination: String,
    #[serde(default)]
    pub description: String,
}

/// Severity-keyed routing overrides
///
/// `NONURGENT` names the home destination, `CRITICAL` the critical-care
/// fallback used when no specialty matches. Keys are read case-insensitively
/// (`gris`, `Rouge`, `CRITICAL`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecialRules {
    pub rules: BTreeMap<Severity, SpecialRule>,
}

impl Serialize for SpecialRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rules.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpecialRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, SpecialRule>::deserialize(deserializer)?;
        let mut rules = BTreeMap::new();
        for (key, rule) in raw {
            let key: StringDeserializer<D::Error> = key.to_uppercase().into_deserializer();
            let severity = Severity::deserialize(key)?;
            rules.insert(severity, rule);
        }
        Ok(Self { rules })
    }
}

impl SpecialRules {
    pub fn get(&self, severity: Severity) -> Option<&SpecialRule> {
        self.rules.get(&severity)
    }

    /// Destination and justification for non-urgent patients
    pub fn home(&self) -> SpecialRule {
        self.get(Severity::NonUrgent).cloned().unwrap_or_else(|| SpecialRule {
            destination: DEFAULT_HOME_DESTINATION.to_string(),
            description: "Non-urgent patients return home".to_string(),
        })
    }

    /// Fallback destination for critical patients without a specialty match
    pub fn critical_care(&self) -> SpecialRule {
        self.get(Severity::Critical).cloned().unwrap_or_else(|| SpecialRule {
            destination: DEFAULT_CRITICAL_CARE_DESTINATION.to_string(),
            description: "Critical patients go to critical care".to_string(),
        })
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Source of department rules
pub trait RuleProvider {
    fn rooms(&self) -> Vec<RoomRule>;
    fn staff(&self) -> StaffRoster;
    fn transfer_units(&self) -> Vec<UnitRule>;
    fn priority_rules(&self) -> PriorityRules;
    fn special_rules(&self) -> SpecialRules;
    fn default_unit(&self) -> String;
}

/// Every section resolved through a provider, defaults applied
///
/// This is what a department actually runs on; its JSON form is hashed to
/// fingerprint checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRules {
    pub rooms: Vec<RoomRule>,
    pub staff: StaffRoster,
    pub transfer_units: Vec<UnitRule>,
    pub priority_rules: PriorityRules,
    pub special_rules: SpecialRules,
    pub default_unit: String,
}

impl ResolvedRules {
    pub fn from_provider(provider: &dyn RuleProvider) -> Self {
        Self {
            rooms: provider.rooms(),
            staff: provider.staff(),
            transfer_units: provider.transfer_units(),
            priority_rules: provider.priority_rules(),
            special_rules: provider.special_rules(),
            default_unit: provider.default_unit(),
        }
    }

    /// Reject duplicate room ids, duplicate unit names and out-of-range durations
    ///
    /// Consultations must last between 1 minute and [`MAX_RULE_MINUTES`];
    /// the long-wait threshold between 0 and [`MAX_RULE_MINUTES`].
    pub fn validate(&self) -> Result<(), RulesError> {
        let mut room_ids = HashSet::new();
        for room in &self.rooms {
            if !room_ids.insert(room.id) {
                return Err(RulesError::Invalid(format!("duplicate room id {}", room.id)));
            }
        }

        let mut unit_names = HashSet::new();
        for unit in &self.transfer_units {
            if !unit_names.insert(unit.name.as_str()) {
                return Err(RulesError::Invalid(format!(
                    "duplicate transfer unit {}",
                    unit.name
                )));
            }
        }

        if let Some(level) = self
            .priority_rules
            .levels
            .iter()
            .find(|level| !(1..=MAX_RULE_MINUTES).contains(&level.consultation_minutes))
        {
            return Err(RulesError::Invalid(format!(
                "consultation duration for {} must be between 1 and {} minutes, got {}",
                level.severity, MAX_RULE_MINUTES, level.consultation_minutes
            )));
        }

        let threshold = self.priority_rules.minor_exception_minutes;
        if !(0..=MAX_RULE_MINUTES).contains(&threshold) {
            return Err(RulesError::Invalid(format!(
                "minor_exception_minutes must be between 0 and {}, got {}",
                MAX_RULE_MINUTES, threshold
            )));
        }

        Ok(())
    }
}

/// JSON-backed rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<InfrastructureRules>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "personnel")]
    pub staff: Option<StaffRoster>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "unites_transfert",
        deserialize_with = "units_section"
    )]
    pub transfer_units: Option<Vec<UnitRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "regles_priorite")]
    pub priority_rules: Option<PriorityRules>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "regles_speciales")]
    pub special_rules: Option<SpecialRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_unit: Option<String>,
}

/// Top-level section names, in the order `from_dir` looks for them
const SECTIONS: [&str; 6] = [
    "infrastructure",
    "staff",
    "transfer_units",
    "priority_rules",
    "special_rules",
    "default_unit",
];

impl RulesConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RulesError> {
        serde_json::from_str(json).map_err(|source| RulesError::Parse { path: None, source })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RulesError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Merge every `*.json` file of a directory
    ///
    /// Files are visited in name order; the first file defining a section
    /// provides it.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, RulesError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| RulesError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(RulesError::NoRuleFiles(dir.to_path_buf()));
        }

        let mut merged = serde_json::Map::new();
        for path in &files {
            let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
                path: path.clone(),
                source,
            })?;
            let value: Value = serde_json::from_str(&text).map_err(|source| RulesError::Parse {
                path: Some(path.clone()),
                source,
            })?;
            let Value::Object(sections) = value else {
                tracing::warn!(path = %path.display(), "rule file is not a JSON object, ignored");
                continue;
            };
            for (key, section) in sections {
                let canonical = canonical_section(&key);
                if SECTIONS.contains(&canonical) && !merged.contains_key(canonical) {
                    tracing::debug!(section = canonical, path = %path.display(), "rule section loaded");
                    merged.insert(canonical.to_string(), section);
                }
            }
        }

        serde_json::from_value(Value::Object(merged))
            .map_err(|source| RulesError::Parse { path: Some(dir.to_path_buf()), source })
    }

    /// Resolve every section and validate the result
    pub fn resolve(&self) -> Result<ResolvedRules, RulesError> {
        let resolved = ResolvedRules::from_provider(self);
        resolved.validate()?;
        Ok(resolved)
    }
}

/// Map legacy section names onto the canonical ones
fn canonical_section(key: &str) -> &str {
    match key {
        "personnel" => "staff",
        "regles_priorite" => "priority_rules",
        "regles_speciales" => "special_rules",
        "unites_transfert" => "transfer_units",
        other => other,
    }
}

fn missing(section: &str) {
    tracing::warn!(section, "rules section missing, using default");
}

impl RuleProvider for RulesConfig {
    fn rooms(&self) -> Vec<RoomRule> {
        match &self.infrastructure {
            Some(infra) => infra.waiting_rooms.clone(),
            None => {
                missing("infrastructure");
                Vec::new()
            }
        }
    }

    fn staff(&self) -> StaffRoster {
        self.staff.clone().unwrap_or_else(|| {
            missing("staff");
            StaffRoster::default()
        })
    }

    fn transfer_units(&self) -> Vec<UnitRule> {
        self.transfer_units.clone().unwrap_or_else(|| {
            missing("transfer_units");
            Vec::new()
        })
    }

    fn priority_rules(&self) -> PriorityRules {
        self.priority_rules.clone().unwrap_or_else(|| {
            missing("priority_rules");
            PriorityRules::default()
        })
    }

    fn special_rules(&self) -> SpecialRules {
        self.special_rules.clone().unwrap_or_else(|| {
            missing("special_rules");
            SpecialRules::default()
        })
    }

    fn default_unit(&self) -> String {
        self.default_unit.clone().unwrap_or_else(|| {
            missing("default_unit");
            DEFAULT_UNIT.to_string()
        })
    }
}

impl RuleProvider for ResolvedRules {
    fn rooms(&self) -> Vec<RoomRule> {
        self.rooms.clone()
    }

    fn staff(&self) -> StaffRoster {
        self.staff.clone()
    }

    fn transfer_units(&self) -> Vec<UnitRule> {
        self.transfer_units.clone()
    }

    fn priority_rules(&self) -> PriorityRules {
        self.priority_rules.clone()
    }

    fn special_rules(&self) -> SpecialRules {
        self.special_rules.clone()
    }

    fn default_unit(&self) -> String {
        self.default_unit.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let rules = RulesConfig::from_json_str("{}").unwrap();
        let resolved = rules.resolve().unwrap();

        assert!(resolved.rooms.is_empty());
        assert_eq!(resolved.staff.doctors.len(), 1);
        assert!(resolved.staff.nurses.is_empty());
        assert_eq!(resolved.priority_rules.minor_exception_minutes, 360);
        assert_eq!(resolved.special_rules.home().destination, "HOME");
        assert_eq!(resolved.special_rules.critical_care().destination, "SOINS_CRITIQUES");
        assert_eq!(resolved.default_unit, "ORTHOPEDIE");
    }

    #[test]
    fn test_legacy_field_names_accepted() {
        let rules = RulesConfig::from_json_str(
            r#"{
                "infrastructure": { "salles_attente": [ { "numero": 3, "capacite": 6 } ] },
                "personnel": {
                    "infirmieres": [ { "nom": "Claire", "type": "FIXE" } ],
                    "aides_soignants": [ { "nom": "Marc", "type": "MOBILE" } ]
                },
                "regles_priorite": { "niveaux": [ { "gravite": "ROUGE", "temps_consultation_max": 45 } ] },
                "regles_speciales": { "GRIS": { "transfert": "MAISON", "description": "Retour domicile" } }
            }"#,
        )
        .unwrap();

        assert_eq!(rules.rooms(), vec![RoomRule { id: 3, capacity: 6 }]);
        let staff = rules.staff();
        assert_eq!(staff.nurses[0].name, "Claire");
        assert_eq!(staff.aides[0].kind, StaffKind::Mobile);
        assert_eq!(rules.priority_rules().consultation_minutes(Severity::Critical), 45);
        assert_eq!(rules.special_rules().home().destination, "MAISON");
    }

    #[test]
    fn test_duplicate_room_rejected() {
        let rules = RulesConfig::from_json_str(
            r#"{ "infrastructure": { "waiting_rooms": [
                { "id": 1, "capacity": 2 }, { "id": 1, "capacity": 3 }
            ] } }"#,
        )
        .unwrap();
        assert!(matches!(rules.resolve(), Err(RulesError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = RulesConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RulesError::Parse { path: None, .. }));
    }

    #[test]
    fn test_unit_capacity_defaults_to_ten() {
        let rules =
            RulesConfig::from_json_str(r#"{ "transfer_units": [ { "name": "CARDIO" } ] }"#).unwrap();
        assert_eq!(rules.transfer_units()[0].capacity, 10);
    }
}
