//! Transfer unit model
//!
//! Downstream hospital units (cardiology, critical care, ...) receiving
//! patients after consultation. Occupancy never exceeds capacity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferUnit {
    name: String,
    capacity: usize,
    occupancy: usize,
    specialties: Vec<String>,
}

impl TransferUnit {
    pub fn new<I, S>(name: impl Into<String>, capacity: usize, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            capacity,
            occupancy: 0,
            specialties: specialties.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.occupancy
    }

    pub fn specialties(&self) -> &[String] {
        &self.specialties
    }

    pub fn has_space(&self) -> bool {
        self.occupancy < self.capacity
    }

    pub fn places_available(&self) -> usize {
        self.capacity.saturating_sub(self.occupancy)
    }

    /// Case-insensitive match of one condition tag against the specialties
    pub fn treats(&self, condition: &str) -> bool {
        self.specialties
            .iter()
            .any(|s| s.to_lowercase() == condition.to_lowercase())
    }

    /// Take one bed; returns false (and changes nothing) when full
    pub(crate) fn accept(&mut self) -> bool {
        if !self.has_space() {
            return false;
        }
        self.occupancy += 1;
        true
    }
}
