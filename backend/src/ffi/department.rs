//! PyO3 wrapper for Department
//!
//! This module provides the Python interface used by dashboards. The
//! department sits behind [`SharedDepartment`], so one Python object can be
//! driven from several threads.

use pyo3::prelude::*;

use super::types::{department_err, parse_kind, parse_role, parse_severity, parse_time, to_py};
use crate::models::event::{EventLog, EventSink, JsonLinesSink};
use crate::models::patient::Patient;
use crate::orchestrator::{Department, SharedDepartment};
use crate::rules::{RulesConfig, StaffRecord};

/// Python wrapper for Rust Department
///
/// # Example (from Python)
///
/// ```python
/// from ed_flow_core import Department
///
/// dept = Department(open("rules/department.json").read(), "2024-03-01T08:00:00Z")
/// dept.admit("P1", "Marie", "Dupont", "CRITICAL", ["cardiaque"],
///            "2024-03-01T08:00:00Z", "2024-03-01T08:00:00Z")
/// result = dept.tick("2024-03-01T08:01:00Z")
/// for action in result["actions"]:
///     print(action)
/// ```
#[pyclass(name = "Department")]
pub struct PyDepartment {
    inner: SharedDepartment,
}

#[pymethods]
impl PyDepartment {
    /// Open a department from a rules JSON document
    ///
    /// Events go to `events_path` as JSON lines when given, otherwise to
    /// an in-memory log.
    #[new]
    #[pyo3(signature = (rules_json, opened_at, events_path=None))]
    fn new(rules_json: &str, opened_at: &str, events_path: Option<&str>) -> PyResult<Self> {
        let rules = RulesConfig::from_json_str(rules_json)
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
        let opened_at = parse_time(opened_at)?;

        let sink: Box<dyn EventSink> = match events_path {
            Some(path) => Box::new(JsonLinesSink::open(path).map_err(|e| {
                pyo3::exceptions::PyIOError::new_err(format!("Cannot open {}: {}", path, e))
            })?),
            None => Box::new(EventLog::new()),
        };

        let department = Department::new(&rules, opened_at, sink).map_err(department_err)?;
        Ok(PyDepartment {
            inner: SharedDepartment::new(department),
        })
    }

    /// Admit a patient; returns the room id
    ///
    /// Raises RuntimeError when every room is full.
    #[pyo3(signature = (patient_id, first_name, last_name, severity, conditions, arrived_at, now))]
    #[allow(clippy::too_many_arguments)]
    fn admit(
        &self,
        patient_id: String,
        first_name: String,
        last_name: String,
        severity: &str,
        conditions: Vec<String>,
        arrived_at: &str,
        now: &str,
    ) -> PyResult<u32> {
        let patient = Patient::new(
            patient_id,
            first_name,
            last_name,
            parse_severity(severity)?,
            parse_time(arrived_at)?,
        )
        .with_conditions(conditions);

        self.inner
            .admit(patient, parse_time(now)?)
            .map_err(department_err)
    }

    /// Run one tick; returns `{"now": ..., "actions": [...]}`
    ///
    /// Actions are the human-readable descriptors in application order.
    fn tick<'py>(&self, py: Python<'py>, now: &str) -> PyResult<Bound<'py, PyAny>> {
        let result = self.inner.tick(parse_time(now)?);
        let dict = pyo3::types::PyDict::new(py);
        dict.set_item("now", result.now.to_rfc3339())?;
        dict.set_item("actions", result.descriptions())?;
        dict.set_item("details", to_py(py, &result.actions)?)?;
        Ok(dict.into_any())
    }

    fn priority_queue<'py>(&self, py: Python<'py>, now: &str) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.inner.priority_queue(parse_time(now)?))
    }

    fn metrics<'py>(&self, py: Python<'py>, now: &str) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.inner.snapshot_metrics(parse_time(now)?))
    }

    fn status_board<'py>(&self, py: Python<'py>, now: &str) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.inner.status_board(parse_time(now)?))
    }

    /// Raises KeyError for an unknown patient or unit, RuntimeError when full
    fn transfer(&self, patient_id: &str, unit: &str, now: &str) -> PyResult<()> {
        self.inner
            .transfer(patient_id, unit, parse_time(now)?)
            .map_err(department_err)
    }

    fn record_departure(&self, patient_id: &str, now: &str) -> PyResult<()> {
        self.inner
            .record_departure(patient_id, parse_time(now)?)
            .map_err(department_err)
    }

    /// Returns the previous capacity
    fn set_room_capacity(&self, room: u32, capacity: usize, now: &str) -> PyResult<usize> {
        self.inner
            .set_room_capacity(room, capacity, parse_time(now)?)
            .map_err(department_err)
    }

    /// Returns the new staff id
    #[pyo3(signature = (role, name, now, kind="FIXED"))]
    fn add_staff(&self, role: &str, name: &str, now: &str, kind: &str) -> PyResult<String> {
        let record = StaffRecord::new(name, parse_kind(kind)?);
        Ok(self.inner.add_staff(parse_role(role)?, record, parse_time(now)?))
    }

    /// Ids of patients stranded after consultation
    fn awaiting_transport(&self) -> Vec<String> {
        self.inner.with(|dept| {
            dept.awaiting_transport()
                .iter()
                .map(|p| p.id().to_string())
                .collect()
        })
    }

    fn dispatch_transport(&self, patient_id: &str, now: &str) -> PyResult<Vec<String>> {
        let now = parse_time(now)?;
        let actions = self
            .inner
            .with(|dept| dept.dispatch_transport(patient_id, now))
            .map_err(department_err)?;
        Ok(actions.iter().map(ToString::to_string).collect())
    }

    fn check_constraints<'py>(&self, py: Python<'py>, now: &str) -> PyResult<Bound<'py, PyAny>> {
        let now = parse_time(now)?;
        to_py(py, &self.inner.with(|dept| dept.check_constraints(now)))
    }

    /// Event records appended between `start` (inclusive) and `end` (exclusive)
    fn events_between<'py>(
        &self,
        py: Python<'py>,
        start: &str,
        end: &str,
    ) -> PyResult<Bound<'py, PyAny>> {
        let (start, end) = (parse_time(start)?, parse_time(end)?);
        to_py(py, &self.inner.with(|dept| dept.events().records_between(start, end)))
    }

    /// JSON checkpoint of the whole session
    fn save_state(&self) -> PyResult<String> {
        self.inner
            .with(|dept| dept.save_state())
            .map_err(department_err)
    }
}
