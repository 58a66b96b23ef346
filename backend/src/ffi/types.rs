//! Type conversion utilities for FFI boundary
//!
//! Everything crossing into Python goes through serde: the Rust value is
//! serialized to `serde_json::Value` and rebuilt as dicts, lists and
//! scalars. Timestamps travel as RFC 3339 strings.

use chrono::{DateTime, Utc};
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3::IntoPyObjectExt;
use serde::Serialize;
use serde_json::Value;

use crate::models::patient::Severity;
use crate::models::staff::{StaffKind, StaffRole};
use crate::orchestrator::{DepartmentError, ErrorKind};

/// Convert any serializable value to its Python form
pub fn to_py<'py, T: Serialize>(py: Python<'py>, value: &T) -> PyResult<Bound<'py, PyAny>> {
    let value = serde_json::to_value(value)
        .map_err(|e| PyRuntimeError::new_err(format!("Serialization failed: {}", e)))?;
    json_to_py(py, &value)
}

fn json_to_py<'py>(py: Python<'py>, value: &Value) -> PyResult<Bound<'py, PyAny>> {
    match value {
        Value::Null => Ok(py.None().into_bound(py)),
        Value::Bool(b) => (*b).into_bound_py_any(py),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into_bound_py_any(py),
            None => n.as_f64().unwrap_or(f64::NAN).into_bound_py_any(py),
        },
        Value::String(s) => s.as_str().into_bound_py_any(py),
        Value::Array(items) => {
            let list = PyList::empty(py);
            for item in items {
                list.append(json_to_py(py, item)?)?;
            }
            Ok(list.into_any())
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (key, item) in map {
                dict.set_item(key, json_to_py(py, item)?)?;
            }
            Ok(dict.into_any())
        }
    }
}

/// Parse an RFC 3339 timestamp
pub fn parse_time(value: &str) -> PyResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PyValueError::new_err(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Parse a serde-named enum from its wire string, case-insensitive
fn parse_enum<T: serde::de::DeserializeOwned>(what: &str, value: &str) -> PyResult<T> {
    serde_json::from_value(Value::String(value.trim().to_uppercase()))
        .map_err(|_| PyValueError::new_err(format!("Unknown {} '{}'", what, value)))
}

pub fn parse_severity(value: &str) -> PyResult<Severity> {
    parse_enum("severity", value)
}

pub fn parse_role(value: &str) -> PyResult<StaffRole> {
    parse_enum("staff role", value)
}

pub fn parse_kind(value: &str) -> PyResult<StaffKind> {
    parse_enum("staff kind", value)
}

/// Map department errors onto Python exceptions by family
pub fn department_err(err: DepartmentError) -> PyErr {
    match err.kind() {
        ErrorKind::NotFound => PyKeyError::new_err(err.to_string()),
        ErrorKind::CapacityExceeded => PyRuntimeError::new_err(err.to_string()),
        ErrorKind::InvalidRequest => PyValueError::new_err(err.to_string()),
    }
}
