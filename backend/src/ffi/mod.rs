//! Python bindings (feature `pyo3`)

pub mod department;
pub mod types;
