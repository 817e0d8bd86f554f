use crate::catalog::{topology, Catalog, MedianBin, MedianRange};
use crate::compute::{derived, median};
use crate::display::trace;
use crate::geography;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::sync::Arc;

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// `(lower, upper, count)` triples; `upper = None` marks the open top bin.
fn unpack_bins(bins: Vec<(f64, Option<f64>, f64)>, design_factor: f64) -> (MedianRange, Vec<f64>) {
    let counts = bins.iter().map(|b| b.2).collect();
    let bins = bins
        .into_iter()
        .enumerate()
        .map(|(i, (lower, upper, _))| MedianBin { variable: format!("bin_{}", i), lower, upper: upper.unwrap_or(f64::INFINITY) })
        .collect();
    (MedianRange { bins, design_factor }, counts)
}

#[pyclass(name = "_Catalog")]
#[derive(Debug, Clone)]
pub struct PyCatalog {
    inner: Arc<Catalog>,
}

#[pymethods]
impl PyCatalog {
    #[staticmethod]
    pub fn from_json(json: &str) -> PyResult<Self> {
        Catalog::from_json(json).map(|c| Self { inner: Arc::new(c) }).map_err(value_error)
    }

    #[staticmethod]
    pub fn load_dir(path: &str) -> PyResult<Self> {
        Catalog::load_dir(std::path::Path::new(path)).map(|c| Self { inner: Arc::new(c) }).map_err(value_error)
    }

    pub fn variables(&self) -> Vec<String> {
        self.inner.iter().map(|v| v.id.clone()).collect()
    }

    pub fn kind(&self, variable: &str) -> PyResult<&'static str> {
        self.inner.get(variable).map(|v| v.kind.tag()).map_err(value_error)
    }

    pub fn dependency_order(&self) -> PyResult<Vec<String>> {
        topology::dependency_order(&self.inner).map_err(value_error)
    }

    /// Every variable `roots` needs, dependencies first.
    pub fn closure(&self, roots: Vec<String>) -> PyResult<Vec<String>> {
        let roots: Vec<&str> = roots.iter().map(String::as_str).collect();
        topology::closure(&self.inner, &roots).map_err(value_error)
    }

    pub fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// Median and its margin for one binned distribution.
#[pyfunction]
#[pyo3(signature = (bins, design_factor=1.0))]
fn median_estimate(bins: Vec<(f64, Option<f64>, f64)>, design_factor: f64) -> PyResult<(f64, Option<f64>)> {
    let (range, counts) = unpack_bins(bins, design_factor);
    let est = median::estimate(&range, &counts).map_err(value_error)?;
    Ok((est.e, est.m))
}

#[pyfunction]
#[pyo3(signature = (bins, design_factor=1.0))]
fn median_trace(bins: Vec<(f64, Option<f64>, f64)>, design_factor: f64) -> PyResult<String> {
    let (range, counts) = unpack_bins(bins, design_factor);
    let e = median::median(&range, &counts).map_err(value_error)?;
    trace::format_median_trace("median", "-", &range, &counts, e).map_err(value_error)
}

/// `(c, p, z)` for an estimate against its base.
#[pyfunction]
#[pyo3(signature = (e, m, agg_e=None, agg_m=None))]
fn derived_fields(e: Option<f64>, m: Option<f64>, agg_e: Option<f64>, agg_m: Option<f64>) -> (Option<f64>, Option<f64>, Option<f64>) {
    let c = derived::coefficient_of_variation(e, m);
    let p = derived::percentage(e, agg_e);
    let z = derived::percentage_moe(e, m, p, agg_e, agg_m);
    (c, p, z)
}

#[pyfunction]
fn reapportion_moe(m: Option<f64>, ratio: f64, fragment_e: Option<f64>) -> Option<f64> {
    geography::reapportion_moe(m, ratio, fragment_e)
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCatalog>()?;
    m.add_function(wrap_pyfunction!(median_estimate, m)?)?;
    m.add_function(wrap_pyfunction!(median_trace, m)?)?;
    m.add_function(wrap_pyfunction!(derived_fields, m)?)?;
    m.add_function(wrap_pyfunction!(reapportion_moe, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
