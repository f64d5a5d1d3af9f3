// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Python bindings for the pattern vault

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use super::config::{records_from_json_str, EngineConfig, LoadOptions, PatternRecord, RedactionStrategy};
use super::detector::{FindOptions, Match};
use super::masking::ManifestEntry;
use super::patterns;
use super::reload::PatternVault;

/// PII pattern vault exposed to Python
///
/// # Example
/// ```python
/// from regex_vault import RegexVault
///
/// vault = RegexVault()  # built-in kr/us/comm patterns
/// vault.find("Call 010-1234-5678 now", ["kr"])
/// # [{"ns_id": "kr/mobile_01", "start": 5, "end": 18, ...}]
///
/// vault.redact("SSN: 900101-1234567", ["kr"], "mask")["redacted_text"]
/// # "SSN: ******-*******"
/// ```
#[pyclass(name = "RegexVault")]
pub struct RegexVaultPy {
    vault: PatternVault,
}

fn parse_records(records_json: Option<&str>) -> PyResult<Vec<PatternRecord>> {
    match records_json {
        Some(source) => records_from_json_str(source)
            .map_err(|e| PyValueError::new_err(format!("Invalid pattern records: {}", e))),
        None => Ok(patterns::default_records()),
    }
}

fn load_options(validate_examples: bool, strict: bool) -> LoadOptions {
    LoadOptions {
        validate_examples,
        strict,
    }
}

fn parse_strategy(strategy: Option<&str>) -> PyResult<Option<RedactionStrategy>> {
    strategy
        .map(|s| s.parse::<RedactionStrategy>().map_err(PyValueError::new_err))
        .transpose()
}

fn match_to_py<'py>(py: Python<'py>, m: &Match) -> PyResult<Bound<'py, PyDict>> {
    let item = PyDict::new(py);
    item.set_item("ns_id", &m.ns_id)?;
    item.set_item("pattern_id", &m.pattern_id)?;
    item.set_item("namespace", &m.namespace)?;
    item.set_item("category", m.category.as_str())?;
    item.set_item("severity", m.severity.as_str())?;
    item.set_item("start", m.start)?;
    item.set_item("end", m.end)?;
    item.set_item("matched_text", m.matched_text.as_deref())?;
    item.set_item("mask", m.mask.as_deref())?;
    Ok(item)
}

fn manifest_entry_to_py<'py>(py: Python<'py>, entry: &ManifestEntry) -> PyResult<Bound<'py, PyDict>> {
    let item = PyDict::new(py);
    item.set_item("ns_id", &entry.ns_id)?;
    item.set_item("category", entry.category.as_str())?;
    item.set_item("severity", entry.severity.as_str())?;
    item.set_item("start", entry.start)?;
    item.set_item("end", entry.end)?;
    item.set_item("strategy", entry.strategy.as_str())?;
    item.set_item("action", entry.action.as_str())?;
    item.set_item("raw", entry.raw.as_deref())?;
    Ok(item)
}

#[pymethods]
impl RegexVaultPy {
    /// Create a vault
    ///
    /// # Arguments
    /// * `records_json` - JSON array of pattern records; built-in library when omitted
    /// * `validate_examples` - Check every record's match/nomatch examples
    /// * `strict` - Fail if any record is rejected
    #[new]
    #[pyo3(signature = (records_json=None, validate_examples=true, strict=false))]
    pub fn new(records_json: Option<&str>, validate_examples: bool, strict: bool) -> PyResult<Self> {
        let records = parse_records(records_json)?;
        let (vault, _) = PatternVault::load(
            &records,
            &load_options(validate_examples, strict),
            EngineConfig::default(),
        )
        .map_err(|e| PyValueError::new_err(format!("Pattern compilation failed: {}", e)))?;

        Ok(Self { vault })
    }

    /// Find PII; `namespaces=None` searches every namespace
    #[pyo3(signature = (text, namespaces=None, allow_overlaps=false, include_matched_text=false))]
    pub fn find(
        &self,
        text: &str,
        namespaces: Option<Vec<String>>,
        allow_overlaps: bool,
        include_matched_text: bool,
    ) -> PyResult<Py<PyAny>> {
        let options = FindOptions {
            namespaces,
            allow_overlaps,
            include_matched_text,
        };
        let result = self.vault.find_with(text, &options);

        Python::attach(|py| {
            let py_list = PyList::empty(py);
            for m in &result.matches {
                py_list.append(match_to_py(py, m)?)?;
            }
            Ok(py_list.into_any().unbind())
        })
    }

    /// Whole-string validation against one pattern
    pub fn validate(&self, text: &str, ns_id: &str) -> PyResult<bool> {
        self.vault
            .validate(text, ns_id)
            .map(|result| result.is_valid)
            .map_err(|e| PyKeyError::new_err(e.to_string()))
    }

    /// Redact PII
    ///
    /// # Returns
    /// `{"redacted_text": str, "redaction_count": int, "manifest": [...]}`
    #[pyo3(signature = (text, namespaces=None, strategy=None))]
    pub fn redact(
        &self,
        text: &str,
        namespaces: Option<Vec<String>>,
        strategy: Option<&str>,
    ) -> PyResult<Py<PyAny>> {
        let strategy = parse_strategy(strategy)?;
        let options = FindOptions {
            namespaces,
            ..Default::default()
        };
        let result = self.vault.redact_with(text, &options, strategy);

        Python::attach(|py| {
            let manifest = PyList::empty(py);
            for entry in &result.manifest {
                manifest.append(manifest_entry_to_py(py, entry)?)?;
            }

            let py_dict = PyDict::new(py);
            py_dict.set_item("redacted_text", &result.redacted_text)?;
            py_dict.set_item("redaction_count", result.redaction_count())?;
            py_dict.set_item("manifest", manifest)?;
            Ok(py_dict.into_any().unbind())
        })
    }

    /// Swap in a new pattern set; returns the new version
    #[pyo3(signature = (records_json=None, validate_examples=true, strict=false))]
    pub fn reload(
        &self,
        records_json: Option<&str>,
        validate_examples: bool,
        strict: bool,
    ) -> PyResult<u64> {
        let records = parse_records(records_json)?;
        self.vault
            .reload(&records, &load_options(validate_examples, strict))
            .map(|report| report.version)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    #[getter]
    pub fn version(&self) -> u64 {
        self.vault.version()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.vault.namespaces()
    }

    pub fn pattern_ids(&self) -> Vec<String> {
        self.vault.pattern_ids()
    }
}
