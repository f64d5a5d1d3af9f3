// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII pattern registry with matching, redaction and hot reload
// Optional PyO3 bindings behind the `python` feature

pub mod vault;

pub use vault::{
    EngineConfig, FindOptions, LoadOptions, PatternRecord, PatternVault, RedactionStrategy,
};

/// Python module: regex_vault
///
/// # Examples
///
/// ```python
/// from regex_vault import RegexVault
///
/// vault = RegexVault()
/// result = vault.redact("SSN: 900101-1234567", ["kr"], "mask")
/// print(result["redacted_text"])  # "SSN: ******-*******"
/// ```
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn regex_vault(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    use pyo3::types::PyModuleMethods;

    m.add_class::<vault::python::RegexVaultPy>()?;

    // Module metadata
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "PII pattern registry with matching and redaction")?;

    Ok(())
}
