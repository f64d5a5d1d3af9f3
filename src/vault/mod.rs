// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Regex Vault - PII pattern registry and redaction engine
//
// Declared pattern records are compiled into matchers, grouped into an
// immutable versioned registry, and served through `PatternVault`, which
// swaps registries atomically on reload.

pub mod compiler;
pub mod config;
pub mod detector;
pub mod error;
pub mod lint;
pub mod masking;
pub mod patterns;
#[cfg(feature = "python")]
pub mod python;
pub mod registry;
pub mod reload;

pub use compiler::{compile, CompiledMatcher, Span};
pub use config::{
    records_from_json_str, records_from_yaml_str, ActionOnMatch, Category, CompilerConfig,
    EngineConfig, Examples, LoadOptions, PatternFile, PatternRecord, Policy, RedactionStrategy,
    RegexFlag, ScanBudget, Severity,
};
pub use detector::{find, validate, FindOptions, FindResult, Match, ValidationResult};
pub use error::{
    BudgetLimit, BuildError, CompileError, ConfigError, Error, MatchError, PatternTimeout,
    ReloadError, Result,
};
pub use masking::{redact, ManifestEntry, RedactionManifest, RedactionResult};
pub use registry::{BuildOutcome, Registry};
pub use reload::{LoadReport, PatternVault, ReloadPhase};
