// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Hot-reload coordinator and the public vault facade
//
// The only mutable shared state is the pointer to the current registry.
// Readers clone the `Arc` and work on that snapshot; a reload builds the next
// registry off to the side and swaps the pointer in one write.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use super::config::{EngineConfig, LoadOptions, PatternRecord, RedactionStrategy};
use super::detector::{self, FindOptions, FindResult, ValidationResult};
use super::error::{BuildError, CompileError, MatchError, ReloadError};
use super::masking::{self, RedactionResult};
use super::patterns;
use super::registry::{BuildOutcome, Registry};

/// Where the most recent reload attempt stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadPhase {
    Idle,
    Building,
    Published { version: u64 },
    RolledBack { failures: usize },
}

/// Summary of a successful load or reload
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub version: u64,
    /// Matchers in the published registry
    pub loaded: usize,
    /// Records left out of it
    pub failures: Vec<CompileError>,
}

/// Thread-safe handle over the current pattern registry
pub struct PatternVault {
    current: RwLock<Arc<Registry>>,
    reload_gate: Mutex<()>,
    phase: RwLock<ReloadPhase>,
    config: EngineConfig,
}

/// Build a registry fit to become current. Nothing usable out of a
/// non-empty batch is a failed build, not an empty registry.
fn build_publishable(
    records: &[PatternRecord],
    options: &LoadOptions,
    config: &EngineConfig,
    version: u64,
) -> Result<BuildOutcome, BuildError> {
    let outcome = Registry::build(records, options, &config.compiler, version)?;
    if outcome.registry.is_empty() && !records.is_empty() {
        return Err(BuildError::NothingCompiled {
            failures: outcome.failures,
        });
    }
    Ok(outcome)
}

impl PatternVault {
    /// Build the initial registry (version 1). Fails in strict mode on any
    /// rejected record, and in either mode when no record compiled.
    pub fn load(
        records: &[PatternRecord],
        options: &LoadOptions,
        config: EngineConfig,
    ) -> Result<(Self, LoadReport), BuildError> {
        let BuildOutcome { registry, failures } = build_publishable(records, options, &config, 1)?;

        let report = LoadReport {
            version: registry.version(),
            loaded: registry.len(),
            failures,
        };
        tracing::info!(
            version = report.version,
            loaded = report.loaded,
            failed = report.failures.len(),
            namespaces = ?registry.namespaces(),
            "pattern registry loaded"
        );

        let vault = Self {
            current: RwLock::new(Arc::new(registry)),
            reload_gate: Mutex::new(()),
            phase: RwLock::new(ReloadPhase::Idle),
            config,
        };
        Ok((vault, report))
    }

    /// Vault over the built-in `kr`, `us` and `comm` library
    pub fn with_defaults(config: EngineConfig) -> Self {
        let records = patterns::default_records();
        match Self::load(&records, &LoadOptions::default(), config.clone()) {
            Ok((vault, _)) => vault,
            // only reachable if a built-in record stops compiling
            Err(e) => {
                tracing::error!(error = %e, "built-in patterns failed to load");
                Self::empty(config)
            }
        }
    }

    fn empty(config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(Registry::default())),
            reload_gate: Mutex::new(()),
            phase: RwLock::new(ReloadPhase::Idle),
            config,
        }
    }

    /// The registry current at the time of the call. Stays valid and
    /// unchanged for as long as the caller holds it.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.read().clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Find PII in the given namespaces
    pub fn find<I, S>(&self, text: &str, namespaces: I) -> FindResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.find_with(text, &FindOptions::namespaces(namespaces))
    }

    pub fn find_with(&self, text: &str, options: &FindOptions) -> FindResult {
        let registry = self.snapshot();
        detector::find(&registry, text, options, &self.config.budget)
    }

    /// Whole-string check of `text` against a single pattern
    pub fn validate(&self, text: &str, ns_id: &str) -> Result<ValidationResult, MatchError> {
        let registry = self.snapshot();
        detector::validate(&registry, text, ns_id)
    }

    /// Redact PII in the given namespaces
    pub fn redact<I, S>(
        &self,
        text: &str,
        namespaces: I,
        strategy: Option<RedactionStrategy>,
    ) -> RedactionResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redact_with(text, &FindOptions::namespaces(namespaces), strategy)
    }

    pub fn redact_with(
        &self,
        text: &str,
        options: &FindOptions,
        strategy: Option<RedactionStrategy>,
    ) -> RedactionResult {
        let registry = self.snapshot();
        masking::redact(&registry, text, options, strategy, &self.config)
    }

    /// Replace the pattern set.
    ///
    /// Readers keep using the previous registry until the new one is
    /// published. Only one reload builds at a time; a second caller gets
    /// `ReloadError::InProgress`. A failed build leaves the previous registry
    /// current.
    pub fn reload(
        &self,
        records: &[PatternRecord],
        options: &LoadOptions,
    ) -> Result<LoadReport, ReloadError> {
        let Some(_gate) = self.reload_gate.try_lock() else {
            tracing::warn!("reload rejected, another reload is building");
            return Err(ReloadError::InProgress);
        };

        *self.phase.write() = ReloadPhase::Building;
        let previous = self.version();
        let version = previous + 1;

        match build_publishable(records, options, &self.config, version) {
            Ok(BuildOutcome { registry, failures }) => {
                let loaded = registry.len();
                let retired = std::mem::replace(&mut *self.current.write(), Arc::new(registry));
                // the last reference may free every matcher; keep that outside the lock
                drop(retired);
                *self.phase.write() = ReloadPhase::Published { version };
                tracing::info!(
                    version,
                    previous,
                    loaded,
                    failed = failures.len(),
                    "pattern registry published"
                );
                Ok(LoadReport {
                    version,
                    loaded,
                    failures,
                })
            }
            Err(e) => {
                let failures = e.into_failures();
                *self.phase.write() = ReloadPhase::RolledBack {
                    failures: failures.len(),
                };
                tracing::info!(
                    version = previous,
                    failed = failures.len(),
                    "reload rolled back, previous registry kept"
                );
                Err(ReloadError::BuildFailure { failures })
            }
        }
    }

    /// Version of the current registry
    pub fn version(&self) -> u64 {
        self.current.read().version()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.snapshot()
            .namespaces()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn pattern_ids(&self) -> Vec<String> {
        self.snapshot()
            .pattern_ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn phase(&self) -> ReloadPhase {
        self.phase.read().clone()
    }
}

impl std::fmt::Debug for PatternVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternVault")
            .field("version", &self.version())
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::config::Category;

    fn records() -> Vec<PatternRecord> {
        vec![
            PatternRecord::new("kr", "mobile_01", Category::Phone, r"01[016-9]-?\d{3,4}-?\d{4}"),
            PatternRecord::new("us", "ssn_01", Category::Ssn, r"\d{3}-\d{2}-\d{4}"),
        ]
    }

    fn vault() -> PatternVault {
        PatternVault::load(&records(), &LoadOptions::default(), EngineConfig::default())
            .unwrap()
            .0
    }

    #[test]
    fn test_initial_load() {
        let vault = vault();
        assert_eq!(vault.version(), 1);
        assert_eq!(vault.phase(), ReloadPhase::Idle);
        assert_eq!(vault.namespaces(), vec!["kr", "us"]);
        assert_eq!(vault.pattern_ids(), vec!["kr/mobile_01", "us/ssn_01"]);
    }

    #[test]
    fn test_strict_load_fails() {
        let mut records = records();
        records.push(PatternRecord::new("kr", "bad_01", Category::Other, r"(\d"));
        let err = PatternVault::load(&records, &LoadOptions::strict(), EngineConfig::default())
            .unwrap_err();
        assert_eq!(err.failures().len(), 1);
    }

    #[test]
    fn test_load_with_nothing_compiled_fails() {
        let records = vec![PatternRecord::new("kr", "bad_01", Category::Other, r"(\d")];
        let err = PatternVault::load(&records, &LoadOptions::default(), EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::NothingCompiled { .. }));
        assert_eq!(err.failures().len(), 1);

        let (vault, report) =
            PatternVault::load(&[], &LoadOptions::default(), EngineConfig::default()).unwrap();
        assert_eq!(report.loaded, 0);
        assert!(vault.namespaces().is_empty());
    }

    #[test]
    fn test_with_defaults() {
        let vault = PatternVault::with_defaults(EngineConfig::default());
        assert_eq!(vault.namespaces(), vec!["kr", "us", "comm"]);
        assert!(vault.validate("010-1234-5678", "kr/mobile_01").unwrap().is_valid);
    }

    #[test]
    fn test_reload_partial_failure_publishes() {
        let vault = vault();
        let records = vec![
            PatternRecord::new("kr", "mobile_01", Category::Phone, r"010-\d{4}-\d{4}"),
            PatternRecord::new("us", "ssn_01", Category::Ssn, r"\d{3}-\d{2}-\d{4}"),
            PatternRecord::new("comm", "email_01", Category::Email, r"[a-z]+@[a-z]+\.com"),
            PatternRecord::new("jp", "phone_01", Category::Phone, r"0\d0-\d{4}-\d{4}"),
            PatternRecord::new("de", "bad_01", Category::Other, r"[unclosed"),
        ];

        let report = vault.reload(&records, &LoadOptions::default()).unwrap();
        assert_eq!(report.version, 2);
        assert_eq!(report.loaded, 4);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], CompileError::InvalidExpression { .. }));
        assert_eq!(vault.version(), 2);
        assert_eq!(vault.phase(), ReloadPhase::Published { version: 2 });
        assert_eq!(vault.namespaces(), vec!["kr", "us", "comm", "jp"]);
    }

    #[test]
    fn test_strict_reload_rolls_back() {
        let vault = vault();
        let mut next = records();
        next.push(PatternRecord::new("kr", "bad_01", Category::Other, r"(a+)+"));

        let err = vault.reload(&next, &LoadOptions::strict()).unwrap_err();
        assert!(matches!(err, ReloadError::BuildFailure { ref failures } if failures.len() == 1));
        assert_eq!(vault.version(), 1);
        assert_eq!(vault.phase(), ReloadPhase::RolledBack { failures: 1 });
        assert_eq!(vault.pattern_ids(), vec!["kr/mobile_01", "us/ssn_01"]);
    }

    #[test]
    fn test_total_failure_rolls_back() {
        let vault = vault();
        let next = vec![PatternRecord::new("kr", "bad_01", Category::Other, r"(")];
        let err = vault.reload(&next, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ReloadError::BuildFailure { .. }));
        assert_eq!(vault.version(), 1);
    }

    #[test]
    fn test_empty_reload_publishes_empty_registry() {
        let vault = vault();
        let report = vault.reload(&[], &LoadOptions::default()).unwrap();
        assert_eq!(report.version, 2);
        assert!(vault.namespaces().is_empty());
    }

    #[test]
    fn test_reload_releases_previous_registry() {
        let vault = vault();
        let previous = Arc::downgrade(&vault.snapshot());

        vault.reload(&records(), &LoadOptions::default()).unwrap();
        assert!(previous.upgrade().is_none());
        assert_eq!(vault.snapshot().version(), 2);
    }

    #[test]
    fn test_concurrent_reload_rejected() {
        let vault = vault();
        let _held = vault.reload_gate.lock();
        let err = vault.reload(&records(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err, ReloadError::InProgress);
        assert_eq!(vault.version(), 1);
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let vault = vault();
        let before = vault.snapshot();

        let next = vec![PatternRecord::new("comm", "email_01", Category::Email, r"[a-z]+@[a-z]+\.com")];
        vault.reload(&next, &LoadOptions::default()).unwrap();

        assert_eq!(before.version(), 1);
        assert_eq!(before.get("kr").len(), 1);
        assert!(vault.snapshot().get("kr").is_empty());
        assert!(vault.find("call 010-1234-5678", ["kr"]).matches.is_empty());
    }

    #[test]
    fn test_readers_see_whole_registries_during_reloads() {
        let vault = vault();
        let old = records();
        let new = vec![
            PatternRecord::new("kr", "mobile_01", Category::Phone, r"01[016-9]-?\d{3,4}-?\d{4}"),
            PatternRecord::new("us", "ssn_01", Category::Ssn, r"\d{3}-\d{2}-\d{4}"),
            PatternRecord::new("us", "zip_01", Category::Address, r"\b\d{5}\b"),
        ];

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let registry = vault.snapshot();
                        let ids = registry.pattern_ids();
                        assert!(ids.len() == 2 || ids.len() == 3, "partial registry: {:?}", ids);
                        if ids.len() == 3 {
                            assert!(registry.version() % 2 == 0);
                        }
                    }
                });
            }
            scope.spawn(|| {
                for round in 0..20 {
                    let next = if round % 2 == 0 { &new } else { &old };
                    // readers never block a reload
                    vault.reload(next, &LoadOptions::default()).unwrap();
                }
            });
        });

        assert_eq!(vault.version(), 21);
        assert_eq!(vault.pattern_ids().len(), 2);
    }
}
