// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Immutable, versioned collection of compiled matchers

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::compiler::{compile, CompiledMatcher};
use super::config::{CompilerConfig, LoadOptions, PatternRecord};
use super::error::{BuildError, CompileError};

/// Compiled matchers grouped by namespace, in declaration order.
///
/// A published registry is never mutated; reloading builds a new one.
#[derive(Debug, Default)]
pub struct Registry {
    version: u64,
    namespaces: Vec<(String, Vec<Arc<CompiledMatcher>>)>,
    by_ns_id: HashMap<String, (usize, usize)>,
}

/// Registry plus the records that did not make it in
#[derive(Debug)]
pub struct BuildOutcome {
    pub registry: Registry,
    pub failures: Vec<CompileError>,
}

impl Registry {
    /// Compile every record and group successes by namespace, preserving
    /// input order. Strict mode rejects the whole batch on any failure.
    pub fn build(
        records: &[PatternRecord],
        options: &LoadOptions,
        config: &CompilerConfig,
        version: u64,
    ) -> Result<BuildOutcome, BuildError> {
        let mut registry = Registry {
            version,
            ..Default::default()
        };
        let mut failures = Vec::new();
        // includes ids whose record failed, so a later record cannot take their place
        let mut seen = HashSet::new();

        for record in records {
            let ns_id = record.ns_id();
            if !seen.insert(ns_id.clone()) {
                failures.push(CompileError::DuplicatePattern { ns_id });
                continue;
            }

            match compile(record, options.validate_examples, config) {
                Ok(matcher) => registry.insert(matcher),
                Err(e) => {
                    tracing::warn!(ns_id = %e.ns_id(), error = %e, "pattern rejected");
                    failures.push(e);
                }
            }
        }

        if options.strict && !failures.is_empty() {
            return Err(BuildError::Strict { failures });
        }

        Ok(BuildOutcome { registry, failures })
    }

    fn insert(&mut self, matcher: CompiledMatcher) {
        let ns_index = match self
            .namespaces
            .iter()
            .position(|(name, _)| name == matcher.namespace())
        {
            Some(index) => index,
            None => {
                self.namespaces
                    .push((matcher.namespace().to_string(), Vec::new()));
                self.namespaces.len() - 1
            }
        };
        let matchers = &mut self.namespaces[ns_index].1;
        self.by_ns_id
            .insert(matcher.ns_id().to_string(), (ns_index, matchers.len()));
        matchers.push(Arc::new(matcher));
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Matchers of a namespace; empty if the namespace is unknown
    pub fn get(&self, namespace: &str) -> &[Arc<CompiledMatcher>] {
        self.namespaces
            .iter()
            .find(|(name, _)| name == namespace)
            .map(|(_, matchers)| matchers.as_slice())
            .unwrap_or(&[])
    }

    /// Declaration position of a namespace, used as the last overlap tie-break
    pub fn namespace_rank(&self, namespace: &str) -> Option<usize> {
        self.namespaces.iter().position(|(name, _)| name == namespace)
    }

    /// Exact lookup by `namespace/id`
    pub fn resolve(&self, ns_id: &str) -> Option<&Arc<CompiledMatcher>> {
        let &(ns_index, index) = self.by_ns_id.get(ns_id)?;
        self.namespaces.get(ns_index)?.1.get(index)
    }

    /// Namespaces in first-declared order
    pub fn namespaces(&self) -> Vec<&str> {
        self.namespaces.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Every `namespace/id` in declaration order
    pub fn pattern_ids(&self) -> Vec<&str> {
        self.iter().map(|m| m.ns_id()).collect()
    }

    /// All matchers, namespace by namespace
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledMatcher>> {
        self.namespaces.iter().flat_map(|(_, matchers)| matchers.iter())
    }

    pub fn len(&self) -> usize {
        self.by_ns_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ns_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::config::Category;

    fn records() -> Vec<PatternRecord> {
        vec![
            PatternRecord::new("kr", "mobile_01", Category::Phone, r"01[016-9]-?\d{3,4}-?\d{4}"),
            PatternRecord::new("comm", "email_01", Category::Email, r"[a-z]+@[a-z]+\.com"),
            PatternRecord::new("kr", "rrn_01", Category::Rrn, r"\d{6}-[1-4]\d{6}"),
            PatternRecord::new("us", "bad_01", Category::Other, r"[0-9"),
            PatternRecord::new("kr", "mobile_01", Category::Phone, r"010\d{8}"),
        ]
    }

    #[test]
    fn test_build_groups_in_input_order() {
        let outcome = Registry::build(
            &records(),
            &LoadOptions::default(),
            &CompilerConfig::default(),
            1,
        )
        .unwrap();
        let registry = outcome.registry;

        assert_eq!(registry.version(), 1);
        assert_eq!(registry.namespaces(), vec!["kr", "comm"]);
        assert_eq!(
            registry.pattern_ids(),
            vec!["kr/mobile_01", "kr/rrn_01", "comm/email_01"]
        );
        assert_eq!(registry.len(), 3);

        assert_eq!(outcome.failures.len(), 2);
        assert!(matches!(outcome.failures[0], CompileError::InvalidExpression { .. }));
        assert!(matches!(outcome.failures[1], CompileError::DuplicatePattern { .. }));
    }

    #[test]
    fn test_get_and_resolve() {
        let registry = Registry::build(
            &records(),
            &LoadOptions::default(),
            &CompilerConfig::default(),
            1,
        )
        .unwrap()
        .registry;

        assert_eq!(registry.get("kr").len(), 2);
        assert!(registry.get("xx").is_empty());
        assert_eq!(registry.resolve("kr/rrn_01").unwrap().id(), "rrn_01");
        assert!(registry.resolve("us/bad_01").is_none());
        assert!(registry.resolve("nope").is_none());
    }

    #[test]
    fn test_strict_build_rejects_batch() {
        let err = Registry::build(
            &records(),
            &LoadOptions::strict(),
            &CompilerConfig::default(),
            1,
        )
        .unwrap_err();
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_duplicate_of_failed_record_is_reported() {
        let records = vec![
            PatternRecord::new("kr", "x_01", Category::Other, r"(\d"),
            PatternRecord::new("kr", "x_01", Category::Other, r"x\d+"),
        ];
        let outcome = Registry::build(
            &records,
            &LoadOptions::default(),
            &CompilerConfig::default(),
            1,
        )
        .unwrap();

        assert!(outcome.registry.is_empty());
        assert_eq!(outcome.failures.len(), 2);
        assert!(matches!(outcome.failures[0], CompileError::InvalidExpression { .. }));
        assert!(matches!(
            &outcome.failures[1],
            CompileError::DuplicatePattern { ns_id } if ns_id == "kr/x_01"
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let options = LoadOptions::default();
        let config = CompilerConfig::default();
        let a = Registry::build(&records(), &options, &config, 1).unwrap().registry;
        let b = Registry::build(&records(), &options, &config, 1).unwrap().registry;
        assert_eq!(a.pattern_ids(), b.pattern_ids());
    }
}
