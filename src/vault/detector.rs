// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Matching engine: multi-pattern search with overlap resolution

use serde::Serialize;
use std::cmp::Ordering;

use super::compiler::{CompiledMatcher, Span};
use super::config::{Category, ScanBudget, Severity};
use super::error::{MatchError, PatternTimeout};
use super::registry::Registry;

/// A single accepted detection. Offsets are byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub ns_id: String,
    pub pattern_id: String,
    pub namespace: String,
    pub category: Category,
    pub severity: Severity,
    pub start: usize,
    pub end: usize,
    /// Only present when requested and the pattern's policy allows `store_raw`
    pub matched_text: Option<String>,
    pub mask: Option<String>,
}

impl Match {
    fn from_matcher(matcher: &CompiledMatcher, span: Span, text: &str, include_text: bool) -> Self {
        let record = matcher.record();
        let matched_text = (include_text && record.policy.store_raw)
            .then(|| text[span.start..span.end].to_string());
        Self {
            ns_id: matcher.ns_id().to_string(),
            pattern_id: record.id.clone(),
            namespace: record.namespace.clone(),
            category: record.category,
            severity: record.policy.severity,
            start: span.start,
            end: span.end,
            matched_text,
            mask: record.mask.clone(),
        }
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Options for a find call
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Namespaces to search; `None` searches every namespace
    pub namespaces: Option<Vec<String>>,
    /// Keep every candidate instead of resolving overlaps
    pub allow_overlaps: bool,
    /// Populate `matched_text` for patterns whose policy allows it
    pub include_matched_text: bool,
}

impl FindOptions {
    pub fn namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: Some(namespaces.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }
}

/// Result of a find call
#[derive(Debug, Clone, Default)]
pub struct FindResult {
    pub matches: Vec<Match>,
    pub namespaces_searched: Vec<String>,
    /// Matchers whose contribution was dropped for exceeding the budget
    pub timed_out: Vec<PatternTimeout>,
}

impl FindResult {
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }
}

/// Result of a whole-string validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub ns_id: String,
    pub is_valid: bool,
    pub matched: Option<Match>,
}

/// Candidate span before overlap resolution
struct Candidate<'r> {
    matcher: &'r CompiledMatcher,
    span: Span,
    /// (namespace position, pattern position) in declaration order
    rank: (usize, usize),
}

impl Candidate<'_> {
    fn severity(&self) -> Severity {
        self.matcher.record().policy.severity
    }
}

/// start asc, length desc, severity desc, declaration order asc
fn precedence(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.span
        .start
        .cmp(&b.span.start)
        .then_with(|| b.span.len().cmp(&a.span.len()))
        .then_with(|| b.severity().cmp(&a.severity()))
        .then_with(|| a.rank.cmp(&b.rank))
}

/// Greedy left-to-right sweep over candidates sorted by `precedence`
fn resolve_overlaps(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    let mut accepted: Vec<Candidate<'_>> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let clear = accepted
            .last()
            .map_or(true, |last| candidate.span.start >= last.span.end);
        if clear {
            accepted.push(candidate);
        }
    }
    accepted
}

fn requested_namespaces(registry: &Registry, options: &FindOptions) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    match &options.namespaces {
        Some(requested) => {
            for ns in requested {
                if !namespaces.contains(ns) {
                    namespaces.push(ns.clone());
                }
            }
        }
        None => namespaces.extend(registry.namespaces().into_iter().map(String::from)),
    }
    namespaces
}

/// Find all PII in `text` across the requested namespaces
pub fn find(
    registry: &Registry,
    text: &str,
    options: &FindOptions,
    budget: &ScanBudget,
) -> FindResult {
    let namespaces = requested_namespaces(registry, options);
    let mut result = FindResult {
        namespaces_searched: namespaces.clone(),
        ..Default::default()
    };
    if text.is_empty() {
        return result;
    }

    let mut candidates = Vec::new();
    for namespace in &namespaces {
        let Some(ns_rank) = registry.namespace_rank(namespace) else {
            tracing::debug!(namespace = %namespace, "unknown namespace, no candidates");
            continue;
        };

        for (index, matcher) in registry.get(namespace).iter().enumerate() {
            match matcher.scan(text, budget) {
                Ok(spans) => candidates.extend(spans.into_iter().map(|span| Candidate {
                    matcher: matcher.as_ref(),
                    span,
                    rank: (ns_rank, index),
                })),
                Err(timeout) => {
                    tracing::warn!(ns_id = %timeout.ns_id, limit = %timeout.limit, "pattern scan exceeded budget, skipped");
                    result.timed_out.push(timeout);
                }
            }
        }
    }

    candidates.sort_by(precedence);
    let accepted = if options.allow_overlaps {
        candidates
    } else {
        resolve_overlaps(candidates)
    };

    result.matches = accepted
        .into_iter()
        .map(|c| Match::from_matcher(c.matcher, c.span, text, options.include_matched_text))
        .collect();
    result
}

/// Whole-string validation against a single pattern
pub fn validate(registry: &Registry, text: &str, ns_id: &str) -> Result<ValidationResult, MatchError> {
    let matcher = registry
        .resolve(ns_id)
        .ok_or_else(|| MatchError::UnknownPattern {
            ns_id: ns_id.to_string(),
        })?;

    let is_valid = matcher.is_full_match(text);
    tracing::debug!(ns_id = %ns_id, is_valid, "validated input");

    let matched = is_valid.then(|| {
        Match::from_matcher(
            matcher,
            Span {
                start: 0,
                end: text.len(),
            },
            text,
            true,
        )
    });

    Ok(ValidationResult {
        ns_id: ns_id.to_string(),
        is_valid,
        matched,
    })
}
