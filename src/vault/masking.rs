// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Redaction engine: rewrites matched spans and records a manifest
//
// Caveat: `mask` output is not guaranteed to be inert. A template that itself
// looks like PII will be found again if the redacted text is scanned twice.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use uuid::Uuid;

use super::config::{ActionOnMatch, Category, EngineConfig, RedactionStrategy, Severity};
use super::detector::{find, FindOptions, Match};
use super::error::PatternTimeout;
use super::registry::Registry;

/// One transformation applied to the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub ns_id: String,
    pub category: Category,
    pub severity: Severity,
    /// Offsets into the original input
    pub start: usize,
    pub end: usize,
    pub strategy: RedactionStrategy,
    pub action: ActionOnMatch,
    /// Raw matched text, only for patterns with `store_raw`
    pub raw: Option<String>,
}

/// Every transformation performed on one input, in input order
pub type RedactionManifest = Vec<ManifestEntry>;

/// Result of a redact call
#[derive(Debug, Clone)]
pub struct RedactionResult {
    pub redacted_text: String,
    pub manifest: RedactionManifest,
    /// Call-level strategy override, if any
    pub strategy: Option<RedactionStrategy>,
    pub timed_out: Vec<PatternTimeout>,
}

impl RedactionResult {
    pub fn redaction_count(&self) -> usize {
        self.manifest.len()
    }
}

/// Find PII in `text` and redact it
pub fn redact(
    registry: &Registry,
    text: &str,
    options: &FindOptions,
    strategy: Option<RedactionStrategy>,
    config: &EngineConfig,
) -> RedactionResult {
    // Overlap resolution is mandatory here; the raw text is read straight from the input
    let options = FindOptions {
        allow_overlaps: false,
        include_matched_text: false,
        ..options.clone()
    };
    let found = find(registry, text, &options, &config.budget);

    let mut manifest = Vec::with_capacity(found.matches.len());
    for m in &found.matches {
        let Some(matcher) = registry.resolve(&m.ns_id) else {
            continue;
        };
        let policy = &matcher.record().policy;
        let applied = resolve_strategy(strategy, policy.strategy);
        log_action(policy.action_on_match, m, applied);

        manifest.push(ManifestEntry {
            ns_id: m.ns_id.clone(),
            category: m.category,
            severity: m.severity,
            start: m.start,
            end: m.end,
            strategy: applied,
            action: policy.action_on_match,
            raw: policy
                .store_raw
                .then(|| text[m.start..m.end].to_string()),
        });
    }

    let redacted_text = apply_redactions(text, &found.matches, &manifest, config).into_owned();

    RedactionResult {
        redacted_text,
        manifest,
        strategy,
        timed_out: found.timed_out,
    }
}

/// Call-level strategy, else the pattern's declared default, else mask
fn resolve_strategy(
    call: Option<RedactionStrategy>,
    pattern_default: Option<RedactionStrategy>,
) -> RedactionStrategy {
    call.or(pattern_default).unwrap_or(RedactionStrategy::Mask)
}

fn log_action(action: ActionOnMatch, m: &Match, strategy: RedactionStrategy) {
    match action {
        ActionOnMatch::Alert => tracing::warn!(
            ns_id = %m.ns_id,
            category = m.category.as_str(),
            severity = m.severity.as_str(),
            start = m.start,
            end = m.end,
            strategy = strategy.as_str(),
            "sensitive data redacted"
        ),
        ActionOnMatch::Log => tracing::info!(
            ns_id = %m.ns_id,
            category = m.category.as_str(),
            start = m.start,
            end = m.end,
            strategy = strategy.as_str(),
            "sensitive data redacted"
        ),
        ActionOnMatch::Redact => tracing::debug!(
            ns_id = %m.ns_id,
            start = m.start,
            end = m.end,
            strategy = strategy.as_str(),
            "sensitive data redacted"
        ),
    }
}

/// Rewrite matched spans, last to first so earlier offsets stay valid
fn apply_redactions<'a>(
    text: &'a str,
    matches: &[Match],
    manifest: &[ManifestEntry],
    config: &EngineConfig,
) -> Cow<'a, str> {
    if manifest.is_empty() {
        // Zero-copy when nothing matched
        return Cow::Borrowed(text);
    }

    let mut result = text.to_string();
    for (m, entry) in matches.iter().zip(manifest).rev() {
        let original = &text[entry.start..entry.end];
        let replacement = replacement_for(original, m, entry.strategy, config);
        result.replace_range(entry.start..entry.end, &replacement);
    }

    Cow::Owned(result)
}

fn replacement_for(
    original: &str,
    m: &Match,
    strategy: RedactionStrategy,
    config: &EngineConfig,
) -> String {
    match strategy {
        RedactionStrategy::Mask => match &m.mask {
            Some(template) => template.clone(),
            None => generic_mask(original, config.mask_char),
        },
        RedactionStrategy::Hash => hash_mask(original, config.hash_prefix_len),
        RedactionStrategy::Tokenize => tokenize_mask(&m.ns_id),
    }
}

/// One mask char per character of the matched span
fn generic_mask(value: &str, mask_char: char) -> String {
    std::iter::repeat(mask_char).take(value.chars().count()).collect()
}

/// Hash masking using SHA256
fn hash_mask(value: &str, prefix_len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("[HASH:{}]", &digest[..prefix_len.clamp(1, digest.len())])
}

/// Opaque reference; the engine keeps no token table
fn tokenize_mask(ns_id: &str) -> String {
    format!("[TOKEN:{}:{}]", ns_id, Uuid::new_v4().simple())
}
