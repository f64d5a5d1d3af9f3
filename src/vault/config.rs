// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Pattern records, policy types and engine configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::error::ConfigError;

/// PII categories a pattern can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Phone,
    Ssn,
    Rrn,
    Email,
    Bank,
    Passport,
    Address,
    CreditCard,
    Ip,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Phone => "phone",
            Category::Ssn => "ssn",
            Category::Rrn => "rrn",
            Category::Email => "email",
            Category::Bank => "bank",
            Category::Passport => "passport",
            Category::Address => "address",
            Category::CreditCard => "credit_card",
            Category::Ip => "ip",
            Category::Other => "other",
        }
    }
}

/// Severity of a pattern. Ordering is `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// What the engine reports when a pattern matches during redaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionOnMatch {
    #[default]
    Redact,
    #[serde(alias = "report")]
    Alert,
    Log,
}

impl ActionOnMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOnMatch::Redact => "redact",
            ActionOnMatch::Alert => "alert",
            ActionOnMatch::Log => "log",
        }
    }
}

/// Transformation applied to a matched span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionStrategy {
    Mask,     // Template or repeated mask char
    Hash,     // [HASH:abc123...]
    Tokenize, // [TOKEN:ns/id:uuid]
}

impl RedactionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionStrategy::Mask => "mask",
            RedactionStrategy::Hash => "hash",
            RedactionStrategy::Tokenize => "tokenize",
        }
    }
}

impl fmt::Display for RedactionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RedactionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mask" => Ok(RedactionStrategy::Mask),
            "hash" => Ok(RedactionStrategy::Hash),
            "tokenize" => Ok(RedactionStrategy::Tokenize),
            other => Err(format!("unknown redaction strategy '{}'", other)),
        }
    }
}

/// Regex compilation flags, spelled the way pattern files declare them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegexFlag {
    #[serde(rename = "IGNORECASE", alias = "ignorecase", alias = "i")]
    IgnoreCase,
    #[serde(rename = "MULTILINE", alias = "multiline", alias = "m")]
    Multiline,
    #[serde(rename = "DOTALL", alias = "dotall", alias = "s")]
    DotAll,
    #[serde(rename = "UNICODE", alias = "unicode", alias = "u")]
    Unicode,
    #[serde(rename = "VERBOSE", alias = "verbose", alias = "x")]
    Verbose,
}

/// Privacy policy attached to a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Policy {
    #[serde(default)]
    pub store_raw: bool,
    #[serde(default)]
    pub action_on_match: ActionOnMatch,
    #[serde(default)]
    pub severity: Severity,
    /// Pattern-level default strategy, used when the caller names none
    #[serde(default)]
    pub strategy: Option<RedactionStrategy>,
}

/// Self-check examples, evaluated as whole-string matches at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Examples {
    #[serde(rename = "match", default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub nomatch: Vec<String>,
}

impl Examples {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.nomatch.is_empty()
    }
}

/// One declared PII shape. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub id: String,
    #[serde(default, alias = "location")]
    pub namespace: String,
    pub category: Category,
    #[serde(alias = "expression")]
    pub pattern: String,
    #[serde(default)]
    pub flags: Vec<RegexFlag>,
    #[serde(default, alias = "mask_template")]
    pub mask: Option<String>,
    #[serde(default)]
    pub examples: Option<Examples>,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PatternRecord {
    /// Minimal record; the remaining fields take their defaults
    pub fn new(
        namespace: impl Into<String>,
        id: impl Into<String>,
        category: Category,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            category,
            pattern: pattern.into(),
            flags: Vec::new(),
            mask: None,
            examples: None,
            policy: Policy::default(),
            description: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.policy.severity = severity;
        self
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn with_flags(mut self, flags: &[RegexFlag]) -> Self {
        self.flags = flags.to_vec();
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_examples(mut self, matches: &[&str], nomatch: &[&str]) -> Self {
        self.examples = Some(Examples {
            matches: matches.iter().map(|s| s.to_string()).collect(),
            nomatch: nomatch.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Globally unique `namespace/id`
    pub fn ns_id(&self) -> String {
        format!("{}/{}", self.namespace, self.id)
    }
}

/// A pattern file groups the records of one namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternFile {
    pub namespace: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patterns: Vec<PatternRecord>,
}

impl PatternFile {
    /// Flatten into records; entries without a namespace inherit the file's
    pub fn into_records(self) -> Vec<PatternRecord> {
        let namespace = self.namespace;
        self.patterns
            .into_iter()
            .map(|mut record| {
                if record.namespace.is_empty() {
                    record.namespace = namespace.clone();
                }
                record
            })
            .collect()
    }
}

/// Parse a YAML pattern file into records
pub fn records_from_yaml_str(source: &str) -> Result<Vec<PatternRecord>, ConfigError> {
    let file: PatternFile = serde_yaml::from_str(source)?;
    Ok(file.into_records())
}

/// Parse a JSON array of records
pub fn records_from_json_str(source: &str) -> Result<Vec<PatternRecord>, ConfigError> {
    Ok(serde_json::from_str(source)?)
}

/// Options for `load` / `reload`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    #[serde(default = "default_true")]
    pub validate_examples: bool,
    #[serde(default)]
    pub strict: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            validate_examples: true,
            strict: false,
        }
    }
}

impl LoadOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }
}

/// Per-matcher execution budget for one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBudget {
    pub max_input_bytes: Option<usize>,
    pub max_scan_time_ms: Option<u64>,
    pub max_matches_per_pattern: Option<usize>,
}

impl Default for ScanBudget {
    fn default() -> Self {
        Self {
            max_input_bytes: Some(10 * 1024 * 1024),
            max_scan_time_ms: Some(500),
            max_matches_per_pattern: Some(100_000),
        }
    }
}

impl ScanBudget {
    /// No limits at all
    pub fn unlimited() -> Self {
        Self {
            max_input_bytes: None,
            max_scan_time_ms: None,
            max_matches_per_pattern: None,
        }
    }
}

/// Limits handed to `regex::RegexBuilder`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub size_limit: usize,
    pub dfa_size_limit: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            size_limit: 1024 * 1024,
            dfa_size_limit: 2 * 1024 * 1024,
        }
    }
}

/// Configuration for the matching and redaction engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_mask_char")]
    pub mask_char: char,
    #[serde(default = "default_hash_prefix_len")]
    pub hash_prefix_len: usize,
    #[serde(default)]
    pub budget: ScanBudget,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

fn default_mask_char() -> char {
    '*'
}

fn default_hash_prefix_len() -> usize {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mask_char: default_mask_char(),
            hash_prefix_len: default_hash_prefix_len(),
            budget: ScanBudget::default(),
            compiler: CompilerConfig::default(),
        }
    }
}
