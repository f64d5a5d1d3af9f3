// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Error taxonomy for the pattern vault. Messages carry pattern ids and
// offsets only, never matched text or example values.

use std::fmt;

/// Result type alias using the vault's umbrella error
pub type Result<T> = std::result::Result<T, Error>;

/// Per-record failure while turning a pattern record into a matcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("pattern {ns_id}: invalid expression: {reason}")]
    InvalidExpression { ns_id: String, reason: String },

    #[error("pattern {ns_id}: unsafe expression: {reason}")]
    UnsafeExpression { ns_id: String, reason: String },

    #[error(
        "pattern {ns_id}: example #{index} expected {} but got {}",
        match_word(.expected),
        match_word(.actual)
    )]
    ExampleMismatch {
        ns_id: String,
        index: usize,
        example: String,
        expected: bool,
        actual: bool,
    },

    #[error("pattern {ns_id}: duplicate namespace/id")]
    DuplicatePattern { ns_id: String },
}

fn match_word(matched: &bool) -> &'static str {
    if *matched {
        "match"
    } else {
        "no match"
    }
}

impl CompileError {
    /// `namespace/id` of the offending record
    pub fn ns_id(&self) -> &str {
        match self {
            CompileError::InvalidExpression { ns_id, .. }
            | CompileError::UnsafeExpression { ns_id, .. }
            | CompileError::ExampleMismatch { ns_id, .. }
            | CompileError::DuplicatePattern { ns_id } => ns_id,
        }
    }
}

/// Which part of the scan budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLimit {
    InputBytes(usize),
    ScanTimeMs(u64),
    Matches(usize),
}

impl fmt::Display for BudgetLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetLimit::InputBytes(n) => write!(f, "input exceeds {} bytes", n),
            BudgetLimit::ScanTimeMs(ms) => write!(f, "scan exceeded {} ms", ms),
            BudgetLimit::Matches(n) => write!(f, "more than {} matches", n),
        }
    }
}

/// A single matcher's scan exceeded its budget; its candidates are discarded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pattern {ns_id} timed out: {limit}")]
pub struct PatternTimeout {
    pub ns_id: String,
    pub limit: BudgetLimit,
}

/// Failures of a single matching call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("unknown pattern: {ns_id}")]
    UnknownPattern { ns_id: String },
}

/// A build that cannot be published
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("strict build rejected {} failing record(s)", .failures.len())]
    Strict { failures: Vec<CompileError> },

    #[error("none of {} record(s) compiled", .failures.len())]
    NothingCompiled { failures: Vec<CompileError> },
}

impl BuildError {
    pub fn failures(&self) -> &[CompileError] {
        match self {
            BuildError::Strict { failures } | BuildError::NothingCompiled { failures } => failures,
        }
    }

    pub fn into_failures(self) -> Vec<CompileError> {
        match self {
            BuildError::Strict { failures } | BuildError::NothingCompiled { failures } => failures,
        }
    }
}

/// Outcome of a reload that did not publish
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReloadError {
    #[error("reload build failed with {} failing record(s); previous registry kept", .failures.len())]
    BuildFailure { failures: Vec<CompileError> },

    #[error("another reload is already building")]
    InProgress,
}

/// Failures parsing pattern files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Umbrella error for callers that do not care which layer failed
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Reload(#[from] ReloadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
