// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Pattern record -> executable matcher
//
// Compilation order: regex syntax, safety lint, empty-match guard, then the
// optional example self-check. Nothing here touches global state.

use regex::{Regex, RegexBuilder};
use std::time::{Duration, Instant};

use super::config::{CompilerConfig, PatternRecord, RegexFlag, ScanBudget};
use super::error::{BudgetLimit, CompileError, PatternTimeout};
use super::lint;

/// Raw span produced by one matcher scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compiled pattern plus the record it came from. Immutable, shareable.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    record: PatternRecord,
    ns_id: String,
    regex: Regex,
    anchored: Regex,
}

impl CompiledMatcher {
    pub fn record(&self) -> &PatternRecord {
        &self.record
    }

    pub fn ns_id(&self) -> &str {
        &self.ns_id
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn namespace(&self) -> &str {
        &self.record.namespace
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Whole-string match: the entire input must match the expression
    pub fn is_full_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// Leftmost-first, non-overlapping occurrences of this single pattern.
    ///
    /// The budget is checked cooperatively between occurrences; running out
    /// discards everything this matcher found.
    pub fn scan(&self, text: &str, budget: &ScanBudget) -> Result<Vec<Span>, PatternTimeout> {
        if let Some(max) = budget.max_input_bytes {
            if text.len() > max {
                return Err(self.timeout(BudgetLimit::InputBytes(max)));
            }
        }

        let deadline = budget
            .max_scan_time_ms
            .map(|ms| (ms, Instant::now() + Duration::from_millis(ms)));

        let mut spans = Vec::new();
        for mat in self.regex.find_iter(text) {
            if let Some((ms, deadline)) = deadline {
                if Instant::now() > deadline {
                    return Err(self.timeout(BudgetLimit::ScanTimeMs(ms)));
                }
            }
            if mat.start() == mat.end() {
                continue;
            }
            if let Some(max) = budget.max_matches_per_pattern {
                if spans.len() >= max {
                    return Err(self.timeout(BudgetLimit::Matches(max)));
                }
            }
            spans.push(Span {
                start: mat.start(),
                end: mat.end(),
            });
        }

        Ok(spans)
    }

    fn timeout(&self, limit: BudgetLimit) -> PatternTimeout {
        PatternTimeout {
            ns_id: self.ns_id.clone(),
            limit,
        }
    }
}

fn builder(source: &str, record: &PatternRecord, config: &CompilerConfig) -> RegexBuilder {
    let mut builder = RegexBuilder::new(source);
    builder
        .size_limit(config.size_limit)
        .dfa_size_limit(config.dfa_size_limit);
    for flag in &record.flags {
        match flag {
            RegexFlag::IgnoreCase => builder.case_insensitive(true),
            RegexFlag::Multiline => builder.multi_line(true),
            RegexFlag::DotAll => builder.dot_matches_new_line(true),
            RegexFlag::Unicode => builder.unicode(true),
            RegexFlag::Verbose => builder.ignore_whitespace(true),
        };
    }
    builder
}

/// Compile one record into a matcher
pub fn compile(
    record: &PatternRecord,
    validate_examples: bool,
    config: &CompilerConfig,
) -> Result<CompiledMatcher, CompileError> {
    let ns_id = record.ns_id();
    let verbose = record.flags.contains(&RegexFlag::Verbose);

    let regex = builder(&record.pattern, record, config)
        .build()
        .map_err(|e| CompileError::InvalidExpression {
            ns_id: ns_id.clone(),
            reason: e.to_string(),
        })?;

    let analysis = lint::analyze(&record.pattern, verbose);
    if analysis.is_none() {
        tracing::debug!(ns_id = %ns_id, "safety lint could not model expression, skipped");
    }

    // a trailing comment in verbose mode must not swallow the closing anchor
    let verbose_tail = verbose || analysis.map_or(false, |a| a.verbose_tail);
    let anchored_source = if verbose_tail {
        format!("\\A(?:{}\n)\\z", record.pattern)
    } else {
        format!(r"\A(?:{})\z", record.pattern)
    };
    let anchored = builder(&anchored_source, record, config)
        .build()
        .map_err(|e| CompileError::InvalidExpression {
            ns_id: ns_id.clone(),
            reason: e.to_string(),
        })?;

    if let Some(hazard) = analysis.and_then(|a| a.hazard) {
        return Err(CompileError::UnsafeExpression {
            ns_id,
            reason: hazard.to_string(),
        });
    }
    if analysis.map_or(false, |a| a.nullable) || regex.is_match("") {
        return Err(CompileError::UnsafeExpression {
            ns_id,
            reason: "expression can match the empty string".to_string(),
        });
    }

    let matcher = CompiledMatcher {
        record: record.clone(),
        ns_id,
        regex,
        anchored,
    };

    if validate_examples {
        validate_examples_of(&matcher)?;
    }

    tracing::debug!(ns_id = %matcher.ns_id, "pattern compiled");
    Ok(matcher)
}

/// Every `match` example must full-match, every `nomatch` example must not
fn validate_examples_of(matcher: &CompiledMatcher) -> Result<(), CompileError> {
    let Some(examples) = matcher.record.examples.as_ref() else {
        return Ok(());
    };

    let expectations = examples
        .matches
        .iter()
        .map(|e| (e, true))
        .chain(examples.nomatch.iter().map(|e| (e, false)));

    for (index, (example, expected)) in expectations.enumerate() {
        let actual = matcher.is_full_match(example);
        if actual != expected {
            return Err(CompileError::ExampleMismatch {
                ns_id: matcher.ns_id.clone(),
                index,
                example: example.clone(),
                expected,
                actual,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::config::{Category, Severity};

    fn mobile() -> PatternRecord {
        PatternRecord::new("kr", "mobile_01", Category::Phone, r"01[016-9]-?\d{3,4}-?\d{4}")
            .with_severity(Severity::High)
            .with_examples(
                &["010-1234-5678", "01012345678", "011-123-4567"],
                &["02-1234-5678", "012-1234-5678"],
            )
    }

    #[test]
    fn test_compile_valid_pattern() {
        let matcher = compile(&mobile(), true, &CompilerConfig::default()).unwrap();
        assert_eq!(matcher.ns_id(), "kr/mobile_01");
        assert!(matcher.is_full_match("010-1234-5678"));
        assert!(!matcher.is_full_match("Call 010-1234-5678"));
    }

    #[test]
    fn test_invalid_expression() {
        let record = PatternRecord::new("kr", "bad_01", Category::Other, r"(\d{3");
        let err = compile(&record, true, &CompilerConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidExpression { ref ns_id, .. } if ns_id == "kr/bad_01"));
    }

    #[test]
    fn test_unsafe_expression() {
        let record = PatternRecord::new("kr", "evil_01", Category::Other, r"(a+)+b");
        let err = compile(&record, false, &CompilerConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::UnsafeExpression { .. }));

        let record = PatternRecord::new("kr", "evil_02", Category::Other, r"(x|xy)*z");
        let err = compile(&record, false, &CompilerConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::UnsafeExpression { .. }));
    }

    #[test]
    fn test_empty_match_rejected() {
        for source in [r"\d*", r"\b", r"(?:abc)?"] {
            let record = PatternRecord::new("kr", "empty_01", Category::Other, source);
            let err = compile(&record, false, &CompilerConfig::default()).unwrap_err();
            assert!(
                matches!(err, CompileError::UnsafeExpression { ref reason, .. } if reason.contains("empty")),
                "{} should be rejected",
                source
            );
        }
    }

    #[test]
    fn test_example_mismatch() {
        let record = mobile().with_examples(&["010-1234-5678"], &["011-123-4567"]);
        let err = compile(&record, true, &CompilerConfig::default()).unwrap_err();
        match err {
            CompileError::ExampleMismatch {
                index,
                expected,
                actual,
                ..
            } => {
                assert_eq!(index, 1);
                assert!(!expected);
                assert!(actual);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // Same record passes when the self-check is off
        assert!(compile(&record, false, &CompilerConfig::default()).is_ok());
    }

    #[test]
    fn test_flags_apply() {
        let record = PatternRecord::new("comm", "word_01", Category::Other, r"secret\d")
            .with_flags(&[RegexFlag::IgnoreCase])
            .with_examples(&["SECRET1"], &["secret"]);
        let matcher = compile(&record, true, &CompilerConfig::default()).unwrap();
        assert!(matcher.is_full_match("Secret9"));
    }

    #[test]
    fn test_inline_verbose_flag_with_trailing_comment() {
        let record = PatternRecord::new("kr", "local_01", Category::Phone, "(?x)\\d{3} - \\d{4} # local number")
            .with_examples(&["123-4567"], &["1234567", "123-45678"]);
        let matcher = compile(&record, true, &CompilerConfig::default()).unwrap();
        assert!(matcher.is_full_match("555-0100"));
        assert!(!matcher.is_full_match("call 555-0100"));
    }

    #[test]
    fn test_scoped_verbose_flag_cannot_hide_unsafe_tail() {
        let record = PatternRecord::new("kr", "evil_03", Category::Other, r"(?x:a)#(b+)+c");
        let err = compile(&record, false, &CompilerConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::UnsafeExpression { .. }));
    }

    #[test]
    fn test_scan_spans() {
        let matcher = compile(&mobile(), false, &CompilerConfig::default()).unwrap();
        let spans = matcher
            .scan("a 010-1234-5678 b 01098765432", &ScanBudget::default())
            .unwrap();
        assert_eq!(spans, vec![Span { start: 2, end: 15 }, Span { start: 18, end: 29 }]);
    }

    #[test]
    fn test_scan_budget_exceeded() {
        let matcher = compile(&mobile(), false, &CompilerConfig::default()).unwrap();

        let budget = ScanBudget {
            max_input_bytes: Some(4),
            ..ScanBudget::unlimited()
        };
        let err = matcher.scan("010-1234-5678", &budget).unwrap_err();
        assert_eq!(err.limit, BudgetLimit::InputBytes(4));

        let budget = ScanBudget {
            max_matches_per_pattern: Some(1),
            ..ScanBudget::unlimited()
        };
        let err = matcher
            .scan("010-1234-5678 010-9876-5432", &budget)
            .unwrap_err();
        assert_eq!(err.ns_id, "kr/mobile_01");
        assert_eq!(err.limit, BudgetLimit::Matches(1));
    }

    #[test]
    fn test_scan_deadline_exceeded() {
        let record = PatternRecord::new("comm", "digit_01", Category::Other, r"\d");
        let matcher = compile(&record, false, &CompilerConfig::default()).unwrap();
        let budget = ScanBudget {
            max_scan_time_ms: Some(0),
            ..ScanBudget::unlimited()
        };

        let err = matcher.scan(&"1 ".repeat(1000), &budget).unwrap_err();
        assert_eq!(err.ns_id, "comm/digit_01");
        assert_eq!(err.limit, BudgetLimit::ScanTimeMs(0));
    }
}
