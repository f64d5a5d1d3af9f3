// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Built-in pattern library for the `kr`, `us` and `comm` namespaces
//
// Every record carries match/nomatch examples so the library validates itself
// when loaded with `validate_examples`.

use once_cell::sync::Lazy;

use super::config::{ActionOnMatch, Category, PatternRecord, Policy, RedactionStrategy, Severity};

fn policy(severity: Severity, store_raw: bool, action_on_match: ActionOnMatch) -> Policy {
    Policy {
        store_raw,
        action_on_match,
        severity,
        strategy: None,
    }
}

// Korean patterns
static KR_PATTERNS: Lazy<Vec<PatternRecord>> = Lazy::new(|| {
    vec![
        PatternRecord::new("kr", "mobile_01", Category::Phone, r"01[016-9]-?\d{3,4}-?\d{4}")
            .with_description("Korean mobile phone number")
            .with_policy(policy(Severity::High, false, ActionOnMatch::Redact))
            .with_mask("***-****-****")
            .with_examples(
                &["010-1234-5678", "01012345678", "011-123-4567"],
                &["02-1234-5678", "012-1234-5678"],
            ),
        PatternRecord::new("kr", "phone_01", Category::Phone, r"0(?:2|[3-6][1-5])-?\d{3,4}-?\d{4}")
            .with_description("Korean landline phone number")
            .with_policy(policy(Severity::Medium, false, ActionOnMatch::Redact))
            .with_examples(&["02-1234-5678", "031-123-4567"], &["010-1234-5678"]),
        PatternRecord::new(
            "kr",
            "rrn_01",
            Category::Rrn,
            r"\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])-?[1-4]\d{6}",
        )
        .with_description("Korean resident registration number")
        .with_policy(policy(Severity::Critical, false, ActionOnMatch::Alert))
        .with_mask("******-*******")
        .with_examples(
            &["900101-1234567", "900101-2234567", "8001011234567"],
            &["900101-5234567", "900101-123456"],
        ),
        PatternRecord::new("kr", "passport_01", Category::Passport, r"[MSRODG]\d{8}")
            .with_description("Korean passport number")
            .with_policy(policy(Severity::High, false, ActionOnMatch::Redact))
            .with_examples(&["M12345678"], &["12345678", "A12345678"]),
        PatternRecord::new("kr", "driver_01", Category::Other, r"\d{2}-\d{2}-\d{6}-\d{2}")
            .with_description("Korean driver's license number")
            .with_policy(policy(Severity::High, false, ActionOnMatch::Redact))
            .with_examples(&["11-12-123456-78"], &["11-12-12345-78"]),
        PatternRecord::new("kr", "brn_01", Category::Other, r"\d{3}-\d{2}-\d{5}")
            .with_description("Korean business registration number")
            .with_policy(policy(Severity::Medium, true, ActionOnMatch::Log))
            .with_examples(&["123-45-67890"], &["123-456-7890"]),
        PatternRecord::new("kr", "bank_01", Category::Bank, r"\d{3,6}-\d{2,6}-\d{3,6}")
            .with_description("Korean bank account number")
            .with_policy(policy(Severity::Medium, false, ActionOnMatch::Redact))
            .with_examples(&["110-123-456789", "1002-34-567890"], &["110-1-456789"]),
    ]
});

// US patterns
static US_PATTERNS: Lazy<Vec<PatternRecord>> = Lazy::new(|| {
    vec![
        PatternRecord::new("us", "ssn_01", Category::Ssn, r"\d{3}-?\d{2}-?\d{4}")
            .with_description("US Social Security Number")
            .with_policy(policy(Severity::Critical, false, ActionOnMatch::Alert))
            .with_mask("***-**-****")
            .with_examples(&["123-45-6789", "123456789"], &["12-345-6789", "1234-56-789"]),
        PatternRecord::new(
            "us",
            "itin_01",
            Category::Ssn,
            r"9\d{2}-?(?:7\d|8[0-8]|9[0-24-9])-?\d{4}",
        )
        .with_description("US Individual Taxpayer Identification Number")
        .with_policy(policy(Severity::Critical, false, ActionOnMatch::Alert))
        .with_examples(&["912-78-1234", "912921234"], &["812-78-1234", "912-93-1234"]),
        PatternRecord::new(
            "us",
            "phone_01",
            Category::Phone,
            r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}",
        )
        .with_description("US phone number")
        .with_policy(policy(Severity::Medium, false, ActionOnMatch::Redact))
        .with_examples(
            &["(555) 123-4567", "555-123-4567", "5551234567", "+1-555-123-4567"],
            &["123-4567"],
        ),
        PatternRecord::new("us", "passport_01", Category::Passport, r"[A-Z]\d{8}")
            .with_description("US passport number")
            .with_policy(policy(Severity::High, false, ActionOnMatch::Redact))
            .with_examples(&["C12345678"], &["12345678", "c12345678"]),
        PatternRecord::new("us", "ein_01", Category::Other, r"\d{2}-\d{7}")
            .with_description("US Employer Identification Number")
            .with_policy(policy(Severity::Medium, true, ActionOnMatch::Log))
            .with_examples(&["12-3456789"], &["123-456789"]),
        PatternRecord::new("us", "zip_01", Category::Address, r"\d{5}(?:-\d{4})?")
            .with_description("US ZIP code")
            .with_policy(policy(Severity::Low, true, ActionOnMatch::Log))
            .with_examples(&["12345", "12345-6789"], &["1234", "12345-678"]),
    ]
});

// Region-independent patterns
static COMM_PATTERNS: Lazy<Vec<PatternRecord>> = Lazy::new(|| {
    vec![
        PatternRecord::new(
            "comm",
            "email_01",
            Category::Email,
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        )
        .with_description("Email address")
        .with_policy(policy(Severity::Medium, false, ActionOnMatch::Redact))
        .with_examples(
            &["user@example.com", "john.doe+tag@company.co.uk"],
            &["invalid.email@", "@example.com"],
        ),
        PatternRecord::new(
            "comm",
            "ipv4_01",
            Category::Ip,
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
        )
        .with_description("IPv4 address")
        .with_policy(policy(Severity::Low, true, ActionOnMatch::Log))
        .with_examples(
            &["192.168.1.1", "10.0.0.1", "255.255.255.255"],
            &["256.1.1.1", "192.168.1.1.1"],
        ),
        PatternRecord::new(
            "comm",
            "ipv6_01",
            Category::Ip,
            r"(?:[A-Fa-f0-9]{1,4}:){7}[A-Fa-f0-9]{1,4}",
        )
        .with_description("IPv6 address (full form)")
        .with_policy(policy(Severity::Low, true, ActionOnMatch::Log))
        .with_examples(&["2001:0db8:85a3:0000:0000:8a2e:0370:7334"], &["2001:db8::1"]),
        PatternRecord::new("comm", "credit_card_01", Category::CreditCard, r"(?:\d{4}[-\s]?){3}\d{4}")
            .with_description("Payment card number")
            .with_policy(Policy {
                store_raw: false,
                action_on_match: ActionOnMatch::Alert,
                severity: Severity::Critical,
                strategy: Some(RedactionStrategy::Mask),
            })
            .with_mask("****-****-****-****")
            .with_examples(
                &["4111-1111-1111-1111", "4111111111111111", "4111 1111 1111 1111"],
                &["4111-1111-1111"],
            ),
        PatternRecord::new(
            "comm",
            "mac_01",
            Category::Other,
            r"(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}",
        )
        .with_description("MAC address")
        .with_policy(policy(Severity::Low, true, ActionOnMatch::Log))
        .with_examples(&["00:1A:2B:3C:4D:5E", "00-1a-2b-3c-4d-5e"], &["00:1A:2B:3C:4D"]),
    ]
});

/// Built-in records in declaration order: `kr`, `us`, then `comm`
pub fn default_records() -> Vec<PatternRecord> {
    KR_PATTERNS
        .iter()
        .chain(US_PATTERNS.iter())
        .chain(COMM_PATTERNS.iter())
        .cloned()
        .collect()
}

/// Built-in records of a single namespace (empty if unknown)
pub fn namespace_records(namespace: &str) -> Vec<PatternRecord> {
    match namespace {
        "kr" => KR_PATTERNS.clone(),
        "us" => US_PATTERNS.clone(),
        "comm" => COMM_PATTERNS.clone(),
        _ => Vec::new(),
    }
}
