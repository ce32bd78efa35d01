// twin-fabric-connectors/src/redaction.rs
// ============================================================================
// Module: Receipt Redaction
// Description: Scrubs emails, phone numbers, and key-shaped tokens.
// Purpose: Keep PII and credentials out of the receipts log.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! Redaction runs over every string in a request or response payload before
//! a receipt is written. Three patterns are scrubbed: email addresses,
//! North-American phone numbers, and API-key-shaped tokens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Email addresses.
fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used, reason = "Pattern is a compile-time constant.")]
        Regex::new(r"(?i)\b[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}\b").unwrap()
    })
}

/// North-American phone numbers.
fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used, reason = "Pattern is a compile-time constant.")]
        Regex::new(r"\b(?:\+?1[-.\s]?)?(?:\(?\d{3}\)?[-.\s]?)\d{3}[-.\s]?\d{4}\b").unwrap()
    })
}

/// API-key-shaped tokens.
fn key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used, reason = "Pattern is a compile-time constant.")]
        Regex::new(r"(?i)\b(?:sk|pk|api|token)[_\-]?[A-Za-z0-9]{8,}\b").unwrap()
    })
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Scrubs one string.
#[must_use]
pub fn redact_text(value: &str) -> String {
    let redacted = email_re().replace_all(value, "[REDACTED_EMAIL]");
    let redacted = phone_re().replace_all(&redacted, "[REDACTED_PHONE]");
    key_re().replace_all(&redacted, "[REDACTED_KEY]").into_owned()
}

/// Recursively scrubs every string in a JSON value.
#[must_use]
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), redact_value(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn emails_phones_and_keys_are_scrubbed() {
        let text = "Reach sam@macrocompute.example or (415) 555-0143, token sk_live12345678.";
        let clean = redact_text(text);
        assert!(clean.contains("[REDACTED_EMAIL]"));
        assert!(clean.contains("[REDACTED_PHONE]"));
        assert!(clean.contains("[REDACTED_KEY]"));
        assert!(!clean.contains("macrocompute.example"));
    }

    #[test]
    fn nested_payloads_are_scrubbed_in_place() {
        let payload = json!({
            "to": "sales@macrocompute.example",
            "lines": [{"note": "call 212-555-0100"}],
            "amount": 3199,
        });
        let clean = redact_value(&payload);
        assert_eq!(clean["to"], "[REDACTED_EMAIL]");
        assert_eq!(clean["lines"][0]["note"], "call [REDACTED_PHONE]");
        assert_eq!(clean["amount"], 3199);
    }

    #[test]
    fn plain_text_is_left_alone() {
        assert_eq!(redact_text("approve budget $3200"), "approve budget $3200");
    }
}
