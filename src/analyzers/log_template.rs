use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::LogExtraction;

/// SLF4J `{}` markers and printf-style conversions (`%s`, `%2$d`, ...).
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\}|%\d*\$?[sdioxXeEfgGaAcbBhHntp]").expect("placeholder regex")
});

/// `logger.info("...")`, `LOG.warn('...')` and friends. Group 1/2: the
/// double- or single-quoted literal.
static LOG_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?i:logger|log)\.(?:info|debug|warn|error|trace|fatal)\s*\(\s*(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("log call regex")
});

/// Builds an extraction from a raw log line. Only empty or whitespace input
/// fails; a line made purely of placeholders yields an empty template.
pub fn extract_from_message(raw: &str) -> LogExtraction {
    if raw.trim().is_empty() {
        return LogExtraction::failed();
    }
    LogExtraction::extracted(generalize(raw))
}

/// Finds `handler`'s body in a controller, takes the first log call in it
/// and generalizes its message.
pub fn extract_from_handler_body(source: &str, handler: &str) -> LogExtraction {
    let Some(body) = method_body(source, handler) else {
        tracing::debug!(handler, "method body could not be bounded");
        return LogExtraction::failed();
    };
    match first_log_message(body) {
        Some(message) => LogExtraction::extracted(generalize(message)),
        None => {
            tracing::debug!(handler, "no log statement in method body");
            LogExtraction::failed()
        }
    }
}

/// Splits a message on its placeholders, trimming each constant segment and
/// dropping empty ones:
///   "Downloading Document {} for case: {}" → ["Downloading Document", "for case:"]
///   "{} {} {}"                             → []
pub fn generalize(message: &str) -> Vec<String> {
    PLACEHOLDER
        .split(message)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_log_message(body: &str) -> Option<&str> {
    LOG_CALL
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
        .find(|literal| !literal.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyScan {
    Outside,
    Inside { depth: usize },
}

/// Text between the braces of `name`'s body. Only whitespace or a `throws`
/// clause may sit between the parameter list and `{`, so calls and mentions
/// in comments are passed over. Braces inside comments or string literals
/// are counted like any other.
fn method_body<'a>(source: &'a str, name: &str) -> Option<&'a str> {
    let signature = Regex::new(&format!(
        r"\b{}\s*\((?:[^()]|\([^()]*\))*\)\s*(?:throws\s+[\w.,\s]+?)?\{{",
        regex::escape(name)
    ))
    .ok()?;
    let body = signature
        .find_iter(source)
        .find_map(|m| bounded_body(source, m.end() - 1));
    body
}

/// Body of the block opening at byte `open`, or `None` if it never closes.
fn bounded_body(source: &str, open: usize) -> Option<&str> {
    let mut state = BodyScan::Outside;
    for (offset, ch) in source[open..].char_indices() {
        state = match (state, ch) {
            (BodyScan::Outside, '{') => BodyScan::Inside { depth: 1 },
            (BodyScan::Inside { depth }, '{') => BodyScan::Inside { depth: depth + 1 },
            (BodyScan::Inside { depth: 1 }, '}') => {
                return Some(&source[open + 1..open + offset]);
            }
            (BodyScan::Inside { depth }, '}') => BodyScan::Inside { depth: depth - 1 },
            (s, _) => s,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn controller(name: &str) -> String {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/controllers")
            .join(name);
        std::fs::read_to_string(path).expect("fixture should be readable")
    }

    // ── extract_from_message ──────────────────────────────────────────────────

    #[test]
    fn test_empty_and_whitespace_fail() {
        for raw in ["", "   ", "\t\n"] {
            let result = extract_from_message(raw);
            assert!(!result.extracted, "{raw:?} should not extract");
            assert!(result.template_parts.is_none(), "{raw:?} should have no template");
        }
    }

    #[test]
    fn test_single_trailing_placeholder() {
        let result = extract_from_message("Updating payment for id: {}");
        assert!(result.extracted);
        assert_eq!(result.template_parts.unwrap(), vec!["Updating payment for id:"]);
    }

    #[test]
    fn test_quotes_around_placeholders_are_kept() {
        let result = extract_from_message("Confirming payment. Transaction id: '{}'. Provider: '{}'");
        assert_eq!(
            result.template_parts.unwrap(),
            vec!["Confirming payment. Transaction id: '", "'. Provider: '", "'"]
        );
    }

    #[test]
    fn test_only_placeholders_is_extracted_but_empty() {
        for raw in ["{}", "{} {} {}", "%s%d", " {}%1$s "] {
            let result = extract_from_message(raw);
            assert!(result.extracted, "{raw:?} is a valid message");
            assert_eq!(result.template_parts, Some(vec![]), "{raw:?}");
        }
    }

    // ── generalize ────────────────────────────────────────────────────────────

    #[test]
    fn test_generalize_cases() {
        let cases: &[(&str, &[&str])] = &[
            ("Hello world", &["Hello world"]),
            ("Hello {}", &["Hello"]),
            ("{} is the value", &["is the value"]),
            ("Hello {} world {}", &["Hello", "world"]),
            ("Start {} {} end", &["Start", "end"]),
            ("User %s logged in at %d", &["User", "logged in at"]),
            ("Value %1$s and %2$d items", &["Value", "and", "items"]),
            ("User {} logged in at %s with code %d", &["User", "logged in at", "with code"]),
            ("  Start  {}  middle  {}  end  ", &["Start", "middle", "end"]),
            ("Downloading Acceptance Document {} for case: {}", &["Downloading Acceptance Document", "for case:"]),
        ];
        for (input, expected) in cases {
            assert_eq!(generalize(input), *expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_generalize_is_idempotent_on_constant_text() {
        let once = generalize("Getting payment status");
        assert_eq!(once, vec!["Getting payment status"]);
        assert_eq!(generalize(&once[0]), once);
    }

    #[test]
    fn test_percent_without_conversion_is_literal() {
        assert_eq!(generalize("100% done"), vec!["100% done"]);
        assert_eq!(generalize("rate 50%% of {}"), vec!["rate 50%% of"]);
    }

    // ── extract_from_handler_body ─────────────────────────────────────────────

    #[test]
    fn test_handler_body_with_single_log_call() {
        let src = controller("PaymentController.java");
        let result = extract_from_handler_body(&src, "confirmPayment");
        assert!(result.extracted);
        assert_eq!(
            result.template_parts.unwrap(),
            vec!["Confirming payment. Transaction id: '", "'. Provider: '", "'"]
        );
    }

    #[test]
    fn test_handler_with_throws_clause() {
        let src = controller("PaymentController.java");
        let result = extract_from_handler_body(&src, "updatePayment");
        assert_eq!(result.template_parts.unwrap(), vec!["Updating payment for id:"]);
    }

    #[test]
    fn test_handler_with_printf_message_and_single_quotes() {
        let src = controller("PaymentController.java");
        assert_eq!(
            extract_from_handler_body(&src, "listPayments").template_parts.unwrap(),
            vec!["Listing", "payments for"]
        );
        assert_eq!(
            extract_from_handler_body(&src, "refundPayment").template_parts.unwrap(),
            vec!["Refund requested for payment"]
        );
    }

    #[test]
    fn test_handler_without_log_fails() {
        let src = controller("PaymentController.java");
        let result = extract_from_handler_body(&src, "cancelPayment");
        assert!(!result.extracted);
        assert!(result.template_parts.is_none());
    }

    #[test]
    fn test_unknown_handler_fails() {
        let src = controller("PaymentController.java");
        assert!(!extract_from_handler_body(&src, "noSuchMethod").extracted);
    }

    #[test]
    fn test_handler_logging_only_placeholders() {
        let src = controller("SimpleController.java");
        let result = extract_from_handler_body(&src, "healthCheck");
        assert!(result.extracted);
        assert_eq!(result.template_parts, Some(vec![]));
    }

    #[test]
    fn test_unbalanced_body_fails() {
        let src = "void broken() { if (x) { LOG.info(\"never closed\");";
        assert!(!extract_from_handler_body(src, "broken").extracted);
    }

    #[test]
    fn test_nested_blocks_are_bounded() {
        let src = r#"
            void outer() {
                if (a) { if (b) { x(); } }
            }
            void later() { log.info("belongs to later"); }
        "#;
        assert!(!extract_from_handler_body(src, "outer").extracted, "log in a later method must not leak in");
        assert_eq!(body_of(src, "outer").matches('{').count(), 2);
    }

    #[test]
    fn test_empty_literal_is_skipped() {
        let src = r#"void m() { log.info(""); LOGGER.warn("Second {}", 1); }"#;
        assert_eq!(extract_from_handler_body(src, "m").template_parts.unwrap(), vec!["Second"]);
    }

    #[test]
    fn test_logger_identifier_case_insensitive_and_word_bounded() {
        let src = r#"void m() { dialog.info("not a logger"); Logger.error("Failed for {}", id); }"#;
        assert_eq!(extract_from_handler_body(src, "m").template_parts.unwrap(), vec!["Failed for"]);
    }

    #[test]
    fn test_first_log_call_in_body_order_wins() {
        let src = r#"void m() { log.info('First {}', a); LOG.info("Second {}", b); }"#;
        assert_eq!(extract_from_handler_body(src, "m").template_parts.unwrap(), vec!["First"]);

        let src = r#"void m() { LOGGER.warn("Retrying {} for {}", n, id); LOGGER.info("Done with {}", id); }"#;
        assert_eq!(extract_from_handler_body(src, "m").template_parts.unwrap(), vec!["Retrying", "for"]);
    }

    #[test]
    fn test_mention_in_comment_does_not_bind_to_next_method() {
        let src = r#"
            // status is refreshed by updatePayment(request) after a change
            @GetMapping("/status")
            ResponseEntity<PaymentStatus> getPaymentStatus() {
                LOGGER.debug("Getting payment status");
                return ResponseEntity.ok(paymentService.status());
            }

            @PutMapping("/update")
            ResponseEntity<Void> updatePayment(@RequestBody PaymentUpdateRequest request) {
                LOGGER.info("Updating payment for id: {}", request.getId());
                return ResponseEntity.ok().build();
            }
        "#;
        assert_eq!(
            extract_from_handler_body(src, "updatePayment").template_parts.unwrap(),
            vec!["Updating payment for id:"]
        );
    }

    #[test]
    fn test_call_sites_are_not_declarations() {
        let src = r#"
            void caller() { if (check(x)) { audit(); } check(y); }
            boolean check(@Named("v") String v) throws IOException, java.sql.SQLException {
                log.info("Checking {}", v);
                return true;
            }
        "#;
        assert_eq!(extract_from_handler_body(src, "check").template_parts.unwrap(), vec!["Checking"]);
    }

    fn body_of<'a>(src: &'a str, name: &str) -> &'a str {
        method_body(src, name).expect("body should be bounded")
    }
}
