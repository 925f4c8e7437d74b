//! Token extraction from portal markup.
//!
//! The portal's pages are treated as a log of marker lines rather than a
//! document tree: each token we need sits on a line of inline script such as
//! `PBI.pageNonce = "...";`. Extraction finds the first line carrying the
//! marker and pulls exactly one charset-constrained quoted string from it.

use crate::security::SecurityQuestion;
use regex::Regex;
use std::sync::OnceLock;

/// Largest body, in characters, we are willing to scan.
pub const MAX_BODY_CHARS: usize = 1 << 20;

const DOCTYPE_MARKER: &str = "<!DOCTYPE html>";

/// A token embedded in markup after a fixed marker.
#[derive(Debug, Clone, Copy)]
pub struct MarkedToken {
    /// Human-readable name used in errors.
    pub label: &'static str,
    /// Substring identifying the line that carries the token.
    pub marker: &'static str,
    /// Quoted token on the marker line, compiled once.
    pub pattern: fn() -> &'static Regex,
}

fn anti_forgery_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[A-Za-z0-9_-]+""#).expect("anti-forgery regex is valid"))
}

fn page_nonce_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[A-Za-z0-9/+=]+""#).expect("page nonce regex is valid"))
}

/// `PBI.antiForgeryToken = "..."` on the challenge page.
pub const ANTI_FORGERY_TOKEN: MarkedToken = MarkedToken {
    label: "anti-forgery token",
    marker: "PBI.antiForgeryToken = \"",
    pattern: anti_forgery_pattern,
};

/// `PBI.pageNonce = "..."` on the home page.
pub const PAGE_NONCE: MarkedToken = MarkedToken {
    label: "page nonce",
    marker: "PBI.pageNonce = \"",
    pattern: page_nonce_pattern,
};

/// Why extraction failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("body is {chars} characters, over the {max} character limit")]
    BodyTooLarge { chars: usize, max: usize },

    #[error("no line carries the {label} marker")]
    MarkerNotFound { label: &'static str },

    #[error("expected exactly one {label} on the marker line, found {found}")]
    MatchCount { label: &'static str, found: usize },

    #[error("no known security question phrase found")]
    NoSecurityQuestion,

    #[error("{found} security question phrases found, expected one")]
    AmbiguousSecurityQuestion { found: usize },
}

/// Cheap content sniff: does the body open with an HTML5 doctype?
pub fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with(DOCTYPE_MARKER)
}

fn check_length(body: &str) -> Result<(), ExtractError> {
    // Byte length bounds char count from above, so only count when it could matter.
    if body.len() > MAX_BODY_CHARS {
        let chars = body.chars().count();
        if chars > MAX_BODY_CHARS {
            return Err(ExtractError::BodyTooLarge {
                chars,
                max: MAX_BODY_CHARS,
            });
        }
    }
    Ok(())
}

/// Pull the single quoted token off the first line carrying `token.marker`.
pub fn extract_marked_token(body: &str, token: &MarkedToken) -> Result<String, ExtractError> {
    check_length(body)?;

    let line = body
        .split('\n')
        .find(|line| line.contains(token.marker))
        .ok_or(ExtractError::MarkerNotFound { label: token.label })?;

    let mut matches = (token.pattern)().find_iter(line);
    match (matches.next(), matches.next()) {
        (Some(found), None) => Ok(found.as_str().trim_matches('"').to_string()),
        (None, _) => Err(ExtractError::MatchCount {
            label: token.label,
            found: 0,
        }),
        (Some(_), Some(_)) => Err(ExtractError::MatchCount {
            label: token.label,
            found: 2 + matches.count(),
        }),
    }
}

/// Identify which challenge question the page is asking.
pub fn extract_security_question(body: &str) -> Result<SecurityQuestion, ExtractError> {
    check_length(body)?;

    let present: Vec<SecurityQuestion> = SecurityQuestion::ALL
        .into_iter()
        .filter(|q| body.contains(q.phrase()))
        .collect();

    match present.as_slice() {
        [question] => Ok(*question),
        [] => Err(ExtractError::NoSecurityQuestion),
        many => Err(ExtractError::AmbiguousSecurityQuestion { found: many.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE_PAGE: &str = "<!DOCTYPE html>\n<html>\n<script>\n\
        PBI.antiForgeryToken = \"CfDJ8MUmt6vrn61EpJ_-Ql3W\";\n\
        </script>\n<label>What was the model of your first car?</label>\n</html>\n";

    const HOME_PAGE: &str = "\n\n   <!DOCTYPE html>\n<script>\n\
        PBI.pageNonce = \"ztYuL3h+9Mwh0imVnh/E=\";\n</script>\n";

    #[test]
    fn html_sniff_ignores_leading_whitespace() {
        assert!(looks_like_html(HOME_PAGE));
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("<!doctype html>"));
        assert!(!looks_like_html("{\"success\":true}"));
        assert!(!looks_like_html(""));
    }

    #[test]
    fn extracts_anti_forgery_token() {
        let token = extract_marked_token(CHALLENGE_PAGE, &ANTI_FORGERY_TOKEN).unwrap();
        assert_eq!(token, "CfDJ8MUmt6vrn61EpJ_-Ql3W");
    }

    #[test]
    fn extracts_page_nonce() {
        let token = extract_marked_token(HOME_PAGE, &PAGE_NONCE).unwrap();
        assert_eq!(token, "ztYuL3h+9Mwh0imVnh/E=");
    }

    #[test]
    fn extraction_is_repeatable() {
        let first = extract_marked_token(HOME_PAGE, &PAGE_NONCE).unwrap();
        for _ in 0..3 {
            assert_eq!(extract_marked_token(HOME_PAGE, &PAGE_NONCE).unwrap(), first);
        }
    }

    #[test]
    fn missing_marker_line_is_an_error() {
        assert_eq!(
            extract_marked_token(CHALLENGE_PAGE, &PAGE_NONCE),
            Err(ExtractError::MarkerNotFound {
                label: "page nonce"
            })
        );
    }

    #[test]
    fn only_first_marker_line_is_considered() {
        let body = "PBI.pageNonce = \"\";\nPBI.pageNonce = \"abc\";\n";
        assert_eq!(
            extract_marked_token(body, &PAGE_NONCE),
            Err(ExtractError::MatchCount {
                label: "page nonce",
                found: 0
            })
        );
    }

    #[test]
    fn multiple_quoted_values_on_marker_line_fail() {
        let body = "PBI.antiForgeryToken = \"abc\"; var x = \"def\"; var y = \"ghi\";";
        assert_eq!(
            extract_marked_token(body, &ANTI_FORGERY_TOKEN),
            Err(ExtractError::MatchCount {
                label: "anti-forgery token",
                found: 3
            })
        );
    }

    #[test]
    fn charset_excludes_foreign_characters() {
        // '+' is outside the anti-forgery charset, so the quoted value does not match.
        let body = "PBI.antiForgeryToken = \"ab+cd\";";
        assert!(matches!(
            extract_marked_token(body, &ANTI_FORGERY_TOKEN),
            Err(ExtractError::MatchCount { found: 0, .. })
        ));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let mut body = String::from("PBI.pageNonce = \"abc\";\n");
        body.push_str(&"x".repeat(MAX_BODY_CHARS));
        assert!(matches!(
            extract_marked_token(&body, &PAGE_NONCE),
            Err(ExtractError::BodyTooLarge { .. })
        ));
        assert!(matches!(
            extract_security_question(&body),
            Err(ExtractError::BodyTooLarge { .. })
        ));
    }

    #[test]
    fn body_at_limit_in_chars_is_accepted() {
        // Multi-byte characters push the byte length over the limit but not the char count.
        let mut body = String::from("PBI.pageNonce = \"abc\";\n");
        let filler = MAX_BODY_CHARS - body.chars().count();
        body.push_str(&"é".repeat(filler));
        assert_eq!(extract_marked_token(&body, &PAGE_NONCE).unwrap(), "abc");
    }

    #[test]
    fn recognises_each_security_question() {
        assert_eq!(
            extract_security_question(CHALLENGE_PAGE),
            Ok(SecurityQuestion::Car)
        );
        assert_eq!(
            extract_security_question("<p>What is your favorite sports team?</p>"),
            Ok(SecurityQuestion::Sport)
        );
        assert_eq!(
            extract_security_question("<p>What is the name of your first employer?</p>"),
            Ok(SecurityQuestion::Employer)
        );
    }

    #[test]
    fn unknown_or_ambiguous_question_fails() {
        assert_eq!(
            extract_security_question("<p>What is your mother's maiden name?</p>"),
            Err(ExtractError::NoSecurityQuestion)
        );
        let both = "What is your favorite sports team? What was the model of your first car?";
        assert_eq!(
            extract_security_question(both),
            Err(ExtractError::AmbiguousSecurityQuestion { found: 2 })
        );
    }

    #[test]
    fn token_patterns_are_compiled_once() {
        assert!(std::ptr::eq((PAGE_NONCE.pattern)(), (PAGE_NONCE.pattern)()));
        assert!(std::ptr::eq(
            (ANTI_FORGERY_TOKEN.pattern)(),
            (ANTI_FORGERY_TOKEN.pattern)()
        ));
        assert!(!std::ptr::eq((PAGE_NONCE.pattern)(), (ANTI_FORGERY_TOKEN.pattern)()));
    }
}
