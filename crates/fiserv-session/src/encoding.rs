//! Browser-exact URL and form encoders.
//!
//! Generic encoders differ from a browser in which punctuation they leave
//! bare, and the portal sees those bytes. These two match what the page's
//! JavaScript would send.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes `encodeURIComponent` escapes.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Bytes `qs` escapes under RFC 1738. Space is handled separately.
const FORM_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'(')
    .remove(b')');

/// `encodeURIComponent`: leaves `A-Z a-z 0-9 - _ . ! ~ * ' ( )` unescaped.
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// One form value, `qs` RFC-1738 style: space becomes `+`,
/// `A-Z a-z 0-9 - _ . ~ ( )` stay bare.
pub fn encode_form_component(input: &str) -> String {
    input
        .split(' ')
        .map(|part| utf8_percent_encode(part, FORM_COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Encode ordered `(key, value)` pairs as an `application/x-www-form-urlencoded` body.
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> String {
    fields
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                encode_form_component(k.as_ref()),
                encode_form_component(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `Date.prototype.toUTCString()` format, e.g. `Tue, 03 Jan 2023 18:04:05 GMT`.
pub fn utc_string(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Heuristic for a token that was already percent-encoded once: it contains
/// an encoded `=` (`%3D`) or an encoded `%` (`%25`).
pub fn looks_url_encoded(token: &str) -> bool {
    token.contains("%3D") || token.contains("%25")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn uri_component_matches_browser() {
        assert_eq!(encode_uri_component("ab+/=cd"), "ab%2B%2F%3Dcd");
        assert_eq!(encode_uri_component("a b!*'()~"), "a%20b!*'()~");
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn form_component_uses_plus_for_space() {
        assert_eq!(encode_form_component("Tue, 03 Jan 2023"), "Tue%2C+03+Jan+2023");
        assert_eq!(encode_form_component("p@ss!(1)*"), "p%40ss%21(1)%2A");
        assert_eq!(encode_form_component(" a+b "), "+a%2Bb+");
        assert_eq!(encode_form_component("100%"), "100%25");
    }

    #[test]
    fn form_body_keeps_field_order() {
        let body = encode_form(&[("username", "jane doe"), ("maskLoginInputs", "false")]);
        assert_eq!(body, "username=jane+doe&maskLoginInputs=false");
        let body = encode_form(&[("__RequestVerificationToken", "CfDJ8_-x")]);
        assert_eq!(body, "__RequestVerificationToken=CfDJ8_-x");
    }

    #[test]
    fn utc_string_is_rfc1123() {
        let at = Utc.with_ymd_and_hms(2023, 1, 3, 18, 4, 5).unwrap();
        assert_eq!(utc_string(at), "Tue, 03 Jan 2023 18:04:05 GMT");
    }

    #[test]
    fn detects_already_encoded_tokens() {
        assert!(looks_url_encoded("abc%3D"));
        assert!(looks_url_encoded("abc%253D"));
        assert!(!looks_url_encoded("abc="));
        assert!(!looks_url_encoded("abc%2F"));
    }
}
