//! Structural checks for server-issued credentials.
//!
//! None of these values are documented; each check encodes what the portal
//! has been observed to issue. A failure means the remote system changed or
//! the session went out of sync, so callers treat it as fatal for the run.

use regex::Regex;
use std::sync::OnceLock;

/// `"CfDJ8"` is the base64 form of the `09 F0 C9 F0` header that prefixes an
/// ASP.NET Core data-protection payload.
pub const DATA_PROTECTION_MAGIC: &str = "CfDJ8";

/// `"=="` url-encoded twice.
pub const DOUBLE_ENCODED_PADDING: &str = "%253D%253D";

/// Why a credential failed its structural check.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("value is empty")]
    Empty,

    #[error("value does not match <routing>_<theme>")]
    SessionContextPattern,

    #[error("routing number does not match the institution")]
    RoutingNumberMismatch,

    #[error("theme number does not match the configured theme")]
    ThemeNumberMismatch,

    #[error("value is not valid percent-encoded UTF-8")]
    Undecodable,

    #[error("missing data-protection magic prefix")]
    MissingDataProtectionMagic,

    #[error("missing doubly-encoded padding suffix")]
    MissingPaddingMarker,

    #[error("value is not lowercase hex")]
    NotLowercaseHex,
}

fn session_context_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{9}_[0-9]+$").expect("session context regex is valid"))
}

fn lowercase_hex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]+$").expect("hex regex is valid"))
}

/// Check a `SessionContext` value such as `241071212_1`.
pub fn validate_session_context(
    value: &str,
    routing_number: &str,
    theme_number: u32,
) -> Result<(), CredentialError> {
    if value.is_empty() {
        return Err(CredentialError::Empty);
    }
    if !session_context_re().is_match(value) {
        return Err(CredentialError::SessionContextPattern);
    }
    let (routing, theme) = value
        .split_once('_')
        .ok_or(CredentialError::SessionContextPattern)?;
    if routing != routing_number {
        return Err(CredentialError::RoutingNumberMismatch);
    }
    if theme != theme_number.to_string() {
        return Err(CredentialError::ThemeNumberMismatch);
    }
    Ok(())
}

/// Check a `PBISession` value: after one url-decode it must be a
/// data-protection payload.
pub fn validate_session_binding(value: &str) -> Result<(), CredentialError> {
    let decoded = urlencoding::decode(value).map_err(|_| CredentialError::Undecodable)?;
    if !decoded.starts_with(DATA_PROTECTION_MAGIC) {
        return Err(CredentialError::MissingDataProtectionMagic);
    }
    Ok(())
}

/// Check a `PMData` value. The payload is base64 with `==` padding, url-encoded
/// twice, so the raw cookie ends in `%253D%253D`.
pub fn validate_protection_material(value: &str) -> Result<(), CredentialError> {
    if !value.ends_with(DOUBLE_ENCODED_PADDING) {
        return Err(CredentialError::MissingPaddingMarker);
    }
    Ok(())
}

/// Check the load balancer `TS01d4e29a` value.
pub fn validate_timestamp_signature(value: &str) -> Result<(), CredentialError> {
    if value.is_empty() {
        return Err(CredentialError::Empty);
    }
    if !lowercase_hex_re().is_match(value) {
        return Err(CredentialError::NotLowercaseHex);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_context_accepts_matching_routing_and_theme() {
        assert_eq!(validate_session_context("241071212_1", "241071212", 1), Ok(()));
        assert_eq!(
            validate_session_context("242170549_12", "242170549", 12),
            Ok(())
        );
    }

    #[test]
    fn session_context_rejects_malformed_values() {
        assert_eq!(
            validate_session_context("", "241071212", 1),
            Err(CredentialError::Empty)
        );
        for bad in [
            "24107121_1",
            "2410712120_1",
            "241071212_",
            "241071212-1",
            "241071212_1 ",
            "a41071212_1",
            "241071212_1_2",
            // Non-ASCII digits must not satisfy the pattern.
            "٢٤١٠٧١٢١٢_1",
        ] {
            assert_eq!(
                validate_session_context(bad, "241071212", 1),
                Err(CredentialError::SessionContextPattern),
                "{bad}"
            );
        }
    }

    #[test]
    fn session_context_rejects_wrong_routing_or_theme() {
        assert_eq!(
            validate_session_context("242170549_1", "241071212", 1),
            Err(CredentialError::RoutingNumberMismatch)
        );
        assert_eq!(
            validate_session_context("241071212_2", "241071212", 1),
            Err(CredentialError::ThemeNumberMismatch)
        );
        assert_eq!(
            validate_session_context("241071212_01", "241071212", 1),
            Err(CredentialError::ThemeNumberMismatch)
        );
    }

    #[test]
    fn session_binding_checks_magic_after_one_decode() {
        assert_eq!(validate_session_binding("CfDJ8MUmt6vrn61EpJ"), Ok(()));
        assert_eq!(validate_session_binding("CfDJ8MUmt6%2Fvrn61"), Ok(()));
        assert_eq!(validate_session_binding("%43fDJ8MUmt6"), Ok(()));
        assert_eq!(
            validate_session_binding("cfdj8MUmt6"),
            Err(CredentialError::MissingDataProtectionMagic)
        );
        assert_eq!(
            validate_session_binding("%2543fDJ8"),
            Err(CredentialError::MissingDataProtectionMagic)
        );
        assert_eq!(
            validate_session_binding("%FF%FE"),
            Err(CredentialError::Undecodable)
        );
    }

    #[test]
    fn protection_material_requires_padding_marker() {
        for prefix in ["", "PMV6NsEwZj3roiOxdeU", "%3D%3D", "abc%253D"] {
            assert_eq!(
                validate_protection_material(prefix),
                Err(CredentialError::MissingPaddingMarker),
                "{prefix}"
            );
            let with_marker = format!("{prefix}{DOUBLE_ENCODED_PADDING}");
            assert_eq!(validate_protection_material(&with_marker), Ok(()));
        }
    }

    #[test]
    fn timestamp_signature_is_lowercase_hex() {
        assert_eq!(validate_timestamp_signature("01bc9608897ea46b"), Ok(()));
        assert_eq!(
            validate_timestamp_signature(""),
            Err(CredentialError::Empty)
        );
        for bad in ["01BC96", "01bc96g", " 01bc", "01bc\n"] {
            assert_eq!(
                validate_timestamp_signature(bad),
                Err(CredentialError::NotLowercaseHex),
                "{bad:?}"
            );
        }
    }
}
