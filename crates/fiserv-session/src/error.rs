//! Error taxonomy for a session run.
//!
//! Every variant is fatal for the run it occurs in; nothing is retried
//! inside a step. Messages name the step and the failed check, never the
//! secret value that failed it.

use crate::extractor::ExtractError;
use crate::security::SecurityAnswerKind;
use crate::types::{CredentialKind, Step};
use crate::validators::CredentialError;

/// Configuration problems, detected before or (for answers) during a run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse institution, url: {0}")]
    UnknownInstitution(String),

    #[error("failed to parse username, no username set")]
    MissingUsername,

    #[error("failed to parse password, no password set")]
    MissingPassword,

    #[error("no answer registered, answer type: {0}")]
    MissingAnswer(SecurityAnswerKind),
}

/// Why a redirect URL could not yield a token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    #[error("redirect url does not parse: {0}")]
    Unparseable(String),

    #[error("redirect url has unexpected host {0:?}")]
    UnexpectedHost(Option<String>),

    #[error("redirect url has unexpected scheme {0:?}")]
    UnexpectedScheme(String),

    #[error("redirect url embeds a password")]
    EmbeddedPassword,

    #[error("redirect url has no Token parameter")]
    MissingToken,

    #[error("token is unexpectedly url encoded")]
    AlreadyEncoded,
}

/// The specific structural check a response failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriftCheck {
    #[error("expected {expected} status, got {actual}")]
    UnexpectedStatus { expected: u16, actual: u16 },

    #[error("expected content-type {expected:?}, got {actual:?}")]
    UnexpectedContentType {
        expected: &'static str,
        actual: Option<String>,
    },

    #[error("response body is not html")]
    NotHtml,

    #[error("location header missing or not a string")]
    MissingLocation,

    #[error("failed to get cookie {0}, no cookie found with that key")]
    MissingCredential(CredentialKind),

    #[error("{kind} cookie failed validation: {source}")]
    InvalidCredential {
        kind: CredentialKind,
        #[source]
        source: CredentialError,
    },

    #[error(transparent)]
    Redirect(#[from] RedirectError),

    #[error("challenge response field {field} is not a {expected}")]
    MalformedChallengeResponse {
        field: &'static str,
        expected: &'static str,
    },

    #[error("challenge answer was rejected (success is not true)")]
    ChallengeRejected,

    #[error("pagination exceeded {limit} pages for account {account_id}")]
    PaginationLimitExceeded { account_id: String, limit: usize },
}

/// Transport-level failure; the step never got a complete response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request could not be built: {0}")]
    Request(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Error categories callers log and alert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProtocolDrift,
    SchemaValidation,
    Transport,
    Configuration,
    Export,
}

/// Any failure that ends a session run.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("protocol drift at {step}: {check}")]
    ProtocolDrift { step: Step, check: DriftCheck },

    #[error("token extraction failed at {step}: {source}")]
    Extraction {
        step: Step,
        #[source]
        source: ExtractError,
    },

    #[error("schema mismatch at {step}: {detail}")]
    Schema { step: Step, detail: String },

    #[error("transport failure at {step}: {source}")]
    Transport {
        step: Step,
        #[source]
        source: TransportError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("export failed: {0}")]
    Export(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SessionError {
    pub fn drift(step: Step, check: impl Into<DriftCheck>) -> Self {
        Self::ProtocolDrift {
            step,
            check: check.into(),
        }
    }

    /// The step the error occurred in, if it is step-scoped.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::ProtocolDrift { step, .. }
            | Self::Extraction { step, .. }
            | Self::Schema { step, .. }
            | Self::Transport { step, .. } => Some(*step),
            Self::Config(_) | Self::Export(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProtocolDrift { .. } | Self::Extraction { .. } => ErrorKind::ProtocolDrift,
            Self::Schema { .. } => ErrorKind::SchemaValidation,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Export(_) => ErrorKind::Export,
        }
    }
}

/// Convenience result type.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_message_names_step_and_check() {
        let err = SessionError::drift(
            Step::StartLogin,
            DriftCheck::UnexpectedStatus {
                expected: 302,
                actual: 200,
            },
        );
        assert_eq!(
            err.to_string(),
            "protocol drift at step 1 (StartLogin): expected 302 status, got 200"
        );
        assert_eq!(err.kind(), ErrorKind::ProtocolDrift);
        assert_eq!(err.step(), Some(Step::StartLogin));
    }

    #[test]
    fn redirect_errors_convert_into_drift() {
        let err = SessionError::drift(Step::SendSecurityAnswer, RedirectError::EmbeddedPassword);
        assert!(matches!(
            err,
            SessionError::ProtocolDrift {
                check: DriftCheck::Redirect(RedirectError::EmbeddedPassword),
                ..
            }
        ));
    }

    #[test]
    fn extraction_counts_as_drift_and_config_has_no_step() {
        let err = SessionError::Extraction {
            step: Step::GetHome,
            source: ExtractError::NoSecurityQuestion,
        };
        assert_eq!(err.kind(), ErrorKind::ProtocolDrift);

        let err = SessionError::from(ConfigError::MissingPassword);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.step(), None);
    }

    #[test]
    fn credential_failure_message_omits_value() {
        let err = SessionError::drift(
            Step::StartSecurityQuestion,
            DriftCheck::InvalidCredential {
                kind: CredentialKind::TimestampSignature,
                source: CredentialError::NotLowercaseHex,
            },
        );
        assert_eq!(
            err.to_string(),
            "protocol drift at step 2 (StartSecurityQuestion): TS01d4e29a cookie failed validation: value is not lowercase hex"
        );
    }
}
