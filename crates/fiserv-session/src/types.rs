//! Core data types for the session protocol: credentials, tokens, steps,
//! and the account/transaction records returned by the portal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cookie carrying the `<routing>_<theme>` session context.
pub const SESSION_CONTEXT_COOKIE: &str = "SessionContext";
/// Cookie carrying the ASP.NET data-protection session binding.
pub const SESSION_BINDING_COOKIE: &str = "PBISession";
/// Cookie carrying the doubly-url-encoded protection material.
pub const PROTECTION_MATERIAL_COOKIE: &str = "PMData";
/// Load balancer timestamp signature cookie.
pub const TIMESTAMP_SIGNATURE_COOKIE: &str = "TS01d4e29a";
/// Anti-forgery cookie issued alongside the challenge page.
pub const REQUEST_VERIFICATION_COOKIE: &str = "__RequestVerificationCookie";
/// Authorization cookie issued once the challenge is answered.
pub const AUTHORIZATION_COOKIE: &str = "Auth";
/// Fixed banner cookie every browser session carries after the challenge.
pub const BANNER_DISPLAY_INDEX_COOKIE: &str = "BannerDisplayIndex";

/// The server-issued credentials the protocol threads between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    SessionContext,
    SessionBinding,
    ProtectionMaterial,
    TimestampSignature,
    RequestVerification,
    Authorization,
}

impl CredentialKind {
    /// Name of the cookie that carries this credential.
    pub fn cookie_name(self) -> &'static str {
        match self {
            Self::SessionContext => SESSION_CONTEXT_COOKIE,
            Self::SessionBinding => SESSION_BINDING_COOKIE,
            Self::ProtectionMaterial => PROTECTION_MATERIAL_COOKIE,
            Self::TimestampSignature => TIMESTAMP_SIGNATURE_COOKIE,
            Self::RequestVerification => REQUEST_VERIFICATION_COOKIE,
            Self::Authorization => AUTHORIZATION_COOKIE,
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cookie_name())
    }
}

/// An opaque server-issued value carried in a cookie.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub key: String,
    pub value: String,
}

impl Credential {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The fixed `BannerDisplayIndex=0` cookie.
    pub fn banner_display_index() -> Self {
        Self::new(BANNER_DISPLAY_INDEX_COOKIE, "0")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("value_len", &self.value.len())
            .finish()
    }
}

macro_rules! opaque_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(<{} chars>)"), self.0.len())
            }
        }
    };
}

opaque_token!(
    /// Token lifted from a redirect URL's `Token` query parameter. Stored decoded.
    RedirectToken
);
opaque_token!(
    /// The `pageNonce` embedded in the authenticated home page.
    PageToken
);
opaque_token!(
    /// Anti-forgery token embedded in the challenge page markup.
    AntiForgeryToken
);

/// The six protocol steps, in the order they must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Step {
    StartLogin,
    StartSecurityQuestion,
    SendSecurityAnswer,
    GetHome,
    GetAccountList,
    GetTransactions,
}

impl Step {
    /// 1-based position in the protocol.
    pub fn number(self) -> u8 {
        match self {
            Self::StartLogin => 1,
            Self::StartSecurityQuestion => 2,
            Self::SendSecurityAnswer => 3,
            Self::GetHome => 4,
            Self::GetAccountList => 5,
            Self::GetTransactions => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::StartLogin => "StartLogin",
            Self::StartSecurityQuestion => "StartSecurityQuestion",
            Self::SendSecurityAnswer => "SendSecurityAnswer",
            Self::GetHome => "GetHome",
            Self::GetAccountList => "GetAccountList",
            Self::GetTransactions => "GetTransactions",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.name())
    }
}

/// An account as listed by `/Home/AccountList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub balance_amount: String,
    pub balance_description: String,
    pub can_change_nickname: bool,
    pub can_have_transactions: bool,
    pub can_view_transactions: bool,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: i64,
    pub number: String,
    pub is_hidden: bool,
    pub can_transfer: bool,
    pub unformatted_balance_amount: f64,
}

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditDebitIndicator {
    Debit,
    Credit,
}

impl CreditDebitIndicator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

/// A single posted or pending transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub amount: String,
    pub balance: Option<String>,
    pub credit_debit_indicator: CreditDebitIndicator,
    pub description: String,
    pub tran_date: String,
    pub posting_status: String,
    pub transaction_id: String,
    pub has_image: bool,
    pub unformatted_balance: Option<String>,
}

/// One page of `/Transaction/{Get|GetMore}` results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub has_more: bool,
    pub archived_transactions_errored: bool,
    pub transactions: Vec<Transaction>,
    pub is_successful: bool,
}

/// An account together with every transaction retrieved for it, in page order.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountExport {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}
