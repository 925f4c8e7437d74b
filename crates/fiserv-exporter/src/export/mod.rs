//! Tabular artifacts for exported accounts and transactions.

pub mod csv;

pub use self::csv::{CsvExporter, ExportError};

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::{NoExpand, Regex};

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex is valid"))
}

/// Collapse every whitespace run to `replacement`. Leading and trailing runs
/// are collapsed, not trimmed.
pub fn collapse_whitespace(input: &str, replacement: &str) -> String {
    whitespace_runs()
        .replace_all(input, NoExpand(replacement))
        .into_owned()
}

/// `<ISO-8601 timestamp>-<label>-<account name>.csv`, with the account name
/// lowercased and its whitespace runs replaced by `_`.
pub fn output_file_name(at: DateTime<Utc>, label: &str, account_name: &str) -> String {
    format!(
        "{}-{}-{}.csv",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        label,
        collapse_whitespace(account_name, "_").to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn collapses_runs_without_trimming() {
        assert_eq!(collapse_whitespace("COFFEE   SHOP\t#12", " "), "COFFEE SHOP #12");
        assert_eq!(collapse_whitespace("  a \n b ", " "), " a b ");
        assert_eq!(collapse_whitespace("", " "), "");
        assert_eq!(collapse_whitespace("ATM\u{a0}\u{a0}WITHDRAWAL\r\n", " "), "ATM WITHDRAWAL ");
    }

    #[test]
    fn file_name_uses_iso_timestamp_and_slug() {
        let at = Utc.with_ymd_and_hms(2023, 1, 3, 18, 4, 5).unwrap();
        assert_eq!(
            output_file_name(at, "txns", "Holiday  Savings"),
            "2023-01-03T18:04:05.000Z-txns-holiday_savings.csv"
        );
    }
}
