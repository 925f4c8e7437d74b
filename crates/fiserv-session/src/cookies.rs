//! Value-type cookie jar.
//!
//! A jar is built fresh for every request from exactly the credentials that
//! step needs, and handed to the transport by value. Nothing carries over
//! between steps unless the orchestrator puts it back in.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::types::Credential;

/// Ordered set of cookies, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<Credential>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`CookieJar::set`].
    pub fn with(mut self, cookie: Credential) -> Self {
        self.set(cookie);
        self
    }

    /// Insert or replace a cookie. A replaced cookie keeps its position.
    pub fn set(&mut self, cookie: Credential) {
        match self.entries.iter_mut().find(|c| c.key == cookie.key) {
            Some(existing) => existing.value = cookie.value,
            None => self.entries.push(cookie),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|c| c.key != key);
    }

    pub fn get(&self, key: &str) -> Option<&Credential> {
        self.entries.iter().find(|c| c.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.key.as_str())
    }

    /// Render as a `Cookie` request header value, or `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|c| format!("{}={}", c.key, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Apply one `Set-Cookie` header. `Max-Age<=0` or an `Expires` in the past
    /// deletes; attributes are otherwise ignored.
    pub fn apply_set_cookie(&mut self, header: &str) {
        self.apply_set_cookie_at(header, Utc::now());
    }

    fn apply_set_cookie_at(&mut self, header: &str, now: DateTime<Utc>) {
        let mut parts = header.split(';');
        let Some(pair) = parts.next() else {
            return;
        };
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let value = value.trim().trim_matches('"');

        let expired = parts.any(|attr| {
            let Some((k, v)) = attr.trim().split_once('=') else {
                return false;
            };
            let (k, v) = (k.trim(), v.trim());
            if k.eq_ignore_ascii_case("max-age") {
                v.parse::<i64>().is_ok_and(|n| n <= 0)
            } else if k.eq_ignore_ascii_case("expires") {
                parse_expires(v).is_some_and(|at| at <= now)
            } else {
                false
            }
        });

        if expired {
            self.remove(name);
        } else {
            self.set(Credential::new(name, value));
        }
    }

    /// Build a jar from a response's `Set-Cookie` headers.
    pub fn from_set_cookie_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut jar = Self::new();
        for header in headers {
            jar.apply_set_cookie(header);
        }
        jar
    }

    /// The jar a browser would hold after a response: the cookies it sent,
    /// updated by the cookies the server set.
    pub fn merged_with_response(&self, set_cookie_headers: &[String]) -> Self {
        let mut jar = self.clone();
        for header in set_cookie_headers {
            jar.apply_set_cookie(header);
        }
        jar
    }
}

/// `Expires` as RFC 1123 (`Thu, 01 Jan 1970 00:00:00 GMT`) or the older
/// dashed form (`Thu, 01-Jan-1970 00:00:00 GMT`).
fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|at| at.and_utc())
}
