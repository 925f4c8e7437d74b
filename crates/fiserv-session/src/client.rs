//! One method per protocol step.
//!
//! Every step builds a fresh cookie jar holding exactly the credentials it
//! needs, sends one request with the header set a browser would send at that
//! point, checks status and content type, then lifts and validates whatever
//! the next step needs. Request builders are separate from the send so the
//! exact bytes of each request can be inspected.

use crate::cookies::CookieJar;
use crate::encoding::{encode_form, encode_uri_component, looks_url_encoded, utc_string};
use crate::error::{DriftCheck, RedirectError, SessionError, SessionResult};
use crate::extractor::{
    extract_marked_token, extract_security_question, looks_like_html, ANTI_FORGERY_TOKEN,
    PAGE_NONCE,
};
use crate::institution::{Institution, DEFAULT_REMOTE_HOST, DEFAULT_THEME_NUMBER};
use crate::security::SecurityQuestion;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::{
    Account, AntiForgeryToken, Credential, CredentialKind, PageToken, RedirectToken, Step,
    TransactionPage,
};
use crate::validators::{
    validate_protection_material, validate_session_binding, validate_session_context,
    validate_timestamp_signature, CredentialError,
};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use url::Url;

/// Desktop Chrome on Windows.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

const ACCEPT_DOCUMENT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_XHR: &str = "application/json, text/javascript, */*; q=0.01";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";
const ACCEPT_ENCODING: &str = "gzip, deflate, br";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Exact content type the data endpoints answer with.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Portal and browser identity settings.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub remote_host: String,
    pub theme_number: u32,
    pub user_agent: String,
    /// Send `DNT: 1`.
    pub enable_dnt: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            remote_host: DEFAULT_REMOTE_HOST.to_string(),
            theme_number: DEFAULT_THEME_NUMBER,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            enable_dnt: true,
        }
    }
}

// ── Step inputs and outcomes ─────────────────────────────────────────────────

/// Credentials issued by the login step.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session_context: Credential,
    pub session_binding: Credential,
    pub protection_material: Credential,
    pub timestamp_signature: Credential,
    pub redirect_token: RedirectToken,
}

/// What the challenge page yields.
#[derive(Debug, Clone)]
pub struct ChallengeOutcome {
    pub protection_material: Credential,
    pub request_verification: Credential,
    pub timestamp_signature: Credential,
    pub anti_forgery_token: AntiForgeryToken,
    pub question: SecurityQuestion,
    pub referer: String,
}

/// What a successful answer yields.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub authorization: Credential,
    pub protection_material: Credential,
    pub timestamp_signature: Credential,
    pub redirect_token: RedirectToken,
    pub referer: String,
}

#[derive(Debug, Clone)]
pub struct HomeOutcome {
    pub page_token: PageToken,
    pub referer: String,
}

#[derive(Debug, Clone)]
pub struct AccountListOutcome {
    pub accounts: Vec<Account>,
    pub referer: String,
}

#[derive(Debug, Clone)]
pub struct TransactionPageOutcome {
    pub page: TransactionPage,
    pub referer: String,
}

/// Inputs to the challenge page request.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeInput<'a> {
    pub session_context: &'a Credential,
    pub session_binding: &'a Credential,
    pub protection_material: &'a Credential,
    pub timestamp_signature: &'a Credential,
    pub redirect_token: &'a RedirectToken,
}

/// Inputs to the answer submission.
#[derive(Debug, Clone, Copy)]
pub struct AnswerInput<'a> {
    pub referer: &'a str,
    pub request_verification: &'a Credential,
    pub session_binding: &'a Credential,
    pub protection_material: &'a Credential,
    pub session_context: &'a Credential,
    pub timestamp_signature: &'a Credential,
    pub redirect_token: &'a RedirectToken,
    pub anti_forgery_token: &'a AntiForgeryToken,
    pub answer: &'a str,
}

/// The credentials every request after the challenge carries.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCookies<'a> {
    pub request_verification: &'a Credential,
    pub authorization: &'a Credential,
    pub session_binding: &'a Credential,
    pub protection_material: &'a Credential,
    pub session_context: &'a Credential,
    pub timestamp_signature: &'a Credential,
}

impl AuthenticatedCookies<'_> {
    fn jar(&self) -> CookieJar {
        CookieJar::new()
            .with(self.request_verification.clone())
            .with(self.authorization.clone())
            .with(Credential::banner_display_index())
            .with(self.session_binding.clone())
            .with(self.protection_material.clone())
            .with(self.session_context.clone())
            .with(self.timestamp_signature.clone())
    }
}

/// Inputs to one transaction page request.
#[derive(Debug, Clone, Copy)]
pub struct TransactionsInput<'a> {
    pub referer: &'a str,
    pub page_token: &'a PageToken,
    pub account_id: &'a str,
    /// `GetMore` instead of `Get`: at least one page was already fetched.
    pub get_more: bool,
}

// ── Pure helpers ─────────────────────────────────────────────────────────────

/// Lift the `Token` query parameter from a redirect target.
///
/// The URL must be `https`, on `expected_host`, with no embedded password,
/// and the decoded token must not still look percent-encoded.
pub fn token_from_redirect_url(
    redirect_url: &str,
    expected_host: &str,
) -> Result<RedirectToken, RedirectError> {
    let url = Url::parse(redirect_url).map_err(|e| RedirectError::Unparseable(e.to_string()))?;
    if url.host_str() != Some(expected_host) {
        return Err(RedirectError::UnexpectedHost(
            url.host_str().map(|h| h.to_string()),
        ));
    }
    if url.scheme() != "https" {
        return Err(RedirectError::UnexpectedScheme(url.scheme().to_string()));
    }
    if url.password().is_some() {
        return Err(RedirectError::EmbeddedPassword);
    }
    let token = url
        .query_pairs()
        .find(|(k, _)| k == "Token")
        .map(|(_, v)| v.into_owned())
        .ok_or(RedirectError::MissingToken)?;
    if looks_url_encoded(&token) {
        return Err(RedirectError::AlreadyEncoded);
    }
    Ok(RedirectToken::new(token))
}

fn ensure_not_encoded(step: Step, token: &str) -> SessionResult<()> {
    if looks_url_encoded(token) {
        return Err(SessionError::drift(step, RedirectError::AlreadyEncoded));
    }
    Ok(())
}

fn expect_status(step: Step, resp: &HttpResponse, expected: u16) -> SessionResult<()> {
    if resp.status != expected {
        return Err(SessionError::drift(
            step,
            DriftCheck::UnexpectedStatus {
                expected,
                actual: resp.status,
            },
        ));
    }
    Ok(())
}

fn expect_html(step: Step, resp: &HttpResponse) -> SessionResult<()> {
    if !looks_like_html(&resp.body) {
        return Err(SessionError::drift(step, DriftCheck::NotHtml));
    }
    Ok(())
}

fn expect_json_content_type(step: Step, resp: &HttpResponse) -> SessionResult<()> {
    let actual = resp.header("content-type");
    if actual != Some(JSON_CONTENT_TYPE) {
        return Err(SessionError::drift(
            step,
            DriftCheck::UnexpectedContentType {
                expected: JSON_CONTENT_TYPE,
                actual: actual.map(|s| s.to_string()),
            },
        ));
    }
    Ok(())
}

fn parse_schema<T: DeserializeOwned>(step: Step, body: &str) -> SessionResult<T> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!("{step}: response does not match schema: {e}");
        SessionError::Schema {
            step,
            detail: e.to_string(),
        }
    })
}

fn take_credential(step: Step, jar: &CookieJar, kind: CredentialKind) -> SessionResult<Credential> {
    tracing::debug!("attempting to get cookie, key: {kind}");
    let cred = jar
        .get(kind.cookie_name())
        .cloned()
        .ok_or_else(|| SessionError::drift(step, DriftCheck::MissingCredential(kind)))?;
    tracing::debug!("successfully retrieved cookie, key: {kind}");
    Ok(cred)
}

fn check_credential(
    step: Step,
    kind: CredentialKind,
    result: Result<(), CredentialError>,
) -> SessionResult<()> {
    result.map_err(|source| SessionError::drift(step, DriftCheck::InvalidCredential { kind, source }))
}

fn extraction(step: Step) -> impl Fn(crate::extractor::ExtractError) -> SessionError {
    move |source| SessionError::Extraction { step, source }
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Drives single protocol steps over a [`Transport`].
pub struct SessionClient<T: Transport> {
    transport: T,
    institution: Institution,
    username: String,
    password: String,
    settings: ClientSettings,
    base_url: String,
}

impl<T: Transport> SessionClient<T> {
    pub fn new(
        transport: T,
        institution: Institution,
        username: impl Into<String>,
        password: impl Into<String>,
        settings: ClientSettings,
    ) -> Self {
        let base_url = format!("https://{}", settings.remote_host);
        tracing::info!(
            "starting api, institution: {}",
            institution.name.to_lowercase()
        );
        Self {
            transport,
            institution,
            username: username.into(),
            password: password.into(),
            settings,
            base_url,
        }
    }

    pub fn institution(&self) -> &Institution {
        &self.institution
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn finish_headers(&self, mut headers: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if !self.settings.enable_dnt {
            headers.retain(|(name, _)| *name != "DNT");
        }
        headers
    }

    async fn send(&self, step: Step, request: HttpRequest) -> SessionResult<HttpResponse> {
        self.transport
            .execute(request)
            .await
            .map_err(|source| SessionError::Transport { step, source })
    }

    // ── Step 1 ──

    pub fn build_start_login(&self, now: DateTime<Utc>) -> HttpRequest {
        let url = format!(
            "{}/Login/RemoteSubmit/{}/{}",
            self.base_url, self.institution.routing_number, self.settings.theme_number
        );
        let headers = self.finish_headers(vec![
            ("Host", self.settings.remote_host.clone()),
            ("User-Agent", self.settings.user_agent.clone()),
            ("Accept", ACCEPT_DOCUMENT.to_string()),
            ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
            ("Accept-Encoding", ACCEPT_ENCODING.to_string()),
            ("Content-Type", FORM_CONTENT_TYPE.to_string()),
            ("DNT", "1".to_string()),
            ("Origin", self.institution.homepage_url.to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Referer", self.institution.referer()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "cross-site".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
        ]);
        let timestamp = utc_string(now);
        let body = encode_form(&[
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("maskLoginInputs", "false"),
            ("fingerprint", "null"),
            ("pluginCount", "5"),
            ("timezoneOffset", "0"),
            ("timestampUtc", timestamp.as_str()),
        ]);
        HttpRequest {
            method: Method::POST,
            url,
            headers,
            // The login request carries no cookies at all.
            cookies: CookieJar::new(),
            body: Some(body),
        }
    }

    /// Submit credentials. Expects a bare 302 to the challenge page.
    pub async fn start_login(&self) -> SessionResult<LoginOutcome> {
        let step = Step::StartLogin;
        let request = self.build_start_login(Utc::now());
        let sent = request.cookies.clone();
        let resp = self.send(step, request).await?;
        expect_status(step, &resp, 302)?;

        let jar = sent.merged_with_response(&resp.set_cookies);
        if jar.get(CredentialKind::ProtectionMaterial.cookie_name()).is_none() {
            tracing::error!("PMData cookie not set, is your password correct?");
        }

        let session_context = take_credential(step, &jar, CredentialKind::SessionContext)?;
        let session_binding = take_credential(step, &jar, CredentialKind::SessionBinding)?;
        let protection_material = take_credential(step, &jar, CredentialKind::ProtectionMaterial)?;
        let timestamp_signature = take_credential(step, &jar, CredentialKind::TimestampSignature)?;
        check_credential(
            step,
            CredentialKind::SessionContext,
            validate_session_context(
                &session_context.value,
                self.institution.routing_number,
                self.settings.theme_number,
            ),
        )?;
        check_credential(
            step,
            CredentialKind::SessionBinding,
            validate_session_binding(&session_binding.value),
        )?;
        check_credential(
            step,
            CredentialKind::ProtectionMaterial,
            validate_protection_material(&protection_material.value),
        )?;
        check_credential(
            step,
            CredentialKind::TimestampSignature,
            validate_timestamp_signature(&timestamp_signature.value),
        )?;

        let location = resp
            .header("location")
            .ok_or_else(|| SessionError::drift(step, DriftCheck::MissingLocation))?;
        let redirect_token = token_from_redirect_url(location, &self.settings.remote_host)
            .map_err(|e| SessionError::drift(step, e))?;

        Ok(LoginOutcome {
            session_context,
            session_binding,
            protection_material,
            timestamp_signature,
            redirect_token,
        })
    }

    // ── Step 2 ──

    pub fn build_start_security_question(&self, input: &ChallengeInput<'_>) -> SessionResult<HttpRequest> {
        ensure_not_encoded(Step::StartSecurityQuestion, input.redirect_token.as_str())?;
        let url = format!(
            "{}/MFA/SecurityChallenge?Token={}",
            self.base_url,
            encode_uri_component(input.redirect_token.as_str())
        );
        let headers = self.finish_headers(vec![
            ("Host", self.settings.remote_host.clone()),
            ("User-Agent", self.settings.user_agent.clone()),
            ("Accept", ACCEPT_DOCUMENT.to_string()),
            ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
            ("Accept-Encoding", ACCEPT_ENCODING.to_string()),
            ("DNT", "1".to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Referer", self.institution.referer()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "cross-site".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
        ]);
        let cookies = CookieJar::new()
            .with(input.session_binding.clone())
            .with(input.protection_material.clone())
            .with(input.session_context.clone())
            .with(input.timestamp_signature.clone());
        Ok(HttpRequest {
            method: Method::GET,
            url,
            headers,
            cookies,
            body: None,
        })
    }

    /// Load the challenge page and read the question and anti-forgery token off it.
    pub async fn start_security_question(
        &self,
        input: &ChallengeInput<'_>,
    ) -> SessionResult<ChallengeOutcome> {
        let step = Step::StartSecurityQuestion;
        let request = self.build_start_security_question(input)?;
        let referer = request.url.clone();
        let sent = request.cookies.clone();
        let resp = self.send(step, request).await?;
        expect_status(step, &resp, 200)?;
        expect_html(step, &resp)?;

        let question = extract_security_question(&resp.body).map_err(extraction(step))?;
        let anti_forgery_token = extract_marked_token(&resp.body, &ANTI_FORGERY_TOKEN)
            .map(AntiForgeryToken::new)
            .map_err(extraction(step))?;

        let jar = sent.merged_with_response(&resp.set_cookies);
        let protection_material = take_credential(step, &jar, CredentialKind::ProtectionMaterial)?;
        let request_verification = take_credential(step, &jar, CredentialKind::RequestVerification)?;
        let timestamp_signature = take_credential(step, &jar, CredentialKind::TimestampSignature)?;
        check_credential(
            step,
            CredentialKind::ProtectionMaterial,
            validate_protection_material(&protection_material.value),
        )?;
        check_credential(
            step,
            CredentialKind::TimestampSignature,
            validate_timestamp_signature(&timestamp_signature.value),
        )?;

        Ok(ChallengeOutcome {
            protection_material,
            request_verification,
            timestamp_signature,
            anti_forgery_token,
            question,
            referer,
        })
    }

    // ── Step 3 ──

    pub fn build_send_security_answer(&self, input: &AnswerInput<'_>) -> SessionResult<HttpRequest> {
        ensure_not_encoded(Step::SendSecurityAnswer, input.redirect_token.as_str())?;
        let url = format!(
            "{}/MFA/Submit/Web?Token={}",
            self.base_url,
            encode_uri_component(input.redirect_token.as_str())
        );
        let headers = self.finish_headers(vec![
            ("Host", self.settings.remote_host.clone()),
            ("User-Agent", self.settings.user_agent.clone()),
            ("Accept", ACCEPT_XHR.to_string()),
            ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
            ("Accept-Encoding", ACCEPT_ENCODING.to_string()),
            ("Content-Type", FORM_CONTENT_TYPE.to_string()),
            ("DNT", "1".to_string()),
            ("Origin", self.base_url.clone()),
            ("Referer", input.referer.to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Sec-Fetch-Dest", "empty".to_string()),
            ("Sec-Fetch-Mode", "cors".to_string()),
            ("Sec-Fetch-Site", "same-origin".to_string()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
        ]);
        let body = encode_form(&[
            ("answer", input.answer),
            ("dontChallengeMe", "false"),
            ("__RequestVerificationToken", input.anti_forgery_token.as_str()),
        ]);
        let cookies = CookieJar::new()
            .with(Credential::banner_display_index())
            .with(input.request_verification.clone())
            .with(input.session_binding.clone())
            .with(input.protection_material.clone())
            .with(input.session_context.clone())
            .with(input.timestamp_signature.clone());
        Ok(HttpRequest {
            method: Method::POST,
            url,
            headers,
            cookies,
            body: Some(body),
        })
    }

    /// Submit the challenge answer. The JSON reply carries the next redirect.
    pub async fn send_security_answer(&self, input: &AnswerInput<'_>) -> SessionResult<AnswerOutcome> {
        let step = Step::SendSecurityAnswer;
        let request = self.build_send_security_answer(input)?;
        let referer = request.url.clone();
        let sent = request.cookies.clone();
        let resp = self.send(step, request).await?;
        expect_status(step, &resp, 200)?;

        // A non-JSON body fails the field checks below like a JSON one missing them.
        let data: serde_json::Value =
            serde_json::from_str(&resp.body).unwrap_or(serde_json::Value::Null);
        let redirect_url = data
            .get("redirectUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SessionError::drift(
                    step,
                    DriftCheck::MalformedChallengeResponse {
                        field: "redirectUrl",
                        expected: "string",
                    },
                )
            })?;
        let success = data.get("success").and_then(|v| v.as_bool()).ok_or_else(|| {
            SessionError::drift(
                step,
                DriftCheck::MalformedChallengeResponse {
                    field: "success",
                    expected: "boolean",
                },
            )
        })?;
        if !success {
            return Err(SessionError::drift(step, DriftCheck::ChallengeRejected));
        }
        let redirect_token = token_from_redirect_url(redirect_url, &self.settings.remote_host)
            .map_err(|e| SessionError::drift(step, e))?;

        let jar = sent.merged_with_response(&resp.set_cookies);
        let authorization = take_credential(step, &jar, CredentialKind::Authorization)?;
        let protection_material = take_credential(step, &jar, CredentialKind::ProtectionMaterial)?;
        let timestamp_signature = take_credential(step, &jar, CredentialKind::TimestampSignature)?;
        check_credential(
            step,
            CredentialKind::ProtectionMaterial,
            validate_protection_material(&protection_material.value),
        )?;
        check_credential(
            step,
            CredentialKind::TimestampSignature,
            validate_timestamp_signature(&timestamp_signature.value),
        )?;

        Ok(AnswerOutcome {
            authorization,
            protection_material,
            timestamp_signature,
            redirect_token,
            referer,
        })
    }

    // ── Step 4 ──

    pub fn build_get_home(
        &self,
        referer: &str,
        redirect_token: &RedirectToken,
        cookies: &AuthenticatedCookies<'_>,
    ) -> SessionResult<HttpRequest> {
        ensure_not_encoded(Step::GetHome, redirect_token.as_str())?;
        let url = format!(
            "{}/?Token={}",
            self.base_url,
            encode_uri_component(redirect_token.as_str())
        );
        let headers = self.finish_headers(vec![
            ("Host", self.settings.remote_host.clone()),
            ("User-Agent", self.settings.user_agent.clone()),
            ("Accept", ACCEPT_DOCUMENT.to_string()),
            ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
            ("Accept-Encoding", ACCEPT_ENCODING.to_string()),
            ("DNT", "1".to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Referer", referer.to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "same-origin".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
        ]);
        Ok(HttpRequest {
            method: Method::GET,
            url,
            headers,
            cookies: cookies.jar(),
            body: None,
        })
    }

    /// Load the authenticated home page and read the page nonce.
    pub async fn get_home(
        &self,
        referer: &str,
        redirect_token: &RedirectToken,
        cookies: &AuthenticatedCookies<'_>,
    ) -> SessionResult<HomeOutcome> {
        let step = Step::GetHome;
        let request = self.build_get_home(referer, redirect_token, cookies)?;
        let referer = request.url.clone();
        let resp = self.send(step, request).await?;
        expect_status(step, &resp, 200)?;
        expect_html(step, &resp)?;
        let page_token = extract_marked_token(&resp.body, &PAGE_NONCE)
            .map(PageToken::new)
            .map_err(extraction(step))?;
        Ok(HomeOutcome {
            page_token,
            referer,
        })
    }

    fn xhr_headers(&self, referer: &str) -> Vec<(&'static str, String)> {
        self.finish_headers(vec![
            ("Host", self.settings.remote_host.clone()),
            ("User-Agent", self.settings.user_agent.clone()),
            ("Accept", ACCEPT_XHR.to_string()),
            ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
            ("Accept-Encoding", ACCEPT_ENCODING.to_string()),
            ("DNT", "1".to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Referer", referer.to_string()),
            ("Sec-Fetch-Dest", "empty".to_string()),
            ("Sec-Fetch-Mode", "cors".to_string()),
            ("Sec-Fetch-Site", "same-origin".to_string()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
        ])
    }

    // ── Step 5 ──

    pub fn build_get_account_list(
        &self,
        referer: &str,
        page_token: &PageToken,
        cookies: &AuthenticatedCookies<'_>,
        now: DateTime<Utc>,
    ) -> SessionResult<HttpRequest> {
        ensure_not_encoded(Step::GetAccountList, page_token.as_str())?;
        let url = format!(
            "{}/Home/AccountList?Token={}&_={}",
            self.base_url,
            encode_uri_component(page_token.as_str()),
            now.timestamp_millis()
        );
        Ok(HttpRequest {
            method: Method::GET,
            url,
            headers: self.xhr_headers(referer),
            cookies: cookies.jar(),
            body: None,
        })
    }

    /// Fetch the account list.
    pub async fn get_account_list(
        &self,
        referer: &str,
        page_token: &PageToken,
        cookies: &AuthenticatedCookies<'_>,
    ) -> SessionResult<AccountListOutcome> {
        let step = Step::GetAccountList;
        let request = self.build_get_account_list(referer, page_token, cookies, Utc::now())?;
        let referer = request.url.clone();
        let resp = self.send(step, request).await?;
        expect_status(step, &resp, 200)?;
        expect_json_content_type(step, &resp)?;
        let accounts: Vec<Account> = parse_schema(step, &resp.body)?;
        Ok(AccountListOutcome { accounts, referer })
    }

    // ── Step 6 ──

    pub fn build_get_transactions(
        &self,
        input: &TransactionsInput<'_>,
        cookies: &AuthenticatedCookies<'_>,
        now: DateTime<Utc>,
    ) -> SessionResult<HttpRequest> {
        ensure_not_encoded(Step::GetTransactions, input.page_token.as_str())?;
        let path_part = if input.get_more { "GetMore" } else { "Get" };
        let url = format!(
            "{}/Transaction/{}/{}?Token={}&_={}",
            self.base_url,
            path_part,
            input.account_id,
            encode_uri_component(input.page_token.as_str()),
            now.timestamp_millis()
        );
        Ok(HttpRequest {
            method: Method::GET,
            url,
            headers: self.xhr_headers(input.referer),
            cookies: cookies.jar(),
            body: None,
        })
    }

    /// Fetch one page of transactions for an account.
    pub async fn get_transactions(
        &self,
        input: &TransactionsInput<'_>,
        cookies: &AuthenticatedCookies<'_>,
    ) -> SessionResult<TransactionPageOutcome> {
        let step = Step::GetTransactions;
        let request = self.build_get_transactions(input, cookies, Utc::now())?;
        let referer = request.url.clone();
        let resp = self.send(step, request).await?;
        expect_status(step, &resp, 200)?;
        expect_json_content_type(step, &resp)?;
        let page: TransactionPage = parse_schema(step, &resp.body)?;
        Ok(TransactionPageOutcome { page, referer })
    }
}
