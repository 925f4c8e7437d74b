//! The export run as an explicit state machine.
//!
//! Each transition consumes the current [`SessionState`], performs exactly
//! one protocol step (or one account's pagination loop) and returns the next
//! state carrying everything later steps need. A failed transition ends the
//! run; there is no resume.

use crate::client::{
    AnswerInput, AuthenticatedCookies, ChallengeInput, ChallengeOutcome, LoginOutcome,
    SessionClient, TransactionsInput,
};
use crate::error::{DriftCheck, SessionError, SessionResult};
use crate::security::SecurityAnswerRegistry;
use crate::transport::Transport;
use crate::types::{
    Account, AccountExport, Credential, PageToken, RedirectToken, Step, Transaction,
};
use std::collections::VecDeque;
use std::time::Duration;

/// Boxed error returned by artifact sinks.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Default pause between protocol steps.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Default pause between transaction pages.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on transaction pages fetched for one account.
pub const DEFAULT_MAX_PAGES: usize = 500;

/// Delays and bounds applied during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub settle: Duration,
    pub page: Duration,
    pub max_pages: usize,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE_DELAY,
            page: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Pacing {
    /// No delays; the page cap is kept.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            page: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Receives results as soon as they are complete.
///
/// Accounts arrive right after the list is fetched, transactions once an
/// account's pagination finishes. Anything already written stays written if
/// the run later fails.
pub trait ArtifactSink: Send + Sync {
    fn export_account(&self, account: &Account) -> Result<(), SinkError>;

    fn export_transactions(
        &self,
        account: &Account,
        transactions: &[Transaction],
    ) -> Result<(), SinkError>;
}

/// Sink that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl ArtifactSink for DiscardSink {
    fn export_account(&self, _account: &Account) -> Result<(), SinkError> {
        Ok(())
    }

    fn export_transactions(&self, _account: &Account, _transactions: &[Transaction]) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Every credential the authenticated steps re-attach.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub session_context: Credential,
    pub session_binding: Credential,
    pub protection_material: Credential,
    pub timestamp_signature: Credential,
    pub request_verification: Credential,
    pub authorization: Credential,
}

impl Credentials {
    pub fn cookies(&self) -> AuthenticatedCookies<'_> {
        AuthenticatedCookies {
            request_verification: &self.request_verification,
            authorization: &self.authorization,
            session_binding: &self.session_binding,
            protection_material: &self.protection_material,
            session_context: &self.session_context,
            timestamp_signature: &self.timestamp_signature,
        }
    }
}

/// Where a run is, and what it holds.
#[derive(Debug, Clone)]
pub enum SessionState {
    Login,
    Challenge {
        login: LoginOutcome,
    },
    Answer {
        login: LoginOutcome,
        challenge: ChallengeOutcome,
    },
    Home {
        credentials: Credentials,
        redirect_token: RedirectToken,
        referer: String,
    },
    ListAccounts {
        credentials: Credentials,
        page_token: PageToken,
        referer: String,
    },
    Paginate {
        credentials: Credentials,
        page_token: PageToken,
        /// Account list URL; every transaction request uses it as `Referer`.
        referer: String,
        pending: VecDeque<Account>,
    },
    Done,
}

impl SessionState {
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Challenge { .. } => "challenge",
            Self::Answer { .. } => "answer",
            Self::Home { .. } => "home",
            Self::ListAccounts { .. } => "list_accounts",
            Self::Paginate { .. } => "paginate_transactions",
            Self::Done => "done",
        }
    }
}

/// Runs complete exports over one client.
pub struct Orchestrator<T: Transport> {
    client: SessionClient<T>,
    answers: SecurityAnswerRegistry,
    pacing: Pacing,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(client: SessionClient<T>, answers: SecurityAnswerRegistry, pacing: Pacing) -> Self {
        Self {
            client,
            answers,
            pacing,
        }
    }

    pub fn client(&self) -> &SessionClient<T> {
        &self.client
    }

    /// One full export from a fresh login. Returns every account with its
    /// transactions in retrieval order.
    pub async fn run(&self, sink: &dyn ArtifactSink) -> SessionResult<Vec<AccountExport>> {
        tracing::info!("starting transactions export");
        let mut exports = Vec::new();
        let mut state = SessionState::Login;
        loop {
            let phase = state.phase();
            state = match self.advance(state, sink, &mut exports).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!("export aborted, phase: {phase}, error: {e}");
                    return Err(e);
                }
            };
            if matches!(state, SessionState::Done) {
                break;
            }
        }
        tracing::info!("finished transactions export, accounts: {}", exports.len());
        Ok(exports)
    }

    async fn settle(&self) {
        if !self.pacing.settle.is_zero() {
            tokio::time::sleep(self.pacing.settle).await;
        }
    }

    /// Perform one transition.
    pub async fn advance(
        &self,
        state: SessionState,
        sink: &dyn ArtifactSink,
        exports: &mut Vec<AccountExport>,
    ) -> SessionResult<SessionState> {
        match state {
            SessionState::Login => {
                let login = self.client.start_login().await?;
                self.settle().await;
                Ok(SessionState::Challenge { login })
            }

            SessionState::Challenge { login } => {
                let challenge = self
                    .client
                    .start_security_question(&ChallengeInput {
                        session_context: &login.session_context,
                        session_binding: &login.session_binding,
                        protection_material: &login.protection_material,
                        timestamp_signature: &login.timestamp_signature,
                        redirect_token: &login.redirect_token,
                    })
                    .await?;
                tracing::info!("security question: {}", challenge.question.answer_kind());
                self.settle().await;
                Ok(SessionState::Answer { login, challenge })
            }

            SessionState::Answer { login, challenge } => {
                let answer = self.answers.answer_for(challenge.question)?;
                let outcome = self
                    .client
                    .send_security_answer(&AnswerInput {
                        referer: &challenge.referer,
                        request_verification: &challenge.request_verification,
                        session_binding: &login.session_binding,
                        protection_material: &challenge.protection_material,
                        session_context: &login.session_context,
                        timestamp_signature: &challenge.timestamp_signature,
                        redirect_token: &login.redirect_token,
                        anti_forgery_token: &challenge.anti_forgery_token,
                        answer,
                    })
                    .await?;
                self.settle().await;
                Ok(SessionState::Home {
                    credentials: Credentials {
                        session_context: login.session_context,
                        session_binding: login.session_binding,
                        protection_material: outcome.protection_material,
                        timestamp_signature: outcome.timestamp_signature,
                        request_verification: challenge.request_verification,
                        authorization: outcome.authorization,
                    },
                    redirect_token: outcome.redirect_token,
                    referer: outcome.referer,
                })
            }

            SessionState::Home {
                credentials,
                redirect_token,
                referer,
            } => {
                let home = self
                    .client
                    .get_home(&referer, &redirect_token, &credentials.cookies())
                    .await?;
                self.settle().await;
                Ok(SessionState::ListAccounts {
                    credentials,
                    page_token: home.page_token,
                    referer: home.referer,
                })
            }

            SessionState::ListAccounts {
                credentials,
                page_token,
                referer,
            } => {
                let list = self
                    .client
                    .get_account_list(&referer, &page_token, &credentials.cookies())
                    .await?;
                tracing::info!("retrieved {} account(s)", list.accounts.len());
                for account in &list.accounts {
                    sink.export_account(account).map_err(SessionError::Export)?;
                }
                self.settle().await;
                Ok(SessionState::Paginate {
                    credentials,
                    page_token,
                    referer: list.referer,
                    pending: list.accounts.into(),
                })
            }

            SessionState::Paginate {
                credentials,
                page_token,
                referer,
                mut pending,
            } => {
                let Some(account) = pending.pop_front() else {
                    return Ok(SessionState::Done);
                };
                tracing::info!("retrieving transactions for account {}", account.name);
                let transactions = self
                    .paginate(&account, &credentials, &page_token, &referer)
                    .await?;
                tracing::info!(
                    "retrieved {} total transaction(s) for account {}",
                    transactions.len(),
                    account.name
                );
                sink.export_transactions(&account, &transactions)
                    .map_err(SessionError::Export)?;
                exports.push(AccountExport {
                    account,
                    transactions,
                });
                Ok(SessionState::Paginate {
                    credentials,
                    page_token,
                    referer,
                    pending,
                })
            }

            SessionState::Done => Ok(SessionState::Done),
        }
    }

    async fn paginate(
        &self,
        account: &Account,
        credentials: &Credentials,
        page_token: &PageToken,
        referer: &str,
    ) -> SessionResult<Vec<Transaction>> {
        let mut transactions = Vec::new();
        let mut pages = 0usize;
        loop {
            if pages >= self.pacing.max_pages {
                return Err(SessionError::drift(
                    Step::GetTransactions,
                    DriftCheck::PaginationLimitExceeded {
                        account_id: account.account_id.clone(),
                        limit: self.pacing.max_pages,
                    },
                ));
            }
            tracing::info!(
                "retrieving transactions, account name: {}, sent {} prior txn request(s)",
                account.name,
                pages
            );
            let outcome = self
                .client
                .get_transactions(
                    &TransactionsInput {
                        referer,
                        page_token,
                        account_id: &account.account_id,
                        get_more: pages > 0,
                    },
                    &credentials.cookies(),
                )
                .await?;
            pages += 1;

            let page = outcome.page;
            if !page.is_successful {
                tracing::warn!(
                    "transaction page not successful, stopping early, account name: {}",
                    account.name
                );
                break;
            }
            tracing::info!("retrieved {} transaction(s)", page.transactions.len());
            transactions.extend(page.transactions);
            if !page.has_more {
                break;
            }
            if !self.pacing.page.is_zero() {
                tokio::time::sleep(self.pacing.page).await;
            }
        }
        Ok(transactions)
    }
}
