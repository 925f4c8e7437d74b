//! fiserv-session: session protocol client for Fiserv-hosted retail online banking portals.

pub mod client;
pub mod cookies;
pub mod encoding;
pub mod error;
pub mod extractor;
pub mod institution;
pub mod orchestrator;
pub mod security;
pub mod transport;
pub mod types;
pub mod validators;

pub use client::{ClientSettings, SessionClient, DEFAULT_USER_AGENT};
pub use cookies::CookieJar;
pub use error::{
    ConfigError, DriftCheck, ErrorKind, RedirectError, SessionError, SessionResult,
    TransportError,
};
pub use institution::{Institution, INSTITUTIONS};
pub use orchestrator::{ArtifactSink, DiscardSink, Orchestrator, Pacing, SessionState, SinkError};
pub use security::{SecurityAnswerKind, SecurityAnswerRegistry, SecurityQuestion};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::*;
