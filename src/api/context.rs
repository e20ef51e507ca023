// src/api/context.rs
// Explicit per-call request context carrying the bearer token

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Everything a REST call needs besides its own arguments.
///
/// Cloned into every task that talks to the backend instead of mutating a
/// shared client's default headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    token: Option<String>,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

impl RequestContext {
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Expiry from the JWT `exp` claim; `None` for opaque tokens.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let token = self.token.as_deref()?;
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
        Utc.timestamp_opt(claims.exp?, 0).single()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
