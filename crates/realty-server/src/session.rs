//! Session tokens carried in cookies.
//!
//! Canonical names (`access_token`, `refresh_token`, `user`) are the only
//! ones written. The older `ghl_`-prefixed names are still read so sessions
//! created before the rename keep working, and are expired on every write.

use std::convert::Infallible;

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use realty_crm::{CrmUser, TokenSet};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const USER_COOKIE: &str = "user";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const LEGACY_ACCESS_TOKEN_COOKIE: &str = "ghl_access_token";
const LEGACY_REFRESH_TOKEN_COOKIE: &str = "ghl_refresh_token";
const LEGACY_USER_COOKIE: &str = "ghl_user";

const DEFAULT_ACCESS_TTL_SECS: u64 = 24 * 60 * 60;
const REFRESH_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const OAUTH_STATE_TTL_SECS: u64 = 10 * 60;

/// Bytes that may not appear raw in a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// The signed-in user's tokens and profile, as read from request cookies.
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<CrmUser>,
}

impl Session {
    /// `None` when the request carries no access token under either name.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Some(Self {
            access_token: read_access_token(headers)?,
            refresh_token: read_refresh_token(headers),
            user: read_user(headers),
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("user", &self.user)
            .finish()
    }
}

pub fn read_access_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_TOKEN_COOKIE)
        .or_else(|| read_cookie(headers, LEGACY_ACCESS_TOKEN_COOKIE))
}

pub fn read_refresh_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, REFRESH_TOKEN_COOKIE)
        .or_else(|| read_cookie(headers, LEGACY_REFRESH_TOKEN_COOKIE))
}

/// The stored user profile. An undecodable cookie reads as no user.
pub fn read_user(headers: &HeaderMap) -> Option<CrmUser> {
    let raw = read_cookie(headers, USER_COOKIE).or_else(|| read_cookie(headers, LEGACY_USER_COOKIE))?;
    let decoded = percent_decode_str(&raw).decode_utf8().ok()?;
    match serde_json::from_str(&decoded) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable user cookie");
            None
        }
    }
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Attributes shared by every cookie the server sets.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    secure: bool,
}

impl CookiePolicy {
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Writes a fresh session. The refresh token cookie is only rewritten
    /// when the provider issued one; `user` is skipped when `None`.
    #[must_use]
    pub fn session(&self, tokens: &TokenSet, user: Option<&CrmUser>) -> SetCookies {
        let ttl = tokens.expires_in.unwrap_or(DEFAULT_ACCESS_TTL_SECS);
        let mut cookies = self.expire_legacy();
        cookies.push(self.cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token, ttl));
        if let Some(refresh_token) = &tokens.refresh_token {
            cookies.push(self.cookie(REFRESH_TOKEN_COOKIE, refresh_token, REFRESH_TTL_SECS));
        }
        if let Some(user) = user {
            match serde_json::to_string(user) {
                Ok(json) => {
                    let encoded = utf8_percent_encode(&json, COOKIE_VALUE).to_string();
                    cookies.push(self.cookie(USER_COOKIE, &encoded, ttl));
                }
                Err(e) => tracing::warn!(error = %e, "failed to encode user cookie"),
            }
        }
        cookies
    }

    /// Expires every session cookie, canonical and legacy.
    #[must_use]
    pub fn clear_session(&self) -> SetCookies {
        let mut cookies = self.expire_legacy();
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_COOKIE] {
            cookies.push(self.cookie(name, "", 0));
        }
        cookies
    }

    #[must_use]
    pub fn oauth_state(&self, state: &str) -> SetCookies {
        SetCookies(vec![self.cookie(OAUTH_STATE_COOKIE, state, OAUTH_STATE_TTL_SECS)])
    }

    #[must_use]
    pub fn clear_oauth_state(&self) -> SetCookies {
        SetCookies(vec![self.cookie(OAUTH_STATE_COOKIE, "", 0)])
    }

    fn expire_legacy(&self) -> SetCookies {
        SetCookies(
            [
                LEGACY_ACCESS_TOKEN_COOKIE,
                LEGACY_REFRESH_TOKEN_COOKIE,
                LEGACY_USER_COOKIE,
            ]
            .into_iter()
            .map(|name| self.cookie(name, "", 0))
            .collect(),
        )
    }

    fn cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}")
    }
}

/// `Set-Cookie` headers to attach to a response.
#[derive(Debug, Default)]
pub struct SetCookies(Vec<String>);

impl SetCookies {
    #[must_use]
    pub fn and(mut self, other: SetCookies) -> Self {
        self.0.extend(other.0);
        self
    }

    fn push(&mut self, cookie: String) {
        self.0.push(cookie);
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl IntoResponseParts for SetCookies {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.0 {
            match HeaderValue::try_from(cookie) {
                Ok(value) => {
                    res.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(_) => tracing::warn!("dropping cookie with a value that is not a valid header"),
            }
        }
        Ok(res)
    }
}
