// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Module
//!
//! Browser sessions are self-contained signed tokens, not references into a
//! server-side store. The cookie value is
//! `v1.<base64url(payload)>.<base64url(hmac)>` where the payload carries the
//! internal user id and expiry. The provider's raw tokens never reach the
//! browser.
//!
//! ## Security
//!
//! - HMAC-SHA256 over the encoded payload; MAC comparison is constant-time
//! - Cookies are HTTP-only, SameSite=Lax, `Secure` per configuration
//! - Expiry is enforced server-side on every resolution; the cookie max-age
//!   is advisory

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "ag_session";

/// Short-lived CSRF state cookie used during the login redirect.
pub const STATE_COOKIE: &str = "ag_oauth_state";

/// Lifetime of the CSRF state cookie (10 minutes).
const STATE_COOKIE_TTL_SECS: i64 = 600;

/// Token format version prefix.
const TOKEN_VERSION: &str = "v1";

/// Session resolution error.
#[derive(Debug)]
pub enum SessionError {
    /// No session cookie present
    Missing,
    /// Cookie is malformed or its signature does not verify
    Invalid,
    /// Session has expired
    Expired,
    /// Session is valid but the user no longer exists in the store
    OrphanedUser,
    /// Store failure during user resolution
    Internal(String),
}

#[derive(Serialize)]
struct SessionErrorBody {
    error: String,
    error_code: String,
}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Missing => "missing_session",
            SessionError::Invalid => "invalid_session",
            SessionError::Expired => "session_expired",
            // Deliberately indistinct: the caller learns nothing about
            // whether the account exists.
            SessionError::OrphanedUser => "invalid_session",
            SessionError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Missing => write!(f, "No session cookie present"),
            SessionError::Invalid => write!(f, "Session cookie is invalid"),
            SessionError::Expired => write!(f, "Session has expired"),
            SessionError::OrphanedUser => write!(f, "Session user no longer exists"),
            SessionError::Internal(msg) => write!(f, "Internal session error: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(error_code = self.error_code(), "session rejected: {self}");

        let body = Json(SessionErrorBody {
            error: "Unauthorized".to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

/// Signed payload inside a session token.
#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    /// Internal user id
    uid: Uuid,
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Expiry (Unix timestamp)
    exp: i64,
}

/// Issues and resolves signed session cookies.
pub struct SessionManager {
    key: Vec<u8>,
    ttl: Duration,
    cookie_secure: bool,
}

impl SessionManager {
    pub fn new(key: Vec<u8>, ttl: Duration, cookie_secure: bool) -> Self {
        Self {
            key,
            ttl,
            cookie_secure,
        }
    }

    /// Issue a session token for a user id.
    pub fn issue(&self, user_id: Uuid) -> String {
        let now = Utc::now().timestamp();
        let payload = SessionPayload {
            uid: user_id,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        // Serializing a plain struct of scalars cannot fail.
        let payload_b64 = Base64UrlUnpadded::encode_string(
            &serde_json::to_vec(&payload).expect("session payload serializes"),
        );
        let sig_b64 = Base64UrlUnpadded::encode_string(&self.mac(payload_b64.as_bytes()));

        format!("{TOKEN_VERSION}.{payload_b64}.{sig_b64}")
    }

    /// Resolve a session token to the user id it was issued for.
    ///
    /// The token's own integrity is re-validated on every call; a forged or
    /// altered cookie never resolves.
    pub fn resolve(&self, value: &str) -> Result<Uuid, SessionError> {
        let mut parts = value.split('.');
        let (version, payload_b64, sig_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(v), Some(p), Some(s), None) => (v, p, s),
                _ => return Err(SessionError::Invalid),
            };

        if version != TOKEN_VERSION {
            return Err(SessionError::Invalid);
        }

        let sig = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| SessionError::Invalid)?;

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig).map_err(|_| SessionError::Invalid)?;

        let payload_bytes =
            Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| SessionError::Invalid)?;
        let payload: SessionPayload =
            serde_json::from_slice(&payload_bytes).map_err(|_| SessionError::Invalid)?;

        if Utc::now().timestamp() >= payload.exp {
            return Err(SessionError::Expired);
        }

        Ok(payload.uid)
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Build the session cookie with the policy-fixed attributes.
    pub fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(self.ttl.as_secs() as i64))
            .build()
    }

    /// Build an expired session cookie to clear the browser's copy.
    ///
    /// Revocation of a self-contained session is cookie clearing; calling it
    /// repeatedly is a no-op.
    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(0))
            .build()
    }

    /// Build the short-lived CSRF state cookie for the login redirect.
    pub fn state_cookie(&self, nonce: String) -> Cookie<'static> {
        Cookie::build((STATE_COOKIE, nonce))
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(STATE_COOKIE_TTL_SECS))
            .build()
    }

    /// Build an expired state cookie (single-use nonce).
    pub fn clear_state_cookie(&self) -> Cookie<'static> {
        Cookie::build((STATE_COOKIE, ""))
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(0))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            Duration::from_secs(3600),
            false,
        )
    }

    #[test]
    fn issued_session_resolves_to_same_user() {
        let manager = manager();
        let user_id = Uuid::new_v4();

        let token = manager.issue(user_id);
        let resolved = manager.resolve(&token).unwrap();

        assert_eq!(resolved, user_id);
    }

    #[test]
    fn expired_session_resolves_to_expired() {
        let manager = SessionManager::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            Duration::ZERO,
            false,
        );

        let token = manager.issue(Uuid::new_v4());
        let err = manager.resolve(&token).unwrap_err();
        assert!(matches!(err, SessionError::Expired));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let manager = manager();
        let token = manager.issue(Uuid::new_v4());

        // Flip one character of the payload segment.
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut payload: Vec<u8> = parts[1].clone().into_bytes();
        payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();
        let tampered = parts.join(".");

        let err = manager.resolve(&tampered).unwrap_err();
        assert!(matches!(err, SessionError::Invalid));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let manager = manager();
        let token = manager.issue(Uuid::new_v4());

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut sig: Vec<u8> = parts[2].clone().into_bytes();
        let last = sig.len() - 1;
        sig[last] = if sig[last] == b'A' { b'B' } else { b'A' };
        parts[2] = String::from_utf8(sig).unwrap();
        let tampered = parts.join(".");

        let err = manager.resolve(&tampered).unwrap_err();
        assert!(matches!(err, SessionError::Invalid));
    }

    #[test]
    fn token_signed_with_different_key_is_invalid() {
        let manager_a = manager();
        let manager_b = SessionManager::new(
            b"fedcba9876543210fedcba9876543210".to_vec(),
            Duration::from_secs(3600),
            false,
        );

        let token = manager_a.issue(Uuid::new_v4());
        let err = manager_b.resolve(&token).unwrap_err();
        assert!(matches!(err, SessionError::Invalid));
    }

    #[test]
    fn malformed_values_are_invalid() {
        let manager = manager();
        for value in ["", "garbage", "v1.only-two", "v2.a.b", "v1.a.b.c"] {
            let err = manager.resolve(value).unwrap_err();
            assert!(matches!(err, SessionError::Invalid), "value: {value}");
        }
    }

    #[test]
    fn session_cookie_attributes_fixed_by_policy() {
        let manager = SessionManager::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            Duration::from_secs(3600),
            true,
        );

        let cookie = manager.session_cookie("token".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert!(cookie.http_only().unwrap_or(false));
        assert!(cookie.secure().unwrap_or(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = manager().clear_session_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(0)));
    }
}
