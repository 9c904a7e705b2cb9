// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Covers JWKS retrieval, token verification, and the code exchange with the
/// provider. Verification failures carry a specific reason for logging but
/// surface to the caller as a generic 401.
#[derive(Debug)]
pub enum AuthError {
    /// Token could not be parsed, or uses a non-allow-listed algorithm
    MalformedToken,
    /// Token signature is invalid
    BadSignature,
    /// No key in the JWKS matches the token's key id
    UnknownKey,
    /// Token issuer does not match the configured provider
    IssuerMismatch,
    /// Token audience does not match the configured client id
    AudienceMismatch,
    /// Token has expired
    Expired,
    /// Token is not yet valid (`nbf`/`iat` in the future beyond leeway)
    NotYetValid,
    /// JWKS could not be fetched and no usable cache exists
    KeyFetchFailed(String),
    /// Authorization-code exchange with the provider failed
    ExchangeFailed(String),
    /// Internal error (key conversion, serialization)
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::BadSignature => "bad_signature",
            AuthError::UnknownKey => "unknown_key",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::Expired => "token_expired",
            AuthError::NotYetValid => "token_not_yet_valid",
            AuthError::KeyFetchFailed(_) => "key_fetch_failed",
            AuthError::ExchangeFailed(_) => "exchange_failed",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedToken
            | AuthError::BadSignature
            | AuthError::UnknownKey
            | AuthError::IssuerMismatch
            | AuthError::AudienceMismatch
            | AuthError::Expired
            | AuthError::NotYetValid
            | AuthError::KeyFetchFailed(_)
            | AuthError::ExchangeFailed(_) => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::BadSignature => write!(f, "Token signature is invalid"),
            AuthError::UnknownKey => write!(f, "No matching key found in JWKS"),
            AuthError::IssuerMismatch => write!(f, "Token issuer is invalid"),
            AuthError::AudienceMismatch => write!(f, "Token audience is invalid"),
            AuthError::Expired => write!(f, "Token has expired"),
            AuthError::NotYetValid => write!(f, "Token is not yet valid"),
            AuthError::KeyFetchFailed(msg) => write!(f, "Failed to fetch JWKS: {msg}"),
            AuthError::ExchangeFailed(msg) => write!(f, "Code exchange failed: {msg}"),
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Full reason goes to the log; the response body stays generic.
        tracing::warn!(error_code = self.error_code(), "authentication failed: {self}");

        let body = Json(AuthErrorBody {
            error: "Unauthorized".to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
