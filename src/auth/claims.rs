// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity claims extracted from a verified id token.

use serde::Deserialize;

/// Raw claims deserialized from the id token payload.
///
/// Standard OIDC claims; providers may omit `email`/`name` depending on the
/// granted scopes.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClaims {
    /// Subject - the provider's stable user identifier
    pub sub: String,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Audience (validated by the jsonwebtoken crate, not read directly)
    #[serde(default)]
    #[allow(dead_code)]
    pub aud: Option<serde_json::Value>,

    /// User's email address
    #[serde(default)]
    pub email: Option<String>,

    /// User's display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Verified identity of the token subject.
///
/// Derived from a successfully verified token and never persisted as-is;
/// the durable record is the provisioned `User`.
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    /// Provider-issued stable subject identifier
    pub subject: String,
    /// Email address, if the token carried one
    pub email: Option<String>,
    /// Display name, falling back to the email local part
    pub display_name: Option<String>,
    /// Token issuer
    pub issuer: String,
    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl From<RawClaims> for IdentityClaims {
    fn from(claims: RawClaims) -> Self {
        // Providers frequently omit `name`; the email local part is the
        // fallback the frontend expects.
        let display_name = claims.name.clone().or_else(|| {
            claims
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string)
        });

        Self {
            subject: claims.sub,
            email: claims.email,
            display_name,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> RawClaims {
        RawClaims {
            sub: "abc123".to_string(),
            iss: "https://idp.example.com".to_string(),
            exp: 1700003600,
            iat: 1700000000,
            aud: Some(serde_json::json!("my-client")),
            email: Some("a@x.com".to_string()),
            name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn from_claims_extracts_subject() {
        let identity = IdentityClaims::from(sample_claims());
        assert_eq!(identity.subject, "abc123");
        assert_eq!(identity.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn display_name_prefers_name_claim() {
        let identity = IdentityClaims::from(sample_claims());
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let mut claims = sample_claims();
        claims.name = None;
        let identity = IdentityClaims::from(claims);
        assert_eq!(identity.display_name.as_deref(), Some("a"));
    }

    #[test]
    fn display_name_absent_without_email_or_name() {
        let mut claims = sample_claims();
        claims.name = None;
        claims.email = None;
        let identity = IdentityClaims::from(claims);
        assert!(identity.display_name.is_none());
    }
}
