// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-token verification.
//!
//! Pure parse-then-validate pipeline: header → algorithm allow-list → key
//! lookup → signature/issuer/audience/expiry checks → [`IdentityClaims`].
//! Any single failed check discards all extracted claims.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use super::claims::{IdentityClaims, RawClaims};
use super::error::AuthError;
use super::jwks::JwksCache;

/// Accepted signing algorithms.
///
/// Asymmetric only: accepting an HMAC algorithm here would let a client sign
/// tokens with the provider's public key material (algorithm confusion).
const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Verifies bearer tokens against the provider's published keys.
#[derive(Clone)]
pub struct TokenVerifier {
    jwks: JwksCache,
    issuer: String,
    audience: String,
    leeway: Duration,
}

impl TokenVerifier {
    pub fn new(
        jwks: JwksCache,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        leeway: Duration,
    ) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway,
        }
    }

    /// Verify a token and extract the subject's identity.
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        // Reject before any key fetch or signature work.
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::MalformedToken);
        }

        let kid = header.kid.as_deref().ok_or(AuthError::MalformedToken)?;
        let (decoding_key, algorithm) = self.jwks.get_decoding_key(kid).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.leeway.as_secs();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data =
            decode::<RawClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::BadSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::NotYetValid,
                _ => AuthError::MalformedToken,
            })?;

        let claims = token_data.claims;

        // jsonwebtoken does not validate iat; a token "issued" in the future
        // beyond leeway is rejected.
        let now = Utc::now().timestamp();
        if claims.iat > now + self.leeway.as_secs() as i64 {
            return Err(AuthError::NotYetValid);
        }

        Ok(IdentityClaims::from(claims))
    }
}
