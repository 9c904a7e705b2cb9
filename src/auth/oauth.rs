// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization-code exchange with the identity provider.
//!
//! The browser only ever sees the authorization redirect; the code exchange
//! is a server-to-server call carrying the client secret.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::error::AuthError;

/// Scopes requested from the provider.
const SCOPES: &str = "openid email profile";

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    /// Opaque or JWT access token (not used by the gateway itself)
    #[allow(dead_code)]
    pub access_token: String,
    /// Signed id token carrying the identity claims
    pub id_token: String,
    /// Token lifetime hint in seconds
    #[serde(default)]
    #[allow(dead_code)]
    pub expires_in: Option<u64>,
}

/// OAuth client for the authorization-code flow.
pub struct OAuthClient {
    client: reqwest::Client,
    authorize_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn new(
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Build the provider authorization URL for the login redirect.
    ///
    /// `state` is the single-use CSRF nonce echoed back on the callback.
    pub fn authorize_redirect(&self, state: &str) -> String {
        let mut url = Url::parse(&self.authorize_url).expect("authorize URL validated at startup");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        url.into()
    }

    /// Exchange an authorization code for tokens.
    ///
    /// A failed exchange never creates or mutates local state; the caller
    /// treats it as a terminal authentication failure.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("code", code),
                ("redirect_uri", &self.redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "HTTP {} from token endpoint",
                response.status()
            )));
        }

        response
            .json::<TokenSet>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))
    }
}
