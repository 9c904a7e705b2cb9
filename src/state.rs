// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state wired from configuration at startup.

use std::sync::Arc;

use crate::auth::{JwksCache, OAuthClient, TokenVerifier};
use crate::config::Config;
use crate::proxy::{ProxyGateway, UpstreamTargets};
use crate::session::SessionManager;
use crate::users::{UserDirectory, UserStoreError};

/// Name of the user database file under `DATA_DIR`.
const USER_DB_FILE: &str = "users.redb";

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwks: JwksCache,
    pub verifier: TokenVerifier,
    pub oauth: Arc<OAuthClient>,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserDirectory>,
    pub proxy: Arc<ProxyGateway>,
}

impl AppState {
    /// Build the full component graph from configuration.
    pub fn from_config(config: Config) -> Result<Self, UserStoreError> {
        let jwks = JwksCache::new(&config.jwks_url).with_cache_ttl(config.jwks_cache_ttl);

        let verifier = TokenVerifier::new(
            jwks.clone(),
            &config.issuer_url,
            &config.client_id,
            config.clock_skew,
        );

        let oauth = Arc::new(OAuthClient::new(
            &config.authorize_url,
            &config.token_url,
            &config.client_id,
            &config.client_secret,
            &config.redirect_uri,
        ));

        let sessions = Arc::new(SessionManager::new(
            config.session_secret.clone(),
            config.session_ttl,
            config.cookie_secure,
        ));

        let users = Arc::new(UserDirectory::open(&config.data_dir.join(USER_DB_FILE))?);

        let proxy = Arc::new(ProxyGateway::new(
            UpstreamTargets {
                generation: config.generation_service_url.clone(),
                rag: config.rag_service_url.clone(),
            },
            config.upstream_timeout,
        ));

        Ok(Self {
            config: Arc::new(config),
            jwks,
            verifier,
            oauth,
            sessions,
            users,
            proxy,
        })
    }
}
