// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup. Missing or
//! malformed required values are fatal: the process refuses to start rather
//! than failing per-request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ISSUER_URL` | Expected `iss` claim of identity tokens | Required |
//! | `JWKS_URL` | Provider JWKS endpoint | Required |
//! | `AUTHORIZE_URL` | Provider authorization endpoint (hosted login UI) | Required |
//! | `TOKEN_URL` | Provider token-exchange endpoint | Required |
//! | `CLIENT_ID` | OAuth client identifier (also the expected audience) | Required |
//! | `CLIENT_SECRET` | OAuth client secret | Required |
//! | `REDIRECT_URI` | Authorized callback URI under this gateway | Required |
//! | `FRONTEND_URL` | Browser application base URL (landing target) | Required |
//! | `SESSION_SECRET` | HMAC key for session cookies (>= 32 bytes) | Required |
//! | `SESSION_TTL_SECS` | Session lifetime in seconds | `3600` |
//! | `COOKIE_SECURE` | Set the `Secure` cookie attribute | `true` |
//! | `ALLOWED_ORIGINS` | Comma-separated browser origins for CORS | Frontend URL |
//! | `GENERATION_SERVICE_URL` | Base URL of the generation upstream | Required |
//! | `RAG_SERVICE_URL` | Base URL of the RAG upstream | Required |
//! | `UPSTREAM_TIMEOUT_SECS` | Per-request timeout for proxied calls | `30` |
//! | `JWKS_CACHE_TTL_SECS` | JWKS cache TTL | `300` |
//! | `CLOCK_SKEW_SECS` | Leeway for `exp`/`iat` validation | `60` |
//! | `DATA_DIR` | Directory holding the user database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Minimum accepted length of `SESSION_SECRET`, in bytes.
///
/// Anything shorter than the HMAC-SHA256 output size weakens the MAC.
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Configuration error, fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Immutable runtime configuration, shared via `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Expected `iss` claim (exact match).
    pub issuer_url: String,
    /// Provider JWKS endpoint.
    pub jwks_url: String,
    /// Provider authorization endpoint (browser is redirected here).
    pub authorize_url: String,
    /// Provider token endpoint (server-to-server code exchange).
    pub token_url: String,
    /// OAuth client identifier; also the expected `aud` claim.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Authorized redirect URI under this gateway's control.
    pub redirect_uri: String,
    /// Browser application base URL.
    pub frontend_url: String,
    /// HMAC key for session cookie signing.
    pub session_secret: Vec<u8>,
    /// Session lifetime.
    pub session_ttl: Duration,
    /// Whether cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    /// Allowed browser origins for CORS.
    pub allowed_origins: Vec<String>,
    /// Base URL of the generation upstream.
    pub generation_service_url: String,
    /// Base URL of the RAG upstream.
    pub rag_service_url: String,
    /// Timeout for proxied upstream calls.
    pub upstream_timeout: Duration,
    /// JWKS cache TTL.
    pub jwks_cache_ttl: Duration,
    /// Clock skew tolerance for token validation.
    pub clock_skew: Duration,
    /// Directory holding the user database file.
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let frontend_url = require_url("FRONTEND_URL")?;

        let allowed_origins = match env::var("ALLOWED_ORIGINS") {
            Ok(raw) => parse_origins(&raw),
            // Same-app deployments talk to the gateway from the frontend origin.
            Err(_) => vec![origin_of(&frontend_url)],
        };

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?
            .into_bytes();
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            });
        }

        Ok(Self {
            issuer_url: require_url("ISSUER_URL")?,
            jwks_url: require_url("JWKS_URL")?,
            authorize_url: require_url("AUTHORIZE_URL")?,
            token_url: require_url("TOKEN_URL")?,
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
            redirect_uri: require_url("REDIRECT_URI")?,
            frontend_url,
            session_secret,
            session_ttl: duration_secs("SESSION_TTL_SECS", 3600)?,
            cookie_secure: bool_var("COOKIE_SECURE", true)?,
            allowed_origins,
            generation_service_url: require_url("GENERATION_SERVICE_URL")?,
            rag_service_url: require_url("RAG_SERVICE_URL")?,
            upstream_timeout: duration_secs("UPSTREAM_TIMEOUT_SECS", 30)?,
            jwks_cache_ttl: duration_secs("JWKS_CACHE_TTL_SECS", 300)?,
            clock_skew: duration_secs("CLOCK_SKEW_SECS", 60)?,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/data")),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value)
}

fn require_url(name: &'static str) -> Result<String, ConfigError> {
    let value = require(name)?;
    Url::parse(&value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    Ok(value)
}

fn duration_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse::<bool>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Split a comma-separated origin list, dropping empty entries.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reduce a URL to its origin (scheme://host[:port]).
fn origin_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => url.to_string(),
    }
}
