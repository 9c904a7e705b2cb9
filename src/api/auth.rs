// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login-flow endpoints.
//!
//! The browser is redirected to the provider's hosted login page and comes
//! back through the callback; on success the only credential it holds is the
//! gateway's own session cookie. Callback failures redirect to the frontend
//! with a machine-readable `auth_error` code instead of rendering an error
//! page of their own.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::session::{SESSION_COOKIE, STATE_COOKIE};
use crate::state::AppState;

/// A 302 Found redirect.
///
/// `axum::response::Redirect` only emits 303/307/308; the login flow uses
/// the classic 302 that browsers and OAuth providers expect.
pub struct Found(String);

impl Found {
    fn to(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.0)]).into_response()
    }
}

/// Query parameters the provider sends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Set instead of `code` when the provider refuses authorization.
    #[serde(default)]
    pub error: Option<String>,
}

/// Response for POST /v1/auth/logout
#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub status: String,
}

/// Response for GET /v1/auth/status
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Whether a session cookie is present. Advisory only; protected
    /// endpoints re-validate the session on every request.
    pub authenticated: bool,
}

/// Start the login flow.
///
/// Issues a single-use CSRF nonce and redirects the browser to the
/// provider's authorization endpoint.
#[utoipa::path(
    get,
    path = "/v1/auth/login",
    tag = "Auth",
    responses(
        (status = 302, description = "Redirect to the provider's hosted login page"),
    )
)]
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Found) {
    let nonce = Uuid::new_v4().to_string();
    let target = state.oauth.authorize_redirect(&nonce);
    let jar = jar.add(state.sessions.state_cookie(nonce));

    (jar, Found::to(target))
}

/// Handle the provider's authorization callback.
///
/// On success the browser lands on the frontend dashboard with a fresh
/// session cookie; on any failure it lands on the frontend root with an
/// `auth_error` query parameter. No local state is created on failure.
#[utoipa::path(
    get,
    path = "/v1/auth/callback",
    tag = "Auth",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Echoed CSRF nonce"),
        ("error" = Option<String>, Query, description = "Provider error code"),
    ),
    responses(
        (status = 302, description = "Redirect to the frontend"),
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> (CookieJar, Found) {
    // The nonce is single-use: cleared up front, whatever the outcome.
    let expected_nonce = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(state.sessions.clear_state_cookie());

    if let Some(provider_error) = query.error {
        tracing::warn!(%provider_error, "provider refused authorization");
        return failure_redirect(&state, jar, "provider_error");
    }

    let (code, echoed_state) = match (query.code, query.state) {
        (Some(code), Some(echoed)) => (code, echoed),
        _ => {
            tracing::warn!("callback missing code or state");
            return failure_redirect(&state, jar, "invalid_callback");
        }
    };

    match expected_nonce {
        Some(nonce) if nonce == echoed_state => {}
        _ => {
            tracing::warn!("callback state does not match the login nonce");
            return failure_redirect(&state, jar, "state_mismatch");
        }
    }

    let tokens = match state.oauth.exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::warn!(error_code = err.error_code(), "code exchange failed: {err}");
            return failure_redirect(&state, jar, err.error_code());
        }
    };

    let identity = match state.verifier.verify(&tokens.id_token).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(error_code = err.error_code(), "id token rejected: {err}");
            return failure_redirect(&state, jar, err.error_code());
        }
    };

    // Provisioning is keyed on email; a token without one cannot log in.
    let Some(email) = identity.email else {
        tracing::warn!(subject = %identity.subject, "id token carries no email claim");
        return failure_redirect(&state, jar, "missing_email");
    };

    let user = match state
        .users
        .upsert(&identity.subject, &email, identity.display_name.as_deref())
    {
        Ok(user) => user,
        Err(err) => {
            tracing::error!("user provisioning failed: {err}");
            return failure_redirect(&state, jar, "internal_error");
        }
    };

    let token = state.sessions.issue(user.id);
    let jar = jar.add(state.sessions.session_cookie(token));

    tracing::info!(user_id = %user.id, "login completed");

    let dashboard = format!(
        "{}/dashboard",
        state.config.frontend_url.trim_end_matches('/')
    );
    (jar, Found::to(dashboard))
}

/// End the session.
///
/// Clears the session cookie; a self-contained session holds no server-side
/// state, so repeating the call is a no-op.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cleared", body = LogoutResponse),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let jar = jar.add(state.sessions.clear_session_cookie());
    (
        jar,
        Json(LogoutResponse {
            status: "logged_out".to_string(),
        }),
    )
}

/// Report whether the browser currently carries a session cookie.
#[utoipa::path(
    get,
    path = "/v1/auth/status",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cookie presence", body = StatusResponse),
    )
)]
pub async fn status(jar: CookieJar) -> Json<StatusResponse> {
    Json(StatusResponse {
        authenticated: jar.get(SESSION_COOKIE).is_some(),
    })
}

fn failure_redirect(
    state: &AppState,
    jar: CookieJar,
    error_code: &str,
) -> (CookieJar, Found) {
    let url = format!(
        "{}/?auth_error={error_code}",
        state.config.frontend_url.trim_end_matches('/')
    );
    (jar, Found::to(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::response::IntoResponse;
    use tempfile::TempDir;
    use url::Url;

    use crate::state::test_support::test_state;

    fn location_of(response: axum::response::Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn login_sets_nonce_and_redirects_to_provider() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let (jar, redirect) = login(State(state), CookieJar::new()).await;

        let nonce = jar.get(STATE_COOKIE).unwrap().value().to_string();
        assert!(!nonce.is_empty());

        let location = Url::parse(&location_of(redirect.into_response())).unwrap();
        assert_eq!(location.host_str(), Some("idp.example.com"));
        let params: std::collections::HashMap<_, _> =
            location.query_pairs().into_owned().collect();
        assert_eq!(params["state"], nonce);
        assert_eq!(params["response_type"], "code");
    }

    #[tokio::test]
    async fn provider_error_redirects_to_frontend_with_code() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let query = CallbackQuery {
            code: None,
            state: None,
            error: Some("access_denied".to_string()),
        };
        let (jar, redirect) = callback(State(state), CookieJar::new(), Query(query)).await;

        assert!(location_of(redirect.into_response()).contains("auth_error=provider_error"));
        assert!(jar.get(SESSION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn mismatched_state_is_rejected_without_exchange() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let jar = CookieJar::new().add(state.sessions.state_cookie("real-nonce".to_string()));
        let query = CallbackQuery {
            code: Some("some-code".to_string()),
            state: Some("forged-nonce".to_string()),
            error: None,
        };
        let (jar, redirect) = callback(State(state), jar, Query(query)).await;

        assert!(location_of(redirect.into_response()).contains("auth_error=state_mismatch"));
        assert!(jar.get(SESSION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn missing_state_cookie_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let query = CallbackQuery {
            code: Some("some-code".to_string()),
            state: Some("any-nonce".to_string()),
            error: None,
        };
        let (_jar, redirect) = callback(State(state), CookieJar::new(), Query(query)).await;

        assert!(location_of(redirect.into_response()).contains("auth_error=state_mismatch"));
    }

    #[tokio::test]
    async fn failed_exchange_redirects_with_exchange_failed() {
        // The token endpoint in the test config is unroutable, so a
        // correctly CSRF-checked callback fails at the exchange step.
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let jar = CookieJar::new().add(state.sessions.state_cookie("nonce-1".to_string()));
        let query = CallbackQuery {
            code: Some("some-code".to_string()),
            state: Some("nonce-1".to_string()),
            error: None,
        };
        let (jar, redirect) = callback(State(state), jar, Query(query)).await;

        assert!(location_of(redirect.into_response()).contains("auth_error=exchange_failed"));
        assert!(jar.get(SESSION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn logout_clears_the_session_cookie() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let jar = CookieJar::new().add(state.sessions.session_cookie("token".to_string()));
        let (jar, Json(body)) = logout(State(state), jar).await;

        assert_eq!(body.status, "logged_out");
        let cleared = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(time::Duration::seconds(0)));
    }

    #[tokio::test]
    async fn status_reflects_cookie_presence() {
        let Json(anonymous) = status(CookieJar::new()).await;
        assert!(!anonymous.authenticated);

        let jar =
            CookieJar::new().add(axum_extra::extract::cookie::Cookie::new(SESSION_COOKIE, "t"));
        let Json(present) = status(jar).await;
        assert!(present.authenticated);
    }
}
