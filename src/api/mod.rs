// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderValue, Method},
    routing::{any, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod auth;
pub mod health;
pub mod proxy;
pub mod users;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let v1_routes = Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/status", get(auth::status))
        .route("/users/me", get(users::get_current_user))
        .route("/proxy/{service}/{*path}", any(proxy::relay));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Credentialed CORS restricted to the configured browser origins.
///
/// Cookies only flow cross-origin with `allow_credentials`, which in turn
/// forbids a wildcard origin; the origin list is explicit.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::callback,
        auth::logout,
        auth::status,
        users::get_current_user,
        proxy::relay,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            auth::LogoutResponse,
            auth::StatusResponse,
            users::UserResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Login flow and session lifecycle"),
        (name = "Users", description = "Provisioned user profiles"),
        (name = "Proxy", description = "Authenticated relay to internal services"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
