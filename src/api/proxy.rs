// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated relay endpoint.
//!
//! `/v1/proxy/{service}/{path}` accepts any method; the session extractor
//! runs before anything touches the upstream, so an unauthenticated request
//! never leaves the gateway.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::extract::Session;
use crate::proxy::UpstreamService;
use crate::state::AppState;

/// Relay a request to an upstream service under the caller's identity.
#[utoipa::path(
    post,
    path = "/v1/proxy/{service}/{path}",
    tag = "Proxy",
    params(
        ("service" = String, Path, description = "Upstream service name"),
        ("path" = String, Path, description = "Path forwarded to the upstream"),
    ),
    request_body(content = String, description = "Raw body forwarded to the upstream"),
    responses(
        (status = 200, description = "Upstream response, relayed verbatim"),
        (status = 401, description = "Missing, invalid, or expired session"),
        (status = 404, description = "Unknown upstream service"),
        (status = 502, description = "Upstream unreachable"),
        (status = 504, description = "Upstream timed out"),
    )
)]
pub async fn relay(
    State(state): State<AppState>,
    Session(user): Session,
    Path((service, path)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(service) = UpstreamService::from_path_segment(&service) else {
        return ApiError::not_found("Unknown service").into_response();
    };

    match state
        .proxy
        .forward(
            service,
            &path,
            query.as_deref(),
            method,
            &headers,
            body,
            user.id,
        )
        .await
    {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}
