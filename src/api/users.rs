// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::extract::Session;
use crate::users::User;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    /// Internal stable user id
    pub id: Uuid,
    /// Provider-issued subject identifier
    pub external_subject: String,
    /// Email address from the latest login
    pub email: String,
    /// Display name, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// When the user was first provisioned
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            external_subject: user.external_subject,
            email: user.email,
            full_name: user.full_name,
            created_at: user.created_at,
        }
    }
}

/// Get the current authenticated user's profile.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 401, description = "Missing, invalid, or expired session"),
    )
)]
pub async fn get_current_user(Session(user): Session) -> Json<UserResponse> {
    Json(user.into())
}
