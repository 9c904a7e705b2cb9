// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request extractor for authenticated sessions.
//!
//! `Session` resolves the session cookie to a full user record, so protected
//! handlers receive a [`User`] and never see raw cookie material. Rejections
//! are uniform 401s; the precise reason only reaches the logs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use crate::session::{SessionError, SESSION_COOKIE};
use crate::state::AppState;
use crate::users::User;

/// The authenticated user behind a valid session cookie.
#[derive(Debug)]
pub struct Session(pub User);

impl FromRequestParts<AppState> for Session {
    type Rejection = SessionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar.get(SESSION_COOKIE).ok_or(SessionError::Missing)?;

        let user_id = state.sessions.resolve(cookie.value())?;

        // A valid signature does not prove the user still exists.
        let user = state
            .users
            .find_by_id(user_id)
            .map_err(|e| SessionError::Internal(e.to_string()))?;

        user.map(Session).ok_or(SessionError::OrphanedUser)
    }
}
