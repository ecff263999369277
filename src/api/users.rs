// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::claims::ClaimsSummary;
use crate::auth::Auth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::User;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// The local user record
    pub user: User,
    /// Claims of the token used for this request
    pub claims: ClaimsSummary,
}

/// Get the current authenticated user.
///
/// The first call with a new Firebase account provisions the local user.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Missing, invalid or rejected token"),
        (status = 404, description = "User record no longer exists"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<UserMeResponse>, ApiError> {
    let user = state
        .users
        .get_user(&auth.user.id.to_string())?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserMeResponse {
        user,
        claims: ClaimsSummary::from(&auth.claims),
    }))
}
