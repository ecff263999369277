// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user.user is the local User, user.claims the verified token claims
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Rejection carrying the `WWW-Authenticate` challenge for 401 responses.
#[derive(Debug)]
pub struct AuthRejection {
    pub error: AuthError,
    challenge: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        self.error.into_challenge_response(&self.challenge)
    }
}

/// Resolve the request's identity, preferring one set by the middleware.
async fn resolve(
    parts: &Parts,
    state: &AppState,
) -> Result<Option<AuthenticatedUser>, AuthRejection> {
    if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
        return Ok(Some(user));
    }

    state
        .authenticator
        .authenticate_request(parts.headers.get(AUTHORIZATION))
        .await
        .map_err(|error| AuthRejection {
            error,
            challenge: state.authenticator.authenticate_header(),
        })
}

/// Extractor for authenticated users.
///
/// Rejects with 401 `not_authenticated` when no bearer credential was sent.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) => Ok(Auth(user)),
            None => Err(AuthRejection {
                error: AuthError::NotAuthenticated,
                challenge: state.authenticator.authenticate_header(),
            }),
        }
    }
}

/// Optional authentication extractor.
///
/// Yields `None` when no credential was sent. A credential that fails
/// authentication is still rejected.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(resolve(parts, state).await?))
    }
}
