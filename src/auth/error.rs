// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication failure.
///
/// Every variant aborts the authentication attempt. The messages are the
/// ones shown to API clients; token rejections share a single
/// message regardless of the underlying reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Authorization header has the wrong shape
    MalformedCredential(MalformedReason),
    /// Token could not be parsed
    InvalidToken,
    /// Token is expired, revoked or otherwise invalid
    TokenRejected,
    /// Anonymous Firebase session
    UnsupportedAuthMethod,
    /// Verified email is required but the token's email is unverified
    UnverifiedEmail,
    /// A handler required authentication but none was supplied
    NotAuthenticated,
    /// Token signing keys could not be fetched
    KeyFetchFailed(String),
    /// Local user lookup or creation failed
    UserProvisioningFailed(String),
}

/// Why an Authorization header was rejected as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Only the scheme was supplied
    NoCredentials,
    /// More than one token follows the scheme
    ContainsSpaces,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MalformedCredential(_) => "malformed_credential",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenRejected => "token_rejected",
            AuthError::UnsupportedAuthMethod => "unsupported_auth_method",
            AuthError::UnverifiedEmail => "unverified_email",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::KeyFetchFailed(_) => "key_fetch_failed",
            AuthError::UserProvisioningFailed(_) => "user_provisioning_failed",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::KeyFetchFailed(_) | AuthError::UserProvisioningFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Attach a `WWW-Authenticate` challenge to the response for 401s.
    pub fn into_challenge_response(self, challenge: &str) -> Response {
        let status = self.status_code();
        let mut response = self.into_response();
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(value) = HeaderValue::from_str(challenge) {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MalformedCredential(MalformedReason::NoCredentials) => {
                write!(f, "Invalid Authorization header. No credentials provided.")
            }
            AuthError::MalformedCredential(MalformedReason::ContainsSpaces) => write!(
                f,
                "Invalid Authorization header. Credentials string should not contain spaces."
            ),
            AuthError::InvalidToken => write!(f, "Invalid token."),
            AuthError::TokenRejected => write!(f, "Could not log in."),
            AuthError::UnsupportedAuthMethod => {
                write!(f, "Firebase anonymous sign-in is not supported.")
            }
            AuthError::UnverifiedEmail => write!(f, "User email not yet confirmed."),
            AuthError::NotAuthenticated => {
                write!(f, "Authentication credentials were not provided.")
            }
            AuthError::KeyFetchFailed(_) => write!(f, "Could not fetch token signing keys."),
            AuthError::UserProvisioningFailed(_) => write!(f, "Could not provision user account."),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
