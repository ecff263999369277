// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Authenticates each request once and stores the [`AuthenticatedUser`] in
//! the request extensions, where the extractors pick it up. Requests without
//! a bearer credential pass through anonymously; handlers that need a user
//! reject them via [`Auth`](super::Auth).
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
//!     .with_state(state);
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request.headers().get(AUTHORIZATION).cloned();
    let result = state
        .authenticator
        .authenticate_request(header.as_ref())
        .await;

    match result {
        Ok(Some(user)) => {
            tracing::debug!(user_id = %user.user.id, uid = %user.claims.uid, "Authenticated request");
            request.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::info!(error_code = e.error_code(), path = %request.uri().path(), "Authentication failed");
            return e.into_challenge_response(&state.authenticator.authenticate_header());
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, OptionalAuth};
    use crate::auth::verifier::testing::{sign, valid_payload, KID};
    use crate::state::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header::WWW_AUTHENTICATE, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn whoami(OptionalAuth(user): OptionalAuth) -> String {
        user.map(|u| u.user.username).unwrap_or_else(|| "anonymous".to_string())
    }

    async fn from_extension(Extension(user): Extension<AuthenticatedUser>) -> String {
        user.claims.uid
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/ext", get(from_extension))
            .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_requests_pass_through() {
        let (state, _dir) = test_state(false);
        let response = app(state)
            .oneshot(axum::http::Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn valid_token_sets_extension() {
        let (state, _dir) = test_state(false);
        let token = sign(&valid_payload("mw-user"), Some(KID));
        let response = app(state)
            .oneshot(
                axum::http::Request::get("/ext")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "mw-user");
    }

    #[tokio::test]
    async fn bad_token_is_challenged() {
        let (state, _dir) = test_state(false);
        let response = app(state)
            .oneshot(
                axum::http::Request::get("/whoami")
                    .header("Authorization", "Bearer")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"api\""
        );

        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error_code"], "malformed_credential");
    }
}
