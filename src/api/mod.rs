// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{claims::ClaimsSummary, middleware::auth_middleware},
    state::AppState,
    storage::User,
};

pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health::liveness, health::readiness, users::get_current_user),
    components(
        schemas(
            User,
            ClaimsSummary,
            users::UserMeResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Users", description = "Firebase-authenticated user accounts")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::testing::{sign, unsigned, valid_payload, KID};
    use crate::state::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header::WWW_AUTHENTICATE, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn get(app: Router, uri: &str, authorization: Option<&str>) -> axum::response::Response {
        let mut builder = Request::get(uri);
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _dir) = test_state(false);
        let response = get(router(state), "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn users_me_provisions_once() {
        let (state, _dir) = test_state(false);
        let token = sign(&valid_payload("router-user"), Some(KID));
        let bearer = format!("Bearer {token}");

        let first = get(router(state.clone()), "/v1/users/me", Some(&bearer)).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = get(router(state.clone()), "/v1/users/me", Some(&bearer)).await;
        assert_eq!(second.status(), StatusCode::OK);

        let first: serde_json::Value =
            serde_json::from_slice(&to_bytes(first.into_body(), usize::MAX).await.unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_slice(&to_bytes(second.into_body(), usize::MAX).await.unwrap())
                .unwrap();
        assert_eq!(first["user"]["id"], second["user"]["id"]);
        assert_eq!(state.users.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn unsigned_token_is_rejected_with_challenge() {
        let (state, _dir) = test_state(false);
        let token = unsigned(&valid_payload("forger"));
        let response = get(router(state.clone()), "/v1/users/me", Some(&format!("Bearer {token}"))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"api\""
        );
        assert_eq!(state.users.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn other_schemes_are_not_authenticated() {
        let (state, _dir) = test_state(false);
        let response = get(router(state), "/v1/users/me", Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
                .unwrap();
        assert_eq!(body["error_code"], "not_authenticated");
    }

    #[test]
    fn openapi_documents_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["paths"]["/v1/users/me"].is_object());
        assert_eq!(
            json["components"]["securitySchemes"]["bearer"]["scheme"],
            "bearer"
        );
    }
}
