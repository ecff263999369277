// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider-side user records.
//!
//! The first time a `uid` authenticates, its canonical email comes from the
//! identity provider's user record rather than from the token. The same
//! record also backs the optional revocation check.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use url::Url;

use super::firebase_app::{CredentialError, FirebaseApp};

const IDENTITY_TOOLKIT_HOST: &str = "https://identitytoolkit.googleapis.com";

/// A user record as held by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub disabled: bool,
    /// Tokens issued before this instant are revoked.
    pub tokens_valid_after: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("no provider user with uid '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("user lookup failed: {0}")]
    Request(String),
}

/// Lookup of provider user records by `uid`.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn fetch_user(&self, uid: &str) -> Result<ProviderUserRecord, DirectoryError>;
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    disabled: bool,
    /// Seconds since the epoch, encoded as a string
    #[serde(default)]
    valid_since: Option<String>,
}

impl From<LookupUser> for ProviderUserRecord {
    fn from(user: LookupUser) -> Self {
        let tokens_valid_after = user
            .valid_since
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Self {
            uid: user.local_id,
            email: user.email.filter(|e| !e.is_empty()),
            email_verified: user.email_verified,
            disabled: user.disabled,
            tokens_valid_after,
        }
    }
}

/// [`ProviderDirectory`] backed by the Identity Toolkit `accounts:lookup` API.
#[derive(Clone)]
pub struct IdentityToolkitDirectory {
    app: FirebaseApp,
}

impl IdentityToolkitDirectory {
    pub fn new(app: FirebaseApp) -> Self {
        Self { app }
    }

    /// Endpoint for `accounts:lookup`, pointed at the emulator when configured.
    pub fn lookup_url(&self) -> Result<Url, DirectoryError> {
        let base = match self.app.emulator_host() {
            Some(host) => format!("http://{host}/identitytoolkit.googleapis.com"),
            None => IDENTITY_TOOLKIT_HOST.to_string(),
        };
        let url = format!(
            "{base}/v1/projects/{}/accounts:lookup",
            self.app.project_id()
        );
        Url::parse(&url).map_err(|e| DirectoryError::Request(format!("bad lookup URL: {e}")))
    }
}

#[async_trait]
impl ProviderDirectory for IdentityToolkitDirectory {
    async fn fetch_user(&self, uid: &str) -> Result<ProviderUserRecord, DirectoryError> {
        let token = self.app.admin_token().await?;
        let response = self
            .app
            .client()
            .post(self.lookup_url()?)
            .bearer_auth(token)
            .json(&serde_json::json!({ "localId": [uid] }))
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Request(format!(
                "HTTP {} from accounts:lookup",
                response.status()
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        body.users
            .into_iter()
            .find(|u| u.local_id == uid)
            .map(ProviderUserRecord::from)
            .ok_or_else(|| DirectoryError::NotFound(uid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_server;
    use axum::{
        http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode, Uri},
        response::IntoResponse,
        Json, Router,
    };
    use std::sync::{Arc, Mutex};

    #[test]
    fn lookup_response_maps_to_record() {
        let body: LookupResponse = serde_json::from_value(serde_json::json!({
            "kind": "identitytoolkit#GetAccountInfoResponse",
            "users": [{
                "localId": "uid-1",
                "email": "one@example.com",
                "emailVerified": true,
                "disabled": false,
                "validSince": "1700000000"
            }]
        }))
        .unwrap();

        let record: ProviderUserRecord = body.users.into_iter().next().unwrap().into();
        assert_eq!(record.uid, "uid-1");
        assert_eq!(record.email.as_deref(), Some("one@example.com"));
        assert!(record.email_verified);
        assert_eq!(
            record.tokens_valid_after.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn empty_lookup_response_has_no_users() {
        let body: LookupResponse =
            serde_json::from_value(serde_json::json!({ "kind": "x" })).unwrap();
        assert!(body.users.is_empty());
    }

    #[test]
    fn lookup_url_targets_project() {
        let app = FirebaseApp::new(None, Some("demo-project".to_string()), None).unwrap();
        let url = IdentityToolkitDirectory::new(app).lookup_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://identitytoolkit.googleapis.com/v1/projects/demo-project/accounts:lookup"
        );
    }

    #[test]
    fn lookup_url_targets_emulator() {
        let app = FirebaseApp::new(
            None,
            Some("demo-project".to_string()),
            Some("127.0.0.1:9099".to_string()),
        )
        .unwrap();
        let url = IdentityToolkitDirectory::new(app).lookup_url().unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9099/identitytoolkit.googleapis.com/v1/projects/demo-project/accounts:lookup"
        );
    }

    type SeenRequests = Arc<Mutex<Vec<(String, Option<String>, serde_json::Value)>>>;

    /// Emulator-backed directory whose lookup endpoint knows `known-uid`,
    /// fails for `broken-uid`, and records every request.
    async fn emulated_directory() -> (IdentityToolkitDirectory, SeenRequests) {
        let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let router = Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let log = log.clone();
                async move {
                    assert_eq!(method, Method::POST);
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    log.lock().unwrap().push((uri.path().to_string(), auth, body.clone()));

                    match body["localId"][0].as_str() {
                        Some("known-uid") => Json(serde_json::json!({
                            "users": [{
                                "localId": "known-uid",
                                "email": "known@example.com",
                                "emailVerified": false,
                                "disabled": true
                            }]
                        }))
                        .into_response(),
                        Some("broken-uid") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                        _ => Json(serde_json::json!({ "kind": "identitytoolkit#GetAccountInfoResponse" }))
                            .into_response(),
                    }
                }
            },
        );
        let addr = test_server::spawn(router).await;

        let app = FirebaseApp::new(
            None,
            Some("demo-project".to_string()),
            Some(addr.to_string()),
        )
        .unwrap();
        (IdentityToolkitDirectory::new(app), seen)
    }

    #[tokio::test]
    async fn fetch_user_posts_local_id_with_admin_token() {
        let (directory, seen) = emulated_directory().await;

        let record = directory.fetch_user("known-uid").await.unwrap();
        assert_eq!(record.uid, "known-uid");
        assert_eq!(record.email.as_deref(), Some("known@example.com"));
        assert!(!record.email_verified);
        assert!(record.disabled);
        assert!(record.tokens_valid_after.is_none());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (path, auth, body) = &seen[0];
        assert_eq!(
            path,
            "/identitytoolkit.googleapis.com/v1/projects/demo-project/accounts:lookup"
        );
        assert_eq!(auth.as_deref(), Some("Bearer owner"));
        assert_eq!(body, &serde_json::json!({ "localId": ["known-uid"] }));
    }

    #[tokio::test]
    async fn unknown_uid_is_not_found() {
        let (directory, _seen) = emulated_directory().await;
        let result = directory.fetch_user("ghost-uid").await;
        assert!(matches!(result, Err(DirectoryError::NotFound(uid)) if uid == "ghost-uid"));
    }

    #[tokio::test]
    async fn error_status_is_request_failure() {
        let (directory, _seen) = emulated_directory().await;
        let result = directory.fetch_user("broken-uid").await;
        assert!(matches!(result, Err(DirectoryError::Request(_))));
    }
}
