// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-wide Firebase handle.
//!
//! Built once at startup from the service-account credential and shared by
//! the token verifier and the provider directory. Holds the project ID, the
//! HTTP client, and an OAuth2 access token minted from the service account
//! (JWT bearer grant, RFC 7523) for Admin API calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Scopes requested for Admin API access tokens.
const ADMIN_SCOPES: &str = "https://www.googleapis.com/auth/cloud-platform \
https://www.googleapis.com/auth/firebase \
https://www.googleapis.com/auth/identitytoolkit \
https://www.googleapis.com/auth/userinfo.email";

/// Default OAuth2 token endpoint for service accounts.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Access tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Service-account credential errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read credential file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse credential: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("credential type must be 'service_account', got '{0}'")]
    NotServiceAccount(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("access token request failed: {0}")]
    TokenRequest(String),

    #[error("no project ID configured")]
    MissingProjectId,
}

/// Service-account key file as downloaded from the Firebase console.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Usable until the refresh margin before expiry.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        TimeDelta::try_seconds(TOKEN_REFRESH_MARGIN_SECS)
            .and_then(|margin| self.expires_at.checked_sub_signed(margin))
            .is_some_and(|refresh_at| refresh_at > now)
    }
}

/// A loaded service account able to mint access tokens.
pub struct ServiceAccount {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccount {
    /// Load a service-account key file.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse a service-account key from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let key: ServiceAccountKey = serde_json::from_str(raw)?;
        if key.key_type != "service_account" {
            return Err(CredentialError::NotServiceAccount(key.key_type));
        }
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key,
            encoding_key,
            cached: RwLock::new(None),
        })
    }

    /// Project ID recorded in the key file.
    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    /// Service-account email.
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Build the signed JWT assertion exchanged for an access token.
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: ADMIN_SCOPES,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))
    }

    /// Return a cached access token, or mint a new one.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, CredentialError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.token.clone());
            }
        }

        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;
        let response = client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::TokenRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CredentialError::TokenRequest(format!(
                "HTTP {} from token endpoint",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::TokenRequest(e.to_string()))?;

        let expires_at = TimeDelta::try_seconds(body.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                CredentialError::TokenRequest(format!("invalid expires_in {}", body.expires_in))
            })?;

        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });
        tracing::debug!(client_email = %self.key.client_email, "Minted Admin API access token");

        Ok(body.access_token)
    }
}

/// Shared Firebase handle injected into the verifier and directory.
#[derive(Clone)]
pub struct FirebaseApp {
    project_id: String,
    service_account: Option<Arc<ServiceAccount>>,
    emulator_host: Option<String>,
    client: reqwest::Client,
}

impl FirebaseApp {
    /// Initialize from a service account. `project_id` overrides the one in
    /// the key file.
    pub fn new(
        service_account: Option<ServiceAccount>,
        project_id: Option<String>,
        emulator_host: Option<String>,
    ) -> Result<Self, CredentialError> {
        let project_id = project_id
            .or_else(|| {
                service_account
                    .as_ref()
                    .and_then(|sa| sa.project_id().map(str::to_string))
            })
            .filter(|id| !id.is_empty())
            .ok_or(CredentialError::MissingProjectId)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CredentialError::TokenRequest(e.to_string()))?;

        Ok(Self {
            project_id,
            service_account: service_account.map(Arc::new),
            emulator_host,
            client,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `host:port` of the Auth emulator, when running against it.
    pub fn emulator_host(&self) -> Option<&str> {
        self.emulator_host.as_deref()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Bearer token for Admin API calls. The emulator accepts `owner`.
    pub async fn admin_token(&self) -> Result<String, CredentialError> {
        if self.emulator_host.is_some() {
            return Ok("owner".to_string());
        }
        match &self.service_account {
            Some(sa) => sa.access_token(&self.client).await,
            None => Err(CredentialError::TokenRequest(
                "no service account configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_service_account_json() -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": "demo-project",
        "private_key_id": "test-key-id",
        "private_key": include_str!("testdata/signing_key.pem"),
        "client_email": "firebase-adminsdk@demo-project.iam.gserviceaccount.com",
        "token_uri": "https://oauth2.googleapis.com/token"
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_server;
    use axum::{http::StatusCode, routing::post, Form, Json, Router};
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize)]
    struct DecodedAssertion {
        iss: String,
        aud: String,
        scope: String,
        iat: i64,
        exp: i64,
    }

    #[test]
    fn loads_service_account() {
        let sa = ServiceAccount::from_json(&test_service_account_json()).unwrap();
        assert_eq!(sa.project_id(), Some("demo-project"));
        assert_eq!(
            sa.client_email(),
            "firebase-adminsdk@demo-project.iam.gserviceaccount.com"
        );
    }

    #[test]
    fn rejects_non_service_account_credentials() {
        let raw = serde_json::json!({
            "type": "authorized_user",
            "private_key": "x",
            "client_email": "x"
        })
        .to_string();
        assert!(matches!(
            ServiceAccount::from_json(&raw),
            Err(CredentialError::NotServiceAccount(_))
        ));
    }

    #[test]
    fn rejects_bad_private_key() {
        let raw = serde_json::json!({
            "type": "service_account",
            "private_key": "not a pem",
            "client_email": "x@example.com"
        })
        .to_string();
        assert!(matches!(
            ServiceAccount::from_json(&raw),
            Err(CredentialError::InvalidKey(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ServiceAccount::load(Path::new("/nonexistent/credential.json"));
        assert!(matches!(result, Err(CredentialError::Io { .. })));
    }

    #[test]
    fn assertion_is_signed_for_token_endpoint() {
        let sa = ServiceAccount::from_json(&test_service_account_json()).unwrap();
        let now = Utc::now();
        let assertion = sa.signed_assertion(now).unwrap();

        let n = include_str!("testdata/signing_key.n");
        let key = DecodingKey::from_rsa_components(n, "AQAB").unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth2.googleapis.com/token"]);
        let data = decode::<DecodedAssertion>(&assertion, &key, &validation).unwrap();

        assert_eq!(data.header.kid.as_deref(), Some("test-key-id"));
        assert_eq!(
            data.claims.iss,
            "firebase-adminsdk@demo-project.iam.gserviceaccount.com"
        );
        assert_eq!(data.claims.aud, "https://oauth2.googleapis.com/token");
        assert!(data.claims.scope.contains("identitytoolkit"));
        assert_eq!(data.claims.exp - data.claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn project_id_override_and_requirement() {
        let sa = ServiceAccount::from_json(&test_service_account_json()).unwrap();
        let app = FirebaseApp::new(Some(sa), Some("other-project".to_string()), None).unwrap();
        assert_eq!(app.project_id(), "other-project");

        assert!(matches!(
            FirebaseApp::new(None, None, None),
            Err(CredentialError::MissingProjectId)
        ));
    }

    /// Service account whose token endpoint answers `expires_in` with the
    /// given status, counting exchanges.
    async fn account_with_token_endpoint(
        status: StatusCode,
        expires_in: i64,
    ) -> (ServiceAccount, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(
                        form.get("grant_type").map(String::as_str),
                        Some("urn:ietf:params:oauth:grant-type:jwt-bearer")
                    );
                    assert_eq!(form.get("assertion").map(|a| a.split('.').count()), Some(3));
                    let body = serde_json::json!({
                        "access_token": format!("ya29.token-{}", counter.load(Ordering::SeqCst)),
                        "expires_in": expires_in,
                        "token_type": "Bearer"
                    });
                    (status, Json(body))
                }
            }),
        );
        let addr = test_server::spawn(router).await;

        let mut key: serde_json::Value =
            serde_json::from_str(&test_service_account_json()).unwrap();
        key["token_uri"] = format!("http://{addr}/token").into();
        let sa = ServiceAccount::from_json(&key.to_string()).unwrap();
        (sa, hits)
    }

    #[tokio::test]
    async fn access_token_is_cached_until_refresh_margin() {
        let (sa, hits) = account_with_token_endpoint(StatusCode::OK, 3600).await;
        let client = reqwest::Client::new();

        let first = sa.access_token(&client).await.unwrap();
        let second = sa.access_token(&client).await.unwrap();
        assert_eq!(first, "ya29.token-1");
        assert_eq!(second, first);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_lived_token_is_refreshed() {
        let (sa, hits) =
            account_with_token_endpoint(StatusCode::OK, TOKEN_REFRESH_MARGIN_SECS - 1).await;
        let client = reqwest::Client::new();

        sa.access_token(&client).await.unwrap();
        let second = sa.access_token(&client).await.unwrap();
        assert_eq!(second, "ya29.token-2");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_endpoint_error_is_reported() {
        let (sa, _hits) = account_with_token_endpoint(StatusCode::BAD_REQUEST, 3600).await;
        let result = sa.access_token(&reqwest::Client::new()).await;
        assert!(matches!(result, Err(CredentialError::TokenRequest(_))));
    }

    #[tokio::test]
    async fn absurd_expires_in_is_rejected() {
        let client = reqwest::Client::new();
        for expires_in in [i64::MAX, i64::MIN] {
            let (sa, _hits) = account_with_token_endpoint(StatusCode::OK, expires_in).await;
            let result = sa.access_token(&client).await;
            assert!(matches!(result, Err(CredentialError::TokenRequest(_))));
        }
    }

    #[test]
    fn cached_token_freshness() {
        let now = Utc::now();
        let token = |secs: i64| CachedToken {
            token: "t".to_string(),
            expires_at: now + TimeDelta::seconds(secs),
        };
        assert!(token(3600).is_fresh(now));
        assert!(!token(TOKEN_REFRESH_MARGIN_SECS).is_fresh(now));

        let far_past = CachedToken {
            token: "t".to_string(),
            expires_at: DateTime::<Utc>::MIN_UTC,
        };
        assert!(!far_past.is_fresh(now));
    }

    #[tokio::test]
    async fn emulator_uses_owner_token() {
        let app = FirebaseApp::new(
            None,
            Some("demo-project".to_string()),
            Some("localhost:9099".to_string()),
        )
        .unwrap();
        assert_eq!(app.admin_token().await.unwrap(), "owner");
    }
}
