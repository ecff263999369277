// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authenticate operation: header → verified claims → local user.

use std::sync::Arc;

use axum::http::HeaderValue;

use super::claims::{AuthenticatedUser, FirebaseClaims};
use super::error::AuthError;
use super::header::{challenge, extract_credential};
use super::resolver::IdentityResolver;
use super::verifier::TokenVerifier;
use crate::storage::User;

/// Scheme prefix and realm used in the `Authorization` and
/// `WWW-Authenticate` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeSettings {
    pub header_prefix: String,
    pub realm: String,
}

impl Default for SchemeSettings {
    fn default() -> Self {
        Self {
            header_prefix: "Bearer".to_string(),
            realm: "api".to_string(),
        }
    }
}

/// Firebase bearer-token authenticator.
pub struct FirebaseAuthenticator {
    scheme: SchemeSettings,
    verifier: Arc<dyn TokenVerifier>,
    resolver: IdentityResolver,
}

impl FirebaseAuthenticator {
    pub fn new(
        scheme: SchemeSettings,
        verifier: Arc<dyn TokenVerifier>,
        resolver: IdentityResolver,
    ) -> Self {
        Self {
            scheme,
            verifier,
            resolver,
        }
    }

    /// Authenticate a request from its `Authorization` header.
    ///
    /// `Ok(None)` means no credential for this scheme was supplied; the
    /// request is neither authenticated nor rejected.
    pub async fn authenticate(
        &self,
        header: Option<&HeaderValue>,
    ) -> Result<Option<(User, FirebaseClaims)>, AuthError> {
        let Some(token) = extract_credential(header, &self.scheme.header_prefix)? else {
            return Ok(None);
        };

        let claims = self.verifier.verify_token(&token).await.map_err(|e| {
            tracing::debug!(reason = %e, "Rejected ID token");
            AuthError::from(e)
        })?;

        let user = self.resolver.resolve(&claims).await?;
        Ok(Some((user, claims)))
    }

    /// Same as [`authenticate`](Self::authenticate), packaged for request extensions.
    pub async fn authenticate_request(
        &self,
        header: Option<&HeaderValue>,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        Ok(self
            .authenticate(header)
            .await?
            .map(|(user, claims)| AuthenticatedUser { user, claims }))
    }

    /// Value for the `WWW-Authenticate` header on 401 responses.
    pub fn authenticate_header(&self) -> String {
        challenge(&self.scheme.header_prefix, &self.scheme.realm)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::auth::jwks::{test_jwk_set, JwksManager};
    use crate::auth::resolver::fakes::StubDirectory;
    use crate::auth::verifier::testing::{KID, PROJECT};
    use crate::auth::verifier::FirebaseTokenVerifier;
    use crate::storage::{UidField, UserDatabase};
    use tempfile::TempDir;

    /// Authenticator over the fixture signing key and a temporary store.
    pub fn test_authenticator(
        require_verified_email: bool,
    ) -> (FirebaseAuthenticator, Arc<UserDatabase>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(UserDatabase::open(&dir.path().join("users.redb")).unwrap());
        let verifier = FirebaseTokenVerifier::new(
            PROJECT,
            JwksManager::with_static_keys(test_jwk_set(KID)),
        );
        let resolver = IdentityResolver::new(
            store.clone(),
            Arc::new(StubDirectory::with_email("provider@example.com")),
            UidField::Username,
            require_verified_email,
        );
        let authenticator =
            FirebaseAuthenticator::new(SchemeSettings::default(), Arc::new(verifier), resolver);
        (authenticator, store, dir)
    }
}
