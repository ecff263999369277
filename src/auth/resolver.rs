// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maps verified claims to a local user, provisioning it on first sight.

use std::sync::Arc;

use super::claims::FirebaseClaims;
use super::directory::ProviderDirectory;
use super::error::AuthError;
use crate::storage::{StoreError, UidField, User, UserStore};

/// Resolves the local [`User`] for a set of verified claims.
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
    directory: Arc<dyn ProviderDirectory>,
    uid_field: UidField,
    require_verified_email: bool,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn UserStore>,
        directory: Arc<dyn ProviderDirectory>,
        uid_field: UidField,
        require_verified_email: bool,
    ) -> Self {
        Self {
            store,
            directory,
            uid_field,
            require_verified_email,
        }
    }

    /// Return the user matching `claims.uid`, creating it if needed.
    ///
    /// Existing users are returned as stored; their email is never refreshed
    /// from the provider.
    pub async fn resolve(&self, claims: &FirebaseClaims) -> Result<User, AuthError> {
        if claims.is_anonymous() {
            return Err(AuthError::UnsupportedAuthMethod);
        }

        let uid = claims.uid.as_str();

        if self.require_verified_email && !claims.email_verified {
            return Err(AuthError::UnverifiedEmail);
        }

        if let Some(user) = self.find(uid)? {
            return Ok(user);
        }

        self.provision(uid).await
    }

    fn find(&self, uid: &str) -> Result<Option<User>, AuthError> {
        self.store
            .find_user(self.uid_field, uid)
            .map_err(|e| AuthError::UserProvisioningFailed(e.to_string()))
    }

    async fn provision(&self, uid: &str) -> Result<User, AuthError> {
        let record = self.directory.fetch_user(uid).await.map_err(|e| {
            tracing::error!(uid, error = %e, "Failed to fetch provider user record");
            AuthError::UserProvisioningFailed(e.to_string())
        })?;
        let email = record.email.as_deref().unwrap_or_default();

        match self.store.create_user(self.uid_field, uid, email) {
            Ok(user) => {
                tracing::info!(uid, user_id = %user.id, field = %self.uid_field, "Provisioned local user");
                Ok(user)
            }
            Err(StoreError::ConstraintViolation(reason)) => {
                // A concurrent first login won the insert
                tracing::info!(uid, %reason, "User created concurrently, using existing record");
                self.find(uid)?.ok_or_else(|| {
                    tracing::error!(uid, %reason, "Constraint violation but no user under this uid");
                    AuthError::UserProvisioningFailed(reason)
                })
            }
            Err(e) => {
                tracing::error!(uid, error = %e, "Failed to create local user");
                Err(AuthError::UserProvisioningFailed(e.to_string()))
            }
        }
    }
}
