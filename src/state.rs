// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{FirebaseAuthenticator, JwksManager};
use crate::storage::UserDatabase;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<FirebaseAuthenticator>,
    pub users: Arc<UserDatabase>,
    /// Signing keys, absent when running against the Auth emulator
    pub keys: Option<JwksManager>,
}

impl AppState {
    pub fn new(
        authenticator: FirebaseAuthenticator,
        users: Arc<UserDatabase>,
        keys: Option<JwksManager>,
    ) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            users,
            keys,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state(require_verified_email: bool) -> (AppState, tempfile::TempDir) {
    use crate::auth::authenticator::testing::test_authenticator;
    use crate::auth::jwks::test_jwk_set;
    use crate::auth::verifier::testing::KID;

    let (authenticator, users, dir) = test_authenticator(require_verified_email);
    let keys = JwksManager::with_static_keys(test_jwk_set(KID));
    (AppState::new(authenticator, users, Some(keys)), dir)
}
