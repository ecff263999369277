// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase ID token claims and the authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::User;

/// Sign-in provider reported for anonymous Firebase sessions.
pub const ANONYMOUS_PROVIDER: &str = "anonymous";

/// Claims carried by a verified Firebase ID token.
///
/// See: https://firebase.google.com/docs/auth/admin/verify-id-tokens
///
/// `sub` and `firebase.sign_in_provider` are required; a token without them
/// does not deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirebaseClaims {
    /// Firebase user ID (the `sub` claim)
    #[serde(rename = "sub")]
    pub uid: String,

    /// Email address, absent for phone-only accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the provider has verified `email`
    #[serde(default)]
    pub email_verified: bool,

    /// Firebase-specific claims
    pub firebase: FirebaseInfo,

    /// Issuer (`https://securetoken.google.com/<project_id>`)
    #[serde(default)]
    pub iss: String,

    /// Audience (the project ID)
    #[serde(default)]
    pub aud: String,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// When the user originally signed in
    #[serde(default)]
    pub auth_time: i64,
}

/// The nested `firebase` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirebaseInfo {
    /// Provider used for this session (`password`, `google.com`, `anonymous`, ...)
    pub sign_in_provider: String,

    /// Provider-specific identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<serde_json::Value>,

    /// Tenant ID for multi-tenant projects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl FirebaseClaims {
    /// Whether this is an anonymous Firebase session.
    pub fn is_anonymous(&self) -> bool {
        self.firebase.sign_in_provider == ANONYMOUS_PROVIDER
    }
}

/// A request's authenticated identity: the local user and the token claims
/// it was resolved from.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: FirebaseClaims,
}

/// Public view of the token claims returned to API clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimsSummary {
    /// Firebase user ID
    pub uid: String,
    /// Sign-in provider for the current session
    pub sign_in_provider: String,
    /// Whether the token's email is verified
    pub email_verified: bool,
}

impl From<&FirebaseClaims> for ClaimsSummary {
    fn from(claims: &FirebaseClaims) -> Self {
        Self {
            uid: claims.uid.clone(),
            sign_in_provider: claims.firebase.sign_in_provider.clone(),
            email_verified: claims.email_verified,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_claims(uid: &str, provider: &str) -> FirebaseClaims {
    FirebaseClaims {
        uid: uid.to_string(),
        email: Some(format!("{uid}@example.com")),
        email_verified: true,
        firebase: FirebaseInfo {
            sign_in_provider: provider.to_string(),
            identities: None,
            tenant: None,
        },
        iss: "https://securetoken.google.com/demo-project".to_string(),
        aud: "demo-project".to_string(),
        iat: 1_700_000_000,
        exp: 1_700_003_600,
        auth_time: 1_700_000_000,
    }
}
