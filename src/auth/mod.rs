// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Firebase ID token authentication with lazily provisioned local users.
//!
//! ## Auth Flow
//!
//! 1. Client signs in with Firebase and sends `Authorization: Bearer <ID token>`
//! 2. Server:
//!    - Extracts the token from the header (`header`)
//!    - Verifies signature, expiry, issuer, audience (`verifier`, `jwks`)
//!    - Rejects anonymous sessions and, if configured, unverified emails
//!    - Looks up the local user by `uid`, or fetches the provider record and
//!      creates one (`resolver`, `directory`)
//!
//! A request without a bearer credential is not an error: it proceeds
//! anonymously, and only handlers using [`Auth`] reject it.
//!
//! ## Security
//!
//! - Signing keys are fetched via HTTPS and cached per `Cache-Control`
//! - Every token rejection yields the same client-facing message
//! - Clock skew tolerance is 60 seconds

pub mod authenticator;
pub mod claims;
pub mod directory;
pub mod error;
pub mod extractor;
pub mod firebase_app;
pub mod header;
pub mod jwks;
pub mod middleware;
pub mod resolver;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_server;

pub use authenticator::{FirebaseAuthenticator, SchemeSettings};
pub use claims::{AuthenticatedUser, FirebaseClaims};
pub use directory::{IdentityToolkitDirectory, ProviderDirectory};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use firebase_app::{FirebaseApp, ServiceAccount};
pub use jwks::JwksManager;
pub use resolver::IdentityResolver;
pub use verifier::{FirebaseTokenVerifier, TokenVerifier};
