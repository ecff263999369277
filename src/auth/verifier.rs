// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase ID token verification.
//!
//! ## Checks
//!
//! - header: `alg` is RS256 and `kid` names a published Google key
//! - signature against the cached JWKS
//! - `aud` is the project ID, `iss` is `https://securetoken.google.com/<project>`
//! - `exp` in the future, `iat` and `auth_time` not in the future (60 s leeway)
//! - `sub` non-empty and at most 128 characters
//! - optionally, the user is not disabled and the token predates no revocation
//!
//! Against the Auth emulator tokens are unsigned, so only the claim checks run.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use super::claims::FirebaseClaims;
use super::directory::{DirectoryError, ProviderDirectory};
use super::error::AuthError;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: i64 = 60;

/// Longest `sub` Firebase will issue.
const MAX_UID_LEN: usize = 128;

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Why a token failed verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Token could not be decoded at all
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("token revoked")]
    Revoked,

    #[error("user disabled")]
    UserDisabled,

    /// Token decoded but failed a signature or claim check
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("signing keys unavailable: {0}")]
    KeyFetch(String),
}

impl From<VerifyError> for AuthError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Malformed(_) => AuthError::InvalidToken,
            VerifyError::KeyFetch(msg) => AuthError::KeyFetchFailed(msg),
            VerifyError::Expired
            | VerifyError::Revoked
            | VerifyError::UserDisabled
            | VerifyError::Invalid(_) => AuthError::TokenRejected,
        }
    }
}

/// Verifies a raw ID token and returns its claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<FirebaseClaims, VerifyError>;
}

/// How signatures are checked.
enum SignatureMode {
    /// Against Google's published keys
    Jwks(JwksManager),
    /// Auth emulator tokens carry no signature
    Emulator,
}

/// [`TokenVerifier`] for Firebase ID tokens.
pub struct FirebaseTokenVerifier {
    project_id: String,
    mode: SignatureMode,
    revocation: Option<Arc<dyn ProviderDirectory>>,
}

impl FirebaseTokenVerifier {
    /// Verify signatures against `keys`.
    pub fn new(project_id: impl Into<String>, keys: JwksManager) -> Self {
        Self {
            project_id: project_id.into(),
            mode: SignatureMode::Jwks(keys),
            revocation: None,
        }
    }

    /// Accept unsigned tokens minted by the Auth emulator.
    pub fn for_emulator(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            mode: SignatureMode::Emulator,
            revocation: None,
        }
    }

    /// Also reject tokens of disabled users and tokens issued before the
    /// user's sessions were revoked.
    pub fn with_revocation_check(mut self, directory: Arc<dyn ProviderDirectory>) -> Self {
        self.revocation = Some(directory);
        self
    }

    /// Signing keys, when verifying signatures.
    pub fn keys(&self) -> Option<&JwksManager> {
        match &self.mode {
            SignatureMode::Jwks(keys) => Some(keys),
            SignatureMode::Emulator => None,
        }
    }

    fn expected_issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }

    async fn decode_signed(
        &self,
        token: &str,
        keys: &JwksManager,
    ) -> Result<FirebaseClaims, VerifyError> {
        let header = decode_header(token).map_err(|e| VerifyError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Invalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Invalid("missing kid header".to_string()))?;

        let decoding_key = keys.get_decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY as u64;
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[self.expected_issuer()]);
        validation.set_required_spec_claims(&["exp", "iat", "aud", "iss"]);

        decode::<FirebaseClaims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => VerifyError::Malformed(e.to_string()),
                _ => VerifyError::Invalid(e.to_string()),
            })
    }

    fn check_claims(&self, claims: &FirebaseClaims, now: i64) -> Result<(), VerifyError> {
        if claims.aud != self.project_id {
            return Err(VerifyError::Invalid(format!(
                "audience '{}' is not project '{}'",
                claims.aud, self.project_id
            )));
        }
        if claims.iss != self.expected_issuer() {
            return Err(VerifyError::Invalid(format!(
                "unexpected issuer '{}'",
                claims.iss
            )));
        }
        if claims.exp.saturating_add(CLOCK_SKEW_LEEWAY) < now {
            return Err(VerifyError::Expired);
        }
        if claims.iat.saturating_sub(CLOCK_SKEW_LEEWAY) > now {
            return Err(VerifyError::Invalid("issued in the future".to_string()));
        }
        if claims.auth_time.saturating_sub(CLOCK_SKEW_LEEWAY) > now {
            return Err(VerifyError::Invalid(
                "authenticated in the future".to_string(),
            ));
        }
        if claims.uid.is_empty() || claims.uid.len() > MAX_UID_LEN {
            return Err(VerifyError::Invalid(
                "subject must be 1 to 128 characters".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_revoked(
        &self,
        directory: &dyn ProviderDirectory,
        claims: &FirebaseClaims,
    ) -> Result<(), VerifyError> {
        let record = directory.fetch_user(&claims.uid).await.map_err(|e| match e {
            DirectoryError::NotFound(uid) => VerifyError::Invalid(format!("unknown user {uid}")),
            other => VerifyError::Invalid(other.to_string()),
        })?;

        if record.disabled {
            return Err(VerifyError::UserDisabled);
        }
        if let Some(valid_after) = record.tokens_valid_after {
            if claims.iat < valid_after.timestamp() {
                return Err(VerifyError::Revoked);
            }
        }
        Ok(())
    }
}

/// Decode the payload of an unsigned token without any checks.
fn decode_unsigned(token: &str) -> Result<FirebaseClaims, VerifyError> {
    let segments: Vec<&str> = token.split('.').collect();
    if !(2..=3).contains(&segments.len()) {
        return Err(VerifyError::Malformed(
            "expected header.payload[.signature]".to_string(),
        ));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| VerifyError::Malformed(e.to_string()))?;
    serde_json::from_slice(&payload).map_err(|e| VerifyError::Malformed(e.to_string()))
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<FirebaseClaims, VerifyError> {
        if token.is_empty() {
            return Err(VerifyError::Malformed("empty token".to_string()));
        }

        let claims = match &self.mode {
            SignatureMode::Jwks(keys) => self.decode_signed(token, keys).await?,
            SignatureMode::Emulator => decode_unsigned(token)?,
        };
        self.check_claims(&claims, Utc::now().timestamp())?;

        if let Some(directory) = &self.revocation {
            self.check_revoked(directory.as_ref(), &claims).await?;
        }

        Ok(claims)
    }
}
