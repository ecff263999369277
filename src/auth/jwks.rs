// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching for Firebase ID tokens.
//!
//! Google publishes the keys that sign Firebase ID tokens at
//! [`FIREBASE_JWKS_URL`]. The response carries `Cache-Control: max-age=N`;
//! keys are cached for that long, or [`DEFAULT_CACHE_TTL`] when absent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use tokio::sync::RwLock;

use super::verifier::VerifyError;

/// Public keys used to sign Firebase ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    /// JWKS URL
    jwks_url: String,
    /// Cached JWKS
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager fetching from `jwks_url`.
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache: Arc::new(RwLock::new(None)),
            client,
        }
    }

    /// Create a manager that always serves `jwks` and never fetches.
    pub fn with_static_keys(jwks: JwkSet) -> Self {
        Self {
            jwks_url: String::new(),
            cache: Arc::new(RwLock::new(Some(CacheEntry {
                jwks,
                fetched_at: Instant::now(),
                ttl: Duration::MAX,
            }))),
            client: reqwest::Client::new(),
        }
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, VerifyError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.is_fresh() {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        let (jwks, ttl) = self.fetch_jwks().await?;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CacheEntry {
                jwks: jwks.clone(),
                fetched_at: Instant::now(),
                ttl,
            });
        }

        Ok(jwks)
    }

    /// Fetch JWKS from the endpoint, returning the keys and their lifetime.
    async fn fetch_jwks(&self) -> Result<(JwkSet, Duration), VerifyError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::KeyFetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_CACHE_TTL);

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        tracing::debug!(keys = jwks.keys.len(), ttl_secs = ttl.as_secs(), "Fetched signing keys");
        Ok((jwks, ttl))
    }

    /// Get the decoding key for the given key ID.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        let jwks = self.get_jwks().await?;

        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| VerifyError::Invalid(format!("no signing key matches kid '{kid}'")))?;

        jwk_to_decoding_key(jwk)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<(), VerifyError> {
        let (jwks, ttl) = self.fetch_jwks().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks,
            fetched_at: Instant::now(),
            ttl,
        });
        Ok(())
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        cache.as_ref().is_some_and(CacheEntry::is_fresh)
    }
}

/// Extract `max-age` from a `Cache-Control` header value.
fn parse_max_age(value: &str) -> Option<Duration> {
    value
        .split(',')
        .map(str::trim)
        .find_map(|directive| directive.strip_prefix("max-age="))
        .and_then(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Convert an RSA JWK to a DecodingKey. Firebase signs only with RS256.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, VerifyError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| VerifyError::KeyFetch(format!("Failed to create RSA key: {e}"))),
        _ => Err(VerifyError::KeyFetch(
            "Unsupported key type in JWKS".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) fn test_jwk_set(kid: &str) -> JwkSet {
    let n = include_str!("testdata/signing_key.n");
    serde_json::from_value(serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": kid,
            "n": n,
            "e": "AQAB"
        }]
    }))
    .unwrap()
}
