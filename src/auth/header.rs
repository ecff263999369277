// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `Authorization` header parsing and the `WWW-Authenticate` challenge.

use axum::http::HeaderValue;

use super::error::{AuthError, MalformedReason};

/// Extract the raw token from an `Authorization` header value.
///
/// Returns `Ok(None)` when the header is absent, blank, or uses a scheme
/// other than `prefix`, so other mechanisms (or anonymous access) can take
/// over. The shape checks run before the scheme comparison.
pub fn extract_credential(
    header: Option<&HeaderValue>,
    prefix: &str,
) -> Result<Option<String>, AuthError> {
    let Some(header) = header else {
        return Ok(None);
    };

    let parts: Vec<&[u8]> = header
        .as_bytes()
        .split(|b| b.is_ascii_whitespace())
        .filter(|part| !part.is_empty())
        .collect();

    match parts.len() {
        0 => return Ok(None),
        1 => return Err(AuthError::MalformedCredential(MalformedReason::NoCredentials)),
        2 => {}
        _ => return Err(AuthError::MalformedCredential(MalformedReason::ContainsSpaces)),
    }

    if !parts[0].eq_ignore_ascii_case(prefix.as_bytes()) {
        return Ok(None);
    }

    std::str::from_utf8(parts[1])
        .map(|token| Some(token.to_string()))
        .map_err(|_| AuthError::InvalidToken)
}

/// Build the `WWW-Authenticate` challenge value: `<prefix> realm="<realm>"`.
pub fn challenge(prefix: &str, realm: &str) -> String {
    format!("{prefix} realm=\"{realm}\"")
}
