// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and passed
//! explicitly to the components that need it.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FIREBASE_APP_CREDENTIALS` | Path to the service-account JSON key | Required (unless emulator) |
//! | `FIREBASE_PROJECT_ID` | Firebase project ID | From the credential |
//! | `FIREBASE_EMAIL_VERIFICATION` | Reject tokens whose email is unverified | `false` |
//! | `FIREBASE_UID_FIELD` | User field keyed by the Firebase uid (`username` or `firebase_uid`) | `username` |
//! | `FIREBASE_CHECK_REVOKED` | Reject revoked tokens and disabled users | `false` |
//! | `FIREBASE_AUTH_EMULATOR_HOST` | `host:port` of the Auth emulator | Unset |
//! | `AUTH_HEADER_PREFIX` | Authorization scheme | `Bearer` |
//! | `AUTH_REALM` | Realm in the `WWW-Authenticate` challenge | `api` |
//! | `DATA_DIR` | Directory holding `users.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::SchemeSettings;
use crate::storage::UidField;

pub const CREDENTIALS_ENV: &str = "FIREBASE_APP_CREDENTIALS";
pub const PROJECT_ID_ENV: &str = "FIREBASE_PROJECT_ID";
pub const EMAIL_VERIFICATION_ENV: &str = "FIREBASE_EMAIL_VERIFICATION";
pub const UID_FIELD_ENV: &str = "FIREBASE_UID_FIELD";
pub const CHECK_REVOKED_ENV: &str = "FIREBASE_CHECK_REVOKED";
pub const EMULATOR_HOST_ENV: &str = "FIREBASE_AUTH_EMULATOR_HOST";
pub const HEADER_PREFIX_ENV: &str = "AUTH_HEADER_PREFIX";
pub const REALM_ENV: &str = "AUTH_REALM";

/// Environment variable name for the data directory path.
///
/// The user database is stored at `$DATA_DIR/users.redb`.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),

    #[error("invalid configuration {0}: {1}")]
    Invalid(&'static str, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Firebase authentication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Service-account key path, loaded once at startup
    pub credential_store_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub require_verified_email: bool,
    pub uid_field: UidField,
    pub check_revoked: bool,
    pub emulator_host: Option<String>,
    pub scheme: SchemeSettings,
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub auth: AuthSettings,
    pub data_dir: PathBuf,
    pub addr: SocketAddr,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let emulator_host = get(EMULATOR_HOST_ENV);
        let credential_store_path = get(CREDENTIALS_ENV).map(PathBuf::from);
        if credential_store_path.is_none() && emulator_host.is_none() {
            return Err(ConfigError::Missing(CREDENTIALS_ENV));
        }

        let uid_field = match get(UID_FIELD_ENV) {
            Some(raw) => raw
                .parse::<UidField>()
                .map_err(|e| ConfigError::Invalid(UID_FIELD_ENV, e))?,
            None => UidField::default(),
        };

        let defaults = SchemeSettings::default();
        let scheme = SchemeSettings {
            header_prefix: get(HEADER_PREFIX_ENV).unwrap_or(defaults.header_prefix),
            realm: get(REALM_ENV).unwrap_or(defaults.realm),
        };
        if scheme.header_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                HEADER_PREFIX_ENV,
                "must be a single word".to_string(),
            ));
        }

        let auth = AuthSettings {
            credential_store_path,
            project_id: get(PROJECT_ID_ENV),
            require_verified_email: parse_bool(EMAIL_VERIFICATION_ENV, get(EMAIL_VERIFICATION_ENV))?,
            uid_field,
            check_revoked: parse_bool(CHECK_REVOKED_ENV, get(CHECK_REVOKED_ENV))?,
            emulator_host,
            scheme,
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid(HOST_ENV, e.to_string()))?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(f) if f == "pretty" => LogFormat::Pretty,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => return Err(ConfigError::Invalid(LOG_FORMAT_ENV, other)),
        };

        Ok(Self {
            auth,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            addr,
            log_format,
        })
    }

    /// Location of the user database.
    pub fn users_db_path(&self) -> PathBuf {
        self.data_dir.join("users.redb")
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid(key, other.to_string())),
    }
}
