// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase Auth API - bearer-token authentication backed by Firebase
//!
//! Verifies Firebase ID tokens on incoming requests and maps each Firebase
//! account to a local user, creating it on first sight.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Credential extraction, token verification, identity resolution
//! - `config` - Environment configuration
//! - `storage` - Local user store (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
