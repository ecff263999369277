// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use firebase_auth_api::{
    api::router,
    auth::{
        firebase_app::CredentialError, jwks::FIREBASE_JWKS_URL, FirebaseApp,
        FirebaseAuthenticator, FirebaseTokenVerifier, IdentityResolver,
        IdentityToolkitDirectory, JwksManager, ProviderDirectory, ServiceAccount,
    },
    config::{AppConfig, LogFormat},
    state::AppState,
    storage::{StoreError, UserDatabase},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("firebase credentials: {0}")]
    Credential(#[from] CredentialError),

    #[error("user store: {0}")]
    Store(#[from] StoreError),

    #[error("server: {0}")]
    Serve(#[from] std::io::Error),
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal(handle: axum_server::Handle<std::net::SocketAddr>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    let auth = &config.auth;

    let service_account = auth
        .credential_store_path
        .as_deref()
        .map(ServiceAccount::load)
        .transpose()?;
    let app = FirebaseApp::new(
        service_account,
        auth.project_id.clone(),
        auth.emulator_host.clone(),
    )?;
    let directory: Arc<dyn ProviderDirectory> =
        Arc::new(IdentityToolkitDirectory::new(app.clone()));

    let (verifier, keys) = match app.emulator_host() {
        Some(host) => {
            tracing::warn!(host, "Using Firebase Auth emulator, token signatures are not checked");
            (FirebaseTokenVerifier::for_emulator(app.project_id()), None)
        }
        None => {
            let keys = JwksManager::new(FIREBASE_JWKS_URL, app.client().clone());
            (
                FirebaseTokenVerifier::new(app.project_id(), keys.clone()),
                Some(keys),
            )
        }
    };
    let verifier = if auth.check_revoked {
        verifier.with_revocation_check(directory.clone())
    } else {
        verifier
    };

    let db_path = config.users_db_path();
    let users = Arc::new(UserDatabase::open(&db_path)?);
    let existing = users.count()?;
    tracing::info!(path = %db_path.display(), users = existing, "Opened user store");

    let resolver = IdentityResolver::new(
        users.clone(),
        directory,
        auth.uid_field,
        auth.require_verified_email,
    );
    let authenticator =
        FirebaseAuthenticator::new(auth.scheme.clone(), Arc::new(verifier), resolver);
    let state = AppState::new(authenticator, users, keys);

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    tracing::info!(
        addr = %config.addr,
        project_id = app.project_id(),
        uid_field = %auth.uid_field,
        check_revoked = auth.check_revoked,
        "Firebase auth server listening (docs at /docs)"
    );

    axum_server::bind(config.addr)
        .handle(handle)
        .serve(router(state).into_make_service())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server failed to start");
        std::process::exit(1);
    }
}
