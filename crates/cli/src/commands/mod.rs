//! CLI command implementations and the shared session.

#![allow(clippy::print_stdout)]

pub mod admin;
pub mod catalog;
pub mod inquiry;

use std::sync::Arc;

use machinery_store_client::{
    AdminGuard, ClaimError, ClientConfig, ClientError, ConfigError, HttpBackend, StoreClient,
};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// No admin secret on the command line or in `STORE_ADMIN_TOKEN`.
    #[error("Admin token missing: pass --token or set STORE_ADMIN_TOKEN")]
    MissingToken,

    #[error("Product {0} not found")]
    ProductNotFound(machinery_store_core::ProductId),
}

/// A logged-in (or anonymous) client plus its access guard.
pub struct Session {
    pub guard: AdminGuard,
    pub config: ClientConfig,
}

impl Session {
    /// Connect to `STORE_BACKEND_URL` as `STORE_IDENTITY`, if configured.
    ///
    /// Without a backend URL the session stays disconnected and every read
    /// is empty.
    pub async fn open(config: ClientConfig) -> Result<Self, CliError> {
        let mut guard = AdminGuard::new(StoreClient::new(&config.cache));

        if let Some(url) = &config.backend_url {
            let backend = HttpBackend::new(url, config.identity.clone(), &config)?;
            if let Err(e) = guard.login(Arc::new(backend)).await {
                tracing::warn!(error = %e, "Could not determine caller role");
            }
        } else {
            tracing::warn!("STORE_BACKEND_URL not set, running disconnected");
        }

        Ok(Self { guard, config })
    }

    pub fn client(&self) -> &StoreClient {
        self.guard.client()
    }

    pub fn close(&mut self) {
        self.guard.logout();
    }
}
