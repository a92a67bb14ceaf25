//! # Application State
//!
//! Shared state passed to all Axum route handlers: the configured
//! [`DocumentService`] and the Prometheus handle used by `/metrics`.

use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

use proposal_state::ClonePolicy;

use crate::repository::Repository;
use crate::service::DocumentService;

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token for `/v1/*`. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Which documents may be cloned.
    pub clone_policy: ClonePolicy,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("clone_policy", &self.clone_policy)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            clone_policy: ClonePolicy::default(),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PORT must be a port number, got '{0}'")]
    InvalidPort(String),

    #[error("CLONE_POLICY: {0}")]
    InvalidClonePolicy(String),
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN` and `CLONE_POLICY` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };
        let auth_token = lookup("AUTH_TOKEN").filter(|t| !t.trim().is_empty());
        let clone_policy = match lookup("CLONE_POLICY") {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidClonePolicy)?,
            None => defaults.clone_policy,
        };

        Ok(Self {
            port,
            auth_token,
            clone_policy,
        })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: DocumentService<Repository>,
    pub config: AppConfig,
    /// Present when a Prometheus recorder was installed at startup.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory state with the given configuration.
    pub fn with_config(config: AppConfig) -> Self {
        Self::with_repository(config, Repository::in_memory())
    }

    pub fn with_repository(config: AppConfig, repository: Repository) -> Self {
        tracing::info!(
            backend = repository.backend_name(),
            clone_policy = %config.clone_policy,
            "document store configured"
        );
        Self {
            service: DocumentService::new(repository, config.clone_policy),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
