//! Client configuration and construction.
//!
//! # Design
//! `ClientBuilder` applies its settings in call order. The first setting that
//! fails is remembered and returned by `build`, even if later settings would
//! have been valid: either a complete `Client` comes back or that error does,
//! never a half-configured client. The `DeploymentService`
//! is wired once at build time and the binding never changes afterwards.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::deployment::DeploymentService;
use crate::error::{ConfigError, Error};
use crate::http::{ReqwestTransport, Transport};

pub const DEFAULT_URL: &str = "http://localhost:3333";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

pub const URL_ENV: &str = "KUBECLIENT_URL";
pub const TIMEOUT_ENV: &str = "KUBECLIENT_TIMEOUT_MS";

/// Entry point to the deployment API.
#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    deployments: DeploymentService,
}

/// Builder for `Client`. Unset fields fall back to `DEFAULT_URL`,
/// `DEFAULT_TIMEOUT` and a fresh `ReqwestTransport`.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    url: Option<String>,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
    error: Option<ConfigError>,
}

impl Client {
    /// A client with every default applied.
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn deployments(&self) -> &DeploymentService {
        &self.deployments
    }
}

impl ClientBuilder {
    /// Seed a builder from `KUBECLIENT_URL` and `KUBECLIENT_TIMEOUT_MS`.
    /// Unset variables keep their defaults. Valid values can be overridden by
    /// later setters; an invalid value fails `build` regardless.
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Ok(url) = env::var(URL_ENV) {
            builder = builder.url(url);
        }
        if let Ok(raw) = env::var(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => builder = builder.timeout(Duration::from_millis(ms)),
                Err(_) => builder.fail(ConfigError::InvalidTimeout(raw)),
            }
        }
        builder
    }

    /// Base URL; must be absolute, able to carry a path, and free of query
    /// and fragment.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        match validate_url(url.into()) {
            Ok(url) => self.url = Some(url),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Default deadline for every request. Any value is accepted.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the transport. The same transport may back several clients.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shorthand for a `ReqwestTransport` over a preconfigured client.
    pub fn reqwest_client(self, client: reqwest::Client) -> Self {
        self.transport(Arc::new(ReqwestTransport::from_client(client)))
    }

    fn fail(&mut self, err: ConfigError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn build(self) -> Result<Client, Error> {
        if let Some(err) = self.error {
            return Err(err.into());
        }

        let url = self.url.unwrap_or_else(|| DEFAULT_URL.to_string());
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new().map_err(ConfigError::Transport)?),
        };

        debug!("client configured for {} with timeout {:?}", url, timeout);
        let deployments = DeploymentService::new(transport.clone(), &url, timeout);
        Ok(Client {
            url,
            timeout,
            transport,
            deployments,
        })
    }
}

fn validate_url(raw: String) -> Result<String, ConfigError> {
    let parsed = match Url::parse(&raw) {
        Ok(parsed) => parsed,
        Err(source) => return Err(ConfigError::InvalidUrl { url: raw, source }),
    };
    if parsed.cannot_be_a_base() {
        return Err(ConfigError::NotABaseUrl(raw));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ConfigError::QueryOrFragment(raw));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
