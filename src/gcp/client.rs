//! GCP Resource Client
//!
//! [`ResourceClient`] implementation combining authentication, HTTP and the
//! kind-to-endpoint mapping.

use super::auth::GcpCredentials;
use super::http::{GcpHttpClient, DEFAULT_REQUEST_TIMEOUT};
use super::resources::{self, Service};
use crate::client::{FetchError, ResourceClient, ResourceDescriptor, ResourceSelector};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const COMPUTE_API_BASE: &str = "https://compute.googleapis.com";
pub const STORAGE_API_BASE: &str = "https://storage.googleapis.com";

/// Connection options for [`GcpResourceClient`]
#[derive(Debug, Clone)]
pub struct GcpOptions {
    pub project_id: String,
    /// Replaces both API hosts when set; self-links from this origin are accepted
    pub api_base: Option<String>,
    pub request_timeout: Duration,
}

impl GcpOptions {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            api_base: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_api_base(mut self, api_base: Option<String>) -> Self {
        self.api_base = api_base.map(|b| b.trim_end_matches('/').to_string());
        self
    }
}

/// Read-only client over the Compute Engine and Cloud Storage APIs
#[derive(Clone)]
pub struct GcpResourceClient {
    credentials: GcpCredentials,
    http: GcpHttpClient,
    options: GcpOptions,
}

impl GcpResourceClient {
    /// Create a client using ADC (or the access token environment variable)
    pub async fn new(options: GcpOptions) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;
        Self::with_credentials(options, credentials)
    }

    pub fn with_credentials(options: GcpOptions, credentials: GcpCredentials) -> Result<Self> {
        let http = GcpHttpClient::new(options.request_timeout)?;
        tracing::info!(
            "GCP client ready for project {} ({})",
            options.project_id,
            options.api_base.as_deref().unwrap_or("default endpoints")
        );
        Ok(Self {
            credentials,
            http,
            options,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.options.project_id
    }

    fn service_base(&self, service: Service) -> &str {
        if let Some(base) = &self.options.api_base {
            return base;
        }
        match service {
            Service::Compute => COMPUTE_API_BASE,
            Service::Storage => STORAGE_API_BASE,
        }
    }

    /// Full URL for a selector
    pub fn url_for(&self, selector: &ResourceSelector) -> Result<String, FetchError> {
        let location = resources::locate(
            selector,
            &self.options.project_id,
            self.options.api_base.as_deref(),
        )?;
        Ok(format!("{}/{}", self.service_base(location.service), location.path))
    }
}

#[async_trait]
impl ResourceClient for GcpResourceClient {
    async fn fetch(&self, selector: &ResourceSelector) -> Result<ResourceDescriptor, FetchError> {
        let url = self.url_for(selector)?;

        let token = self.credentials.get_token().await.map_err(|e| {
            tracing::warn!("Token refresh failed: {:#}", e);
            FetchError::Transient(format!("could not obtain access token: {e}"))
        })?;

        let body = self
            .http
            .get(&url, &token)
            .await
            .map_err(|e| e.into_fetch_error(selector.kind, &selector.id))?;

        resources::to_descriptor(selector, &body)
    }

    fn name(&self) -> &str {
        "gcp"
    }
}
