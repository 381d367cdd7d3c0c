//! GCP Authentication
//!
//! Handles authentication using Application Default Credentials (ADC),
//! or a pre-issued access token supplied through the environment.

use anyhow::{Context, Result};
use gcp_auth::TokenProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Read-only scope is enough for every assertion
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform.read-only"];

/// Environment variable holding a pre-issued bearer token
pub const ACCESS_TOKEN_ENV: &str = "INFRAPROBE_ACCESS_TOKEN";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Fixed(String),
}

/// GCP credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    /// Use the token in [`ACCESS_TOKEN_ENV`] if set, Application Default
    /// Credentials otherwise
    pub async fn new() -> Result<Self> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                tracing::info!("Using access token from {}", ACCESS_TOKEN_ENV);
                return Ok(Self::fixed(token.trim()));
            }
        }

        let provider = gcp_auth::provider().await.context(
            "Failed to initialize GCP authentication. Run 'gcloud auth application-default login'",
        )?;

        Ok(Self {
            source: TokenSource::Provider(provider),
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Credentials that always present the same bearer token
    pub fn fixed(token: &str) -> Self {
        Self {
            source: TokenSource::Fixed(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        let provider = match &self.source {
            TokenSource::Fixed(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;

        let token_str = token.as_str().to_string();

        // gcp_auth does not reliably report expiry for every credential
        // type, so cache with a conservative TTL
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }

    match project.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }

    if project.ends_with('-') {
        return false;
    }

    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Read the default project from the environment or gcloud configuration
/// Security: Validates project ID format before returning
pub fn get_default_project() -> Option<String> {
    for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    let config_dir = get_gcloud_config_dir()?;

    if let Ok(content) = std::fs::read_to_string(config_dir.join("properties")) {
        if let Some(project) = project_from_properties(&content, None) {
            return Some(project);
        }
    }

    let active_config = std::fs::read_to_string(config_dir.join("active_config")).ok()?;
    let config_name = active_config.trim();

    // Security: Validate config name to prevent path traversal
    if !config_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        tracing::warn!("Invalid characters in active_config name");
        return None;
    }

    let config_path = config_dir
        .join("configurations")
        .join(format!("config_{}", config_name));
    let content = std::fs::read_to_string(config_path).ok()?;
    project_from_properties(&content, Some("core"))
}

/// Find `project = ...` in an INI-style gcloud file, optionally restricted
/// to one `[section]`
fn project_from_properties(content: &str, section: Option<&str>) -> Option<String> {
    let mut in_section = section.is_none();
    for line in content.lines() {
        let line = line.trim();
        // Security: Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_section = section.map_or(true, |s| line == format!("[{s}]"));
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "project" {
                let project = value.trim().to_string();
                if validate_project_id(&project) {
                    return Some(project);
                }
            }
        }
    }
    None
}
