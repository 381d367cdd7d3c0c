//! Resource Client abstraction
//!
//! The engine only ever talks to a provider through [`ResourceClient`], so it
//! does not care which cloud or which resource kind it is asserting against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kinds of resources an assertion can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnetwork,
    LoadBalancer,
    Instance,
    Bucket,
}

impl ResourceKind {
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Network,
        ResourceKind::Subnetwork,
        ResourceKind::LoadBalancer,
        ResourceKind::Instance,
        ResourceKind::Bucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnetwork => "subnetwork",
            Self::LoadBalancer => "load_balancer",
            Self::Instance => "instance",
            Self::Bucket => "bucket",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown resource kind: {s}"))
    }
}

/// Which resource an assertion is about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceSelector {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceSelector {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Snapshot of a live resource as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub id: String,
    pub state: String,
    pub attributes: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            state: state.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

/// Why a fetch did not produce a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The provider has no such resource
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    /// Timeouts, connection failures, rate limiting, 5xx. Worth retrying.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// The provider refused the request (bad request, auth, permissions)
    #[error("request rejected ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// The provider answered with something that is not a resource
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Read-only access to a provider's resources.
///
/// Implementations hold no per-call mutable state; one client is shared by
/// every assertion in a run.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch one resource by kind and id
    async fn fetch(&self, selector: &ResourceSelector) -> Result<ResourceDescriptor, FetchError>;

    /// Provider name, for logs and reports
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("network".parse::<ResourceKind>(), Ok(ResourceKind::Network));
        assert_eq!(
            "load-balancer".parse::<ResourceKind>(),
            Ok(ResourceKind::LoadBalancer)
        );
        assert_eq!(" Bucket ".parse::<ResourceKind>(), Ok(ResourceKind::Bucket));
        assert!("vpc_endpoint".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_names_round_trip_through_display() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.to_string().parse::<ResourceKind>(), Ok(*kind));
        }
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FetchError::Transient("503".into()).is_retryable());
        assert!(!FetchError::NotFound {
            kind: ResourceKind::Network,
            id: "vpc-1".into()
        }
        .is_retryable());
        assert!(!FetchError::Rejected {
            status: 403,
            reason: "denied".into()
        }
        .is_retryable());
        assert!(!FetchError::Malformed("not json".into()).is_retryable());
    }

    #[test]
    fn test_selector_display() {
        let selector = ResourceSelector::new(ResourceKind::Network, "vpc-123");
        assert_eq!(selector.to_string(), "network/vpc-123");
    }
}
