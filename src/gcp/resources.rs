//! Resource kind mapping
//!
//! Maps each [`ResourceKind`] to a Compute Engine or Cloud Storage REST path
//! and turns the returned JSON into a [`ResourceDescriptor`].

use crate::client::{FetchError, ResourceDescriptor, ResourceKind, ResourceSelector};
use serde_json::Value;

/// State reported for resources whose API representation carries none
pub const DEFAULT_STATE: &str = "available";

/// Which API host serves a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Compute,
    Storage,
}

/// Where to GET a resource from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub service: Service,
    /// Path relative to the service's API base, without leading slash
    pub path: String,
}

impl Location {
    fn new(service: Service, path: String) -> Self {
        Self { service, path }
    }
}

/// Hosts whose self-links are accepted as resource ids
pub const SELF_LINK_HOSTS: &[&str] = &[
    "www.googleapis.com",
    "compute.googleapis.com",
    "storage.googleapis.com",
];

fn enc(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn bad_id(selector: &ResourceSelector, expected: &str) -> FetchError {
    FetchError::Rejected {
        status: 400,
        reason: format!("{} id '{}' must look like {}", selector.kind, selector.id, expected),
    }
}

/// Split `scope/name` ids (zone or region qualified)
fn scoped<'a>(selector: &'a ResourceSelector, expected: &str) -> Result<(&'a str, &'a str), FetchError> {
    match selector.id.split_once('/') {
        Some((scope, name)) if !scope.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((scope, name))
        }
        _ => Err(bad_id(selector, expected)),
    }
}

/// Resolve a selector to the location of its REST representation
///
/// Self-link ids are accepted only from a Google API host over https (or from
/// `api_base`), and only when their path names a resource of the selector's
/// kind. The request always goes to the configured endpoint.
pub fn locate(
    selector: &ResourceSelector,
    project: &str,
    api_base: Option<&str>,
) -> Result<Location, FetchError> {
    if selector.id.contains("://") {
        return locate_self_link(selector, api_base);
    }

    let compute = |path: String| {
        Location::new(
            Service::Compute,
            format!("compute/v1/projects/{}/{}", enc(project), path),
        )
    };

    let location = match selector.kind {
        ResourceKind::Network => compute(format!("global/networks/{}", enc(&selector.id))),
        ResourceKind::Subnetwork => {
            let (region, name) = scoped(selector, "region/name")?;
            compute(format!("regions/{}/subnetworks/{}", enc(region), enc(name)))
        }
        ResourceKind::LoadBalancer => match selector.id.split_once('/') {
            None => compute(format!("global/forwardingRules/{}", enc(&selector.id))),
            Some(_) => {
                let (region, name) = scoped(selector, "name or region/name")?;
                compute(format!("regions/{}/forwardingRules/{}", enc(region), enc(name)))
            }
        },
        ResourceKind::Instance => {
            let (zone, name) = scoped(selector, "zone/name")?;
            compute(format!("zones/{}/instances/{}", enc(zone), enc(name)))
        }
        ResourceKind::Bucket => Location::new(
            Service::Storage,
            format!("storage/v1/b/{}", enc(&selector.id)),
        ),
    };

    Ok(location)
}

fn trusted_origin(url: &url::Url, api_base: Option<&str>) -> bool {
    let google = url.scheme() == "https"
        && url.port().is_none()
        && url.host_str().is_some_and(|host| SELF_LINK_HOSTS.contains(&host));
    google
        || api_base
            .and_then(|base| url::Url::parse(base).ok())
            .is_some_and(|base| base.origin() == url.origin())
}

fn compute_path_matches(kind: ResourceKind, rest: &[&str]) -> bool {
    matches!(
        (kind, rest),
        (ResourceKind::Network, ["global", "networks", _])
            | (ResourceKind::Subnetwork, ["regions", _, "subnetworks", _])
            | (
                ResourceKind::LoadBalancer,
                ["global", "forwardingRules", _] | ["regions", _, "forwardingRules", _]
            )
            | (ResourceKind::Instance, ["zones", _, "instances", _])
    )
}

fn locate_self_link(selector: &ResourceSelector, api_base: Option<&str>) -> Result<Location, FetchError> {
    let url = url::Url::parse(&selector.id).map_err(|_| bad_id(selector, "a valid self-link URL"))?;
    if !trusted_origin(&url, api_base) {
        return Err(FetchError::Rejected {
            status: 400,
            reason: format!(
                "{} self-link host '{}' is not a Google API endpoint",
                selector.kind,
                url.host_str().unwrap_or_default()
            ),
        });
    }

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(bad_id(selector, "a self-link URL"));
    }

    match segments.as_slice() {
        ["storage", "v1", "b", _] if selector.kind == ResourceKind::Bucket => {
            Ok(Location::new(Service::Storage, segments.join("/")))
        }
        ["compute", "v1", "projects", _, rest @ ..] if compute_path_matches(selector.kind, rest) => {
            Ok(Location::new(Service::Compute, segments.join("/")))
        }
        _ => Err(bad_id(selector, &format!("a self-link to a {}", selector.kind))),
    }
}

/// Build a descriptor from a REST resource body
pub fn to_descriptor(selector: &ResourceSelector, body: &Value) -> Result<ResourceDescriptor, FetchError> {
    let Value::Object(map) = body else {
        return Err(FetchError::Malformed(format!(
            "expected a JSON object for {selector}"
        )));
    };

    let state = ["status", "state"]
        .iter()
        .find_map(|field| map.get(*field).and_then(|v| v.as_str()))
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| DEFAULT_STATE.to_string());

    let mut descriptor = ResourceDescriptor::new(selector.kind, selector.id.clone(), state);

    for (key, value) in map {
        let name = snake_case(key);
        match value {
            Value::String(s) => {
                if s.starts_with("https://") {
                    descriptor
                        .attributes
                        .insert(format!("{name}_short"), extract_short_name(s));
                }
                descriptor.attributes.insert(name, s.clone());
            }
            Value::Number(n) => {
                descriptor.attributes.insert(name, n.to_string());
            }
            Value::Bool(b) => {
                descriptor.attributes.insert(name, b.to_string());
            }
            Value::Array(items) => {
                descriptor
                    .attributes
                    .insert(format!("{name}_count"), items.len().to_string());
            }
            Value::Object(_) | Value::Null => {}
        }
    }

    Ok(descriptor)
}

/// Extract short name from GCP resource URL
/// e.g., "https://www.googleapis.com/compute/v1/projects/my-project/global/networks/main" -> "main"
pub fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// `ipCidrRange` -> `ip_cidr_range`, `IPAddress` -> `ip_address`
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}
