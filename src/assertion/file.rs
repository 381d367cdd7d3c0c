//! Assertions file
//!
//! YAML (or JSON) document listing the assertions of a run plus optional
//! engine settings. Building the assertions resolves every `id_from` key
//! against the loaded [`Declaration`]; any unresolved key is fatal.

use super::{Assertion, Predicate};
use crate::client::{ResourceKind, ResourceSelector};
use crate::declaration::{Declaration, LookupError};
use crate::engine::RetryPolicy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse assertions file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("assertion #{index} ({description}): {reason}")]
    Invalid {
        index: usize,
        description: String,
        reason: String,
    },

    #[error("assertion #{index} ({description}): {source}")]
    Lookup {
        index: usize,
        description: String,
        #[source]
        source: LookupError,
    },

    #[error("invalid settings: {0}")]
    Settings(String),
}

/// Top-level document
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AssertionsFile {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub assertions: Vec<AssertionSpec>,
}

/// Engine and provider settings carried by the assertions file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Project to query, overrides user config and gcloud defaults
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Settings(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Settings(
                "retry.multiplier must be a finite number >= 1.0".to_string(),
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        })
    }
}

impl Settings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// One assertion as written in the file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertionSpec {
    pub description: String,
    pub kind: String,
    /// Literal resource id
    #[serde(default)]
    pub id: Option<String>,
    /// Declaration key holding the resource id
    #[serde(default)]
    pub id_from: Option<String>,
    #[serde(default)]
    pub expect: ExpectSpec,
}

/// Expectations; an empty block only checks that the resource exists
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ExpectSpec {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub contains: BTreeMap<String, String>,
}

impl ExpectSpec {
    pub fn to_predicate(&self) -> Predicate {
        let mut predicates = Vec::new();
        if let Some(state) = &self.state {
            predicates.push(Predicate::StateEquals(state.clone()));
        }
        for (name, value) in &self.attributes {
            predicates.push(Predicate::AttributeEquals {
                name: name.clone(),
                value: value.clone(),
            });
        }
        for (name, needle) in &self.contains {
            predicates.push(Predicate::AttributeContains {
                name: name.clone(),
                needle: needle.clone(),
            });
        }

        match predicates.len() {
            0 => Predicate::Exists,
            1 => predicates.remove(0),
            _ => Predicate::All(predicates),
        }
    }
}

impl AssertionsFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve every spec into an [`Assertion`], in file order
    pub fn build(&self, declaration: &Declaration) -> Result<Vec<Assertion>, ConfigError> {
        self.assertions
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.build(index + 1, declaration))
            .collect()
    }
}

impl AssertionSpec {
    fn build(&self, index: usize, declaration: &Declaration) -> Result<Assertion, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            index,
            description: self.description.clone(),
            reason,
        };

        let kind: ResourceKind = self.kind.parse().map_err(invalid)?;

        let id = match (&self.id, &self.id_from) {
            (Some(id), None) => id.clone(),
            (None, Some(key)) => declaration
                .lookup(key)
                .map_err(|source| ConfigError::Lookup {
                    index,
                    description: self.description.clone(),
                    source,
                })?
                .to_string(),
            (Some(_), Some(_)) => {
                return Err(invalid("set only one of `id` and `id_from`".to_string()))
            }
            (None, None) => return Err(invalid("one of `id` or `id_from` is required".to_string())),
        };

        if id.trim().is_empty() {
            return Err(invalid("resource id is empty".to_string()));
        }

        if let Some(key) = &self.id_from {
            let shown = declaration
                .get(key)
                .map(|d| d.display_value())
                .unwrap_or_else(|| id.clone());
            tracing::debug!("Resolved {} -> {} {}", key, kind, shown);
        }

        Ok(Assertion::new(
            self.description.clone(),
            ResourceSelector::new(kind, id),
            self.expect.to_predicate(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUTS: &str = r#"{
        "main_vpc_id": {"value": "vpc-123"},
        "alb_arn": {"value": "web-lb"}
    }"#;

    const ASSERTIONS: &str = r#"
settings:
  parallel: true
  workers: 4
  timeout_secs: 30
  retry:
    max_attempts: 5
    base_delay_ms: 10
assertions:
  - description: main VPC is available
    kind: network
    id_from: main_vpc_id
    expect:
      state: available
  - description: load balancer exists
    kind: load_balancer
    id_from: alb_arn
  - description: bucket is regional
    kind: bucket
    id: logs-bucket
    expect:
      attributes:
        location_type: region
      contains:
        location: EUROPE
"#;

    #[test]
    fn test_parse_and_build() {
        let decl = Declaration::from_json_str(OUTPUTS).unwrap();
        let file = AssertionsFile::from_str(ASSERTIONS).unwrap();
        assert!(file.settings.parallel);
        assert_eq!(file.settings.workers, Some(4));
        assert_eq!(file.settings.timeout(), Some(Duration::from_secs(30)));

        let policy = file.settings.retry.to_policy().unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(10));
        assert_eq!(policy.multiplier, 2.0);

        let assertions = file.build(&decl).unwrap();
        assert_eq!(assertions.len(), 3);
        assert_eq!(
            assertions[0].selector,
            ResourceSelector::new(ResourceKind::Network, "vpc-123")
        );
        assert!(matches!(assertions[0].predicate, Predicate::StateEquals(ref s) if s == "available"));
        assert!(matches!(assertions[1].predicate, Predicate::Exists));
        assert_eq!(assertions[2].selector.id, "logs-bucket");
        assert!(matches!(assertions[2].predicate, Predicate::All(ref p) if p.len() == 2));
    }

    #[test]
    fn test_missing_declared_key_is_fatal() {
        let decl = Declaration::from_json_str(r#"{"alb_arn": {"value": "web-lb"}}"#).unwrap();
        let file = AssertionsFile::from_str(ASSERTIONS).unwrap();
        let err = file.build(&decl).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Lookup { index: 1, source: LookupError::MissingKey(ref k), .. } if k == "main_vpc_id"
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let file = AssertionsFile::from_str(
            "assertions:\n  - description: x\n    kind: vpc_peering\n    id: p-1\n",
        )
        .unwrap();
        let err = file.build(&Declaration::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { index: 1, .. }));
    }

    #[test]
    fn test_id_and_id_from_are_exclusive() {
        let both = AssertionsFile::from_str(
            "assertions:\n  - description: x\n    kind: network\n    id: a\n    id_from: b\n",
        )
        .unwrap();
        assert!(both.build(&Declaration::default()).is_err());

        let neither =
            AssertionsFile::from_str("assertions:\n  - description: x\n    kind: network\n")
                .unwrap();
        assert!(neither.build(&Declaration::default()).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(AssertionsFile::from_str("settings:\n  paralel: true\n").is_err());
    }

    #[test]
    fn test_json_is_accepted() {
        let file = AssertionsFile::from_str(
            r#"{"assertions": [{"description": "vpc", "kind": "network", "id": "vpc-1"}]}"#,
        )
        .unwrap();
        assert_eq!(file.assertions.len(), 1);
        assert!(!file.settings.parallel);
    }

    #[test]
    fn test_invalid_retry_settings() {
        let zero = RetrySettings {
            max_attempts: 0,
            ..RetrySettings::default()
        };
        assert!(zero.to_policy().is_err());

        let shrinking = RetrySettings {
            multiplier: 0.5,
            ..RetrySettings::default()
        };
        assert!(shrinking.to_policy().is_err());
    }
}
