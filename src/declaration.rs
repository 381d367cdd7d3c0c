//! Declared Infrastructure State
//!
//! Loads the output file written by the provisioning tool (one
//! `{"value": ..., "type": ..., "sensitive": ...}` object per key) and
//! exposes strict, fallible lookups into it.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a declaration file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid declaration in {origin}: {reason}")]
    Shape { origin: String, reason: String },
}

/// Errors raised by [`Declaration::lookup`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("declared key not found: {0}")]
    MissingKey(String),

    #[error("declared key {0} does not hold a string value")]
    NotAString(String),
}

/// One declared output
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredValue {
    pub value: Value,
    /// Every sibling field of `value` (`type`, `sensitive`, ...)
    pub metadata: BTreeMap<String, Value>,
}

impl DeclaredValue {
    pub fn is_sensitive(&self) -> bool {
        self.metadata
            .get("sensitive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// The value as it may appear in logs
    pub fn display_value(&self) -> String {
        if self.is_sensitive() {
            return "<sensitive>".to_string();
        }
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Loaded expected state: key -> declared value, immutable after load
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    entries: BTreeMap<String, DeclaredValue>,
    /// Raw document, kept for nested `a.b.c` navigation
    raw: Map<String, Value>,
}

impl Declaration {
    /// Read and parse a declaration file. Nothing is returned unless the
    /// whole file parses.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decl = Self::parse(&content, &path.display().to_string())?;
        tracing::info!("Loaded {} declared outputs from {:?}", decl.len(), path);
        Ok(decl)
    }

    pub fn from_json_str(content: &str) -> Result<Self, LoadError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, LoadError> {
        let document: Value = serde_json::from_str(content).map_err(|source| LoadError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let Value::Object(raw) = document else {
            return Err(LoadError::Shape {
                origin: origin.to_string(),
                reason: "top level must be an object".to_string(),
            });
        };

        let mut entries = BTreeMap::new();
        for (key, entry) in &raw {
            // Objects without a `value` field are groups; they are only
            // reachable through dotted lookups.
            let Value::Object(fields) = entry else {
                return Err(LoadError::Shape {
                    origin: origin.to_string(),
                    reason: format!("entry {key} is not an object"),
                });
            };
            if let Some(declared) = declared_value(fields) {
                entries.insert(key.clone(), declared);
            }
        }

        Ok(Self { entries, raw })
    }

    /// Exact-match lookup of a string value. Falls back to navigating nested
    /// objects when `key` contains dots and is not itself a top-level key.
    pub fn lookup(&self, key: &str) -> Result<&str, LookupError> {
        let value = match self.entries.get(key) {
            Some(declared) => &declared.value,
            None => self.lookup_nested(key)?,
        };

        value
            .as_str()
            .ok_or_else(|| LookupError::NotAString(key.to_string()))
    }

    fn lookup_nested(&self, key: &str) -> Result<&Value, LookupError> {
        let missing = || LookupError::MissingKey(key.to_string());

        if !key.contains('.') {
            return Err(missing());
        }

        let mut segments = key.split('.');
        let first = segments.next().ok_or_else(missing)?;
        let mut current = self.raw.get(first).ok_or_else(missing)?;
        for segment in segments {
            current = current.get(segment).ok_or_else(missing)?;
        }

        current.get("value").ok_or_else(missing)
    }

    /// Full entry for a top-level key, including metadata
    pub fn get(&self, key: &str) -> Option<&DeclaredValue> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn declared_value(fields: &Map<String, Value>) -> Option<DeclaredValue> {
    let value = fields.get("value")?.clone();
    let metadata = fields
        .iter()
        .filter(|(name, _)| name.as_str() != "value")
        .map(|(name, v)| (name.clone(), v.clone()))
        .collect();
    Some(DeclaredValue { value, metadata })
}
