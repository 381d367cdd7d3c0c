//! Shared test doubles for the engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use infraprobe::client::{FetchError, ResourceClient, ResourceDescriptor, ResourceKind, ResourceSelector};
use infraprobe::engine::RetryPolicy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What the scripted client does for one resource id
#[derive(Debug, Clone)]
pub enum Behavior {
    Found(ResourceDescriptor),
    /// Answer after a delay
    Slow(Duration, ResourceDescriptor),
    NotFound,
    Transient,
    /// Fail transiently this many times, then answer
    Flaky(usize, ResourceDescriptor),
    /// Never answer
    Hang,
}

/// Client answering from a script and counting calls per id
#[derive(Default)]
pub struct ScriptedClient {
    script: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, id: &str, behavior: Behavior) -> Self {
        self.script.insert(id.to_string(), behavior);
        self
    }

    pub fn calls(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ResourceClient for ScriptedClient {
    async fn fetch(&self, selector: &ResourceSelector) -> Result<ResourceDescriptor, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(selector.id.clone()).or_default();
            *count += 1;
            *count
        };

        let not_found = || FetchError::NotFound {
            kind: selector.kind,
            id: selector.id.clone(),
        };

        match self.script.get(&selector.id) {
            None | Some(Behavior::NotFound) => Err(not_found()),
            Some(Behavior::Found(d)) => Ok(d.clone()),
            Some(Behavior::Slow(delay, d)) => {
                tokio::time::sleep(*delay).await;
                Ok(d.clone())
            }
            Some(Behavior::Transient) => Err(FetchError::Transient("503 Service Unavailable".into())),
            Some(Behavior::Flaky(failures, d)) => {
                if call <= *failures {
                    Err(FetchError::Transient("429 Too Many Requests".into()))
                } else {
                    Ok(d.clone())
                }
            }
            Some(Behavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn network(id: &str, state: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(ResourceKind::Network, id, state)
}

/// Retry policy with millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(8),
    }
}
