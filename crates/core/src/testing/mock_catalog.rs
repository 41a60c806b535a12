//! Mock subject catalog for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::catalog::{CatalogError, SubjectCatalog};

/// Mock implementation of [`SubjectCatalog`].
///
/// Behavior is scripted per id:
/// - [`insert`](Self::insert) registers the payload a fetch returns;
/// - [`fail_times`](Self::fail_times) makes the next `n` fetches of an id
///   fail with a rejected status before the payload is served;
/// - ids with no payload always answer HTTP 404.
///
/// Every call is recorded, and the mock tracks how many fetches were in
/// flight at once so tests can assert the admission limit held.
#[derive(Debug, Default)]
pub struct MockCatalog {
    payloads: RwLock<HashMap<u32, Value>>,
    failures: RwLock<HashMap<u32, u32>>,
    delay: RwLock<Duration>,
    calls: RwLock<Vec<u32>>,
    current: AtomicUsize,
    max_seen: AtomicUsize,
}

impl MockCatalog {
    /// Creates an empty mock; every fetch answers 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the payload served for an id.
    pub async fn insert(&self, id: u32, payload: Value) {
        self.payloads.write().await.insert(id, payload);
    }

    /// Makes the next `n` fetches of `id` fail with HTTP 503.
    pub async fn fail_times(&self, id: u32, n: u32) {
        self.failures.write().await.insert(id, n);
    }

    /// Adds a delay to every fetch, to widen concurrency windows.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Every id fetched, in call order.
    pub async fn calls(&self) -> Vec<u32> {
        self.calls.read().await.clone()
    }

    /// Highest number of fetches that were ever in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }

    fn rejected(id: u32, status: u16) -> CatalogError {
        CatalogError::RejectedStatus {
            status,
            url: format!("mock://subject/{}", id),
        }
    }
}

#[async_trait]
impl SubjectCatalog for MockCatalog {
    async fn subject(&self, id: u32) -> Result<Value, CatalogError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        self.calls.write().await.push(id);

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let result = {
            let mut failures = self.failures.write().await;
            match failures.get_mut(&id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Err(Self::rejected(id, 503))
                }
                _ => match self.payloads.read().await.get(&id) {
                    Some(payload) => Ok(payload.clone()),
                    None => Err(Self::rejected(id, 404)),
                },
            }
        };

        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
