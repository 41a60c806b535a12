//! The fetch/validate/persist pipeline.
//!
//! [`Spider::run`] pulls ids from an [`IdRange`] and spawns one task per id
//! under [`ConcurrencyGate`] control: the driver acquires a permit before
//! spawning and the task owns that permit for its whole lifetime, so at
//! most `parallel` fetches are in flight and the gate goes idle exactly
//! when the last task finishes. Ids are dispatched in increasing order;
//! completion order is up to remote latency, which is safe because every
//! task writes to its own id-keyed file.
//!
//! No per-id failure escapes its task. Fetch errors are retried inside
//! [`with_retry`]; validation failures skip the id; store failures are
//! logged and contained.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::catalog::{Subject, SubjectCatalog};
use crate::gate::ConcurrencyGate;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{PersistOutcome, SubjectStore};

use super::config::SpiderConfig;
use super::ids::IdRange;

/// A progress tick, sent once per dispatched id.
#[derive(Debug, Clone, Copy)]
pub struct SpiderProgress {
    /// The id just dispatched.
    pub id: u32,
    /// How many ids have been dispatched so far, this one included.
    pub position: u64,
    /// Total number of ids in the sweep, when the range is bounded.
    pub total: Option<u64>,
}

/// The catalog sweep driver.
pub struct Spider<C: SubjectCatalog + 'static> {
    config: SpiderConfig,
    catalog: Arc<C>,
    store: Arc<SubjectStore>,
    gate: Arc<ConcurrencyGate>,
    retry: RetryPolicy,
}

impl<C: SubjectCatalog + 'static> Spider<C> {
    /// Creates a spider over the given catalog.
    pub fn new(config: SpiderConfig, catalog: Arc<C>) -> Self {
        let gate = ConcurrencyGate::new(config.parallel);
        let store = Arc::new(SubjectStore::new(&config.output_dir));
        Self {
            config,
            catalog,
            store,
            gate,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the default retry policy (retry forever, immediately).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The admission gate driving this sweep.
    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    /// Runs the sweep to completion and returns the number of ids
    /// dispatched. Does not return until every spawned task has finished.
    pub async fn run(&self) -> u64 {
        self.run_with_progress(None).await
    }

    /// Like [`run`](Self::run), reporting each dispatch on `progress`.
    /// A full or closed progress channel drops ticks rather than slowing
    /// the sweep down.
    pub async fn run_with_progress(&self, progress: Option<mpsc::Sender<SpiderProgress>>) -> u64 {
        let ids = IdRange::new(self.config.begin, self.config.end);
        let total = ids.len_hint();

        info!(
            "Starting catalog sweep: begin={}, end={:?}, parallel={}, output={}",
            self.config.begin,
            self.config.end,
            self.gate.limit(),
            self.config.output_dir.display()
        );

        let mut dispatched: u64 = 0;
        for id in ids {
            let permit = self.gate.acquire().await;
            dispatched += 1;

            if let Some(tx) = &progress {
                let _ = tx.try_send(SpiderProgress {
                    id,
                    position: dispatched,
                    total,
                });
            }

            let catalog = Arc::clone(&self.catalog);
            let store = Arc::clone(&self.store);
            let retry = self.retry;
            tokio::spawn(async move {
                // The permit rides with the task and frees the slot when
                // the task ends, on every path.
                let _permit = permit;
                process_subject(catalog.as_ref(), &store, retry, id).await;
            });
        }

        // Cannot time out without a deadline.
        let _ = self.gate.wait_idle(None).await;

        info!("Catalog sweep finished, {} subjects dispatched", dispatched);
        dispatched
    }
}

/// One unit of work: fetch, validate, persist.
async fn process_subject<C>(catalog: &C, store: &SubjectStore, retry: RetryPolicy, id: u32)
where
    C: SubjectCatalog + ?Sized,
{
    debug!("Subject {} task started", id);

    let payload = match with_retry(retry, "subject fetch", |_| catalog.subject(id)).await {
        Ok(payload) => payload,
        Err(e) => {
            error!("Giving up on subject {}: {}", id, e);
            return;
        }
    };

    let subject = match Subject::from_value(&payload) {
        Ok(subject) => subject,
        Err(e) => {
            warn!("Failed to validate subject {}: {}", id, e);
            return;
        }
    };

    match store.persist(&subject).await {
        Ok(PersistOutcome::Written(bytes)) => {
            info!(
                "Subject {} {:?} saved, {} bytes",
                id,
                subject.display_name(),
                bytes
            );
        }
        // The store logs the skip with the existing path.
        Ok(PersistOutcome::AlreadyExists) => {}
        Err(e) => {
            error!("Failed to persist subject {}: {}", id, e);
        }
    }
}
