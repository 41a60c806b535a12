//! Bounded admission control for concurrent fetch tasks.
//!
//! [`ConcurrencyGate`] is a counting permit pool with one extra capability a
//! plain semaphore lacks: [`ConcurrencyGate::wait_idle`] lets a driver find
//! out when every permit has been returned *and* nobody is waiting for one,
//! i.e. when all dispatched work has drained. The driver acquires a permit
//! before spawning each task, hands the permit to the task, and waits for
//! the gate to go idle after the last dispatch.
//!
//! Permits are scoped: [`Permit`] returns itself to the gate when dropped,
//! so a task cannot leak its slot on any exit path (success, error, panic).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// Errors produced by the gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The gate did not become idle within the given deadline.
    /// The caller may simply wait again.
    #[error("gate did not become idle within {0:?}")]
    Timeout(Duration),
}

/// Permit accounting. `available` counts free slots, `waiting` counts
/// callers currently suspended in [`ConcurrencyGate::acquire`].
#[derive(Debug, Clone, Copy)]
struct GateState {
    available: usize,
    waiting: usize,
}

/// A bounded permit pool with an idle signal.
///
/// At most `limit` permits are ever outstanding. The gate is intended for
/// single-driver usage: one task acquires and one task waits for idleness;
/// permits themselves may be dropped from any task.
#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: usize,
    state: watch::Sender<GateState>,
}

/// An admission slot held by one in-flight task.
///
/// Dropping the permit returns it to the gate. The permit carries its own
/// handle to the gate's state, so it can ride into a spawned task and
/// outlive the driver's borrow of the gate.
#[must_use = "dropping a permit immediately releases its slot"]
#[derive(Debug)]
pub struct Permit {
    state: watch::Sender<GateState>,
}

/// Keeps the `waiting` counter honest while a caller is suspended in
/// `acquire`, including when the acquire future is cancelled mid-wait.
struct WaitingGuard<'a> {
    state: &'a watch::Sender<GateState>,
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.waiting -= 1);
    }
}

impl ConcurrencyGate {
    /// Creates a gate with the given permit limit. A limit of zero is
    /// clamped to one; a gate that can never admit anything is useless.
    pub fn new(limit: usize) -> Arc<Self> {
        let limit = limit.max(1);
        let (state, _) = watch::channel(GateState {
            available: limit,
            waiting: 0,
        });
        Arc::new(Self { limit, state })
    }

    /// The configured permit limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of permits currently free.
    pub fn available(&self) -> usize {
        self.state.borrow().available
    }

    /// Number of permits currently held by tasks.
    pub fn in_flight(&self) -> usize {
        self.limit - self.state.borrow().available
    }

    /// Waits until a permit is free and takes it.
    ///
    /// Never fails. Cancelling the returned future while suspended does not
    /// consume a permit and does not disturb the idle accounting.
    pub async fn acquire(&self) -> Permit {
        let mut rx = self.state.subscribe();
        self.state.send_modify(|s| s.waiting += 1);
        let _waiting = WaitingGuard { state: &self.state };
        loop {
            let mut taken = false;
            // send_if_modified keeps failed takes from waking other waiters
            self.state.send_if_modified(|s| {
                if s.available > 0 {
                    s.available -= 1;
                    taken = true;
                    true
                } else {
                    false
                }
            });
            if taken {
                return Permit {
                    state: self.state.clone(),
                };
            }
            // The gate owns the sender, so the channel cannot close here.
            let _ = rx.changed().await;
        }
    }

    /// Waits until all permits are free and nobody is suspended in
    /// [`acquire`](Self::acquire).
    ///
    /// The condition is re-checked on every permit release, and once
    /// immediately on entry, so a wait issued against an already-idle gate
    /// resolves without suspending. With `timeout` set, a
    /// [`GateError::Timeout`] is returned if the deadline passes first;
    /// waiting again afterwards is fine. Intended for a single waiter.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> Result<(), GateError> {
        let limit = self.limit;
        let mut rx = self.state.subscribe();
        let idle = async move {
            // Cannot fail while the gate keeps the sender alive.
            let _ = rx
                .wait_for(|s| s.available == limit && s.waiting == 0)
                .await;
        };
        match timeout {
            Some(deadline) => tokio::time::timeout(deadline, idle)
                .await
                .map_err(|_| GateError::Timeout(deadline)),
            None => {
                idle.await;
                Ok(())
            }
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.available += 1);
    }
}
