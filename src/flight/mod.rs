//! Flight Coordinator (request coalescing)
//!
//! Guarantees at most one in-flight execution per key. The first caller for
//! a key becomes the owner and runs the operation; callers arriving while it
//! runs wait on that call's completion signal and receive a clone of the
//! owner's result, error included.
//!
//! # Lifecycle of a call record
//!
//! ```text
//!  owner:   lock ─► insert record ─► unlock ─► op().await ─► lock ─► remove + publish ─► unlock
//!  waiter:  lock ─► clone receiver ─► unlock ─► wait for publish ─────────────────────────┘
//! ```
//!
//! - The map mutex is never held across `.await`; unrelated keys proceed
//!   concurrently and the operation may block on network I/O.
//! - Records are removed as soon as the owner finishes, so a later call
//!   re-executes. Result reuse across calls is the cache's job.
//! - If the owner's future is dropped mid-flight, its record is removed and
//!   its waiters get [`Error::FlightAbandoned`]. Waiters never re-run the
//!   operation themselves.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Error, Result};

type Slot<T> = Option<Result<T>>;

struct Call<T> {
    id: u64,
    done: watch::Receiver<Slot<T>>,
}

enum Role<T> {
    Owner(u64, watch::Sender<Slot<T>>),
    Waiter(watch::Receiver<Slot<T>>),
}

/// Deduplicates concurrent operations sharing a key
pub struct Flight<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> Flight<T> {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `op` for `key`, or join the execution already in flight.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let role = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(call) => Role::Waiter(call.done.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    calls.insert(key.to_string(), Call { id, done: rx });
                    Role::Owner(id, tx)
                }
            }
        };

        let (id, done) = match role {
            Role::Owner(id, done) => (id, done),
            Role::Waiter(done) => return Self::wait(key, done).await,
        };

        let mut guard = OwnerGuard {
            flight: self,
            key,
            id,
            done: Some(done),
        };

        let result = op().await;
        guard.complete(result.clone());
        result
    }

    /// Number of keys with an execution in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    async fn wait(key: &str, mut done: watch::Receiver<Slot<T>>) -> Result<T> {
        match done.wait_for(Option::is_some).await {
            Ok(slot) => (*slot)
                .clone()
                .unwrap_or_else(|| Err(Error::FlightAbandoned(key.to_string()))),
            Err(_) => Err(Error::FlightAbandoned(key.to_string())),
        }
    }

    /// Drop the record for `key` if it still belongs to call `id`
    fn forget(&self, key: &str, id: u64) {
        let mut calls = self.calls.lock();
        if calls.get(key).map(|call| call.id) == Some(id) {
            calls.remove(key);
        }
    }
}

impl<T: Clone> Default for Flight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Flight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

/// Owner-side handle: publishes on completion, cleans up on cancellation.
struct OwnerGuard<'a, T: Clone> {
    flight: &'a Flight<T>,
    key: &'a str,
    id: u64,
    done: Option<watch::Sender<Slot<T>>>,
}

impl<T: Clone> OwnerGuard<'_, T> {
    fn complete(&mut self, result: Result<T>) {
        if let Some(done) = self.done.take() {
            // Remove before publishing so no new caller can join a finished call.
            let mut calls = self.flight.calls.lock();
            if calls.get(self.key).map(|call| call.id) == Some(self.id) {
                calls.remove(self.key);
            }
            done.send_replace(Some(result));
        }
    }
}

impl<T: Clone> Drop for OwnerGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            // Cancelled before completion. Forget the record before closing the
            // channel so no new caller can join an abandoned call.
            tracing::debug!(key = %self.key, "in-flight owner dropped before completion");
            self.flight.forget(self.key, self.id);
            drop(done);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
