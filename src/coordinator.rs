//! Per-key request coordination: throttling and in-flight deduplication
//!
//! Two orthogonal primitives, both consulted before any network call goes
//! out:
//!
//! - [`RequestCoordinator::can_proceed`] rejects a *new* top-level request
//!   when too little time has passed since the last allowed one for the
//!   same key. It is a side-effecting check-and-record, not a pure
//!   predicate; call it exactly once per attempted request.
//! - [`RequestCoordinator::dedupe`] collapses concurrent requests for the
//!   identical resource into a single in-flight future whose outcome is
//!   delivered identically to every waiter. The slot is freed the instant
//!   the future settles, on success and failure alike, so a failed or
//!   timed-out fetch never blocks a fresh retry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::ApiError;

/// A shared in-flight fetch; cloning yields another waiter on the same
/// outcome.
pub type Flight<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

/// Coordinates requests sharing a result type `T`.
pub struct RequestCoordinator<T> {
    last_allowed: Mutex<HashMap<String, Instant>>,
    in_flight: Arc<Mutex<HashMap<String, Flight<T>>>>,
}

impl<T> Default for RequestCoordinator<T> {
    fn default() -> Self {
        Self {
            last_allowed: Mutex::new(HashMap::new()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Throttle check-and-record.
    ///
    /// Returns `false`, without touching the recorded timestamp, when less
    /// than `min_interval` has elapsed since the last allowed call for
    /// `key`; otherwise records now as the new last-allowed time and
    /// returns `true`.
    pub fn can_proceed(&self, key: &str, min_interval: Duration) -> bool {
        let mut map = self.last_allowed.lock().unwrap();
        let now = Instant::now();

        if let Some(last) = map.get(key) {
            let elapsed = now.duration_since(*last);
            if elapsed < min_interval {
                tracing::debug!(
                    key,
                    wait_ms = (min_interval - elapsed).as_millis() as u64,
                    "throttled"
                );
                return false;
            }
        }

        map.insert(key.to_string(), now);
        true
    }

    /// Single-flight execution of `factory` under `key`.
    ///
    /// When an entry for `key` is already in flight, the caller joins it and
    /// no duplicate work is triggered; otherwise `factory` runs and its
    /// outcome is shared with every concurrent caller. The returned future
    /// must be awaited for the flight to make progress.
    pub fn dedupe<F, Fut>(&self, key: &str, factory: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let mut map = self.in_flight.lock().unwrap();

        if let Some(existing) = map.get(key) {
            tracing::debug!(key, "joining in-flight request");
            return existing.clone();
        }

        let slot_map = Arc::clone(&self.in_flight);
        let slot_key = key.to_string();
        let inner = factory();
        let flight = async move {
            let outcome = inner.await;
            // Release the slot before any waiter observes the outcome.
            slot_map.lock().unwrap().remove(&slot_key);
            outcome
        }
        .boxed()
        .shared();

        map.insert(key.to_string(), flight.clone());
        flight
    }

    /// Number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}
