use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::broadcast;

use crate::dispatch::Fetch;
use crate::error::{ApiError, Result};
use crate::query::Query;

// One settled outcome per flight, buffered for late-polling subscribers.
const SETTLE_CHANNEL_CAPACITY: usize = 1;

type Outcome = Result<Value>;

enum EntryState {
    /// Fetch in flight. Concurrent lookups subscribe instead of refetching.
    /// The flight id distinguishes this flight from a successor started after
    /// an `invalidate` raced with settlement.
    Pending {
        tx: broadcast::Sender<Outcome>,
        flight: u64,
    },
    Ready {
        value: Value,
        inserted: Instant,
    },
    /// Kept so the failure is observable until the next lookup, which always
    /// starts fresh rather than replaying the error past its flight.
    Failed {
        error: ApiError,
    },
}

/// De-duplicating, TTL-bounded cache over a [`Fetch`] implementation.
///
/// Guarantees at most one outstanding network call per unique [`Query`]:
/// concurrent lookups for the same query share a single in-flight fetch and
/// all observe the identical outcome, value or error. Entries expire lazily
/// after `ttl`; `invalidate` removes one eagerly.
pub struct QueryCache {
    fetcher: Arc<dyn Fetch>,
    ttl: Duration,
    entries: Arc<Mutex<HashMap<Query, EntryState>>>,
    next_flight: AtomicU64,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn Fetch>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_flight: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Serve `query` from cache, join the in-flight fetch for it, or start a
    /// fresh one. The underlying fetch runs detached on the runtime, so a
    /// caller abandoning interest neither aborts it nor disturbs the other
    /// subscribers.
    pub async fn lookup_or_fetch(&self, query: Query) -> Result<Value> {
        let mut rx = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(&query) {
                Some(EntryState::Ready { value, inserted }) if inserted.elapsed() < self.ttl => {
                    return Ok(value.clone());
                }
                Some(EntryState::Pending { tx, .. }) => tx.subscribe(),
                // Absent, expired or failed: this caller opens a new flight.
                _ => {
                    if let Some(EntryState::Failed { error }) = entries.get(&query) {
                        log::debug!("retrying {} after earlier failure: {}", query, error);
                    }
                    let (tx, rx) = broadcast::channel(SETTLE_CHANNEL_CAPACITY);
                    let flight = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    entries.insert(
                        query.clone(),
                        EntryState::Pending {
                            tx: tx.clone(),
                            flight,
                        },
                    );
                    self.spawn_fetch(query, tx, flight);
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // Only reachable if the runtime tears the fetch task down mid-flight.
            Err(_) => Err(ApiError::Transport(
                "fetch task dropped before settling".into(),
            )),
        }
    }

    /// Remove the entry for `query` regardless of state. The next lookup
    /// starts fresh; an in-flight fetch still settles its current subscribers.
    pub fn invalidate(&self, query: &Query) {
        self.entries.lock().unwrap().remove(query);
    }

    /// Drop every settled entry that can no longer serve a lookup. Lazy
    /// removal on access is the baseline policy; this reclaims memory for
    /// queries that are never asked for again.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.entries
            .lock()
            .unwrap()
            .retain(|_, state| match state {
                EntryState::Pending { .. } => true,
                EntryState::Ready { inserted, .. } => inserted.elapsed() < ttl,
                EntryState::Failed { .. } => false,
            });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn spawn_fetch(&self, query: Query, tx: broadcast::Sender<Outcome>, flight: u64) {
        let fetcher = Arc::clone(&self.fetcher);
        let entries = Arc::clone(&self.entries);
        // Detached: once started, the fetch runs to completion even if every
        // subscriber goes away, so the in-flight work is never wasted.
        tokio::spawn(async move {
            let outcome = fetcher.fetch(&query).await;
            {
                let mut entries = entries.lock().unwrap();
                // Record the settled state only if this flight still owns the
                // slot; invalidate() may have cleared it mid-flight.
                let owns_slot = matches!(
                    entries.get(&query),
                    Some(EntryState::Pending { flight: owner, .. }) if *owner == flight
                );
                if owns_slot {
                    let settled = match &outcome {
                        Ok(value) => EntryState::Ready {
                            value: value.clone(),
                            inserted: Instant::now(),
                        },
                        Err(error) => EntryState::Failed {
                            error: error.clone(),
                        },
                    };
                    entries.insert(query, settled);
                }
            }
            // Subscribers may all be gone; a send error is fine then.
            let _ = tx.send(outcome);
        });
    }
}
