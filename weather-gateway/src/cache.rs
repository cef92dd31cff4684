//! In-memory forecast cache with expiry and single-flight fetches.
//!
//! Every key maps to one slot: either a stored entry or a pending fetch that
//! later callers attach to. Slot transitions happen under the key's shard lock
//! in a `DashMap`, and that lock is never held across an await, so work on
//! unrelated keys proceeds independently.
//!
//! Fetches run on their own task. A caller that goes away (client disconnect,
//! handler cancelled) stops waiting but does not abort the fetch.

use chrono::{DateTime, Duration, Utc};
use common::errors::FetchError;
use common::models::HourlyRecord;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use utoipa::ToSchema;

use crate::cache_key::CacheKey;
use crate::clock::Clock;

pub const HOURS_PER_DAY: usize = 24;

/// Exactly 24 hourly records in ascending time order.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    hours: Vec<HourlyRecord>,
}

impl DailyForecast {
    pub fn new(hours: Vec<HourlyRecord>) -> Result<Self, FetchError> {
        if hours.len() != HOURS_PER_DAY {
            return Err(FetchError::invalid_response(format!(
                "expected {} hourly records, got {}",
                HOURS_PER_DAY,
                hours.len()
            )));
        }
        if hours.windows(2).any(|pair| pair[0].time >= pair[1].time) {
            return Err(FetchError::invalid_response(
                "hourly records are not in ascending time order",
            ));
        }

        Ok(Self { hours })
    }

    pub fn hours(&self) -> &[HourlyRecord] {
        &self.hours
    }

    pub fn into_hours(self) -> Vec<HourlyRecord> {
        self.hours
    }
}

/// A stored forecast. Immutable once stored; a refresh replaces the whole entry.
#[derive(Debug, Clone)]
pub struct ForecastEntry {
    pub key: CacheKey,
    pub hours: Vec<HourlyRecord>,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ForecastEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    fn is_servable(&self, now: DateTime<Utc>) -> bool {
        self.is_live(now) && self.hours.len() == HOURS_PER_DAY
    }
}

type FetchOutcome = Result<Arc<ForecastEntry>, FetchError>;

enum Slot {
    Ready(Arc<ForecastEntry>),
    Pending(watch::Receiver<Option<FetchOutcome>>),
}

enum Lookup {
    Hit(Arc<ForecastEntry>),
    Join(watch::Receiver<Option<FetchOutcome>>),
    Lead(
        watch::Sender<Option<FetchOutcome>>,
        watch::Receiver<Option<FetchOutcome>>,
    ),
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStats {
    /// Live entries currently stored
    pub entries: usize,
    /// Requests served from a stored entry
    pub hits: u64,
    /// Requests that started an upstream fetch
    pub misses: u64,
    /// Requests that attached to a fetch already in flight
    pub coalesced: u64,
}

pub struct ForecastCache {
    slots: Arc<DashMap<CacheKey, Slot>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl ForecastCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            ttl,
            clock,
            counters: Counters::default(),
        }
    }

    /// Return the live entry for `key`, or fetch it exactly once no matter how
    /// many callers ask concurrently. The flag is `true` only when the entry
    /// was already stored before this call.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        fetcher: F,
    ) -> Result<(Arc<ForecastEntry>, bool), FetchError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<DailyForecast, FetchError>> + Send + 'static,
    {
        let now = self.clock.now();

        let lookup = match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = match occupied.get() {
                    Slot::Ready(entry) if entry.is_servable(now) => Some(Lookup::Hit(entry.clone())),
                    Slot::Pending(rx) => Some(Lookup::Join(rx.clone())),
                    // Expired or unusable: replace with a fresh fetch.
                    Slot::Ready(_) => None,
                };
                existing.unwrap_or_else(|| {
                    let (tx, rx) = watch::channel(None);
                    occupied.insert(Slot::Pending(rx.clone()));
                    Lookup::Lead(tx, rx)
                })
            }
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(Slot::Pending(rx.clone()));
                Lookup::Lead(tx, rx)
            }
        };

        match lookup {
            Lookup::Hit(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache hit");
                Ok((entry, true))
            }
            Lookup::Join(rx) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Joining in-flight fetch");
                wait_for_outcome(rx).await.map(|entry| (entry, false))
            }
            Lookup::Lead(tx, rx) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                info!(key = %key, "Cache miss, fetching from upstream");

                // A fetcher that panics before handing over its future must not
                // leave the pending slot behind for later callers to join.
                let fetch = match panic::catch_unwind(AssertUnwindSafe(fetcher)) {
                    Ok(fetch) => fetch,
                    Err(payload) => {
                        self.slots.remove_if(&key, |_, slot| {
                            matches!(slot, Slot::Pending(pending) if pending.same_channel(&rx))
                        });
                        tx.send_replace(Some(Err(FetchError::unavailable(
                            "fetcher panicked before starting",
                        ))));
                        warn!(key = %key, "Fetcher panicked, cleared in-flight slot");
                        panic::resume_unwind(payload);
                    }
                };

                self.spawn_fetch(key, fetch, tx);
                wait_for_outcome(rx).await.map(|entry| (entry, false))
            }
        }
    }

    fn spawn_fetch<Fut>(
        &self,
        key: CacheKey,
        fetch: Fut,
        tx: watch::Sender<Option<FetchOutcome>>,
    ) where
        Fut: Future<Output = Result<DailyForecast, FetchError>> + Send + 'static,
    {
        let slots = self.slots.clone();
        let clock = self.clock.clone();
        let ttl = self.ttl;

        tokio::spawn(
            async move {
                // Inner task so a panicking fetcher still produces an outcome.
                let result = match tokio::spawn(fetch).await {
                    Ok(result) => result,
                    Err(e) => Err(FetchError::unavailable(format!("fetch task failed: {}", e))),
                };

                let outcome: FetchOutcome = result.map(|forecast| {
                    let fetched_at = clock.now();
                    Arc::new(ForecastEntry {
                        key: key.clone(),
                        hours: forecast.into_hours(),
                        fetched_at,
                        expires_at: fetched_at
                            .checked_add_signed(ttl)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC),
                    })
                });

                match &outcome {
                    Ok(entry) => {
                        slots.insert(key.clone(), Slot::Ready(entry.clone()));
                        info!(key = %key, expires_at = %entry.expires_at, "Stored forecast");
                    }
                    Err(e) => {
                        slots.remove_if(&key, |_, slot| matches!(slot, Slot::Pending(_)));
                        warn!(key = %key, error = %e, "Upstream fetch failed");
                    }
                }

                tx.send_replace(Some(outcome));
            }
            .in_current_span(),
        );
    }

    /// Drop expired entries. Pending fetches are left alone.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;

        self.slots.retain(|_, slot| {
            let keep = match slot {
                Slot::Ready(entry) => entry.is_servable(now),
                Slot::Pending(_) => true,
            };
            if !keep {
                purged += 1;
            }
            keep
        });

        purged
    }

    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: std::time::Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = self.purge_expired();
                        if purged > 0 {
                            info!(purged, "Purged expired forecast entries");
                        }
                    }
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self
            .slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(entry) if entry.is_live(now)))
            .count();

        CacheStats {
            entries,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
        }
    }
}

async fn wait_for_outcome(mut rx: watch::Receiver<Option<FetchOutcome>>) -> FetchOutcome {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone(),
        Err(_) => None,
    };
    outcome.unwrap_or_else(|| Err(FetchError::unavailable("in-flight fetch was dropped")))
}
