//! Correlation Table - maps request ids to one-shot reply handlers.
//!
//! Flow:
//! 1. The executor generates a `RequestId`
//! 2. It calls `register()` with a handler forwarding into its private channel
//! 3. It publishes the request
//! 4. The reply listener calls `complete()` with the raw reply payload
//! 5. The executor awaits its channel or times out, then calls `cancel()`
//!
//! `complete()` removes the entry before invoking it, so a handler runs at
//! most once even if the same reply is delivered twice.

use crate::domain::correlation::RequestId;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use orm_telemetry::metrics::{EXPIRED_ENTRIES, PENDING_CALLS, UNMATCHED_REPLIES};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One-shot completion handler receiving the raw reply payload.
pub type ReplyHandler = Box<dyn FnOnce(Bytes) + Send + Sync + 'static>;

/// Errors from correlation table operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// A live entry already exists for this id.
    #[error("request id {0} is already registered")]
    Duplicate(RequestId),
}

/// A registered call waiting for its reply
struct CorrelationEntry {
    handler: ReplyHandler,
    registered_at: Instant,
    ttl: Duration,
}

impl CorrelationEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.registered_at) > self.ttl
    }
}

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct CorrelationStats {
    /// Total entries registered
    pub total_registered: AtomicU64,
    /// Total handlers invoked with a reply
    pub total_completed: AtomicU64,
    /// Total entries removed after their deadline
    pub total_expired: AtomicU64,
    /// Total entries removed without a reply
    pub total_cancelled: AtomicU64,
    /// Total replies that found no live entry
    pub total_unmatched: AtomicU64,
}

/// Time-bounded map from request id to reply handler.
///
/// Safe to share between the reply listener, the executors and the sweeper.
pub struct CorrelationTable {
    entries: DashMap<RequestId, CorrelationEntry>,
    default_ttl: Duration,
    stats: Arc<CorrelationStats>,
}

impl CorrelationTable {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            stats: Arc::new(CorrelationStats::default()),
        }
    }

    /// Time-to-live applied when `register` is given none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `handler` for `request_id` until it is taken, cancelled or
    /// older than `ttl`.
    ///
    /// An expired entry under the same id is replaced; a live one is not.
    pub fn register(
        &self,
        request_id: RequestId,
        handler: ReplyHandler,
        ttl: Option<Duration>,
    ) -> Result<(), CorrelationError> {
        let now = Instant::now();
        let entry = CorrelationEntry {
            handler,
            registered_at: now,
            ttl: ttl.unwrap_or(self.default_ttl),
        };

        match self.entries.entry(request_id) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Err(CorrelationError::Duplicate(request_id));
                }
                occupied.insert(entry);
                self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
                EXPIRED_ENTRIES.inc();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                PENDING_CALLS.inc();
            }
        }

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %request_id, "Registered correlation entry");
        Ok(())
    }

    /// Remove and return the handler for `request_id`.
    ///
    /// Expired entries are discarded and reported as a miss.
    pub fn take(&self, request_id: &RequestId) -> Option<ReplyHandler> {
        let (_, entry) = self.entries.remove(request_id)?;
        PENDING_CALLS.dec();

        if entry.is_expired(Instant::now()) {
            self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
            EXPIRED_ENTRIES.inc();
            return None;
        }
        Some(entry.handler)
    }

    /// Route a reply payload to the handler registered for `request_id`.
    ///
    /// Returns true if a handler was found and invoked.
    pub fn complete(&self, request_id: &RequestId, payload: Bytes) -> bool {
        match self.take(request_id) {
            Some(handler) => {
                handler(payload);
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %request_id, "Completed correlation entry");
                true
            }
            None => {
                self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
                UNMATCHED_REPLIES.inc();
                debug!(
                    request_id = %request_id,
                    "Reply for consumed, expired or unknown request id"
                );
                false
            }
        }
    }

    /// Drop the entry for `request_id` without invoking it.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        if self.entries.remove(request_id).is_some() {
            PENDING_CALLS.dec();
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove expired entries (TTL cleanup).
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|id, entry| {
            if entry.is_expired(now) {
                warn!(
                    request_id = %id,
                    elapsed_ms = now.duration_since(entry.registered_at).as_millis(),
                    ttl_ms = entry.ttl.as_millis(),
                    "Removing expired correlation entry"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.stats
                .total_expired
                .fetch_add(removed as u64, Ordering::Relaxed);
            EXPIRED_ENTRIES.inc_by(removed as f64);
            PENDING_CALLS.sub(removed as f64);
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.entries.contains_key(request_id)
    }

    pub fn stats(&self) -> &CorrelationStats {
        &self.stats
    }
}

impl fmt::Debug for CorrelationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationTable")
            .field("pending", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl Drop for CorrelationTable {
    fn drop(&mut self) {
        PENDING_CALLS.sub(self.entries.len() as f64);
    }
}

/// Background task sweeping expired entries every `interval`.
pub async fn cleanup_task(table: Arc<CorrelationTable>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick completes immediately.
    cleanup_interval.tick().await;

    loop {
        cleanup_interval.tick().await;
        let removed = table.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired correlation entries");
        }
    }
}
