//! Process-local failed login counters.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::domain::LoginAttemptStore;

/// Idle time after which an identifier's failures are forgotten.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Map size that triggers the first sweep of idle identifiers.
const MIN_SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct AttemptEntry {
    failures: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

impl AttemptEntry {
    fn new(now: Instant) -> Self {
        Self {
            failures: 0,
            last_failure: now,
            locked_until: None,
        }
    }

    /// Idle for at least `ttl` and not inside an active lockout.
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        let unlocked = self.locked_until.is_none_or(|deadline| deadline <= now);
        unlocked && now.saturating_duration_since(self.last_failure) >= ttl
    }
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, AttemptEntry>,
    sweep_threshold: usize,
}

/// In-memory [`LoginAttemptStore`].
///
/// Counters live only as long as the process. Every operation takes the lock
/// once, so read-increment-write on a counter cannot interleave with another
/// request for the same identifier.
///
/// An identifier with no failure for `idle_ttl` (and no active lockout) reads
/// as zero failures. Such entries are dropped in a sweep that runs when a new
/// identifier arrives and the map has reached its sweep threshold; the
/// threshold then doubles relative to what survived, so sweeps stay amortized.
#[derive(Debug)]
pub struct InMemoryLoginAttemptStore {
    entries: Mutex<Entries>,
    idle_ttl: Duration,
}

impl Default for InMemoryLoginAttemptStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl InMemoryLoginAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Usually the lockout time, so a forgotten counter never shortens a lockout.
    #[must_use]
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                sweep_threshold: MIN_SWEEP_THRESHOLD,
            }),
            idle_ttl,
        }
    }

    /// Number of identifiers currently tracked, stale ones included.
    pub fn len(&self) -> usize {
        self.entries().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every stale identifier now and returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let mut entries = self.entries();
        Self::sweep(&mut entries, Instant::now(), self.idle_ttl)
    }

    fn sweep(entries: &mut Entries, now: Instant, ttl: Duration) -> usize {
        let before = entries.map.len();
        entries.map.retain(|_, entry| !entry.is_stale(now, ttl));
        let removed = before - entries.map.len();
        entries.sweep_threshold = (entries.map.len() * 2).max(MIN_SWEEP_THRESHOLD);
        if removed > 0 {
            debug!(removed, remaining = entries.map.len(), "Swept idle login counters");
        }
        removed
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // A panic while holding the lock cannot leave a counter half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live<'a>(&self, entries: &'a Entries, identifier: &str) -> Option<&'a AttemptEntry> {
        entries
            .map
            .get(identifier)
            .filter(|entry| !entry.is_stale(Instant::now(), self.idle_ttl))
    }
}

impl LoginAttemptStore for InMemoryLoginAttemptStore {
    fn failures(&self, identifier: &str) -> u32 {
        let entries = self.entries();
        self.live(&entries, identifier)
            .map_or(0, |entry| entry.failures)
    }

    fn record_failure(&self, identifier: &str) -> u32 {
        let now = Instant::now();
        let mut entries = self.entries();

        if !entries.map.contains_key(identifier) && entries.map.len() >= entries.sweep_threshold {
            Self::sweep(&mut entries, now, self.idle_ttl);
        }

        let entry = entries
            .map
            .entry(identifier.to_string())
            .or_insert_with(|| AttemptEntry::new(now));
        if entry.is_stale(now, self.idle_ttl) {
            *entry = AttemptEntry::new(now);
        }

        let previous = entry.failures;
        entry.failures = previous.saturating_add(1);
        entry.last_failure = now;
        previous
    }

    fn reset(&self, identifier: &str) {
        self.entries().map.remove(identifier);
    }

    fn locked_until(&self, identifier: &str) -> Option<Instant> {
        let entries = self.entries();
        self.live(&entries, identifier)
            .and_then(|entry| entry.locked_until)
    }

    fn lock_until(&self, identifier: &str, deadline: Instant) {
        let now = Instant::now();
        self.entries()
            .map
            .entry(identifier.to_string())
            .or_insert_with(|| AttemptEntry::new(now))
            .locked_until = Some(deadline);
    }
}
