//! Pending request table: correlation id -> one-shot reply handler.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use stark_core::Envelope;

/// Invoked at most once with the reply envelope.
pub type ReplyHandler = Box<dyn FnOnce(Envelope) + Send + 'static>;

struct PendingEntry {
    handler: ReplyHandler,
    created_at: Instant,
    deadline: Instant,
}

/// Result of looking up an inbound `corr`.
pub enum Take {
    /// Live entry; the handler now belongs to the caller.
    Live {
        handler: ReplyHandler,
        elapsed: Duration,
    },
    /// The entry had expired and has been removed; its handler was dropped.
    Expired,
    /// No entry under this id.
    Missing,
}

#[derive(Default)]
pub struct PendingRequests {
    entries: HashMap<String, PendingEntry>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `id` until `now + timeout`.
    /// Returns true if an older entry with the same id was replaced.
    pub fn insert(&mut self, id: String, handler: ReplyHandler, now: Instant, timeout: Duration) -> bool {
        let entry = PendingEntry {
            handler,
            created_at: now,
            deadline: now + timeout,
        };
        self.entries.insert(id, entry).is_some()
    }

    /// Remove the entry for `corr`. An entry past its deadline is never handed
    /// out, even if `expire` has not swept it yet.
    pub fn take(&mut self, corr: &str, now: Instant) -> Take {
        match self.entries.remove(corr) {
            Some(e) if now < e.deadline => Take::Live {
                handler: e.handler,
                elapsed: now.saturating_duration_since(e.created_at),
            },
            Some(_) => Take::Expired,
            None => Take::Missing,
        }
    }

    /// Drop every entry whose deadline has passed. Returns how many went.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now < e.deadline);
        before - self.entries.len()
    }

    /// Earliest deadline among live entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(hits: &Arc<AtomicUsize>) -> ReplyHandler {
        let hits = Arc::clone(hits);
        Box::new(move |_: Envelope| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn live_entry_is_taken_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut t = PendingRequests::new();
        let now = Instant::now();
        t.insert("q1".into(), counting(&hits), now, Duration::from_secs(300));

        match t.take("q1", now + Duration::from_secs(1)) {
            Take::Live { handler, elapsed } => {
                assert_eq!(elapsed, Duration::from_secs(1));
                handler(Envelope::new("reply"));
            }
            _ => unreachable!("entry must be live"),
        }
        assert!(matches!(t.take("q1", now), Take::Missing));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn entry_past_deadline_is_never_handed_out() {
        let mut t = PendingRequests::new();
        let now = Instant::now();
        t.insert("q1".into(), Box::new(|_: Envelope| {}), now, Duration::from_secs(5));
        assert!(matches!(t.take("q1", now + Duration::from_secs(5)), Take::Expired));
        assert!(t.is_empty());
    }

    #[test]
    fn expire_sweeps_only_overdue_entries() {
        let mut t = PendingRequests::new();
        let now = Instant::now();
        t.insert("short".into(), Box::new(|_: Envelope| {}), now, Duration::from_secs(1));
        t.insert("long".into(), Box::new(|_: Envelope| {}), now, Duration::from_secs(10));
        assert_eq!(t.next_deadline(), Some(now + Duration::from_secs(1)));

        assert_eq!(t.expire(now + Duration::from_secs(2)), 1);
        assert!(!t.contains("short"));
        assert!(t.contains("long"));
        assert_eq!(t.next_deadline(), Some(now + Duration::from_secs(10)));
    }

    #[test]
    fn same_id_replaces_previous_handler() {
        let mut t = PendingRequests::new();
        let now = Instant::now();
        assert!(!t.insert("q".into(), Box::new(|_: Envelope| {}), now, Duration::from_secs(1)));
        assert!(t.insert("q".into(), Box::new(|_: Envelope| {}), now, Duration::from_secs(1)));
        assert_eq!(t.len(), 1);
    }
}
