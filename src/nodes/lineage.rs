use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identifier shared by a node and all of its clones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageId(pub u64);

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Monotonic source of lineage ids.
///
/// Every freshly constructed node draws one id; clones copy theirs. The counter
/// is atomic so operators running on several threads can share one instance
/// without handing out duplicate ids.
#[derive(Debug)]
pub struct LineageCounter {
    next: AtomicU64,
}

impl LineageCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> LineageId {
        LineageId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure ids handed out later never collide with `id`
    pub fn observe(&self, id: LineageId) {
        self.next.fetch_max(id.0 + 1, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for LineageCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic() {
        let counter = LineageCounter::new();
        let a = counter.next_id();
        let b = counter.next_id();
        assert!(b > a);
    }

    #[test]
    fn test_observe_skips_past_seen_ids() {
        let counter = LineageCounter::new();
        counter.observe(LineageId(41));
        assert_eq!(counter.next_id(), LineageId(42));

        // Observing an older id never rewinds
        counter.observe(LineageId(3));
        assert_eq!(counter.next_id(), LineageId(43));
    }

    #[test]
    fn test_shared_counter_never_duplicates() {
        let counter = Arc::new(LineageCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || (0..250).map(|_| counter.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<LineageId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
