use std::collections::{HashSet, VecDeque};

use murmur_primitives::Digest;

/// Bounded recency set of already-seen envelope digests.
///
/// Eviction is oldest-first once `capacity` is reached; an evicted digest is
/// treated as unseen again. Sizing is the usual tradeoff: too small and
/// duplicates within the window get re-delivered, too large and memory grows
/// with traffic. The cache is owned by its relay instance and dies with it.
#[derive(Debug)]
pub struct DedupCache {
    seen: HashSet<Digest>,
    order: VecDeque<Digest>,
    capacity: usize,
}

impl DedupCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records `digest`; returns whether this was its first sight.
    pub fn insert(&mut self, digest: Digest) -> bool {
        if !self.seen.insert(digest) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                let _removed = self.seen.remove(&oldest);
            }
        }

        self.order.push_back(digest);

        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sight_then_duplicate() {
        let mut cache = DedupCache::new(8);
        let digest = Digest::of(b"hello");

        assert!(cache.insert(digest));
        assert!(!cache.insert(digest));
    }

    #[test]
    fn evicts_oldest_first_at_capacity() {
        let mut cache = DedupCache::new(2);
        let first = Digest::of(b"one");
        let second = Digest::of(b"two");
        let third = Digest::of(b"three");

        assert!(cache.insert(first));
        assert!(cache.insert(second));
        assert!(cache.insert(third));
        assert_eq!(cache.len(), 2);

        // `first` fell out of the window and counts as unseen again.
        assert!(cache.insert(first));
        // `third` is still within the window.
        assert!(!cache.insert(third));
    }

    #[test]
    fn zero_capacity_still_holds_one_entry() {
        let mut cache = DedupCache::new(0);
        let digest = Digest::of(b"only");

        assert!(cache.insert(digest));
        assert!(!cache.insert(digest));
    }
}
