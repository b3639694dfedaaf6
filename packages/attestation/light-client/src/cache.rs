//! Session-scoped verification cache.
//!
//! A best-effort memo of facts already established *within one session*:
//! which `(height, digest)` batches passed signature verification, and
//! which `(height, path, value)` packets those batches attested. The
//! caller constructs one per session and passes it through the calls; it
//! is never a process-wide cache, so a cached membership claim cannot
//! leak into another session. Cold-path evaluation always verifies
//! signatures first.

use std::collections::{HashSet, VecDeque};

use attestation_batch::batch::B32;

const DEFAULT_CAPACITY: usize = 1024;

/// Capacity-bounded memo of session-verified facts. Eviction is FIFO;
/// losing an entry only costs a re-verification.
#[derive(Debug)]
pub struct VerificationCache {
    capacity: usize,
    digests: HashSet<(u64, B32)>,
    digest_order: VecDeque<(u64, B32)>,
    members: HashSet<(u64, B32, B32)>,
    member_order: VecDeque<(u64, B32, B32)>,
}

impl VerificationCache {
    /// Create a cache bounded to `capacity` entries per fact kind.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            digests: HashSet::new(),
            digest_order: VecDeque::new(),
            members: HashSet::new(),
            member_order: VecDeque::new(),
        }
    }

    /// Whether signature verification already succeeded for this
    /// `(height, digest)` in this session.
    #[must_use]
    pub fn is_digest_verified(&self, height: u64, digest: B32) -> bool {
        self.digests.contains(&(height, digest))
    }

    /// Remember a successful signature verification.
    pub fn mark_digest_verified(&mut self, height: u64, digest: B32) {
        let key = (height, digest);
        if self.digests.insert(key) {
            self.digest_order.push_back(key);
            if self.digest_order.len() > self.capacity {
                if let Some(evicted) = self.digest_order.pop_front() {
                    self.digests.remove(&evicted);
                }
            }
        }
    }

    /// Whether `(path, value)` was part of a quorum-verified batch for
    /// `height` earlier in this session.
    #[must_use]
    pub fn is_member(&self, height: u64, path: B32, value: B32) -> bool {
        self.members.contains(&(height, path, value))
    }

    /// Remember a membership fact established by a verified batch.
    pub fn mark_member(&mut self, height: u64, path: B32, value: B32) {
        let key = (height, path, value);
        if self.members.insert(key) {
            self.member_order.push_back(key);
            if self.member_order.len() > self.capacity {
                if let Some(evicted) = self.member_order.pop_front() {
                    self.members.remove(&evicted);
                }
            }
        }
    }

    /// Drop every memoized fact.
    pub fn clear(&mut self) {
        self.digests.clear();
        self.digest_order.clear();
        self.members.clear();
        self.member_order.clear();
    }
}

impl Default for VerificationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_digests_and_members() {
        let mut cache = VerificationCache::default();
        let digest = B32::from([1u8; 32]);
        assert!(!cache.is_digest_verified(10, digest));
        cache.mark_digest_verified(10, digest);
        assert!(cache.is_digest_verified(10, digest));
        // same digest at another height is a different fact
        assert!(!cache.is_digest_verified(11, digest));

        let (path, value) = (B32::from([2u8; 32]), B32::from([3u8; 32]));
        cache.mark_member(10, path, value);
        assert!(cache.is_member(10, path, value));
        assert!(!cache.is_member(10, value, path));
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut cache = VerificationCache::with_capacity(2);
        for i in 0..3u8 {
            cache.mark_digest_verified(1, B32::from([i; 32]));
        }
        assert!(!cache.is_digest_verified(1, B32::from([0u8; 32])));
        assert!(cache.is_digest_verified(1, B32::from([1u8; 32])));
        assert!(cache.is_digest_verified(1, B32::from([2u8; 32])));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = VerificationCache::default();
        cache.mark_member(1, B32::from([1u8; 32]), B32::from([2u8; 32]));
        cache.clear();
        assert!(!cache.is_member(1, B32::from([1u8; 32]), B32::from([2u8; 32])));
    }
}
