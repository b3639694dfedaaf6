//! Height → trusted-timestamp consensus store and its state machine.
//!
//! A store is `Active` until a conflicting observation for an already
//! recorded height is seen, at which point it freezes permanently.
//! Freezing is terminal: there is no in-place reset, recovery requires a
//! new client instance.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{client_state::ClientState, error::LightClientError};

/// Outcome of recording an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new consensus record was written
    Updated,
    /// The identical observation was already recorded; nothing changed
    NoOp,
    /// A conflicting timestamp was submitted for a known height; the
    /// client is now frozen
    Misbehaviour,
}

/// The verifier's owned state: client state plus all consensus records.
///
/// Writes must be serialized per instance; see [`SharedClient`] for the
/// locking wrapper. Reads never mutate records and remain available after
/// freezing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusStore {
    client_state: ClientState,
    /// height → trusted timestamp (seconds)
    records: BTreeMap<u64, u64>,
}

impl ConsensusStore {
    /// Create a store around a validated client state.
    ///
    /// # Errors
    /// Returns [`LightClientError::InvalidClientState`] if the state
    /// violates its invariants.
    pub fn new(client_state: ClientState) -> Result<Self, LightClientError> {
        client_state.validate()?;
        Ok(Self {
            client_state,
            records: BTreeMap::new(),
        })
    }

    /// Record a quorum-verified `(height, timestamp)` observation.
    ///
    /// Heights need not arrive in order; a historical height is accepted
    /// as long as it does not conflict with an existing record. Two
    /// different timestamps for the same height are proof the attestor
    /// set disagreed with itself, and the store freezes rather than pick
    /// a side.
    ///
    /// # Errors
    /// Returns [`LightClientError::FrozenClient`] once frozen.
    pub fn record_observation(
        &mut self,
        height: u64,
        timestamp: u64,
    ) -> Result<UpdateOutcome, LightClientError> {
        if self.client_state.is_frozen {
            return Err(LightClientError::FrozenClient);
        }

        match self.records.get(&height) {
            Some(&recorded) if recorded == timestamp => Ok(UpdateOutcome::NoOp),
            Some(_) => {
                self.client_state.is_frozen = true;
                Ok(UpdateOutcome::Misbehaviour)
            }
            None => {
                self.records.insert(height, timestamp);
                if height > self.client_state.latest_height {
                    self.client_state.latest_height = height;
                }
                Ok(UpdateOutcome::Updated)
            }
        }
    }

    /// Trusted timestamp recorded for `height`.
    ///
    /// # Errors
    /// Returns [`LightClientError::ConsensusTimestampNotFound`] if no
    /// record exists.
    pub fn consensus_timestamp(&self, height: u64) -> Result<u64, LightClientError> {
        self.records
            .get(&height)
            .copied()
            .ok_or(LightClientError::ConsensusTimestampNotFound(height))
    }

    /// The attestor identities and the quorum threshold.
    #[must_use]
    pub fn attestor_set(&self) -> (&[Address], usize) {
        (
            &self.client_state.attestor_addresses,
            self.client_state.min_required_sigs,
        )
    }

    /// Snapshot of the client state.
    #[must_use]
    pub const fn client_state(&self) -> &ClientState {
        &self.client_state
    }

    /// Highest recorded height.
    #[must_use]
    pub const fn latest_height(&self) -> u64 {
        self.client_state.latest_height
    }

    /// Whether the client froze on misbehaviour.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.client_state.is_frozen
    }

    /// Number of consensus records held.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Shared handle over a [`ConsensusStore`] giving the required locking
/// discipline: exclusive lock around the read-check-write of an update,
/// shared lock for reads. Lock poisoning is absorbed, the store holds no
/// invariant that a panicking reader could have broken mid-write.
#[derive(Debug, Clone)]
pub struct SharedClient(Arc<RwLock<ConsensusStore>>);

impl SharedClient {
    /// Wrap a store for shared use.
    #[must_use]
    pub fn new(store: ConsensusStore) -> Self {
        Self(Arc::new(RwLock::new(store)))
    }

    /// Run `f` under the exclusive write lock.
    pub fn with_write<T>(&self, f: impl FnOnce(&mut ConsensusStore) -> T) -> T {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run `f` under the shared read lock.
    pub fn with_read<T>(&self, f: impl FnOnce(&ConsensusStore) -> T) -> T {
        let guard = self.0.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Trusted timestamp recorded for `height`.
    ///
    /// # Errors
    /// Returns [`LightClientError::ConsensusTimestampNotFound`] if no
    /// record exists.
    pub fn consensus_timestamp(&self, height: u64) -> Result<u64, LightClientError> {
        self.with_read(|store| store.consensus_timestamp(height))
    }

    /// Snapshot of the client state.
    #[must_use]
    pub fn client_state(&self) -> ClientState {
        self.with_read(|store| store.client_state().clone())
    }
}

#[cfg(test)]
mod record_observation {
    use super::*;
    use crate::test_utils::client_state;

    fn store() -> ConsensusStore {
        ConsensusStore::new(client_state(3)).expect("valid state")
    }

    #[test]
    fn first_observation_updates_and_advances_latest() {
        let mut s = store();
        let res = s.record_observation(100, 1_000).expect("active");
        assert_eq!(res, UpdateOutcome::Updated);
        assert_eq!(s.latest_height(), 100);
        assert_eq!(s.consensus_timestamp(100).unwrap(), 1_000);
    }

    #[test]
    fn replay_is_idempotent() {
        let mut s = store();
        assert_eq!(
            s.record_observation(100, 1_000).unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            s.record_observation(100, 1_000).unwrap(),
            UpdateOutcome::NoOp
        );
        assert_eq!(s.latest_height(), 100);
        assert_eq!(s.record_count(), 1);
    }

    #[test]
    fn historical_heights_are_accepted() {
        let mut s = store();
        assert_eq!(
            s.record_observation(100, 1_000).unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            s.record_observation(90, 900).unwrap(),
            UpdateOutcome::Updated
        );
        // latest height does not regress
        assert_eq!(s.latest_height(), 100);
        assert_eq!(s.consensus_timestamp(90).unwrap(), 900);
    }

    #[test]
    fn conflicting_timestamp_freezes() {
        let mut s = store();
        assert_eq!(
            s.record_observation(100, 1_000).unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            s.record_observation(100, 2_000).unwrap(),
            UpdateOutcome::Misbehaviour
        );
        assert!(s.is_frozen());

        // a legitimate later update is now rejected
        let res = s.record_observation(101, 1_100);
        assert!(matches!(res, Err(LightClientError::FrozenClient)));

        // the original record is unchanged and still readable
        assert_eq!(s.consensus_timestamp(100).unwrap(), 1_000);
    }

    #[test]
    fn reads_survive_freezing() {
        let mut s = store();
        let _ = s.record_observation(100, 1_000).unwrap();
        let _ = s.record_observation(100, 2_000).unwrap();
        assert!(s.is_frozen());
        assert_eq!(s.consensus_timestamp(100).unwrap(), 1_000);
        assert!(matches!(
            s.consensus_timestamp(101),
            Err(LightClientError::ConsensusTimestampNotFound(101))
        ));
    }

    #[test]
    fn shared_client_serializes_writers() {
        let shared = SharedClient::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let client = shared.clone();
                std::thread::spawn(move || {
                    client.with_write(|s| s.record_observation(100 + i, 1_000 + i))
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
        assert_eq!(shared.with_read(ConsensusStore::record_count), 8);
        assert_eq!(shared.client_state().latest_height, 107);
    }
}
