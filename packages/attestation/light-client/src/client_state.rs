//! Attestor client state

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::LightClientError;

/// Minimal attestor client state.
/// Holds the fixed attestor set, the quorum threshold and the
/// progression/frozen flags mutated by updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Attestor identities (20-byte addresses recovered from signatures)
    pub attestor_addresses: Vec<Address>,
    /// Minimum required signatures
    pub min_required_sigs: usize,
    /// Latest height for tracking progression
    pub latest_height: u64,
    /// Whether the client is frozen due to misbehaviour
    pub is_frozen: bool,
}

impl ClientState {
    /// Construct a new client state from an attestor address set.
    ///
    /// # Errors
    /// Returns [`LightClientError::InvalidClientState`] if the set is empty,
    /// contains duplicates, or the quorum is not satisfiable by the set.
    pub fn new(
        attestor_addresses: Vec<Address>,
        min_required_sigs: usize,
        latest_height: u64,
    ) -> Result<Self, LightClientError> {
        let state = Self {
            attestor_addresses,
            min_required_sigs,
            latest_height,
            is_frozen: false,
        };
        state.validate()?;
        Ok(state)
    }

    /// Construct a new client state from a list of secp256k1 public keys,
    /// deriving the Ethereum address of each (keccak of the uncompressed
    /// key, last 20 bytes).
    ///
    /// # Errors
    /// Returns [`LightClientError::InvalidClientState`] on invariant violations,
    /// as in [`ClientState::new`].
    pub fn new_from_pubkeys(
        pub_keys: Vec<k256::ecdsa::VerifyingKey>,
        min_required_sigs: usize,
        latest_height: u64,
    ) -> Result<Self, LightClientError> {
        let attestor_addresses = pub_keys
            .into_iter()
            .map(|pk| {
                use sha3::{Digest as Sha3Digest, Keccak256};
                let uncompressed = pk.to_encoded_point(false);
                let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
                let mut addr_bytes = [0u8; 20];
                addr_bytes.copy_from_slice(&hash[12..]);
                Address::from(addr_bytes)
            })
            .collect();

        Self::new(attestor_addresses, min_required_sigs, latest_height)
    }

    /// Check the attestor-set and quorum invariants.
    ///
    /// # Errors
    /// Returns [`LightClientError::InvalidClientState`] naming the violated
    /// invariant.
    pub fn validate(&self) -> Result<(), LightClientError> {
        if self.attestor_addresses.is_empty() {
            return Err(LightClientError::InvalidClientState {
                reason: "attestor set is empty".into(),
            });
        }
        let mut sorted = self.attestor_addresses.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != self.attestor_addresses.len() {
            return Err(LightClientError::InvalidClientState {
                reason: "attestor set contains duplicates".into(),
            });
        }
        if self.min_required_sigs == 0 || self.min_required_sigs > self.attestor_addresses.len() {
            return Err(LightClientError::InvalidClientState {
                reason: format!(
                    "quorum {} not satisfiable by attestor set of {}",
                    self.min_required_sigs,
                    self.attestor_addresses.len()
                ),
            });
        }
        Ok(())
    }
}
