//! Client update orchestration: signature quorum, batch consistency,
//! then the consensus-store state transition.

use attestation_batch::AttestedBatch;
use serde::{Deserialize, Serialize};

use crate::{
    cache::VerificationCache,
    error::LightClientError,
    store::{ConsensusStore, UpdateOutcome},
    verify::{attestation_digest, verify_signatures},
};

/// A claimed observation submitted as a client update. The batch bytes
/// stay opaque here; [`update_client`] decodes them after the quorum
/// check so signatures are always verified over the exact signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The height this header attests to
    pub new_height: u64,
    /// Timestamp (seconds) of the new height
    pub timestamp: u64,
    /// ABI-encoded [`AttestedBatch`] that was signed
    pub attestation_data: Vec<u8>,
    /// Raw 65-byte signatures in `r||s||v` format for address recovery
    pub signatures: Vec<Vec<u8>>,
}

/// Apply a claimed observation to the store.
///
/// Verifies the signature quorum over the batch digest (skipping the
/// crypto when this session already verified the same digest at the same
/// height), checks the batch's internally-claimed height against the
/// header, then records the observation. Packets of an accepted batch
/// are marked in `cache` so a same-session membership query can use the
/// empty-proof fast path.
///
/// # Errors
/// Returns an error on a frozen client, on any signature/quorum failure,
/// on a malformed batch, or on a height mismatch. A conflicting
/// timestamp is not an error: it is reported as
/// [`UpdateOutcome::Misbehaviour`] and freezes the store.
pub fn update_client(
    store: &mut ConsensusStore,
    cache: &mut VerificationCache,
    header: &Header,
) -> Result<UpdateOutcome, LightClientError> {
    if store.is_frozen() {
        return Err(LightClientError::FrozenClient);
    }

    let digest = attestation_digest(&header.attestation_data);
    if !cache.is_digest_verified(header.new_height, digest) {
        let (attestors, quorum) = store.attestor_set();
        verify_signatures(digest, &header.signatures, attestors, quorum)?;
    }

    let batch = AttestedBatch::from_abi_bytes(&header.attestation_data).map_err(|e| {
        LightClientError::InvalidAttestedData {
            reason: format!("attestation data is not a valid batch: {e}"),
        }
    })?;
    if batch.height != header.new_height {
        return Err(LightClientError::HeightMismatch {
            claimed: batch.height,
            queried: header.new_height,
        });
    }

    let outcome = store.record_observation(header.new_height, header.timestamp)?;

    if outcome != UpdateOutcome::Misbehaviour {
        cache.mark_digest_verified(header.new_height, digest);
        for packet in batch.packets() {
            cache.mark_member(header.new_height, packet.path, packet.commitment);
        }
    }

    Ok(outcome)
}
