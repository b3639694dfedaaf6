//! Membership oracle: answers whether a packet commitment was observed
//! (or attested absent) at a recorded height, backed by the same
//! signature quorum as updates.

use attestation_batch::{batch::B32, scan, AttestedBatch};
use serde::{Deserialize, Serialize};

use crate::{
    cache::VerificationCache,
    error::LightClientError,
    store::ConsensusStore,
    verify::{attestation_digest, verify_signatures},
};

/// The proof envelope: a serialized attested batch plus the signatures
/// over its digest.
#[derive(Serialize, Deserialize)]
pub struct AttestationProof {
    /// ABI-encoded [`AttestedBatch`] that was signed
    pub attestation_data: Vec<u8>,
    /// Raw 65-byte `r||s||v` signatures of the attestors
    pub signatures: Vec<Vec<u8>>,
}

impl AttestationProof {
    /// Serialize the envelope to the JSON wire form.
    ///
    /// # Errors
    /// Returns the underlying serialization error.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Verify that `(path, value)` was observed at `height`, returning the
/// trusted timestamp of that height.
///
/// An empty `proof` takes the fast path: it succeeds only if this
/// session already verified a batch attesting the same packet at the
/// same height (see [`VerificationCache`]); it never establishes new
/// facts.
///
/// # Errors
/// - [`LightClientError::ConsensusTimestampNotFound`] if `height` has no record
/// - [`LightClientError::EmptyProof`] on an empty proof with no cached fact
/// - [`LightClientError::HeightMismatch`] if the batch claims another height
/// - any signature/quorum failure from [`verify_signatures`]
/// - [`LightClientError::Membership`] if the scan rejects the pair
pub fn verify_membership(
    store: &ConsensusStore,
    cache: &mut VerificationCache,
    height: u64,
    proof: &[u8],
    path: B32,
    value: B32,
) -> Result<u64, LightClientError> {
    let timestamp = store.consensus_timestamp(height)?;

    if proof.is_empty() {
        if cache.is_member(height, path, value) {
            return Ok(timestamp);
        }
        return Err(LightClientError::EmptyProof);
    }

    let batch = verified_batch(store, cache, height, proof)?;
    scan::verify_packet_membership(&batch, path, value)?;
    cache.mark_member(height, path, value);

    Ok(timestamp)
}

/// Verify that `path` was attested absent at `height`, returning the
/// trusted timestamp of that height.
///
/// A path the batch does not mention fails closed: attestation carries
/// no completeness guarantee, so "not mentioned" is not "absent". The
/// empty-proof fast path is not available for absence.
///
/// # Errors
/// As [`verify_membership`], with [`LightClientError::Membership`]
/// carrying the absence-specific scan failures.
pub fn verify_non_membership(
    store: &ConsensusStore,
    cache: &mut VerificationCache,
    height: u64,
    proof: &[u8],
    path: B32,
) -> Result<u64, LightClientError> {
    let timestamp = store.consensus_timestamp(height)?;

    if proof.is_empty() {
        return Err(LightClientError::EmptyProof);
    }

    let batch = verified_batch(store, cache, height, proof)?;
    scan::verify_packet_absence(&batch, path)?;

    Ok(timestamp)
}

/// Decode the proof envelope and run it through the signature quorum,
/// memoizing the verified digest in the session cache.
fn verified_batch(
    store: &ConsensusStore,
    cache: &mut VerificationCache,
    height: u64,
    proof: &[u8],
) -> Result<AttestedBatch, LightClientError> {
    let envelope: AttestationProof =
        serde_json::from_slice(proof).map_err(LightClientError::DeserializeProofFailed)?;

    let batch = AttestedBatch::from_abi_bytes(&envelope.attestation_data).map_err(|e| {
        LightClientError::InvalidAttestedData {
            reason: format!("attestation data is not a valid batch: {e}"),
        }
    })?;
    if batch.height != height {
        return Err(LightClientError::HeightMismatch {
            claimed: batch.height,
            queried: height,
        });
    }

    let digest = attestation_digest(&envelope.attestation_data);
    if !cache.is_digest_verified(height, digest) {
        let (attestors, quorum) = store.attestor_set();
        verify_signatures(digest, &envelope.signatures, attestors, quorum)?;
        cache.mark_digest_verified(height, digest);
    }

    Ok(batch)
}
