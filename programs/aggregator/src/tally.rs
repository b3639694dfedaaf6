//! Quorum tally over attestor responses.
//!
//! Responses are bucketed by `(height, digest(attested_data))`: only
//! attestors that agree on both the height and the exact payload count
//! toward the same bucket. Within a bucket each attestor identity counts
//! once, whatever order its responses arrive in.

use std::collections::HashMap;

use alloy_primitives::FixedBytes;
use sha2::{Digest as Sha2Digest, Sha256};

use crate::error::AggregatorError;
use crate::rpc::{AttestationEntry, QuorumAttestationResponse, SigPair};

/// Raw `r||s||v` signature length accepted from attestors.
pub const SIGNATURE_BYTE_LENGTH: usize = 65;
type Signature = FixedBytes<SIGNATURE_BYTE_LENGTH>;

/// Attestor identity length (20-byte address).
pub const ATTESTOR_ID_BYTE_LENGTH: usize = 20;
type AttestorId = FixedBytes<ATTESTOR_ID_BYTE_LENGTH>;

type PayloadDigest = FixedBytes<32>;

#[derive(Debug, Clone)]
struct BucketEntry {
    attestor_id: AttestorId,
    signature: Signature,
    endpoint: String,
}

#[derive(Debug, Clone)]
struct Bucket {
    timestamp: u64,
    attested_data: Vec<u8>,
    entries: Vec<BucketEntry>,
}

/// Maps `(height, payload digest)` to the attestations agreeing on it.
///
/// Structure:
/// ```text
/// (height 110, digest 0x1234..):
///     [attestor_A, attestor_B]
/// (height 110, digest 0x9876..):
///     [attestor_C]
/// ```
#[derive(Debug, Clone, Default)]
pub struct AttestationTally {
    buckets: HashMap<(u64, PayloadDigest), Bucket>,
}

impl AttestationTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one attestation entry reported by `endpoint` under the
    /// attestor identity `attestor_id`.
    ///
    /// Malformed entries (bad lengths, empty payload, a timestamp
    /// disagreeing with the entry's own bucket) are rejected; the caller
    /// logs and continues with other responses. A repeated identity
    /// within a bucket is ignored so one attestor can never count twice.
    pub fn insert(
        &mut self,
        endpoint: &str,
        attestor_id: &[u8],
        entry: AttestationEntry,
    ) -> Result<(), AggregatorError> {
        let invalid = |reason: String| AggregatorError::InvalidAttestation {
            endpoint: endpoint.to_string(),
            reason,
        };

        let attestor_id = AttestorId::try_from(attestor_id)
            .map_err(|_| invalid(format!("invalid attestor id length: {}", attestor_id.len())))?;
        let signature = Signature::try_from(entry.signature.as_slice())
            .map_err(|_| invalid(format!("invalid signature length: {}", entry.signature.len())))?;
        if entry.attested_data.is_empty() {
            return Err(invalid("empty attested data".into()));
        }

        let digest = PayloadDigest::from_slice(&Sha256::digest(&entry.attested_data));
        let bucket = self
            .buckets
            .entry((entry.height, digest))
            .or_insert_with(|| Bucket {
                timestamp: entry.timestamp,
                attested_data: entry.attested_data.clone(),
                entries: Vec::new(),
            });

        if bucket.timestamp != entry.timestamp {
            return Err(invalid(format!(
                "timestamp {} disagrees with bucket timestamp {} for height {}",
                entry.timestamp, bucket.timestamp, entry.height
            )));
        }
        if bucket.entries.iter().any(|e| e.attestor_id == attestor_id) {
            return Ok(());
        }

        bucket.entries.push(BucketEntry {
            attestor_id,
            signature,
            endpoint: endpoint.to_string(),
        });
        Ok(())
    }

    /// The bucket with the greatest height at or above `min_height`
    /// whose distinct-attestor count meets `quorum`. Maximization is
    /// deliberate: the freshest state a quorum agrees on, not the most
    /// popular state overall.
    #[must_use]
    pub fn best_quorum(&self, quorum: usize, min_height: u64) -> Option<QuorumAttestationResponse> {
        self.buckets
            .iter()
            .filter(|((height, _), bucket)| {
                *height >= min_height && bucket.entries.len() >= quorum
            })
            .max_by_key(|((height, _), _)| *height)
            .map(|((height, _), bucket)| {
                let mut endpoints: Vec<String> = bucket
                    .entries
                    .iter()
                    .map(|e| e.endpoint.clone())
                    .collect();
                endpoints.dedup();
                QuorumAttestationResponse {
                    height: *height,
                    timestamp: bucket.timestamp,
                    attested_data: bucket.attested_data.clone(),
                    signatures: bucket
                        .entries
                        .iter()
                        .map(|e| SigPair {
                            signature: e.signature.to_vec(),
                            attestor_id: e.attestor_id.to_vec(),
                        })
                        .collect(),
                    endpoints,
                }
            })
    }

    /// Partial tally of `(height, agreeing attestors)` per bucket, sorted
    /// by height, for observability in quorum failures.
    #[must_use]
    pub fn summary(&self) -> Vec<(u64, usize)> {
        let mut tally: Vec<(u64, usize)> = self
            .buckets
            .iter()
            .map(|((height, _), bucket)| (*height, bucket.entries.len()))
            .collect();
        tally.sort_unstable();
        tally
    }
}
