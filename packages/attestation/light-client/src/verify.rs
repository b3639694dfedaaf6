//! Quorum signature verification over an attestation digest.

use alloy_primitives::{Address, Signature, B256};
use sha2::{Digest, Sha256};

use crate::error::LightClientError;

/// Sha256 digest of raw attestation bytes. This is the prehash the
/// attestors sign.
#[must_use]
pub fn attestation_digest(attestation_data: &[u8]) -> B256 {
    let hash = Sha256::digest(attestation_data);
    B256::from_slice(&hash)
}

/// Verifies that `signatures` carries at least `quorum` distinct, valid
/// signatures over `digest` from members of `attestor_set`.
///
/// Signatures are raw 65-byte `r||s||v` ECDSA; each recovers to a 20-byte
/// address that must belong to the attestor set. The first occurrence of a
/// signer wins; a later signature recovering to the same address is
/// reported as the duplicate. Pure function, no side effects.
///
/// Returns the distinct recovered signers in input order.
///
/// # Errors
/// - [`LightClientError::EmptySignatures`] on an empty signature list
/// - [`LightClientError::InvalidSignature`] if parsing or recovery fails,
///   or recovery yields the zero address
/// - [`LightClientError::UnknownSigner`] if a recovered address is outside the set
/// - [`LightClientError::DuplicateSigner`] if one address recovers twice
/// - [`LightClientError::ThresholdNotMet`] if fewer than `quorum` signers remain
pub fn verify_signatures(
    digest: B256,
    signatures: &[Vec<u8>],
    attestor_set: &[Address],
    quorum: usize,
) -> Result<Vec<Address>, LightClientError> {
    if signatures.is_empty() {
        return Err(LightClientError::EmptySignatures);
    }

    let mut signers: Vec<Address> = Vec::with_capacity(signatures.len());
    for raw in signatures {
        let signature = Signature::try_from(raw.as_slice())
            .map_err(|_| LightClientError::InvalidSignature)?;
        let address = signature
            .recover_address_from_prehash(&digest)
            .map_err(|_| LightClientError::InvalidSignature)?;

        if address == Address::ZERO {
            return Err(LightClientError::InvalidSignature);
        }
        if !attestor_set.contains(&address) {
            return Err(LightClientError::UnknownSigner { address });
        }
        if signers.contains(&address) {
            return Err(LightClientError::DuplicateSigner { address });
        }
        signers.push(address);
    }

    if signers.len() < quorum {
        return Err(LightClientError::ThresholdNotMet {
            got: signers.len(),
            need: quorum,
        });
    }

    Ok(signers)
}
