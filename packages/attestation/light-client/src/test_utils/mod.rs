//! Test utilities: deterministic signers and canned batches

#[allow(
    missing_docs,
    clippy::missing_panics_doc,
    clippy::borrow_interior_mutable_const,
    clippy::declare_interior_mutable_const
)]
mod fixtures {
    use std::cell::LazyCell;

    use alloy_primitives::{Address, B256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use attestation_batch::{AttestedBatch, PacketCompact};

    use crate::{client_state::ClientState, membership::AttestationProof, update::Header};

    pub const S_SIGNERS: LazyCell<Vec<PrivateKeySigner>> = LazyCell::new(|| {
        vec![
            PrivateKeySigner::from_slice(&[0xcd; 32]).expect("valid key"),
            PrivateKeySigner::from_slice(&[0x02; 32]).expect("valid key"),
            PrivateKeySigner::from_slice(&[0x03; 32]).expect("valid key"),
            PrivateKeySigner::from_slice(&[0x10; 32]).expect("valid key"),
            PrivateKeySigner::from_slice(&[0x1F; 32]).expect("valid key"),
        ]
    });

    #[must_use]
    pub fn signers() -> Vec<PrivateKeySigner> {
        S_SIGNERS.clone()
    }

    #[must_use]
    pub fn attestor_addresses() -> Vec<Address> {
        S_SIGNERS.iter().map(PrivateKeySigner::address).collect()
    }

    /// Client state over the fixture attestors with the given quorum.
    #[must_use]
    pub fn client_state(quorum: usize) -> ClientState {
        ClientState::new(attestor_addresses(), quorum, 0).expect("valid fixture state")
    }

    /// A small batch for `height`: two live packets and one packet
    /// attested absent (zero commitment) at path `0x51..`.
    #[must_use]
    pub fn sample_batch(height: u64) -> AttestedBatch {
        AttestedBatch::new(
            height,
            vec![
                PacketCompact::new([0x11u8; 32], [0x12u8; 32]),
                PacketCompact::new([0x21u8; 32], [0x22u8; 32]),
                PacketCompact::new([0x51u8; 32], [0x00u8; 32]),
            ],
        )
    }

    /// Every fixture signer's raw 65-byte signature over `digest`.
    #[must_use]
    pub fn sign_digest(digest: B256) -> Vec<Vec<u8>> {
        S_SIGNERS
            .iter()
            .map(|signer| {
                signer
                    .sign_hash_sync(&digest)
                    .expect("signing should work")
                    .as_bytes()
                    .to_vec()
            })
            .collect()
    }

    /// A fully signed header carrying [`sample_batch`] for `height`.
    #[must_use]
    pub fn signed_header(height: u64, timestamp: u64) -> Header {
        let batch = sample_batch(height);
        Header {
            new_height: height,
            timestamp,
            attestation_data: batch.to_abi_bytes(),
            signatures: sign_digest(batch.digest()),
        }
    }

    /// A serialized [`AttestationProof`] envelope for `batch`, signed by
    /// every fixture signer.
    #[must_use]
    pub fn proof_bytes(batch: &AttestedBatch) -> Vec<u8> {
        let envelope = AttestationProof {
            attestation_data: batch.to_abi_bytes(),
            signatures: sign_digest(batch.digest()),
        };
        envelope.to_bytes().expect("envelope serializes")
    }
}

pub use fixtures::*;
