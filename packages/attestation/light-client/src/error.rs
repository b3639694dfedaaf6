//! Error types for the attestation light client

use alloy_primitives::Address;
use attestation_batch::BatchError;
use thiserror::Error;

/// Main error type for light client operations
#[derive(Error, Debug)]
pub enum LightClientError {
    /// No signatures were submitted at all
    #[error("no signatures provided")]
    EmptySignatures,

    /// A signature could not be parsed or did not recover to a usable identity
    #[error("signature verification failed")]
    InvalidSignature,

    /// A signature recovered to an address outside the attestor set
    #[error("unknown signer recovered from signature: {address}")]
    UnknownSigner {
        /// Recovered address that is not in the trusted set
        address: Address,
    },

    /// The same attestor signed twice in one signature set
    #[error("duplicate signer in signature set: {address}")]
    DuplicateSigner {
        /// Address that recovered from more than one signature
        address: Address,
    },

    /// Fewer distinct valid signers than the configured quorum
    #[error("signature threshold not met: got {got}, need {need}")]
    ThresholdNotMet {
        /// Count of valid, unique, known signers
        got: usize,
        /// Configured quorum
        need: usize,
    },

    /// The client state violates its own invariants
    #[error("invalid client state: {reason}")]
    InvalidClientState {
        /// Reason for error
        reason: String,
    },

    /// Cannot attest to data as malformed
    #[error("invalid attested data: {reason}")]
    InvalidAttestedData {
        /// Reason for error
        reason: String,
    },

    /// The batch's claimed height differs from the height being processed
    #[error("batch height {claimed} does not match queried height {queried}")]
    HeightMismatch {
        /// Height claimed inside the attested batch
        claimed: u64,
        /// Height the caller asked about
        queried: u64,
    },

    /// Client is frozen after misbehaviour; all writes are rejected
    #[error("client is frozen")]
    FrozenClient,

    /// No consensus record exists for the requested height
    #[error("no consensus timestamp recorded for height {0}")]
    ConsensusTimestampNotFound(u64),

    /// The batch scan rejected the membership or absence claim
    #[error("membership verification failed: {0}")]
    Membership(#[from] BatchError),

    /// Proof cannot be deserialized
    #[error("deserializing membership proof failed: {0}")]
    DeserializeProofFailed(#[source] serde_json::Error),

    /// An empty proof was submitted but the session cache holds no matching fact
    #[error("empty proof without a matching session-verified fact")]
    EmptyProof,
}
