//! The attested batch data model and its ABI wire form.

use alloy_primitives::FixedBytes as AlloyFixedBytes;
use alloy_sol_types::SolValue;
use sha2::{Digest, Sha256};

/// handy alias for 32-byte fixed bytes
pub type B32 = AlloyFixedBytes<32>;

/// Represents a lightweight packet observation as
/// (hash(commitment path), commitment value). Carrying the path
/// hash gives attestations replay protection, since there is no
/// merkle proof to bind a value to its location.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PacketCompact {
    /// Packet's `commitment_path` hash
    pub path: B32,

    /// Packet's `commitment` value
    pub commitment: B32,
}

impl PacketCompact {
    /// Create a new packet compact from a path and a commitment
    pub fn new<T>(path: T, commitment: T) -> Self
    where
        T: Into<B32>,
    {
        Self {
            path: path.into(),
            commitment: commitment.into(),
        }
    }

    /// Convert packet compact to a tuple of path and commitment
    #[inline]
    #[must_use]
    pub const fn as_tuple(&self) -> (B32, B32) {
        (self.path, self.commitment)
    }
}

impl<T: Into<B32>> From<(T, T)> for PacketCompact {
    fn from((path, commitment): (T, T)) -> Self {
        Self::new(path, commitment)
    }
}

/// A signed unit of observation: the height the observation was made
/// at plus the packet commitments observed in that block.
///
/// The ABI wire form is `(uint64, (bytes32,bytes32)[])`, and signatures
/// are taken over the Sha256 digest of that encoding.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttestedBatch {
    /// Height the packets were observed at
    pub height: u64,
    /// Observed packet commitments
    packets: Vec<PacketCompact>,
}

impl AttestedBatch {
    /// Create a new batch from a height and a vector of [`PacketCompact`]
    #[must_use]
    pub const fn new(height: u64, packets: Vec<PacketCompact>) -> Self {
        Self { height, packets }
    }

    /// Iterate over each individual packet commitment
    pub fn packets(&self) -> impl Iterator<Item = &PacketCompact> {
        self.packets.iter()
    }

    /// Number of packets in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the batch carries no packets
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Encode the batch to ABI bytes as `(uint64, (bytes32,bytes32)[])`
    #[must_use]
    pub fn to_abi_bytes(&self) -> Vec<u8> {
        let tuples: Vec<(B32, B32)> = self.packets.iter().map(PacketCompact::as_tuple).collect();
        (self.height, tuples).abi_encode()
    }

    /// Decode a batch from ABI bytes encoded as `(uint64, (bytes32,bytes32)[])`
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid encoding.
    pub fn from_abi_bytes(raw: &[u8]) -> Result<Self, alloy_sol_types::Error> {
        let (height, tuples) = <(u64, Vec<(B32, B32)>)>::abi_decode(raw)?;
        let packets = tuples.into_iter().map(PacketCompact::from).collect();

        Ok(Self { height, packets })
    }

    /// Sha256 digest of the ABI wire form; this is what attestors sign
    #[must_use]
    pub fn digest(&self) -> B32 {
        let hash = Sha256::digest(self.to_abi_bytes());
        B32::from_slice(&hash)
    }
}
