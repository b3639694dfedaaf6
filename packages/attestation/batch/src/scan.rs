//! Membership and absence scans over an attested batch.
//!
//! Attestations carry no completeness guarantee over paths they do not
//! mention, so absence can only be proven for a path the batch
//! explicitly attests with the canonical zero commitment. A path the
//! batch never mentions fails closed.

use crate::{batch::B32, AttestedBatch, BatchError};

/// The canonical "absent" commitment value.
pub const ABSENT_COMMITMENT: B32 = B32::ZERO;

/// Verifies that `(path, value)` is attested by the batch.
///
/// Linear scan; batches are bounded by a single block's packet count.
///
/// # Errors
/// - [`BatchError::EmptyPackets`] if the batch has no packets
/// - [`BatchError::EmptyValue`] if `value` is the canonical absent value
/// - [`BatchError::NotMember`] if no packet matches both fields
pub fn verify_packet_membership(
    batch: &AttestedBatch,
    path: B32,
    value: B32,
) -> Result<(), BatchError> {
    if batch.is_empty() {
        return Err(BatchError::EmptyPackets);
    }
    if value == ABSENT_COMMITMENT {
        return Err(BatchError::EmptyValue);
    }

    if batch
        .packets()
        .any(|packet| packet.path == path && packet.commitment == value)
    {
        Ok(())
    } else {
        Err(BatchError::NotMember)
    }
}

/// Verifies that `path` is attested as absent by the batch.
///
/// # Errors
/// - [`BatchError::EmptyPackets`] if the batch has no packets
/// - [`BatchError::NotMember`] if the path is not attested at all
/// - [`BatchError::CommitmentPresent`] if the path carries a live commitment
pub fn verify_packet_absence(batch: &AttestedBatch, path: B32) -> Result<(), BatchError> {
    if batch.is_empty() {
        return Err(BatchError::EmptyPackets);
    }

    // fail closed: an unattested path proves nothing
    let packet = batch
        .packets()
        .find(|packet| packet.path == path)
        .ok_or(BatchError::NotMember)?;

    if packet.commitment == ABSENT_COMMITMENT {
        Ok(())
    } else {
        Err(BatchError::CommitmentPresent)
    }
}
