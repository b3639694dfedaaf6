use thiserror::Error;

/// Collection of errors that can occur when scanning an
/// attested batch for membership or absence.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch carries no packets at all
    #[error("batch contains no packets")]
    EmptyPackets,

    /// The queried commitment value is the canonical absent value
    #[error("queried value is empty")]
    EmptyValue,

    /// The queried (path, value) pair is not attested by the batch
    #[error("value is not a member of the attested batch")]
    NotMember,

    /// Non-membership was queried but the path carries a live commitment
    #[error("path carries a non-zero commitment")]
    CommitmentPresent,
}
