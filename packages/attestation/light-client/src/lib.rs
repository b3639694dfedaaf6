#![doc = "Attestation-based light client: quorum signature verification, consensus tracking and membership queries"]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]
#![cfg_attr(test, allow(clippy::borrow_interior_mutable_const))]

pub mod cache;
pub mod client_state;
pub mod error;
pub mod membership;
pub mod store;
pub mod update;
pub mod verify;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
