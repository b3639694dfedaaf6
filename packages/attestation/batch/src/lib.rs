#![doc = "Attested observation batches and membership scans"]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]

mod error;

pub mod batch;
pub mod scan;

pub use batch::{AttestedBatch, PacketCompact};
pub use error::BatchError;
