//! Attestation aggregation service: polls a fixed set of attestor
//! endpoints and determines the highest height a quorum agrees on.

pub mod rpc {
    #![allow(missing_docs, clippy::pedantic)]
    tonic::include_proto!("aggregator");

    pub(crate) const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("aggregator_descriptor");
}

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod mock_attestor;
pub mod server;
pub mod tally;
