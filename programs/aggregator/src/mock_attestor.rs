//! Mock attestor servers, runnable standalone via the `attestor`
//! subcommand and in-process in the end-to-end tests.

use std::{collections::BTreeMap, net::SocketAddr, time::Duration};

use alloy_primitives::B256;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use attestation_batch::{AttestedBatch, PacketCompact};
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, time::sleep};
use tonic::{transport::Server, Request, Response, Status};

use crate::rpc::{
    attestation_service_server::{AttestationService, AttestationServiceServer},
    AttestationEntry, AttestationsFromHeightRequest, AttestationsFromHeightResponse,
};

/// How a mock attestor behaves under query.
#[derive(Debug, Clone, Copy)]
pub enum MockBehaviour {
    /// Answers with the shared canonical observations.
    Honest,
    /// Always returns an internal error.
    Failing,
    /// Answers honestly after the given delay.
    Delayed(u64),
    /// Answers with observations only it believes in.
    Disagreeing,
}

/// The canonical batch every honest attestor observes at `height`.
pub fn honest_batch(height: u64) -> AttestedBatch {
    let h = u8::try_from(height % 251).unwrap();
    AttestedBatch::new(
        height,
        vec![
            PacketCompact::new([h; 32], [h.wrapping_add(1); 32]),
            PacketCompact::new([h.wrapping_add(2); 32], [0u8; 32]),
        ],
    )
}

fn disagreeing_batch(height: u64, seed: u8) -> AttestedBatch {
    // same height, privately forked payload
    let batch = honest_batch(height);
    let forged = PacketCompact::new([seed; 32], [seed.wrapping_mul(7); 32]);
    AttestedBatch::new(height, batch.packets().cloned().chain([forged]).collect())
}

#[derive(Debug)]
pub struct MockAttestor {
    // BTreeMap keeps heights sorted for range queries.
    store: BTreeMap<u64, AttestationEntry>,
    behaviour: MockBehaviour,
    signer: PrivateKeySigner,
}

impl MockAttestor {
    pub fn new(seed: u8, behaviour: MockBehaviour) -> Self {
        let signer = PrivateKeySigner::from_slice(&[seed; 32]).expect("valid key");

        let mut store = BTreeMap::new();
        for height in 95..=105u64 {
            let batch = match behaviour {
                MockBehaviour::Disagreeing => disagreeing_batch(height, seed),
                _ => honest_batch(height),
            };
            store.insert(height, Self::sign_entry(&signer, height, &batch));
        }
        // a fresher block only honest attestors have observed
        if !matches!(behaviour, MockBehaviour::Disagreeing) {
            let batch = honest_batch(110);
            store.insert(110, Self::sign_entry(&signer, 110, &batch));
        }

        Self {
            store,
            behaviour,
            signer,
        }
    }

    fn sign_entry(signer: &PrivateKeySigner, height: u64, batch: &AttestedBatch) -> AttestationEntry {
        let attested_data = batch.to_abi_bytes();
        let digest = B256::from_slice(&Sha256::digest(&attested_data));
        let signature = signer
            .sign_hash_sync(&digest)
            .expect("signing should work")
            .as_bytes()
            .to_vec();

        AttestationEntry {
            height,
            timestamp: 1_700_000_000 + height,
            attested_data,
            signature,
        }
    }

    pub fn attestor_id(&self) -> Vec<u8> {
        self.signer.address().to_vec()
    }
}

#[tonic::async_trait]
impl AttestationService for MockAttestor {
    async fn attestations_from_height(
        &self,
        request: Request<AttestationsFromHeightRequest>,
    ) -> Result<Response<AttestationsFromHeightResponse>, Status> {
        match self.behaviour {
            MockBehaviour::Failing => {
                return Err(Status::internal("simulated attestor failure"));
            }
            MockBehaviour::Delayed(ms) => sleep(Duration::from_millis(ms)).await,
            _ => {}
        }

        let min_height = request.into_inner().min_height;
        let attestations = self
            .store
            .range(min_height..)
            .map(|(_, entry)| entry.clone())
            .collect();

        Ok(Response::new(AttestationsFromHeightResponse {
            attestor_id: self.attestor_id(),
            attestations,
        }))
    }
}

/// Serve a mock attestor on `listen_addr`, blocking until the server
/// exits. This is what the `attestor` CLI subcommand runs.
pub async fn serve_attestor(
    listen_addr: SocketAddr,
    seed: u8,
    behaviour: MockBehaviour,
) -> crate::error::Result<()> {
    let attestor = MockAttestor::new(seed, behaviour);
    tracing::info!(
        "mock attestor 0x{} listening on {listen_addr}",
        hex::encode(attestor.attestor_id())
    );

    Server::builder()
        .add_service(AttestationServiceServer::new(attestor))
        .serve(listen_addr)
        .await?;

    Ok(())
}

/// Spin up a mock attestor server on a random available port.
/// Returns the address it is listening on and its attestor identity.
pub async fn setup_attestor_server(
    seed: u8,
    behaviour: MockBehaviour,
) -> anyhow::Result<(SocketAddr, Vec<u8>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let attestor = MockAttestor::new(seed, behaviour);
    let attestor_id = attestor.attestor_id();

    tokio::spawn(async move {
        Server::builder()
            .add_service(AttestationServiceServer::new(attestor))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
    });

    Ok((addr, attestor_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::attestation_service_client::AttestationServiceClient;

    #[tokio::test]
    async fn standalone_attestor_serves_on_a_fixed_address() {
        let _ = tracing_subscriber::fmt::try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        tokio::spawn(serve_attestor(addr, 7, MockBehaviour::Honest));
        sleep(Duration::from_millis(100)).await;

        let mut client = AttestationServiceClient::connect(format!("http://{addr}"))
            .await
            .expect("client connect failed");
        let resp = client
            .attestations_from_height(Request::new(AttestationsFromHeightRequest {
                min_height: 110,
            }))
            .await
            .expect("RPC failed")
            .into_inner();

        let expected_id = MockAttestor::new(7, MockBehaviour::Honest).attestor_id();
        assert_eq!(resp.attestor_id, expected_id);
        assert_eq!(resp.attestations.len(), 1);
        assert_eq!(resp.attestations[0].height, 110);
    }
}
