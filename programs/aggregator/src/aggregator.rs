//! The aggregation core: concurrent attestor fan-out and quorum discovery.

use std::sync::Arc;
use std::time::Duration;

use futures::{future::join_all, stream::FuturesUnordered, StreamExt};
use moka::future::Cache;
use tokio::{
    sync::Mutex,
    time::{sleep, timeout},
};
use tonic::{transport::Channel, Request, Response, Status};

use crate::{
    config::{AttestorConfig, Config},
    error::{AggregatorError, Result},
    rpc::{
        aggregator_service_server::AggregatorService,
        attestation_service_client::AttestationServiceClient, AttestationsFromHeightRequest,
        AttestationsFromHeightResponse, QuorumAttestationRequest, QuorumAttestationResponse,
    },
    tally::AttestationTally,
};

/// Queries every configured attestor endpoint and determines the highest
/// height a quorum of them agrees on. Owns only its in-flight query state
/// and a result cache; accepted results take effect by being submitted to
/// the verifier's update path, never by the aggregator itself.
#[derive(Debug)]
pub struct Aggregator {
    config: Arc<AttestorConfig>,
    clients: Vec<Mutex<AttestationServiceClient<Channel>>>,
    result_cache: Cache<u64, QuorumAttestationResponse>,
}

impl Aggregator {
    /// Connect to every configured endpoint and build the service.
    ///
    /// # Errors
    /// Returns [`AggregatorError::AttestorConnection`] naming the first
    /// endpoint that refused the connection.
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let clients = Self::create_clients(&config.attestor).await?;

        Ok(Self {
            config: Arc::new(config.attestor),
            clients,
            result_cache: Cache::builder()
                .max_capacity(config.cache.result_cache_capacity)
                .time_to_live(Duration::from_secs(config.cache.result_cache_ttl_secs))
                .build(),
        })
    }

    async fn create_clients(
        config: &AttestorConfig,
    ) -> Result<Vec<Mutex<AttestationServiceClient<Channel>>>> {
        let futures = config.attestor_endpoints.iter().map(|endpoint| async move {
            AttestationServiceClient::connect(endpoint.to_string())
                .await
                .map(Mutex::new)
                .map_err(|source| AggregatorError::AttestorConnection {
                    endpoint: endpoint.to_string(),
                    source,
                })
        });

        join_all(futures).await.into_iter().collect()
    }

    /// Highest height at or above `min_height` backed by a quorum of
    /// matching attestations, memoized per `min_height` for the cache
    /// TTL. Only successful aggregations are cached; failures are
    /// retried on the next call.
    ///
    /// # Errors
    /// See [`Aggregator::aggregate`].
    pub async fn find_quorum_height(&self, min_height: u64) -> Result<QuorumAttestationResponse> {
        if let Some(hit) = self.result_cache.get(&min_height).await {
            return Ok(hit);
        }

        let result = self.aggregate(min_height).await?;
        self.result_cache.insert(min_height, result.clone()).await;
        Ok(result)
    }

    /// One cold aggregation pass.
    ///
    /// Every endpoint is queried concurrently, each bounded by the
    /// per-endpoint timeout; the pass as a whole is bounded by the global
    /// aggregation timeout. Responses are drained as they arrive and the
    /// pass returns early once a quorum bucket exists, or fails fast once
    /// the endpoints still able to answer cannot close the gap to quorum.
    async fn aggregate(&self, min_height: u64) -> Result<QuorumAttestationResponse> {
        let quorum = self.config.quorum_threshold;
        let total = self.clients.len();
        if total < quorum {
            return Err(AggregatorError::InsufficientEndpoints {
                responsive: total,
                required: quorum,
            });
        }

        let per_endpoint = Duration::from_millis(self.config.attestor_query_timeout_ms);
        let mut queries: FuturesUnordered<_> = self
            .clients
            .iter()
            .enumerate()
            .map(|(i, client)| {
                let endpoint = self.config.attestor_endpoints[i].to_string();
                async move {
                    let result = timeout(per_endpoint, async {
                        let mut client = client.lock().await;
                        client
                            .attestations_from_height(Request::new(AttestationsFromHeightRequest {
                                min_height,
                            }))
                            .await
                    })
                    .await;

                    let result = match result {
                        Ok(Ok(response)) => Ok(response.into_inner()),
                        Ok(Err(status)) => Err(AggregatorError::GrpcStatus(status)),
                        Err(_) => Err(AggregatorError::Timeout(
                            self.config.attestor_query_timeout_ms,
                        )),
                    };
                    (endpoint, result)
                }
            })
            .collect();

        let deadline = sleep(Duration::from_millis(self.config.aggregation_timeout_ms));
        tokio::pin!(deadline);

        let mut tally = AttestationTally::new();
        let mut completed = 0usize;
        let mut successes = 0usize;

        loop {
            tokio::select! {
                () = &mut deadline => {
                    tracing::warn!(
                        "aggregation timed out with {completed}/{total} endpoints answered"
                    );
                    break;
                }
                maybe = queries.next() => {
                    let Some((endpoint, result)) = maybe else { break };
                    completed += 1;
                    match result {
                        Ok(AttestationsFromHeightResponse { attestor_id, attestations }) => {
                            successes += 1;
                            for entry in attestations {
                                if let Err(e) = tally.insert(&endpoint, &attestor_id, entry) {
                                    tracing::error!(
                                        "invalid attestation, continuing with other responses: {e}"
                                    );
                                }
                            }
                            // quorum already reached by responders so far
                            if let Some(best) = tally.best_quorum(quorum, min_height) {
                                return Ok(best);
                            }
                        }
                        Err(e) => {
                            tracing::error!("attestor [{endpoint}] failed, error: {e}");
                        }
                    }
                    let remaining = total - completed;
                    if successes + remaining < quorum {
                        return Err(AggregatorError::InsufficientEndpoints {
                            responsive: successes + remaining,
                            required: quorum,
                        });
                    }
                }
            }
        }

        tally
            .best_quorum(quorum, min_height)
            .ok_or_else(|| AggregatorError::QuorumNotReached {
                required: quorum,
                tally: tally.summary(),
            })
    }
}

#[tonic::async_trait]
impl AggregatorService for Aggregator {
    async fn get_quorum_attestation(
        &self,
        request: Request<QuorumAttestationRequest>,
    ) -> std::result::Result<Response<QuorumAttestationResponse>, Status> {
        let min_height = request.into_inner().min_height;
        let result = self.find_quorum_height(min_height).await?;
        Ok(Response::new(result))
    }
}

#[cfg(test)]
mod e2e_tests {
    use super::*;
    use crate::{
        config::{CacheConfig, Config, ServerConfig},
        mock_attestor::{honest_batch, setup_attestor_server, MockBehaviour},
    };
    use std::net::SocketAddr;

    fn test_config(
        timeout_ms: u64,
        quorum_threshold: usize,
        attestor_endpoints: Vec<SocketAddr>,
    ) -> Config {
        Config {
            server: ServerConfig {
                listener_addr: "127.0.0.1:50060".parse().unwrap(),
                log_level: "INFO".to_string(),
            },
            attestor: crate::config::AttestorConfig {
                attestor_query_timeout_ms: timeout_ms,
                aggregation_timeout_ms: timeout_ms * 4,
                quorum_threshold,
                attestor_endpoints: attestor_endpoints
                    .into_iter()
                    .map(|s| format!("http://{s}").parse().unwrap())
                    .collect(),
            },
            cache: CacheConfig::default(),
        }
    }

    #[tokio::test]
    async fn quorum_met_returns_freshest_common_height() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, id_1) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, id_2) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();
        let (addr_3, id_3) = setup_attestor_server(3, MockBehaviour::Honest).await.unwrap();
        let (addr_4, _) = setup_attestor_server(4, MockBehaviour::Failing).await.unwrap();

        let config = test_config(5_000, 3, vec![addr_1, addr_2, addr_3, addr_4]);
        let aggregator = Aggregator::from_config(config).await.unwrap();

        let response = aggregator.find_quorum_height(95).await.unwrap();

        // all honest attestors share height 110, the freshest bucket
        assert_eq!(response.height, 110);
        assert_eq!(response.timestamp, 1_700_000_110);
        assert_eq!(response.signatures.len(), 3);
        let ids: Vec<_> = response
            .signatures
            .iter()
            .map(|pair| pair.attestor_id.clone())
            .collect();
        assert!(ids.contains(&id_1));
        assert!(ids.contains(&id_2));
        assert!(ids.contains(&id_3));
        assert_eq!(response.endpoints.len(), 3);
    }

    #[tokio::test]
    async fn maximality_prefers_higher_quorum_bucket() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, _) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, _) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();
        let (addr_3, _) = setup_attestor_server(3, MockBehaviour::Honest).await.unwrap();

        let config = test_config(5_000, 3, vec![addr_1, addr_2, addr_3]);
        let aggregator = Aggregator::from_config(config).await.unwrap();

        // heights 95..=105 all have quorum too; 110 must win
        let response = aggregator.find_quorum_height(95).await.unwrap();
        assert_eq!(response.height, 110);
    }

    #[tokio::test]
    async fn min_height_above_all_buckets_fails_with_tally() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, _) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, _) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();
        let (addr_3, _) = setup_attestor_server(3, MockBehaviour::Honest).await.unwrap();

        let config = test_config(5_000, 3, vec![addr_1, addr_2, addr_3]);
        let aggregator = Aggregator::from_config(config).await.unwrap();

        let res = aggregator.find_quorum_height(200).await;
        assert!(matches!(
            res,
            Err(AggregatorError::QuorumNotReached { required: 3, ref tally }) if !tally.is_empty()
        ));
    }

    #[tokio::test]
    async fn disagreeing_attestors_do_not_pool_into_one_bucket() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, _) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, _) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();
        let (addr_3, _) = setup_attestor_server(3, MockBehaviour::Disagreeing).await.unwrap();
        let (addr_4, _) = setup_attestor_server(4, MockBehaviour::Disagreeing).await.unwrap();

        let config = test_config(5_000, 3, vec![addr_1, addr_2, addr_3, addr_4]);
        let aggregator = Aggregator::from_config(config).await.unwrap();

        let res = aggregator.find_quorum_height(95).await;
        assert!(matches!(
            res,
            Err(AggregatorError::QuorumNotReached { required: 3, .. })
        ));
    }

    #[tokio::test]
    async fn timeouts_and_failures_fail_fast() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, _) = setup_attestor_server(1, MockBehaviour::Delayed(1_000)).await.unwrap();
        let (addr_2, _) = setup_attestor_server(2, MockBehaviour::Delayed(1_000)).await.unwrap();
        let (addr_3, _) = setup_attestor_server(3, MockBehaviour::Delayed(1_000)).await.unwrap();
        let (addr_4, _) = setup_attestor_server(4, MockBehaviour::Failing).await.unwrap();

        let config = test_config(100, 3, vec![addr_1, addr_2, addr_3, addr_4]);
        let aggregator = Aggregator::from_config(config).await.unwrap();

        let res = aggregator.find_quorum_height(95).await;
        assert!(matches!(
            res,
            Err(AggregatorError::InsufficientEndpoints { required: 3, .. })
        ));
    }

    #[tokio::test]
    async fn global_deadline_ends_aggregation_with_partial_tally() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, _) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, _) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();
        let (addr_3, _) = setup_attestor_server(3, MockBehaviour::Delayed(5_000)).await.unwrap();
        let (addr_4, _) = setup_attestor_server(4, MockBehaviour::Delayed(5_000)).await.unwrap();

        // per-endpoint timeout far beyond the global deadline, so the
        // delayed endpoints are still outstanding when the pass ends
        let mut config = test_config(10_000, 3, vec![addr_1, addr_2, addr_3, addr_4]);
        config.attestor.aggregation_timeout_ms = 300;
        let aggregator = Aggregator::from_config(config).await.unwrap();

        let res = aggregator.find_quorum_height(95).await;
        assert!(matches!(
            res,
            Err(AggregatorError::QuorumNotReached { required: 3, ref tally })
                if tally.contains(&(110, 2))
        ));
    }

    #[tokio::test]
    async fn repeated_query_is_served_from_cache() {
        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, _) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, _) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();

        let config = test_config(5_000, 2, vec![addr_1, addr_2]);
        let aggregator = Aggregator::from_config(config).await.unwrap();

        let first = aggregator.find_quorum_height(95).await.unwrap();
        let second = aggregator.find_quorum_height(95).await.unwrap();
        assert_eq!(first, second);
    }

    /// The aggregator's output must be consumable by the verifier
    /// unchanged: update the light client with the quorum attestation,
    /// then answer a membership query against the same batch.
    #[tokio::test]
    async fn quorum_attestation_feeds_the_light_client() {
        use attestation_light_client::{
            cache::VerificationCache,
            client_state::ClientState,
            membership::{verify_membership, AttestationProof},
            store::ConsensusStore,
            update::{update_client, Header},
        };

        let _ = tracing_subscriber::fmt::try_init();

        let (addr_1, id_1) = setup_attestor_server(1, MockBehaviour::Honest).await.unwrap();
        let (addr_2, id_2) = setup_attestor_server(2, MockBehaviour::Honest).await.unwrap();
        let (addr_3, id_3) = setup_attestor_server(3, MockBehaviour::Honest).await.unwrap();

        let config = test_config(5_000, 3, vec![addr_1, addr_2, addr_3]);
        let aggregator = Aggregator::from_config(config).await.unwrap();
        let result = aggregator.find_quorum_height(95).await.unwrap();

        let attestors = [id_1, id_2, id_3]
            .iter()
            .map(|id| alloy_primitives::Address::from_slice(id))
            .collect();
        let client_state = ClientState::new(attestors, 3, 0).unwrap();
        let mut store = ConsensusStore::new(client_state).unwrap();
        let mut cache = VerificationCache::default();

        let signatures: Vec<Vec<u8>> = result
            .signatures
            .iter()
            .map(|pair| pair.signature.clone())
            .collect();
        let header = Header {
            new_height: result.height,
            timestamp: result.timestamp,
            attestation_data: result.attested_data.clone(),
            signatures: signatures.clone(),
        };
        update_client(&mut store, &mut cache, &header).expect("verifier accepts the aggregation");
        assert_eq!(store.latest_height(), result.height);

        let proof = AttestationProof {
            attestation_data: result.attested_data.clone(),
            signatures,
        }
        .to_bytes()
        .unwrap();
        let batch = honest_batch(result.height);
        let packet = batch.packets().next().unwrap();
        let ts = verify_membership(
            &store,
            &mut cache,
            result.height,
            &proof,
            packet.path,
            packet.commitment,
        )
        .expect("member");
        assert_eq!(ts, result.timestamp);
    }
}
